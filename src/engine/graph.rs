//! `DependencyGraph`: the memoised transitive closure of the analyzer's
//! result from a root (spec 4.2).
//!
//! Node identity is kept in a `bimap::BiMap`, the same crate `dagrs`
//! itself reaches for to pair a task's own id with its position in the
//! adjacency vectors (`dagrs::engine::graph::Graph::find_index_by_id` /
//! `find_id_by_index`).

use std::collections::{HashMap, HashSet};

use bimap::BiMap;

use crate::analyzer::{self, Mode};
use crate::error::{AnalyzerError, CycleError};
use crate::task::descriptor::{TaskClass, TaskKind};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    index_of: BiMap<&'static TaskClass, usize>,
    /// `dependencies[i]` = nodes that `i` depends on (must finish first).
    dependencies: Vec<HashSet<usize>>,
    /// `dependents[i]` = nodes that depend on `i` (the reverse edges the
    /// clean pass walks).
    dependents: Vec<HashSet<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, class: &'static TaskClass) -> usize {
        if let Some(&idx) = self.index_of.get_by_left(&class) {
            return idx;
        }
        let idx = self.dependencies.len();
        self.dependencies.push(HashSet::new());
        self.dependents.push(HashSet::new());
        self.index_of.insert(class, idx);
        idx
    }

    fn add_edge(&mut self, dependent: usize, dependency: usize) {
        self.dependencies[dependent].insert(dependency);
        self.dependents[dependency].insert(dependent);
    }

    /// Recursively add `root` and every dependency the analyzer reports
    /// for any node already added, terminating on first revisit (spec
    /// 4.2). Section candidates are added as nodes (so their own subgraph
    /// is known ahead of selection) but never as edges out of the
    /// section — the late binding happens at execution time, not here.
    pub fn build_from(root: &'static TaskClass, mode: Mode) -> Result<Self, AnalyzerError> {
        let mut graph = Self::new();
        let mut visited: HashSet<&'static TaskClass> = HashSet::new();
        let mut stack = vec![root];

        while let Some(class) = stack.pop() {
            if !visited.insert(class) {
                continue;
            }
            let idx = graph.ensure_node(class);

            let deps = analyzer::dependencies_of(class, mode)?;
            for dep in deps {
                let dep_idx = graph.ensure_node(dep);
                graph.add_edge(idx, dep_idx);
                if !visited.contains(dep) {
                    stack.push(dep);
                }
            }

            if class.kind == TaskKind::Section {
                // A candidate depends on its own section, not the other way
                // round: the section has to run `select` and mark every
                // unselected candidate Skipped *before* any candidate can
                // become ready, otherwise every candidate would show up in
                // `next_ready_tasks()` immediately (no prerequisites of its
                // own) and run regardless of selection (spec 4.7 / 8
                // scenario 4: "exactly one candidate per section has its
                // `run` invoked").
                for get_candidate in class.candidates {
                    let candidate = get_candidate();
                    let candidate_idx = graph.ensure_node(candidate);
                    graph.add_edge(candidate_idx, idx);
                    if !visited.contains(candidate) {
                        stack.push(candidate);
                    }
                }
            }
        }

        Ok(graph)
    }

    /// Same shape as [`DependencyGraph::build_from`] but sources edges
    /// from a caller-supplied function instead of the Analyzer — used in
    /// tests and whenever dependencies were already computed some other
    /// way (spec 4.2).
    pub fn build_from_cached<F>(root: &'static TaskClass, mut edges_of: F) -> Self
    where
        F: FnMut(&'static TaskClass) -> HashSet<&'static TaskClass>,
    {
        let mut graph = Self::new();
        let mut visited: HashSet<&'static TaskClass> = HashSet::new();
        let mut stack = vec![root];

        while let Some(class) = stack.pop() {
            if !visited.insert(class) {
                continue;
            }
            let idx = graph.ensure_node(class);
            for dep in edges_of(class) {
                let dep_idx = graph.ensure_node(dep);
                graph.add_edge(idx, dep_idx);
                if !visited.contains(dep) {
                    stack.push(dep);
                }
            }
        }

        graph
    }

    pub fn contains(&self, class: &'static TaskClass) -> bool {
        self.index_of.get_by_left(&class).is_some()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &'static TaskClass> + '_ {
        (0..self.dependencies.len()).map(move |i| *self.index_of.get_by_right(&i).unwrap())
    }

    pub fn dependencies_for(&self, class: &'static TaskClass) -> HashSet<&'static TaskClass> {
        let Some(&idx) = self.index_of.get_by_left(&class) else {
            return HashSet::new();
        };
        self.dependencies[idx]
            .iter()
            .map(|&i| *self.index_of.get_by_right(&i).unwrap())
            .collect()
    }

    pub fn dependents_for(&self, class: &'static TaskClass) -> HashSet<&'static TaskClass> {
        let Some(&idx) = self.index_of.get_by_left(&class) else {
            return HashSet::new();
        };
        self.dependents[idx]
            .iter()
            .map(|&i| *self.index_of.get_by_right(&i).unwrap())
            .collect()
    }

    /// Kahn's algorithm: dependencies precede dependents. Errors with
    /// every cyclic SCC if the graph isn't acyclic.
    pub fn topological_order(&self) -> Result<Vec<&'static TaskClass>, CycleError> {
        let n = self.dependencies.len();
        let mut indegree: Vec<usize> = self.dependencies.iter().map(|d| d.len()).collect();
        let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(i) = ready.pop() {
            order.push(i);
            for &dependent in &self.dependents[i] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }

        if order.len() != n {
            let sccs = self.strongly_connected_components();
            let cyclic: Vec<Vec<&'static TaskClass>> = sccs
                .into_iter()
                .filter(|scc| scc.len() > 1 || self.is_self_dependency(scc[0]))
                .collect();
            return Err(CycleError { sccs: cyclic });
        }

        Ok(order
            .into_iter()
            .map(|i| *self.index_of.get_by_right(&i).unwrap())
            .collect())
    }

    fn is_self_dependency(&self, idx: usize) -> bool {
        self.dependencies[idx].contains(&idx)
    }

    /// Tarjan's algorithm, exposed for diagnostics (spec 4.2).
    pub fn strongly_connected_components(&self) -> Vec<Vec<&'static TaskClass>> {
        let n = self.dependencies.len();
        let mut index_counter = 0;
        let mut index = vec![None; n];
        let mut lowlink = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut stack = Vec::new();
        let mut sccs: Vec<Vec<usize>> = Vec::new();

        struct Frame {
            node: usize,
            child_iter: std::vec::IntoIter<usize>,
        }

        for start in 0..n {
            if index[start].is_some() {
                continue;
            }
            let mut call_stack: Vec<Frame> = vec![Frame {
                node: start,
                child_iter: self.dependencies[start]
                    .iter()
                    .copied()
                    .collect::<Vec<_>>()
                    .into_iter(),
            }];
            index[start] = Some(index_counter);
            lowlink[start] = index_counter;
            index_counter += 1;
            stack.push(start);
            on_stack[start] = true;

            while let Some(frame) = call_stack.last_mut() {
                let v = frame.node;
                if let Some(w) = frame.child_iter.next() {
                    if index[w].is_none() {
                        index[w] = Some(index_counter);
                        lowlink[w] = index_counter;
                        index_counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call_stack.push(Frame {
                            node: w,
                            child_iter: self.dependencies[w]
                                .iter()
                                .copied()
                                .collect::<Vec<_>>()
                                .into_iter(),
                        });
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w].unwrap());
                    }
                } else {
                    call_stack.pop();
                    if let Some(parent) = call_stack.last() {
                        lowlink[parent.node] = lowlink[parent.node].min(lowlink[v]);
                    }
                    if lowlink[v] == index[v].unwrap() {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().unwrap();
                            on_stack[w] = false;
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        sccs.push(component);
                    }
                }
            }
        }

        sccs.into_iter()
            .map(|scc| {
                scc.into_iter()
                    .map(|i| *self.index_of.get_by_right(&i).unwrap())
                    .collect()
            })
            .collect()
    }

    /// Builds the reverse graph used for the clean pass: an edge `a -> b`
    /// in the run graph (a depends on b) becomes `b -> a` (spec 4.3).
    pub fn reversed(&self) -> DependencyGraph {
        DependencyGraph {
            index_of: self.index_of.clone(),
            dependencies: self.dependents.clone(),
            dependents: self.dependencies.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Builds both edge directions at once, used internally when a caller
/// needs a plain lookup from class to its declared dependents, e.g. for
/// observer tree rendering.
pub fn index_by_name(graph: &DependencyGraph) -> HashMap<&'static str, &'static TaskClass> {
    graph.nodes().map(|c| (c.name, c)).collect()
}
