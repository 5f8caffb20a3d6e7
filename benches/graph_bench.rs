//! Benchmark: dependency graph construction and scheduler readiness.
//!
//! Measures `DependencyGraph::build_from_cached` and
//! `Scheduler::next_ready_tasks` over synthetic linear, diamond, and wide
//! parallel shapes, the same three topologies `dagrs`'s own `compute_dag`
//! family of examples exercises by hand.

use std::collections::HashSet;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use taski::engine::graph::DependencyGraph;
use taski::engine::scheduler::Scheduler;
use taski::task::{Exports, Instance, TaskClass, TaskContext, TaskKind, TaskResult};

struct BenchTask;

impl taski::task::TaskBody for BenchTask {
    fn run(&self, _ctx: &TaskContext<'_>) -> TaskResult<Exports> {
        Ok(Exports::new())
    }
}

fn leak_node(name: &'static str) -> &'static TaskClass {
    Box::leak(Box::new(TaskClass::new(
        name,
        "graph_bench",
        TaskKind::Task,
        "",
        &[],
        &[],
        || Instance::Task(Box::new(BenchTask)),
    )))
}

fn linear_chain(n: usize) -> (Vec<&'static TaskClass>, &'static TaskClass) {
    let names: Vec<&'static str> = (0..n).map(|i| Box::leak(format!("n{i}").into_boxed_str()) as &str).collect();
    let nodes: Vec<&'static TaskClass> = names.into_iter().map(leak_node).collect();
    (nodes.clone(), *nodes.last().unwrap())
}

fn diamond(width: usize) -> (Vec<&'static TaskClass>, &'static TaskClass) {
    let source = leak_node(Box::leak(String::from("source").into_boxed_str()));
    let sink = leak_node(Box::leak(String::from("sink").into_boxed_str()));
    let middle: Vec<&'static TaskClass> = (0..width)
        .map(|i| leak_node(Box::leak(format!("mid{i}").into_boxed_str())))
        .collect();
    let mut nodes = vec![source];
    nodes.extend(middle.iter().copied());
    nodes.push(sink);
    (nodes, sink)
}

fn edges_for_linear(nodes: &[&'static TaskClass], class: &'static TaskClass) -> HashSet<&'static TaskClass> {
    let idx = nodes.iter().position(|&c| std::ptr::eq(c, class)).unwrap();
    if idx == 0 {
        HashSet::new()
    } else {
        HashSet::from([nodes[idx - 1]])
    }
}

fn edges_for_diamond(
    nodes: &[&'static TaskClass],
    class: &'static TaskClass,
    source: &'static TaskClass,
    sink: &'static TaskClass,
) -> HashSet<&'static TaskClass> {
    if std::ptr::eq(class, source) {
        HashSet::new()
    } else if std::ptr::eq(class, sink) {
        nodes[1..nodes.len() - 1].iter().copied().collect()
    } else {
        HashSet::from([source])
    }
}

fn bench_build_from_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_graph_build");

    for size in [10, 50, 100, 250] {
        let (nodes, root) = linear_chain(size);
        group.bench_with_input(BenchmarkId::new("linear", size), &root, |b, &root| {
            b.iter(|| {
                let graph = DependencyGraph::build_from_cached(black_box(root), |class| edges_for_linear(&nodes, class));
                black_box(graph)
            });
        });
    }

    for width in [10, 50, 100] {
        let (nodes, sink) = diamond(width);
        let source = nodes[0];
        group.bench_with_input(BenchmarkId::new("diamond", width), &sink, |b, &sink| {
            b.iter(|| {
                let graph = DependencyGraph::build_from_cached(black_box(sink), |class| {
                    edges_for_diamond(&nodes, class, source, sink)
                });
                black_box(graph)
            });
        });
    }

    group.finish();
}

fn bench_topological_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("topological_order");

    for size in [10, 50, 100, 250] {
        let (nodes, root) = linear_chain(size);
        let graph = DependencyGraph::build_from_cached(root, |class| edges_for_linear(&nodes, class));
        group.bench_with_input(BenchmarkId::new("linear", size), &graph, |b, g| {
            b.iter(|| black_box(g.topological_order().unwrap()));
        });
    }

    group.finish();
}

fn bench_scheduler_readiness(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_next_ready");

    for width in [10, 50, 100, 250] {
        let (nodes, sink) = diamond(width);
        let source = nodes[0];
        let graph = DependencyGraph::build_from_cached(sink, |class| edges_for_diamond(&nodes, class, source, sink));
        let scheduler = Scheduler::new(graph);
        for &class in &nodes {
            scheduler.register(class, Arc::new(taski::task::TaskWrapper::new(class)));
        }
        group.bench_with_input(BenchmarkId::new("diamond", width), &scheduler, |b, s| {
            b.iter(|| black_box(s.next_ready_tasks()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_from_cached, bench_topological_order, bench_scheduler_readiness);
criterion_main!(benches);
