//! AST walk collecting every reference to another task/section.
//!
//! A task body never names a dependency by bare identifier the way the
//! Ruby original does (`ATask.name`) — Rust has no reified classes, so our
//! macro-generated API makes a type stand for itself via
//! `X::descriptor()` (spec Design Notes, "Class-as-identifier"). Both
//! surface forms the generated code can contain collapse to that one
//! shape:
//!
//! - `ctx.dep::<X>()` expands, conceptually, to a call whose turbofish
//!   names `X`.
//! - `ctx.dep_class(X::descriptor())` or a section's `select` body
//!   returning `X::descriptor()` directly names `X` as the receiver of a
//!   `::descriptor()` call — the direct analogue of "every call node whose
//!   receiver is a constant path" (spec 4.1).
//!
//! We never execute any of this; we only look at the parsed syntax tree.

use std::collections::HashSet;

use syn::visit::{self, Visit};
use syn::{Expr, ExprCall, ExprMethodCall, GenericArgument, Path, Type};

use crate::analyzer::resolve;
use crate::task::descriptor::TaskClass;

pub(crate) struct DependencyVisitor {
    caller_module_path: &'static str,
    deps: HashSet<&'static TaskClass>,
}

impl DependencyVisitor {
    pub(crate) fn new(caller_module_path: &'static str) -> Self {
        Self {
            caller_module_path,
            deps: HashSet::new(),
        }
    }

    pub(crate) fn into_deps(self) -> HashSet<&'static TaskClass> {
        self.deps
    }

    fn record_path(&mut self, path: &Path) {
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        if let Some(class) = resolve::resolve(&segments, self.caller_module_path) {
            self.deps.insert(class);
        }
    }
}

impl<'ast> Visit<'ast> for DependencyVisitor {
    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        if node.method == "dep" {
            if let Some(turbofish) = &node.turbofish {
                for arg in &turbofish.args {
                    if let GenericArgument::Type(Type::Path(type_path)) = arg {
                        self.record_path(&type_path.path);
                    }
                }
            }
        }
        visit::visit_expr_method_call(self, node);
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        if let Expr::Path(func_path) = &*node.func {
            let segs = &func_path.path.segments;
            if segs.len() >= 2 && segs.last().map(|s| s.ident == "descriptor").unwrap_or(false) {
                let mut receiver = func_path.path.clone();
                receiver.segments.pop(); // drop the trailing `descriptor` segment
                self.record_path(&receiver);
            }
        }
        visit::visit_expr_call(self, node);
    }
}
