//! The static dependency analyzer (spec 4.1).
//!
//! Given a `TaskClass`, returns the set of task/section classes its body
//! statically references — without ever constructing or running that
//! class's instance. The body text itself was captured at compile time by
//! `#[taski::task]`/`#[taski::section]` (see `taski-derive`), so "locate
//! the body" is free: `class.source` already *is* just the `run`/`select`
//! body, nothing more of the surrounding file.

pub(crate) mod resolve;
mod visitor;

use std::collections::HashSet;

use syn::Block;

use crate::error::AnalyzerError;
use crate::task::descriptor::{TaskClass, TaskKind};

/// Execution mode excludes a section's own candidate references (the
/// selector must stay pure w.r.t. the graph); visualisation mode includes
/// them so a tree view can show the full potential shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Execution,
    Visualisation,
}

/// Analyze one task/section's body and return everything it statically
/// depends on. Empty source (no body could be captured) yields the empty
/// set, which spec 4.1 treats as legal, not an error.
pub fn dependencies_of(
    class: &'static TaskClass,
    mode: Mode,
) -> Result<HashSet<&'static TaskClass>, AnalyzerError> {
    if class.source.trim().is_empty() {
        return Ok(HashSet::new());
    }

    let scan_section_body = match (class.kind, mode) {
        (TaskKind::Task, _) => true,
        (TaskKind::Section, Mode::Visualisation) => true,
        (TaskKind::Section, Mode::Execution) => false,
    };
    if !scan_section_body {
        return Ok(HashSet::new());
    }

    let block: Block =
        syn::parse_str(class.source).map_err(|e| AnalyzerError::Parse(class.name, e.to_string()))?;

    let mut v = visitor::DependencyVisitor::new(class.module_path);
    syn::visit::visit_block(&mut v, &block);
    Ok(v.into_deps())
}
