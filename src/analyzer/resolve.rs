//! Name resolution: turn the path segments found in a task's source back
//! into a `&'static TaskClass`.
//!
//! The original walks the surrounding Ruby module nesting from innermost
//! to outermost, trying each prefix, first match wins. Rust has no open
//! module reopening to replicate exactly, so we approximate with the
//! nearest equivalent: try qualifying the referenced path against
//! successively shorter prefixes of the *caller's* `module_path!()`
//! (innermost first, ending at the crate root), then fall back to a bare
//! simple-name match against every known descriptor — the case that
//! covers a dependency brought into scope with `use`. Unresolved names are
//! silently dropped, exactly as spec 4.1 requires.

use crate::task::descriptor::{all_task_classes, TaskClass};

pub(crate) fn resolve(segments: &[String], caller_module_path: &'static str) -> Option<&'static TaskClass> {
    if segments.is_empty() {
        return None;
    }
    let text = segments.join("::");

    for prefix in module_prefixes(caller_module_path) {
        let qualified = if prefix.is_empty() {
            text.clone()
        } else {
            format!("{prefix}::{text}")
        };
        if let Some(found) = find_by_qualified(&qualified) {
            return Some(found);
        }
    }

    if segments.len() == 1 {
        find_by_simple_name(&segments[0])
    } else {
        None
    }
}

/// `"a::b::c"` -> `["a::b::c", "a::b", "a", ""]`.
fn module_prefixes(module_path: &str) -> Vec<String> {
    let parts: Vec<&str> = module_path.split("::").filter(|s| !s.is_empty()).collect();
    (0..=parts.len()).rev().map(|i| parts[..i].join("::")).collect()
}

fn find_by_qualified(qualified: &str) -> Option<&'static TaskClass> {
    all_task_classes().find(|tc| tc.qualified_name() == qualified)
}

fn find_by_simple_name(name: &str) -> Option<&'static TaskClass> {
    all_task_classes().find(|tc| tc.name == name)
}

#[cfg(test)]
mod tests {
    use super::module_prefixes;

    #[test]
    fn prefixes_go_innermost_to_outermost() {
        assert_eq!(
            module_prefixes("myapp::tasks::user"),
            vec!["myapp::tasks::user", "myapp::tasks", "myapp", ""]
        );
    }

    #[test]
    fn crate_root_has_one_empty_prefix() {
        assert_eq!(module_prefixes(""), vec![""]);
    }
}
