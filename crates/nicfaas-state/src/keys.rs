//! Key layout of the placement directory.
//!
//! ```text
//! /smartnics/<nodeID>                       -> nodeID
//! /functions/<funcName>                     -> creationToken
//! /deployments/smartnic/<nodeID>/<funcName> -> replicaCount
//! ```

/// Offload node inventory.
pub const NODES_DIR: &str = "/smartnics";

/// Function registry.
pub const FUNCTIONS_DIR: &str = "/functions";

/// Root of all assignment entries.
pub const DEPLOYMENTS_DIR: &str = "/deployments";

/// Per-node assignment directories live under here.
pub const ASSIGNMENTS_DIR: &str = "/deployments/smartnic";

pub fn node_key(node_id: &str) -> String {
    format!("{NODES_DIR}/{node_id}")
}

pub fn function_key(name: &str) -> String {
    format!("{FUNCTIONS_DIR}/{name}")
}

pub fn assignment_key(node_id: &str, name: &str) -> String {
    format!("{ASSIGNMENTS_DIR}/{node_id}/{name}")
}

/// Whether `segment` can stand alone as one component of a key.
///
/// Rejects empty names, `.`/`..`, and anything containing `/` or a
/// control character.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.chars().any(|c| c == '/' || c.is_control())
}

/// Strip `dir/` from `key`, returning the direct child name.
///
/// Returns `None` for keys outside `dir` and for deeper descendants.
pub fn child_name<'a>(dir: &str, key: &'a str) -> Option<&'a str> {
    let rest = key.strip_prefix(dir)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_layout() {
        assert_eq!(node_key("10.0.0.1"), "/smartnics/10.0.0.1");
        assert_eq!(function_key("resize-lambdanic"), "/functions/resize-lambdanic");
        assert_eq!(
            assignment_key("10.0.0.1", "resize-lambdanic"),
            "/deployments/smartnic/10.0.0.1/resize-lambdanic"
        );
    }

    #[test]
    fn child_name_strips_prefix() {
        assert_eq!(child_name(NODES_DIR, "/smartnics/10.0.0.1"), Some("10.0.0.1"));
        assert_eq!(child_name(FUNCTIONS_DIR, "/smartnics/10.0.0.1"), None);
    }

    #[test]
    fn segments_with_separators_are_rejected() {
        assert!(is_valid_segment("echo-lambdanic"));
        assert!(is_valid_segment("20.20.20.101"));
        for bad in ["", ".", "..", "team/echo-lambdanic", "/x", "x/", "a\nb"] {
            assert!(!is_valid_segment(bad), "{bad:?} accepted");
        }
    }

    #[test]
    fn child_name_skips_nested_and_empty() {
        assert_eq!(child_name(ASSIGNMENTS_DIR, "/deployments/smartnic/n1/f"), None);
        assert_eq!(child_name(NODES_DIR, "/smartnics/"), None);
        assert_eq!(child_name(NODES_DIR, "/smartnicsX/a"), None);
    }
}
