//! Causality context attached to events and emitted commands

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies where an event or command came from
///
/// Commands and updates emitted by a rule carry a child of the context of
/// the event that caused them, so a chain of reactions can be traced back to
/// the original device event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// Parent context ID, set when this context was derived from another
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Name of the rule that produced this context, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl Context {
    /// Create a root context with a fresh ULID
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: None,
            rule: None,
        }
    }

    /// Create a root context attributed to a rule
    pub fn for_rule(rule: impl Into<String>) -> Self {
        Self {
            rule: Some(rule.into()),
            ..Self::new()
        }
    }

    /// Derive a context for a reaction to this one
    pub fn child(&self, rule: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
            rule: Some(rule.into()),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_links_parent() {
        let root = Context::new();
        let child = root.child("UserRules.OnOffRule");

        assert_ne!(root.id, child.id);
        assert_eq!(child.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(child.rule.as_deref(), Some("UserRules.OnOffRule"));
    }
}
