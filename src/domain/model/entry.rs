use serde::{Deserialize, Serialize};

use crate::domain::surface::ElementHandle;

/// Canonical form of a user identity: trimmed, one leading `@` removed, lowercase.
/// Returns `None` when nothing is left.
pub fn normalize_identity(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// How an identity was attributed to an action element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Link on the same visual row
    Positional,
    /// `@handle` token in an ancestor's text
    AncestorText,
}

/// One pending request found in a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub identity: Option<String>,
    pub method: Option<ResolutionMethod>,
    pub action: ElementHandle,
}

impl Entry {
    pub fn resolved(identity: String, method: ResolutionMethod, action: ElementHandle) -> Self {
        Self {
            identity: Some(identity),
            method: Some(method),
            action,
        }
    }

    pub fn unresolved(action: ElementHandle) -> Self {
        Self {
            identity: None,
            method: None,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identity() {
        assert_eq!(normalize_identity("Alice"), Some("alice".to_string()));
        assert_eq!(normalize_identity("  @Bob_99 "), Some("bob_99".to_string()));
        assert_eq!(normalize_identity("@"), None);
        assert_eq!(normalize_identity("   "), None);
    }
}
