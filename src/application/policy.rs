//! Allow-list policy. Fails closed: an empty allow-list approves nobody.

use std::collections::BTreeSet;

use crate::domain::model::normalize_identity;

/// Decide whether `identity` may be approved.
///
/// Exact match after normalization only; no prefix, substring or wildcard
/// matching. Callers must not pass an empty identity.
pub fn is_allowed(identity: &str, allowlist: &BTreeSet<String>) -> bool {
    if allowlist.is_empty() {
        tracing::debug!(identity = %identity, "Allow-list empty, denying");
        return false;
    }

    let Some(identity) = normalize_identity(identity) else {
        tracing::warn!("Policy asked about an empty identity, denying");
        return false;
    };

    let allowed = allowlist
        .iter()
        .filter_map(|entry| normalize_identity(entry))
        .any(|entry| entry == identity);

    tracing::debug!(identity = %identity, allowed, "Policy decision");
    allowed
}
