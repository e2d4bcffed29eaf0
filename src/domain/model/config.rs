use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::entry::normalize_identity;
use crate::domain::error::DomainError;

/// Upper bound for the ancestor walk used by identity extraction.
pub const MAX_ANCESTOR_DEPTH: usize = 20;

/// Session configuration. Immutable once a controller has been built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApprovalConfig {
    /// Pause after each approval and after each scroll
    #[serde(with = "duration_serde")]
    pub delay: Duration,

    /// Session cap on approvals
    pub max_approvals: u32,

    /// Scroll the list for more entries once a batch is done
    pub auto_scroll: bool,

    /// Normalized identities allowed to be approved. Empty denies everything.
    #[serde(deserialize_with = "deserialize_allowlist")]
    pub allowed_usernames: BTreeSet<String>,

    pub tuning: Tuning,

    /// Unrecognized keys, kept so newer config files still load
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(2000),
            max_approvals: 50,
            auto_scroll: true,
            allowed_usernames: BTreeSet::new(),
            tuning: Tuning::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl ApprovalConfig {
    /// Replace the allow-list, normalizing every name.
    pub fn with_allowed<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_usernames = normalize_allowlist(names);
        self
    }

    pub fn filter_active(&self) -> bool {
        !self.allowed_usernames.is_empty()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_approvals == 0 {
            return Err(DomainError::Validation(
                "maxApprovals must be at least 1".to_string(),
            ));
        }
        self.tuning.validate()
    }
}

/// Heuristic thresholds and short delays used by discovery and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tuning {
    /// Max vertical distance (px) between an action and a link on the same row
    pub row_threshold_px: f64,

    /// Ancestor levels searched for an `@handle` token
    pub ancestor_depth: usize,

    /// Wait after scrolling an element into view
    #[serde(with = "duration_serde")]
    pub settle_delay: Duration,

    /// Wait after skipping an entry
    #[serde(with = "duration_serde")]
    pub skip_delay: Duration,

    /// Consecutive scans without new entries before giving up
    pub max_empty_scans: u32,

    /// Exact, case-sensitive labels of the approve action
    pub accept_labels: Vec<String>,

    /// Labels of the inverse action; an element carrying one is never approved
    pub decline_labels: Vec<String>,

    /// First path segments that are site navigation rather than users
    pub reserved_routes: Vec<String>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            row_threshold_px: 50.0,
            ancestor_depth: MAX_ANCESTOR_DEPTH,
            settle_delay: Duration::from_millis(300),
            skip_delay: Duration::from_millis(500),
            max_empty_scans: 3,
            accept_labels: strings(&["Accept", "Approve"]),
            decline_labels: strings(&["Decline", "Reject", "Deny"]),
            reserved_routes: strings(&[
                "home",
                "explore",
                "notifications",
                "messages",
                "settings",
                "follower_requests",
                "i",
                "search",
                "compose",
                "login",
                "logout",
            ]),
        }
    }
}

impl Tuning {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.row_threshold_px.is_nan() || self.row_threshold_px <= 0.0 {
            return Err(DomainError::Validation(
                "rowThresholdPx must be positive".to_string(),
            ));
        }
        if self.ancestor_depth == 0 || self.ancestor_depth > MAX_ANCESTOR_DEPTH {
            return Err(DomainError::Validation(format!(
                "ancestorDepth must be between 1 and {}",
                MAX_ANCESTOR_DEPTH
            )));
        }
        if self.max_empty_scans == 0 {
            return Err(DomainError::Validation(
                "maxEmptyScans must be at least 1".to_string(),
            ));
        }
        if self.accept_labels.is_empty() {
            return Err(DomainError::Validation(
                "acceptLabels must not be empty".to_string(),
            ));
        }
        if let Some(label) = self
            .accept_labels
            .iter()
            .find(|l| self.decline_labels.contains(l))
        {
            return Err(DomainError::Validation(format!(
                "label {:?} is both an accept and a decline label",
                label
            )));
        }
        Ok(())
    }

    pub fn is_reserved_route(&self, segment: &str) -> bool {
        self.reserved_routes
            .iter()
            .any(|r| r.eq_ignore_ascii_case(segment))
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

pub fn normalize_allowlist<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|n| normalize_identity(n.as_ref()))
        .collect()
}

fn deserialize_allowlist<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(normalize_allowlist(raw.unwrap_or_default()))
}

/// Durations accept either integer milliseconds or a humantime string ("2s").
mod duration_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
            Raw::Text(s) => humantime::parse_duration(s.trim()).map_err(de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApprovalConfig::default();
        assert_eq!(config.delay, Duration::from_millis(2000));
        assert_eq!(config.max_approvals, 50);
        assert!(config.auto_scroll);
        assert!(!config.filter_active());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_millis_and_humantime() {
        let config: ApprovalConfig = serde_yaml::from_str("delay: 1500").unwrap();
        assert_eq!(config.delay, Duration::from_millis(1500));

        let config: ApprovalConfig =
            serde_yaml::from_str("delay: 3s\ntuning:\n  skipDelay: 250ms").unwrap();
        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(config.tuning.skip_delay, Duration::from_millis(250));
        assert_eq!(config.tuning.ancestor_depth, MAX_ANCESTOR_DEPTH);
    }

    #[test]
    fn test_allowlist_is_normalized() {
        let yaml = "allowedUsernames: ['  Alice ', '@BOB', '', '@']";
        let config: ApprovalConfig = serde_yaml::from_str(yaml).unwrap();
        let names: Vec<&str> = config.allowed_usernames.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let yaml = "maxApprovals: 5\nfutureOption: true\n";
        let config: ApprovalConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_approvals, 5);
        assert!(config.extra.contains_key("futureOption"));
    }

    #[test]
    fn test_validation() {
        let mut config = ApprovalConfig::default();
        config.max_approvals = 0;
        assert!(config.validate().is_err());

        let mut config = ApprovalConfig::default();
        config.tuning.ancestor_depth = MAX_ANCESTOR_DEPTH + 1;
        assert!(config.validate().is_err());

        let mut config = ApprovalConfig::default();
        config.tuning.decline_labels.push("Accept".to_string());
        assert!(config.validate().is_err());

        let mut config = ApprovalConfig::default();
        config.tuning.row_threshold_px = 0.0;
        assert!(config.validate().is_err());

        let mut config = ApprovalConfig::default();
        config.tuning.row_threshold_px = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reserved_routes() {
        let tuning = Tuning::default();
        assert!(tuning.is_reserved_route("home"));
        assert!(tuning.is_reserved_route("Explore"));
        assert!(!tuning.is_reserved_route("alice"));
    }
}
