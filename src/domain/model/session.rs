use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::domain::surface::ElementHandle;

/// Controller lifecycle. `Stopped` is terminal for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ControllerPhase {
    #[default]
    Idle,
    Scanning,
    Deciding,
    Acting,
    Stopped,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxApprovalsReached,
    /// `stop()` was called
    Stopped,
    /// Container disappeared mid-run
    SurfaceClosed,
    /// No new requests after repeated scrolling
    NoNewRequests,
    /// No new requests and scrolling disabled, or the single pass finished
    Exhausted,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MaxApprovalsReached => "maximum approvals reached",
            Self::Stopped => "stopped by caller",
            Self::SurfaceClosed => "surface closed",
            Self::NoNewRequests => "no new requests after repeated scrolling",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Mutable per-session state, owned by the controller.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub session_id: Option<String>,
    pub phase: ControllerPhase,
    pub approved_count: u32,
    pub skipped_count: u32,
    pub failed_count: u32,
    pub is_running: bool,
    /// Monotonic: an identity is never removed for the life of the session.
    pub processed_identities: HashSet<String>,
    /// Action elements already seen without a resolvable identity
    pub unresolved_handles: HashSet<ElementHandle>,
    pub consecutive_empty_scans: u32,
}

impl SessionState {
    pub fn snapshot(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.session_id.clone(),
            phase: self.phase,
            approved_count: self.approved_count,
            skipped_count: self.skipped_count,
            failed_count: self.failed_count,
            is_running: self.is_running,
            processed_identities: self.processed_identities.iter().cloned().collect(),
            unresolved_count: self.unresolved_handles.len(),
            consecutive_empty_scans: self.consecutive_empty_scans,
        }
    }
}

/// Read-only view of the session for status queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: Option<String>,
    pub phase: ControllerPhase,
    pub approved_count: u32,
    pub skipped_count: u32,
    pub failed_count: u32,
    pub is_running: bool,
    pub processed_identities: BTreeSet<String>,
    pub unresolved_count: usize,
    pub consecutive_empty_scans: u32,
}

/// Produced once, when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: String,
    pub approved_count: u32,
    pub skipped_count: u32,
    pub failed_count: u32,
    pub filter_was_active: bool,
    pub allowed_usernames: BTreeSet<String>,
    pub stop_reason: StopReason,
}

/// What `start`/`run` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The request list was not on screen; no session was started.
    NotReady,
    /// The caller refused to run with an empty allow-list.
    Declined,
    /// A session is already in progress on this controller.
    AlreadyRunning,
    Completed(SessionResult),
}

impl RunOutcome {
    pub fn result(&self) -> Option<&SessionResult> {
        match self {
            Self::Completed(result) => Some(result),
            _ => None,
        }
    }
}
