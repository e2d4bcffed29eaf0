use serde::{Deserialize, Serialize};

use super::model::{ControllerPhase, ResolutionMethod, SessionResult, StopReason};

/// Diagnostic events emitted by an approval session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// Controller moved between phases
    PhaseChanged {
        session_id: String,
        old: ControllerPhase,
        new: ControllerPhase,
    },

    /// A scan of the request list began
    ScanStarted { session_id: String },

    /// A scan finished; `fresh` counts entries not seen before
    ScanCompleted {
        session_id: String,
        found: usize,
        fresh: usize,
    },

    IdentityResolved {
        session_id: String,
        identity: String,
        method: ResolutionMethod,
    },

    IdentityUnresolved { session_id: String, action: String },

    PolicyDecision {
        session_id: String,
        identity: String,
        allowed: bool,
    },

    ActionSucceeded { session_id: String, identity: String },

    ActionFailed { session_id: String, identity: String },

    /// Session ended
    SessionStopped {
        session_id: String,
        reason: StopReason,
        result: SessionResult,
    },
}

impl DomainEvent {
    /// Get the session ID associated with this event
    pub fn session_id(&self) -> &str {
        match self {
            Self::PhaseChanged { session_id, .. } => session_id,
            Self::ScanStarted { session_id } => session_id,
            Self::ScanCompleted { session_id, .. } => session_id,
            Self::IdentityResolved { session_id, .. } => session_id,
            Self::IdentityUnresolved { session_id, .. } => session_id,
            Self::PolicyDecision { session_id, .. } => session_id,
            Self::ActionSucceeded { session_id, .. } => session_id,
            Self::ActionFailed { session_id, .. } => session_id,
            Self::SessionStopped { session_id, .. } => session_id,
        }
    }

    /// Event category name
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::PhaseChanged { .. } => "phase_changed",
            Self::ScanStarted { .. } => "scan_started",
            Self::ScanCompleted { .. } => "scan_completed",
            Self::IdentityResolved { .. } => "identity_resolved",
            Self::IdentityUnresolved { .. } => "identity_unresolved",
            Self::PolicyDecision { .. } => "policy_decision",
            Self::ActionSucceeded { .. } => "action_succeeded",
            Self::ActionFailed { .. } => "action_failed",
            Self::SessionStopped { .. } => "session_stopped",
        }
    }
}
