mod config;
mod entry;
mod session;

pub use config::{normalize_allowlist, ApprovalConfig, Tuning, MAX_ANCESTOR_DEPTH};
pub use entry::{normalize_identity, Entry, ResolutionMethod};
pub use session::{
    ControllerPhase, RunOutcome, SessionResult, SessionState, SessionStatus, StopReason,
};
