pub mod adapter;
pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{create_event_bus, ApprovalController, SharedEventBus};
pub use domain::model::{ApprovalConfig, RunOutcome, SessionResult, SessionStatus, StopReason};
pub use domain::surface::UiSurface;
