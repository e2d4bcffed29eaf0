pub mod controller;
pub mod discovery;
pub mod eventbus;
pub mod executor;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::ApprovalController;
pub use eventbus::{create_event_bus, EventBus, SessionEvents, SharedEventBus};
