use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::time::sleep;
use ulid::Ulid;

use crate::application::discovery::EntryDiscovery;
use crate::application::eventbus::SharedEventBus;
use crate::application::executor::ActionExecutor;
use crate::application::policy;
use crate::domain::error::DomainError;
use crate::domain::event::DomainEvent;
use crate::domain::model::{
    ApprovalConfig, ControllerPhase, Entry, RunOutcome, SessionResult, SessionState,
    SessionStatus, StopReason,
};
use crate::domain::surface::{ContainerHandle, UiSurface};

/// Drives one approval session against a UI surface.
///
/// The run loop is the only flow of control that mutates session state.
/// `stop()` and `status()` may be called from other tasks at any time.
pub struct ApprovalController {
    surface: Arc<dyn UiSurface>,
    config: ApprovalConfig,
    discovery: EntryDiscovery,
    executor: ActionExecutor,
    event_bus: SharedEventBus,
    state: Mutex<SessionState>,
    /// Cooperative cancellation flag, cleared by `stop()`
    running: AtomicBool,
    /// Set while a run is in progress
    active: AtomicBool,
}

impl ApprovalController {
    pub fn new(
        surface: Arc<dyn UiSurface>,
        config: ApprovalConfig,
        event_bus: SharedEventBus,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            discovery: EntryDiscovery::new(config.tuning.clone()),
            executor: ActionExecutor::new(surface.clone(), config.tuning.settle_delay),
            surface,
            config,
            event_bus,
            state: Mutex::new(SessionState::default()),
            running: AtomicBool::new(false),
            active: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    /// Run a session, asking `confirm_empty_allowlist` first when the
    /// allow-list is empty and the session is certain to approve nobody.
    pub async fn start<F>(&self, confirm_empty_allowlist: F) -> RunOutcome
    where
        F: FnOnce() -> bool,
    {
        if !self.config.filter_active() {
            tracing::warn!("Allow-list is empty: this session will not approve anyone");
            if !confirm_empty_allowlist() {
                tracing::info!("Session declined by caller");
                return RunOutcome::Declined;
            }
        }
        self.run().await
    }

    /// Run a session until one of the termination conditions is met.
    pub async fn run(&self) -> RunOutcome {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("Session already running");
            return RunOutcome::AlreadyRunning;
        }
        // Released on every exit, including when the caller drops this future
        let _guard = RunGuard(self);

        let Some(container) = self.surface.find_container().await else {
            tracing::warn!("Request list not found, session not started");
            return RunOutcome::NotReady;
        };

        let session_id = Ulid::new().to_string();
        *self.lock_state() = SessionState {
            session_id: Some(session_id.clone()),
            is_running: true,
            ..Default::default()
        };
        self.running.store(true, Ordering::SeqCst);

        tracing::info!(
            session = %session_id,
            allowed = self.config.allowed_usernames.len(),
            max_approvals = self.config.max_approvals,
            auto_scroll = self.config.auto_scroll,
            "Approval session started"
        );

        let reason = self.run_loop(&session_id, &container).await;

        self.running.store(false, Ordering::SeqCst);
        self.set_phase(&session_id, ControllerPhase::Stopped);
        let result = {
            let mut state = self.lock_state();
            state.is_running = false;
            SessionResult {
                session_id: session_id.clone(),
                approved_count: state.approved_count,
                skipped_count: state.skipped_count,
                failed_count: state.failed_count,
                filter_was_active: self.config.filter_active(),
                allowed_usernames: self.config.allowed_usernames.clone(),
                stop_reason: reason,
            }
        };

        tracing::info!(
            session = %session_id,
            approved = result.approved_count,
            skipped = result.skipped_count,
            failed = result.failed_count,
            "Approval session stopped: {}",
            reason.describe()
        );
        self.event_bus.publish(DomainEvent::SessionStopped {
            session_id,
            reason,
            result: result.clone(),
        });

        RunOutcome::Completed(result)
    }

    /// Request cooperative cancellation. No-op when not running.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the current (or last) session.
    pub fn status(&self) -> SessionStatus {
        let mut status = self.lock_state().snapshot();
        status.is_running = status.is_running && self.is_running();
        status
    }

    async fn run_loop(&self, session_id: &str, container: &ContainerHandle) -> StopReason {
        loop {
            if let Some(reason) = self.should_stop() {
                return reason;
            }
            if !self.surface.is_present(container).await {
                return self.surface_closed();
            }

            self.set_phase(session_id, ControllerPhase::Scanning);
            self.event_bus.publish(DomainEvent::ScanStarted {
                session_id: session_id.to_string(),
            });
            let entries = match self
                .discovery
                .list_entries(self.surface.as_ref(), container)
                .await
            {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Scan failed, treating as empty: {}", e);
                    Vec::new()
                }
            };
            let found = entries.len();
            let fresh = self.filter_new(entries);
            tracing::info!(found, fresh = fresh.len(), "Scan completed");
            self.event_bus.publish(DomainEvent::ScanCompleted {
                session_id: session_id.to_string(),
                found,
                fresh: fresh.len(),
            });

            if fresh.is_empty() {
                if !self.config.auto_scroll {
                    return StopReason::Exhausted;
                }
                let empty_scans = {
                    let mut state = self.lock_state();
                    state.consecutive_empty_scans += 1;
                    state.consecutive_empty_scans
                };
                if empty_scans >= self.config.tuning.max_empty_scans {
                    return StopReason::NoNewRequests;
                }
                tracing::debug!(
                    empty_scans,
                    limit = self.config.tuning.max_empty_scans,
                    "No new requests, scrolling"
                );
                self.scroll(container).await;
                continue;
            }

            self.lock_state().consecutive_empty_scans = 0;

            if let Some(reason) = self.process_batch(session_id, container, fresh).await {
                return reason;
            }

            if let Some(reason) = self.should_stop() {
                return reason;
            }
            if !self.config.auto_scroll {
                return StopReason::Exhausted;
            }
            self.scroll(container).await;
        }
    }

    /// Process entries top to bottom. Returns a reason when the session must end.
    async fn process_batch(
        &self,
        session_id: &str,
        container: &ContainerHandle,
        entries: Vec<Entry>,
    ) -> Option<StopReason> {
        for entry in entries {
            if let Some(reason) = self.should_stop() {
                return Some(reason);
            }
            if !self.surface.is_present(container).await {
                return Some(self.surface_closed());
            }

            self.set_phase(session_id, ControllerPhase::Deciding);

            let Some(identity) = entry.identity else {
                {
                    let mut state = self.lock_state();
                    state.unresolved_handles.insert(entry.action.clone());
                    state.skipped_count += 1;
                }
                tracing::info!(action = %entry.action, "Skipping request without identity");
                self.event_bus.publish(DomainEvent::IdentityUnresolved {
                    session_id: session_id.to_string(),
                    action: entry.action.0.clone(),
                });
                sleep(self.config.tuning.skip_delay).await;
                continue;
            };

            // Marked before acting so a failed action is never retried
            if !self.lock_state().processed_identities.insert(identity.clone()) {
                continue;
            }
            if let Some(method) = entry.method {
                self.event_bus.publish(DomainEvent::IdentityResolved {
                    session_id: session_id.to_string(),
                    identity: identity.clone(),
                    method,
                });
            }

            let allowed = policy::is_allowed(&identity, &self.config.allowed_usernames);
            self.event_bus.publish(DomainEvent::PolicyDecision {
                session_id: session_id.to_string(),
                identity: identity.clone(),
                allowed,
            });
            if !allowed {
                self.lock_state().skipped_count += 1;
                tracing::info!(identity = %identity, "Skipping request not in allow-list");
                sleep(self.config.tuning.skip_delay).await;
                continue;
            }

            self.set_phase(session_id, ControllerPhase::Acting);
            if self.executor.act(&entry.action).await {
                let approved = {
                    let mut state = self.lock_state();
                    state.approved_count += 1;
                    state.approved_count
                };
                tracing::info!(
                    identity = %identity,
                    approved,
                    max = self.config.max_approvals,
                    "Approved request"
                );
                self.event_bus.publish(DomainEvent::ActionSucceeded {
                    session_id: session_id.to_string(),
                    identity,
                });
                sleep(self.config.delay).await;
            } else {
                self.lock_state().failed_count += 1;
                tracing::warn!(identity = %identity, "Failed to approve request");
                self.event_bus.publish(DomainEvent::ActionFailed {
                    session_id: session_id.to_string(),
                    identity,
                });
            }
        }
        None
    }

    /// Drop entries already handled this session, and duplicates within the batch.
    fn filter_new(&self, entries: Vec<Entry>) -> Vec<Entry> {
        let state = self.lock_state();
        let mut batch_ids = HashSet::new();
        let mut batch_handles = HashSet::new();
        entries
            .into_iter()
            .filter(|entry| match &entry.identity {
                Some(id) => {
                    !state.processed_identities.contains(id) && batch_ids.insert(id.clone())
                }
                None => {
                    !state.unresolved_handles.contains(&entry.action)
                        && batch_handles.insert(entry.action.clone())
                }
            })
            .collect()
    }

    fn should_stop(&self) -> Option<StopReason> {
        if !self.is_running() {
            return Some(StopReason::Stopped);
        }
        if self.lock_state().approved_count >= self.config.max_approvals {
            return Some(StopReason::MaxApprovalsReached);
        }
        None
    }

    fn surface_closed(&self) -> StopReason {
        tracing::warn!("Request list closed, ending session");
        self.running.store(false, Ordering::SeqCst);
        StopReason::SurfaceClosed
    }

    async fn scroll(&self, container: &ContainerHandle) {
        if let Err(e) = self.surface.scroll_to_end(container).await {
            tracing::warn!("Scroll failed: {}", e);
        }
        sleep(self.config.delay).await;
    }

    fn set_phase(&self, session_id: &str, new: ControllerPhase) {
        let old = {
            let mut state = self.lock_state();
            std::mem::replace(&mut state.phase, new)
        };
        if old != new {
            tracing::trace!(?old, ?new, "Phase changed");
            self.event_bus.publish(DomainEvent::PhaseChanged {
                session_id: session_id.to_string(),
                old,
                new,
            });
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // State stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears the run flags when a run ends or is abandoned.
struct RunGuard<'a>(&'a ApprovalController);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let controller = self.0;
        controller.running.store(false, Ordering::SeqCst);
        controller.lock_state().is_running = false;
        controller.active.store(false, Ordering::SeqCst);
    }
}
