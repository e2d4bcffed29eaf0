use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::domain::surface::{ElementHandle, SurfaceError, UiSurface};

/// Performs the approve action on a single element.
///
/// Never returns an error: every failure is logged and reported as `false`.
pub struct ActionExecutor {
    surface: Arc<dyn UiSurface>,
    settle_delay: Duration,
}

impl ActionExecutor {
    pub fn new(surface: Arc<dyn UiSurface>, settle_delay: Duration) -> Self {
        Self {
            surface,
            settle_delay,
        }
    }

    pub async fn act(&self, handle: &ElementHandle) -> bool {
        if let Err(e) = self.surface.scroll_into_view(handle).await {
            tracing::debug!(action = %handle, "Scroll into view failed: {}", e);
        }
        sleep(self.settle_delay).await;

        match self.surface.activate(handle).await {
            Ok(()) => true,
            Err(SurfaceError::Unsupported(reason)) => {
                tracing::debug!(action = %handle, %reason, "Primary activation unavailable, dispatching click");
                match self.surface.dispatch_click(handle).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(action = %handle, "Dispatched click failed: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!(action = %handle, "Activation failed: {}", e);
                false
            }
        }
    }
}
