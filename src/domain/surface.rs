use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque reference to the request list container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerHandle(pub String);

/// Opaque, adapter-scoped reference to a single element on the surface.
///
/// Handles are only meaningful for the surface that produced them and may go
/// stale whenever the surface re-renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screen-space bounding box of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// A link that may carry a user identity in its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityLink {
    pub handle: ElementHandle,
    pub href: String,
    pub position: BoundingBox,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The capability is not available for this element.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("stale element handle: {0}")]
    StaleHandle(String),

    #[error("surface script failed: {0}")]
    Script(String),

    #[error("browser error: {0}")]
    Browser(String),
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// The externally owned UI the controller observes and acts upon.
///
/// Implementations must return elements in document order so that repeated
/// scans of an unchanged surface produce identical results.
#[async_trait]
pub trait UiSurface: Send + Sync {
    /// Locate the request list container, if it is currently shown.
    async fn find_container(&self) -> Option<ContainerHandle>;

    /// Whether the container is still attached and visible.
    async fn is_present(&self, container: &ContainerHandle) -> bool;

    /// All button-like elements inside the container.
    async fn list_action_candidates(
        &self,
        container: &ContainerHandle,
    ) -> SurfaceResult<Vec<ElementHandle>>;

    /// All links inside the container, with their hrefs and positions.
    async fn list_identity_links(
        &self,
        container: &ContainerHandle,
    ) -> SurfaceResult<Vec<IdentityLink>>;

    /// Every label the element carries (visible text, accessible name, title).
    async fn element_labels(&self, handle: &ElementHandle) -> SurfaceResult<Vec<String>>;

    /// Whether the element is disabled or already in a consumed state.
    async fn is_disabled(&self, handle: &ElementHandle) -> SurfaceResult<bool>;

    /// Full text content of the element.
    async fn element_text(&self, handle: &ElementHandle) -> SurfaceResult<String>;

    async fn element_position(&self, handle: &ElementHandle) -> SurfaceResult<BoundingBox>;

    /// Parent element, or `None` at the document root.
    async fn parent(&self, handle: &ElementHandle) -> SurfaceResult<Option<ElementHandle>>;

    /// Smooth-scroll the element into view. Does not wait for the scroll to finish.
    async fn scroll_into_view(&self, handle: &ElementHandle) -> SurfaceResult<()>;

    /// Primary activation mechanism. Returns `SurfaceError::Unsupported` when the
    /// element cannot be activated this way.
    async fn activate(&self, handle: &ElementHandle) -> SurfaceResult<()>;

    /// Fallback activation: a synthesized click event that bubbles and is cancelable.
    async fn dispatch_click(&self, handle: &ElementHandle) -> SurfaceResult<()>;

    /// Scroll the container to its end so more entries load.
    async fn scroll_to_end(&self, container: &ContainerHandle) -> SurfaceResult<()>;
}
