//! Entry discovery: turns the action buttons on the surface into entries.
//!
//! Identity extraction is first-match-wins per button:
//! 1. positional: the identity link on the same visual row
//! 2. ancestor text: the first `@handle` token in the nearest ancestor whose
//!    text has one, never climbing to the container or past the depth bound
//!
//! Discovery only observes. A button with no identity is still returned, and
//! deciding what to do with it is left to the controller.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::model::{normalize_identity, Entry, ResolutionMethod, Tuning};
use crate::domain::surface::{ContainerHandle, ElementHandle, SurfaceResult, UiSurface};

fn profile_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/([A-Za-z0-9_]+)/?$").expect("valid regex"))
}

fn handle_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:^|[^A-Za-z0-9_@.])@([A-Za-z0-9_]+)").expect("valid regex")
    })
}

/// Extract the user segment from a profile link, or `None` for anything that
/// is not a single-segment path.
pub fn profile_segment(href: &str) -> Option<&str> {
    let href = href.trim();
    let path = match href.find("://") {
        Some(idx) => {
            let rest = &href[idx + 3..];
            &rest[rest.find('/')?..]
        }
        None if href.starts_with('/') && !href.starts_with("//") => href,
        None => return None,
    };
    let path = path.split(['?', '#']).next().unwrap_or(path);
    profile_path_pattern()
        .captures(path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First `@handle` token in a block of text.
pub fn find_handle_token(text: &str) -> Option<&str> {
    handle_token_pattern()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Link on the surface that names a user.
#[derive(Debug, Clone)]
struct ProfileLink {
    identity: String,
    center_y: f64,
}

pub struct EntryDiscovery {
    tuning: Tuning,
}

impl EntryDiscovery {
    pub fn new(tuning: Tuning) -> Self {
        Self { tuning }
    }

    /// List every pending request currently on the surface, top to bottom.
    pub async fn list_entries(
        &self,
        surface: &dyn UiSurface,
        container: &ContainerHandle,
    ) -> SurfaceResult<Vec<Entry>> {
        let candidates = surface.list_action_candidates(container).await?;
        let links = self.profile_links(surface, container).await?;

        let mut entries = Vec::new();
        for candidate in candidates {
            if !self.is_actionable(surface, &candidate).await {
                continue;
            }
            let entry = match self
                .resolve_identity(surface, container, &candidate, &links)
                .await
            {
                Some((identity, method)) => Entry::resolved(identity, method, candidate),
                None => Entry::unresolved(candidate),
            };
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Exact label match on an approve verb, no decline verb, not disabled.
    async fn is_actionable(&self, surface: &dyn UiSurface, handle: &ElementHandle) -> bool {
        let labels = match surface.element_labels(handle).await {
            Ok(labels) => labels,
            Err(e) => {
                tracing::debug!(action = %handle, "Failed to read labels: {}", e);
                return false;
            }
        };

        let has = |verbs: &[String]| labels.iter().any(|l| verbs.iter().any(|v| v == l.trim()));
        if !has(&self.tuning.accept_labels) || has(&self.tuning.decline_labels) {
            return false;
        }

        match surface.is_disabled(handle).await {
            Ok(disabled) => !disabled,
            Err(e) => {
                tracing::debug!(action = %handle, "Failed to read disabled state: {}", e);
                false
            }
        }
    }

    async fn profile_links(
        &self,
        surface: &dyn UiSurface,
        container: &ContainerHandle,
    ) -> SurfaceResult<Vec<ProfileLink>> {
        let links = surface.list_identity_links(container).await?;
        Ok(links
            .into_iter()
            .filter_map(|link| {
                let segment = profile_segment(&link.href)?;
                if self.tuning.is_reserved_route(segment) {
                    return None;
                }
                Some(ProfileLink {
                    identity: normalize_identity(segment)?,
                    center_y: link.position.center_y(),
                })
            })
            .collect())
    }

    async fn resolve_identity(
        &self,
        surface: &dyn UiSurface,
        container: &ContainerHandle,
        action: &ElementHandle,
        links: &[ProfileLink],
    ) -> Option<(String, ResolutionMethod)> {
        if let Some(identity) = self.nearest_on_row(surface, action, links).await {
            return Some((identity, ResolutionMethod::Positional));
        }
        self.ancestor_handle(surface, container, action)
            .await
            .map(|identity| (identity, ResolutionMethod::AncestorText))
    }

    async fn nearest_on_row(
        &self,
        surface: &dyn UiSurface,
        action: &ElementHandle,
        links: &[ProfileLink],
    ) -> Option<String> {
        let action_y = match surface.element_position(action).await {
            Ok(pos) => pos.center_y(),
            Err(e) => {
                tracing::debug!(action = %action, "Failed to read position: {}", e);
                return None;
            }
        };

        let mut best: Option<(&ProfileLink, f64)> = None;
        for link in links {
            let distance = (link.center_y - action_y).abs();
            // Strict comparison keeps the earliest link on ties
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((link, distance));
            }
        }

        match best {
            Some((link, distance)) if distance <= self.tuning.row_threshold_px => {
                Some(link.identity.clone())
            }
            _ => None,
        }
    }

    async fn ancestor_handle(
        &self,
        surface: &dyn UiSurface,
        container: &ContainerHandle,
        action: &ElementHandle,
    ) -> Option<String> {
        let mut current = action.clone();
        for _ in 0..self.tuning.ancestor_depth {
            let parent = match surface.parent(&current).await {
                Ok(Some(parent)) if parent.0 != container.0 => parent,
                Ok(_) => return None,
                Err(e) => {
                    tracing::debug!(action = %action, "Ancestor walk stopped: {}", e);
                    return None;
                }
            };
            match surface.element_text(&parent).await {
                Ok(text) => {
                    if let Some(identity) = find_handle_token(&text).and_then(normalize_identity) {
                        return Some(identity);
                    }
                }
                Err(e) => tracing::debug!(action = %action, "Failed to read ancestor text: {}", e),
            }
            current = parent;
        }
        None
    }
}
