use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::scripts;
use crate::domain::surface::{
    BoundingBox, ContainerHandle, ElementHandle, IdentityLink, SurfaceError, SurfaceResult,
    UiSurface,
};
use crate::infrastructure::config::BrowserSettings;

/// Browser process (launched or attached) plus its CDP handler task.
pub struct BrowserSession {
    browser: Browser,
    handler_handle: tokio::task::JoinHandle<()>,
    page: Page,
    launched: bool,
}

impl BrowserSession {
    /// Launch a browser with a persistent profile so the operator's login survives.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let profile_dir = settings.effective_profile_dir();
        std::fs::create_dir_all(&profile_dir)
            .map_err(|e| anyhow!("Failed to create profile dir {:?}: {}", profile_dir, e))?;

        tracing::info!("Launching browser with profile {:?}", profile_dir);

        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .user_data_dir(&profile_dir)
            .arg("--disable-infobars")
            .arg("--mute-audio");
        // Headless unless asked otherwise; the operator usually needs a window to log in
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config).await?;
        let handler_handle = spawn_handler(handler);
        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            handler_handle,
            page,
            launched: true,
        })
    }

    /// Attach to an already running browser over its DevTools websocket.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        tracing::info!("Connecting to browser at {}", ws_url);
        let (browser, handler) = Browser::connect(ws_url).await?;
        let handler_handle = spawn_handler(handler);

        let page = match browser.pages().await?.into_iter().next() {
            Some(page) => page,
            None => browser.new_page("about:blank").await?,
        };

        Ok(Self {
            browser,
            handler_handle,
            page,
            launched: false,
        })
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page.goto(url).await?;
        tracing::debug!("Navigated to {}", url);
        Ok(())
    }

    pub fn surface(&self, settings: &BrowserSettings) -> ChromiumSurface {
        ChromiumSurface::new(self.page.clone(), settings.container_selectors.clone())
    }

    /// Close a launched browser; an attached one is only detached.
    pub async fn close(mut self) -> Result<()> {
        if self.launched {
            if let Err(e) = self.browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
        }
        self.handler_handle.abort();
        tracing::info!("Browser session closed");
        Ok(())
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::trace!("Browser handler error: {}", e);
            }
        }
    })
}

/// Reply shape shared by every page script
#[derive(Debug, Deserialize)]
struct Reply<T> {
    #[serde(default)]
    stale: bool,
    value: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LinkInfo {
    id: String,
    href: String,
    rect: BoundingBox,
}

/// `UiSurface` over a live page, addressing elements by registry ids.
pub struct ChromiumSurface {
    page: Page,
    container_selectors: Vec<String>,
}

impl ChromiumSurface {
    pub fn new(page: Page, container_selectors: Vec<String>) -> Self {
        Self {
            page,
            container_selectors,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        body: &str,
        args: serde_json::Value,
    ) -> SurfaceResult<Reply<T>> {
        let script = scripts::wrap(body, &args);
        let result = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| SurfaceError::Browser(e.to_string()))?;
        result
            .into_value::<Reply<T>>()
            .map_err(|e| SurfaceError::Script(e.to_string()))
    }

    /// Call a script that addresses one element, mapping a missing element to a stale handle.
    async fn call_element<T: DeserializeOwned>(
        &self,
        body: &str,
        handle: &str,
    ) -> SurfaceResult<T> {
        let reply = self.call::<T>(body, json!({ "id": handle })).await?;
        if reply.stale {
            return Err(SurfaceError::StaleHandle(handle.to_string()));
        }
        reply
            .value
            .ok_or_else(|| SurfaceError::Script(format!("no value returned for {}", handle)))
    }

    async fn mouse_click(&self, x: f64, y: f64) -> chromiumoxide::error::Result<()> {
        let move_params = DispatchMouseEventParams::new(DispatchMouseEventType::MouseMoved, x, y);
        self.page.execute(move_params).await?;

        let mut down_params =
            DispatchMouseEventParams::new(DispatchMouseEventType::MousePressed, x, y);
        down_params.button = Some(MouseButton::Left);
        down_params.click_count = Some(1);
        self.page.execute(down_params).await?;

        let mut up_params =
            DispatchMouseEventParams::new(DispatchMouseEventType::MouseReleased, x, y);
        up_params.button = Some(MouseButton::Left);
        up_params.click_count = Some(1);
        self.page.execute(up_params).await?;

        tracing::trace!("Clicked at ({}, {})", x, y);
        Ok(())
    }
}

#[async_trait]
impl UiSurface for ChromiumSurface {
    async fn find_container(&self) -> Option<ContainerHandle> {
        match self
            .call::<String>(scripts::FIND_CONTAINER, json!({ "selectors": self.container_selectors }))
            .await
        {
            Ok(reply) => reply.value.map(ContainerHandle),
            Err(e) => {
                tracing::debug!("Container lookup failed: {}", e);
                None
            }
        }
    }

    async fn is_present(&self, container: &ContainerHandle) -> bool {
        self.call_element::<bool>(scripts::IS_PRESENT, &container.0)
            .await
            .unwrap_or(false)
    }

    async fn list_action_candidates(
        &self,
        container: &ContainerHandle,
    ) -> SurfaceResult<Vec<ElementHandle>> {
        let ids: Vec<String> = self
            .call_element(scripts::LIST_BUTTONS, &container.0)
            .await?;
        Ok(ids.into_iter().map(ElementHandle).collect())
    }

    async fn list_identity_links(
        &self,
        container: &ContainerHandle,
    ) -> SurfaceResult<Vec<IdentityLink>> {
        let links: Vec<LinkInfo> = self
            .call_element(scripts::LIST_LINKS, &container.0)
            .await?;
        Ok(links
            .into_iter()
            .map(|l| IdentityLink {
                handle: ElementHandle(l.id),
                href: l.href,
                position: l.rect,
            })
            .collect())
    }

    async fn element_labels(&self, handle: &ElementHandle) -> SurfaceResult<Vec<String>> {
        self.call_element(scripts::LABELS, &handle.0).await
    }

    async fn is_disabled(&self, handle: &ElementHandle) -> SurfaceResult<bool> {
        self.call_element(scripts::IS_DISABLED, &handle.0)
            .await
    }

    async fn element_text(&self, handle: &ElementHandle) -> SurfaceResult<String> {
        self.call_element(scripts::TEXT, &handle.0).await
    }

    async fn element_position(&self, handle: &ElementHandle) -> SurfaceResult<BoundingBox> {
        self.call_element(scripts::RECT, &handle.0).await
    }

    async fn parent(&self, handle: &ElementHandle) -> SurfaceResult<Option<ElementHandle>> {
        let parent: Option<String> = self
            .call::<String>(scripts::PARENT, json!({ "id": handle.0 }))
            .await
            .and_then(|reply| {
                if reply.stale {
                    Err(SurfaceError::StaleHandle(handle.0.clone()))
                } else {
                    Ok(reply.value)
                }
            })?;
        Ok(parent.map(ElementHandle))
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> SurfaceResult<()> {
        self.call_element::<bool>(scripts::SCROLL_INTO_VIEW, &handle.0)
            .await
            .map(|_| ())
    }

    async fn activate(&self, handle: &ElementHandle) -> SurfaceResult<()> {
        let rect: BoundingBox = self
            .call_element(scripts::VIEWPORT_RECT, &handle.0)
            .await?;
        if rect.is_empty() {
            return Err(SurfaceError::Unsupported(
                "element has no visible box in the viewport".to_string(),
            ));
        }
        let (x, y) = rect.center();
        self.mouse_click(x, y)
            .await
            .map_err(|e| SurfaceError::Browser(e.to_string()))
    }

    async fn dispatch_click(&self, handle: &ElementHandle) -> SurfaceResult<()> {
        self.call_element::<bool>(scripts::DISPATCH_CLICK, &handle.0)
            .await
            .map(|_| ())
    }

    async fn scroll_to_end(&self, container: &ContainerHandle) -> SurfaceResult<()> {
        self.call_element::<bool>(scripts::SCROLL_TO_END, &container.0)
            .await
            .map(|_| ())
    }
}
