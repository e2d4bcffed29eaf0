//! Scriptable in-memory surface for tests.
//!
//! The fake lays out a list of request rows. Each row has a root element,
//! optional profile link, and an Accept/Decline button pair on the same line.
//! Text content follows DOM semantics: an element's text includes the text of
//! its descendants.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::domain::surface::{
    BoundingBox, ContainerHandle, ElementHandle, IdentityLink, SurfaceError, SurfaceResult,
    UiSurface,
};

const CONTAINER_ID: &str = "list";
const ROW_HEIGHT: f64 = 80.0;
const LIST_TOP: f64 = 100.0;

#[derive(Debug, Clone)]
enum RowSpec {
    Linked(String),
    TextOnly(String),
    Text(String),
    Bare,
    DeepText(String, usize),
}

#[derive(Debug, Clone, Default)]
struct Node {
    parent: Option<ElementHandle>,
    children: Vec<ElementHandle>,
    text: String,
    labels: Vec<String>,
    disabled: bool,
    position: BoundingBox,
}

#[derive(Default)]
struct State {
    present: bool,
    nodes: HashMap<ElementHandle, Node>,
    buttons: Vec<ElementHandle>,
    links: Vec<IdentityLink>,
    rows: usize,
    row_names: BTreeMap<ElementHandle, String>,
    pages: VecDeque<Vec<RowSpec>>,
    activations: Vec<ElementHandle>,
    activation_times: Vec<Instant>,
    dispatched: Vec<ElementHandle>,
    failing: HashSet<ElementHandle>,
    primary_unsupported: HashSet<ElementHandle>,
    close_after: Option<usize>,
    consume_on_activate: bool,
    close_on_scroll: bool,
    failing_scans: usize,
    scrolls: usize,
}

pub struct FakeSurface {
    state: Mutex<State>,
}

fn h(id: impl Into<String>) -> ElementHandle {
    ElementHandle(id.into())
}

impl FakeSurface {
    pub fn new() -> Self {
        let mut state = State {
            present: true,
            ..Default::default()
        };
        state.nodes.insert(h(CONTAINER_ID), Node::default());
        Self {
            state: Mutex::new(state),
        }
    }

    fn with(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Row with a profile link on the button's line and `@name` in its text.
    pub fn row(self, name: &str) -> Self {
        self.with().add_row(RowSpec::Linked(name.to_string()));
        self
    }

    /// Row without a link; only the row text carries `@name`.
    pub fn text_only_row(self, name: &str) -> Self {
        self.with().add_row(RowSpec::TextOnly(name.to_string()));
        self
    }

    /// Row without a link, with arbitrary text.
    pub fn text_row(self, text: &str) -> Self {
        self.with().add_row(RowSpec::Text(text.to_string()));
        self
    }

    /// Row with no identity anywhere.
    pub fn bare_row(self) -> Self {
        self.with().add_row(RowSpec::Bare);
        self
    }

    /// Row whose `@name` text sits `depth` levels above the button.
    pub fn deep_text_row(self, name: &str, depth: usize) -> Self {
        self.with()
            .add_row(RowSpec::DeepText(name.to_string(), depth.max(1)));
        self
    }

    /// Linked rows revealed by the next `scroll_to_end`.
    pub fn next_page(self, names: &[&str]) -> Self {
        let page = names.iter().map(|n| RowSpec::Linked(n.to_string())).collect();
        self.with().pages.push_back(page);
        self
    }

    /// Activated buttons become disabled, like a row that has been handled.
    pub fn consume_on_activate(self) -> Self {
        self.with().consume_on_activate = true;
        self
    }

    /// Container disappears right after the `n`th successful activation.
    pub fn close_after_activations(self, n: usize) -> Self {
        self.with().close_after = Some(n);
        self
    }

    /// Container disappears on the next `scroll_to_end`.
    pub fn close_on_scroll(self) -> Self {
        self.with().close_on_scroll = true;
        self
    }

    /// The next `n` scans fail to list candidates.
    pub fn fail_scans(self, n: usize) -> Self {
        self.with().failing_scans = n;
        self
    }

    /// Every activation attempt on this row's button fails.
    pub fn failing_row(self, index: usize) -> Self {
        let button = self.accept_button(index);
        self.with().failing.insert(button);
        self
    }

    /// Primary activation is unavailable for this row's button.
    pub fn primary_unsupported(self, index: usize) -> Self {
        let button = self.accept_button(index);
        self.with().primary_unsupported.insert(button);
        self
    }

    pub fn remove_container(&self) {
        self.with().present = false;
    }

    pub fn accept_button(&self, index: usize) -> ElementHandle {
        h(format!("accept-{}", index))
    }

    /// Vertical centre of a row's buttons.
    pub fn row_y(&self, index: usize) -> f64 {
        LIST_TOP + index as f64 * ROW_HEIGHT + 30.0
    }

    pub fn add_link(&self, href: &str, position: BoundingBox) {
        let mut state = self.with();
        let handle = h(format!("extra-link-{}", state.links.len()));
        state.links.push(IdentityLink {
            handle,
            href: href.to_string(),
            position,
        });
    }

    pub fn set_labels(&self, handle: &ElementHandle, labels: &[&str]) {
        if let Some(node) = self.with().nodes.get_mut(handle) {
            node.labels = labels.iter().map(|l| l.to_string()).collect();
        }
    }

    pub fn set_disabled(&self, handle: &ElementHandle, disabled: bool) {
        if let Some(node) = self.with().nodes.get_mut(handle) {
            node.disabled = disabled;
        }
    }

    /// Row names whose Accept button was activated, in order.
    pub fn approved_names(&self) -> Vec<String> {
        let state = self.with();
        state
            .activations
            .iter()
            .map(|b| state.row_names.get(b).cloned().unwrap_or_else(|| b.0.clone()))
            .collect()
    }

    pub fn dispatched(&self) -> Vec<ElementHandle> {
        self.with().dispatched.clone()
    }

    /// When each successful activation happened, in order.
    pub fn activation_times(&self) -> Vec<Instant> {
        self.with().activation_times.clone()
    }

    pub fn scroll_count(&self) -> usize {
        self.with().scrolls
    }
}

impl State {
    fn insert(&mut self, handle: ElementHandle, parent: &ElementHandle, node: Node) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(handle.clone());
        }
        self.nodes.insert(
            handle,
            Node {
                parent: Some(parent.clone()),
                ..node
            },
        );
    }

    fn add_row(&mut self, spec: RowSpec) {
        let i = self.rows;
        self.rows += 1;

        let top = LIST_TOP + i as f64 * ROW_HEIGHT;
        let row = h(format!("row-{}", i));
        let (name, text) = match &spec {
            RowSpec::Linked(name) | RowSpec::TextOnly(name) => {
                (name.clone(), format!("{} @{}", name, name))
            }
            RowSpec::DeepText(name, _) => (name.clone(), format!("@{}", name)),
            RowSpec::Text(text) => (format!("row-{}", i), text.clone()),
            RowSpec::Bare => (format!("row-{}", i), "Someone wants to follow you".to_string()),
        };
        let container = h(CONTAINER_ID);
        self.insert(
            row.clone(),
            &container,
            Node {
                text,
                position: BoundingBox::new(0.0, top, 480.0, 60.0),
                ..Default::default()
            },
        );

        if let RowSpec::Linked(name) = &spec {
            let link = h(format!("link-{}", i));
            let position = BoundingBox::new(10.0, top + 20.0, 100.0, 20.0);
            self.insert(
                link.clone(),
                &row,
                Node {
                    position,
                    ..Default::default()
                },
            );
            self.links.push(IdentityLink {
                handle: link,
                href: format!("/{}", name),
                position,
            });
        }

        let mut button_parent = row.clone();
        if let RowSpec::DeepText(_, depth) = &spec {
            for level in 1..*depth {
                let wrapper = h(format!("wrap-{}-{}", i, level));
                self.insert(wrapper.clone(), &button_parent, Node::default());
                button_parent = wrapper;
            }
        }

        let accept = h(format!("accept-{}", i));
        self.insert(
            accept.clone(),
            &button_parent,
            Node {
                text: "Accept".to_string(),
                labels: vec!["Accept".to_string()],
                position: BoundingBox::new(300.0, top + 15.0, 80.0, 30.0),
                ..Default::default()
            },
        );
        let decline = h(format!("decline-{}", i));
        self.insert(
            decline.clone(),
            &button_parent,
            Node {
                text: "Decline".to_string(),
                labels: vec!["Decline".to_string()],
                position: BoundingBox::new(390.0, top + 15.0, 80.0, 30.0),
                ..Default::default()
            },
        );
        self.buttons.push(accept.clone());
        self.buttons.push(decline);
        self.row_names.insert(accept, name);
    }

    fn text_content(&self, handle: &ElementHandle) -> String {
        let Some(node) = self.nodes.get(handle) else {
            return String::new();
        };
        let mut parts = vec![node.text.clone()];
        parts.extend(node.children.iter().map(|c| self.text_content(c)));
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn node(&self, handle: &ElementHandle) -> SurfaceResult<&Node> {
        self.nodes
            .get(handle)
            .ok_or_else(|| SurfaceError::StaleHandle(handle.0.clone()))
    }

    fn record_activation(&mut self, handle: &ElementHandle) {
        self.activations.push(handle.clone());
        self.activation_times.push(Instant::now());
        if self.consume_on_activate {
            if let Some(node) = self.nodes.get_mut(handle) {
                node.disabled = true;
            }
        }
        if self.close_after == Some(self.activations.len()) {
            self.present = false;
        }
    }
}

#[async_trait]
impl UiSurface for FakeSurface {
    async fn find_container(&self) -> Option<ContainerHandle> {
        self.with()
            .present
            .then(|| ContainerHandle(CONTAINER_ID.to_string()))
    }

    async fn is_present(&self, _container: &ContainerHandle) -> bool {
        self.with().present
    }

    async fn list_action_candidates(
        &self,
        _container: &ContainerHandle,
    ) -> SurfaceResult<Vec<ElementHandle>> {
        let mut state = self.with();
        if state.failing_scans > 0 {
            state.failing_scans -= 1;
            return Err(SurfaceError::Script("list query threw".to_string()));
        }
        Ok(state.buttons.clone())
    }

    async fn list_identity_links(
        &self,
        _container: &ContainerHandle,
    ) -> SurfaceResult<Vec<IdentityLink>> {
        Ok(self.with().links.clone())
    }

    async fn element_labels(&self, handle: &ElementHandle) -> SurfaceResult<Vec<String>> {
        Ok(self.with().node(handle)?.labels.clone())
    }

    async fn is_disabled(&self, handle: &ElementHandle) -> SurfaceResult<bool> {
        Ok(self.with().node(handle)?.disabled)
    }

    async fn element_text(&self, handle: &ElementHandle) -> SurfaceResult<String> {
        let state = self.with();
        state.node(handle)?;
        Ok(state.text_content(handle))
    }

    async fn element_position(&self, handle: &ElementHandle) -> SurfaceResult<BoundingBox> {
        Ok(self.with().node(handle)?.position)
    }

    async fn parent(&self, handle: &ElementHandle) -> SurfaceResult<Option<ElementHandle>> {
        Ok(self.with().node(handle)?.parent.clone())
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> SurfaceResult<()> {
        self.with().node(handle)?;
        Ok(())
    }

    async fn activate(&self, handle: &ElementHandle) -> SurfaceResult<()> {
        let mut state = self.with();
        state.node(handle)?;
        if state.primary_unsupported.contains(handle) {
            return Err(SurfaceError::Unsupported("native click".to_string()));
        }
        if state.failing.contains(handle) {
            return Err(SurfaceError::Script("click threw".to_string()));
        }
        state.record_activation(handle);
        Ok(())
    }

    async fn dispatch_click(&self, handle: &ElementHandle) -> SurfaceResult<()> {
        let mut state = self.with();
        state.node(handle)?;
        if state.failing.contains(handle) {
            return Err(SurfaceError::Script("dispatch threw".to_string()));
        }
        state.dispatched.push(handle.clone());
        state.record_activation(handle);
        Ok(())
    }

    async fn scroll_to_end(&self, _container: &ContainerHandle) -> SurfaceResult<()> {
        let mut state = self.with();
        state.scrolls += 1;
        if state.close_on_scroll {
            state.present = false;
        }
        if let Some(page) = state.pages.pop_front() {
            for spec in page {
                state.add_row(spec);
            }
        }
        Ok(())
    }
}
