//! Responsive layout state
//!
//! [`LayoutManager`] is the single owner of the active breakpoint and the
//! sidebar open flag. Changes are published on the [`EventBus`] as
//! `layout:breakpoint:change`, `layout:sidebar:change`,
//! `layout:layout:update` and `layout:orientation:change`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use folio_core::{EventBus, ListenerResult, ObserverId, ObserverList, Subscription};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Named viewport-width tiers, smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breakpoint {
    Xs,
    Sm,
    Md,
    Lg,
    Xl,
    Xxl,
}

impl Breakpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Breakpoint::Xs => "xs",
            Breakpoint::Sm => "sm",
            Breakpoint::Md => "md",
            Breakpoint::Lg => "lg",
            Breakpoint::Xl => "xl",
            Breakpoint::Xxl => "xxl",
        }
    }

    pub fn device(&self) -> DeviceClass {
        match self {
            Breakpoint::Xs | Breakpoint::Sm => DeviceClass::Mobile,
            Breakpoint::Md => DeviceClass::Tablet,
            Breakpoint::Lg | Breakpoint::Xl | Breakpoint::Xxl => DeviceClass::Desktop,
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

/// Minimum widths of the default tiers
pub const DEFAULT_BREAKPOINTS: [(Breakpoint, u32); 6] = [
    (Breakpoint::Xs, 0),
    (Breakpoint::Sm, 576),
    (Breakpoint::Md, 768),
    (Breakpoint::Lg, 992),
    (Breakpoint::Xl, 1200),
    (Breakpoint::Xxl, 1400),
];

/// The tier with the largest minimum width not above `width`.
///
/// Falls back to [`Breakpoint::Xs`] when no tier matches.
pub fn resolve_breakpoint(width: u32, tiers: &[(Breakpoint, u32)]) -> Breakpoint {
    tiers
        .iter()
        .filter(|(_, min)| *min <= width)
        .max_by_key(|(_, min)| *min)
        .map(|(bp, _)| *bp)
        .unwrap_or(Breakpoint::Xs)
}

/// How breakpoint crossings treat the sidebar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidebarPolicy {
    /// Every crossing closes the sidebar on mobile and opens it on desktop
    #[default]
    Force,
    /// An explicit toggle survives crossings until the device class changes
    PreserveManual,
}

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub breakpoints: Vec<(Breakpoint, u32)>,
    pub sidebar_policy: SidebarPolicy,
    pub header_height: u32,
    pub footer_height: u32,
    pub sidebar_width: u32,
    pub content_padding: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            breakpoints: DEFAULT_BREAKPOINTS.to_vec(),
            sidebar_policy: SidebarPolicy::Force,
            header_height: 60,
            footer_height: 80,
            sidebar_width: 280,
            content_padding: 20,
        }
    }
}

/// Snapshot returned by [`LayoutManager::layout_state`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutState {
    pub sidebar_open: bool,
    pub breakpoint: Breakpoint,
    pub header_height: u32,
    pub footer_height: u32,
    pub sidebar_width: u32,
    pub content_padding: u32,
    pub window_width: u32,
    pub window_height: u32,
}

/// Partial update for [`LayoutManager::update_layout_config`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LayoutPatch {
    pub header_height: Option<u32>,
    pub footer_height: Option<u32>,
    pub sidebar_width: Option<u32>,
    pub content_padding: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakpointInfo {
    pub name: Breakpoint,
    /// Minimum width of the tier
    pub width: u32,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop: bool,
}

/// Placement of the main content area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContentLayout {
    pub sidebar_width: u32,
    pub available_width: u32,
    pub breakpoint: Breakpoint,
    /// Left offset of the content; zero on mobile
    pub margin_left: u32,
    /// Width given to the content; `None` means the full viewport
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridConfig {
    pub columns: u32,
    pub gap: String,
    pub max_width: String,
    pub breakpoints: BTreeMap<String, u32>,
}

/// Delivered to layout observers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayoutNotice {
    Resize {
        width: u32,
        height: u32,
        breakpoint: Breakpoint,
    },
    ElementResize {
        element: String,
        width: u32,
        height: u32,
    },
}

#[derive(Debug)]
struct Inner {
    state: LayoutState,
    /// Sidebar state last chosen explicitly
    manual: Option<bool>,
}

/// Owner of breakpoint and sidebar state
pub struct LayoutManager {
    inner: RwLock<Inner>,
    breakpoints: Vec<(Breakpoint, u32)>,
    policy: SidebarPolicy,
    observers: ObserverList<LayoutNotice>,
    bindings: Mutex<Vec<Subscription>>,
    events: Arc<EventBus>,
}

impl fmt::Debug for LayoutManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutManager")
            .field("state", &self.inner.read().state)
            .field("policy", &self.policy)
            .finish()
    }
}

impl LayoutManager {
    pub fn new(config: LayoutConfig, events: Arc<EventBus>) -> Self {
        let mut breakpoints = config.breakpoints;
        breakpoints.sort_by_key(|(_, min)| *min);

        Self {
            inner: RwLock::new(Inner {
                state: LayoutState {
                    sidebar_open: false,
                    breakpoint: Breakpoint::Lg,
                    header_height: config.header_height,
                    footer_height: config.footer_height,
                    sidebar_width: config.sidebar_width,
                    content_padding: config.content_padding,
                    window_width: 0,
                    window_height: 0,
                },
                manual: None,
            }),
            breakpoints,
            policy: config.sidebar_policy,
            observers: ObserverList::new("layout observer"),
            bindings: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Listen for `sidebar:toggle` on the bus; detail `{"force": bool}` is
    /// honoured when present
    pub fn bind_events(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = self.events.on("sidebar:toggle", move |event| {
            if let Some(layout) = weak.upgrade() {
                let force = event.detail.get("force").and_then(|v| v.as_bool());
                layout.toggle_sidebar(force);
            }
            Ok(())
        });
        self.bindings.lock().push(subscription);
    }

    pub fn sidebar_policy(&self) -> SidebarPolicy {
        self.policy
    }

    /// Record a new viewport size.
    ///
    /// A breakpoint change is announced and the sidebar policy applied,
    /// then the content layout is recomputed and observers get a resize.
    pub fn update_viewport(&self, width: u32, height: u32) {
        let crossing = {
            let mut inner = self.inner.write();
            inner.state.window_width = width;
            inner.state.window_height = height;
            self.refresh_breakpoint(&mut inner)
        };

        if let Some((old, new)) = crossing {
            self.on_breakpoint_change(old, new, width);
        }

        let layout = self.update_content_layout();
        self.observers.notify(&LayoutNotice::Resize {
            width,
            height,
            breakpoint: layout.breakpoint,
        });
    }

    fn refresh_breakpoint(&self, inner: &mut Inner) -> Option<(Breakpoint, Breakpoint)> {
        let new = resolve_breakpoint(inner.state.window_width, &self.breakpoints);
        let old = inner.state.breakpoint;
        if new == old {
            return None;
        }
        inner.state.breakpoint = new;
        Some((old, new))
    }

    fn on_breakpoint_change(&self, old: Breakpoint, new: Breakpoint, width: u32) {
        log::debug!("Breakpoint {} -> {} at {}px", old, new, width);
        self.events.emit(
            "layout:breakpoint:change",
            json!({ "oldBreakpoint": old, "newBreakpoint": new, "width": width }),
        );

        let target = {
            let mut inner = self.inner.write();
            if self.policy == SidebarPolicy::PreserveManual && old.device() != new.device() {
                inner.manual = None;
            }
            let preserved = match self.policy {
                SidebarPolicy::Force => None,
                SidebarPolicy::PreserveManual => inner.manual,
            };
            let open = inner.state.sidebar_open;
            match (preserved, new.device()) {
                (Some(_), _) => None,
                (None, DeviceClass::Mobile) if open => Some(false),
                (None, DeviceClass::Desktop) if !open => Some(true),
                _ => None,
            }
        };

        if let Some(open) = target {
            self.apply_sidebar(open);
        }
    }

    /// Flip the sidebar, or set it to `force` when given
    pub fn toggle_sidebar(&self, force: Option<bool>) {
        let open = force.unwrap_or_else(|| !self.is_sidebar_open());
        self.set_sidebar_state(open);
    }

    /// Explicitly open or close the sidebar
    pub fn set_sidebar_state(&self, open: bool) {
        self.inner.write().manual = Some(open);
        self.apply_sidebar(open);
    }

    fn apply_sidebar(&self, open: bool) {
        let width = {
            let mut inner = self.inner.write();
            inner.state.sidebar_open = open;
            current_sidebar_width(&inner.state)
        };

        self.events.emit(
            "layout:sidebar:change",
            json!({ "isOpen": open, "width": width }),
        );
        self.update_content_layout();
    }

    pub fn is_sidebar_open(&self) -> bool {
        self.inner.read().state.sidebar_open
    }

    /// Recompute where the content sits and announce it
    pub fn update_content_layout(&self) -> ContentLayout {
        let layout = {
            let inner = self.inner.read();
            let state = &inner.state;
            let sidebar_width = current_sidebar_width(state);
            let available_width = state.window_width.saturating_sub(sidebar_width);
            let mobile = state.breakpoint.device() == DeviceClass::Mobile;

            ContentLayout {
                sidebar_width,
                available_width,
                breakpoint: state.breakpoint,
                margin_left: if mobile { 0 } else { sidebar_width },
                width: if mobile { None } else { Some(available_width) },
            }
        };

        self.events.emit(
            "layout:layout:update",
            json!({
                "sidebarWidth": layout.sidebar_width,
                "availableWidth": layout.available_width,
                "breakpoint": layout.breakpoint,
            }),
        );
        layout
    }

    /// Derived CSS custom properties, keyed by property name
    pub fn css_variables(&self) -> BTreeMap<String, String> {
        let state = self.inner.read().state.clone();
        let mut vars = BTreeMap::new();

        for (bp, min) in &self.breakpoints {
            vars.insert(format!("--breakpoint-{}", bp), format!("{}px", min));
        }
        vars.insert("--header-height".into(), format!("{}px", state.header_height));
        vars.insert("--footer-height".into(), format!("{}px", state.footer_height));
        vars.insert("--sidebar-width".into(), format!("{}px", state.sidebar_width));
        vars.insert(
            "--content-padding".into(),
            format!("{}px", state.content_padding),
        );
        vars.insert(
            "--sidebar-current-width".into(),
            format!("{}px", current_sidebar_width(&state)),
        );
        vars.insert("--grid-columns".into(), "12".into());
        vars.insert("--grid-gap".into(), "1rem".into());
        vars.insert("--container-max-width".into(), "1200px".into());
        vars
    }

    pub fn grid_config(&self, columns: u32) -> GridConfig {
        GridConfig {
            columns,
            gap: "var(--grid-gap)".to_string(),
            max_width: "var(--container-max-width)".to_string(),
            breakpoints: self
                .breakpoints
                .iter()
                .map(|(bp, min)| (bp.to_string(), *min))
                .collect(),
        }
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.inner.read().state.breakpoint
    }

    pub fn is_mobile(&self) -> bool {
        self.breakpoint().device() == DeviceClass::Mobile
    }

    pub fn is_tablet(&self) -> bool {
        self.breakpoint().device() == DeviceClass::Tablet
    }

    pub fn is_desktop(&self) -> bool {
        self.breakpoint().device() == DeviceClass::Desktop
    }

    pub fn current_breakpoint(&self) -> BreakpointInfo {
        let name = self.breakpoint();
        let width = self
            .breakpoints
            .iter()
            .find(|(bp, _)| *bp == name)
            .map(|(_, min)| *min)
            .unwrap_or(0);
        let device = name.device();

        BreakpointInfo {
            name,
            width,
            is_mobile: device == DeviceClass::Mobile,
            is_tablet: device == DeviceClass::Tablet,
            is_desktop: device == DeviceClass::Desktop,
        }
    }

    pub fn layout_state(&self) -> LayoutState {
        self.inner.read().state.clone()
    }

    pub fn update_layout_config(&self, patch: LayoutPatch) {
        {
            let mut inner = self.inner.write();
            let state = &mut inner.state;
            if let Some(v) = patch.header_height {
                state.header_height = v;
            }
            if let Some(v) = patch.footer_height {
                state.footer_height = v;
            }
            if let Some(v) = patch.sidebar_width {
                state.sidebar_width = v;
            }
            if let Some(v) = patch.content_padding {
                state.content_padding = v;
            }
        }
        self.update_content_layout();
    }

    /// Re-evaluate the layout after the device rotated
    pub fn handle_orientation_change(&self, angle: u16) {
        let crossing = {
            let mut inner = self.inner.write();
            self.refresh_breakpoint(&mut inner)
        };
        if let Some((old, new)) = crossing {
            let width = self.inner.read().state.window_width;
            self.on_breakpoint_change(old, new, width);
        }

        let layout = self.update_content_layout();
        self.events.emit(
            "layout:orientation:change",
            json!({ "orientation": angle, "breakpoint": layout.breakpoint }),
        );
    }

    /// Report a size change of a named element to observers
    pub fn handle_element_resize(&self, element: &str, width: u32, height: u32) {
        self.observers.notify(&LayoutNotice::ElementResize {
            element: element.to_string(),
            width,
            height,
        });
    }

    pub fn add_observer<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&LayoutNotice) -> ListenerResult + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Drop observers and bus bindings
    pub fn destroy(&self) {
        self.observers.clear();
        for subscription in self.bindings.lock().drain(..) {
            subscription.unsubscribe();
        }
    }
}

fn current_sidebar_width(state: &LayoutState) -> u32 {
    if state.sidebar_open {
        state.sidebar_width
    } else {
        0
    }
}
