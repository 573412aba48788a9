use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use folio_core::{EventBus, Subscription};
use parking_lot::{Mutex, RwLock};

use super::{load_or_fallback, Component, View};
use crate::layout::{Breakpoint, LayoutManager};
use crate::template::TemplateLoader;

const FALLBACK_CSS: &str = "\
.app-sidebar { position: fixed; left: -300px; top: 80px; width: 300px; height: calc(100vh - 80px); \
background: #f8f9fa; box-shadow: 2px 0 10px rgba(0,0,0,0.1); transition: left 0.3s ease; z-index: 999; }
.app-sidebar.open { left: 0; }";

const FALLBACK_HTML: &str = r#"<aside class="app-sidebar">
  <div class="sidebar-content"><p>Sidebar</p></div>
</aside>"#;

/// Collapsible side navigation.
///
/// With a layout manager the open state follows `layout:sidebar:change`;
/// without one the sidebar answers `sidebar:toggle` itself. Either way it
/// closes when the viewport drops to a phone breakpoint.
pub struct Sidebar {
    loader: Arc<TemplateLoader>,
    layout: Option<Arc<LayoutManager>>,
    open: AtomicBool,
    view: RwLock<View>,
    bindings: Mutex<Vec<Subscription>>,
}

impl Sidebar {
    pub fn new(
        loader: Arc<TemplateLoader>,
        events: &EventBus,
        layout: Option<Arc<LayoutManager>>,
    ) -> Arc<Self> {
        let sidebar = Arc::new(Self {
            loader,
            layout,
            open: AtomicBool::new(true),
            view: RwLock::new(View::default()),
            bindings: Mutex::new(Vec::new()),
        });
        sidebar.bind(events);
        sidebar
    }

    fn bind(self: &Arc<Self>, events: &EventBus) {
        let mut bindings = Vec::with_capacity(2);

        let weak: Weak<Self> = Arc::downgrade(self);
        bindings.push(if self.layout.is_some() {
            events.on("layout:sidebar:change", move |event| {
                if let (Some(sidebar), Some(open)) = (
                    weak.upgrade(),
                    event.detail.get("isOpen").and_then(|v| v.as_bool()),
                ) {
                    sidebar.update_state(open);
                }
                Ok(())
            })
        } else {
            events.on("sidebar:toggle", move |_| {
                if let Some(sidebar) = weak.upgrade() {
                    sidebar.toggle();
                }
                Ok(())
            })
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        bindings.push(events.on("layout:breakpoint:change", move |event| {
            let breakpoint = event
                .detail
                .get("newBreakpoint")
                .cloned()
                .and_then(|v| serde_json::from_value::<Breakpoint>(v).ok());
            if let (Some(sidebar), Some(breakpoint)) = (weak.upgrade(), breakpoint) {
                sidebar.handle_breakpoint_change(breakpoint);
            }
            Ok(())
        }));

        self.bindings.lock().extend(bindings);
    }

    pub async fn load(&self) -> View {
        let view = load_or_fallback(&self.loader, "sidebar", || {
            View::fallback(FALLBACK_HTML, FALLBACK_CSS)
        })
        .await;
        *self.view.write() = view.clone();
        view
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Flip the open state and report it to the layout manager
    pub fn toggle(&self) {
        let open = !self.open.fetch_xor(true, Ordering::SeqCst);
        if let Some(layout) = &self.layout {
            layout.set_sidebar_state(open);
        }
    }

    /// Adopt `open`. Returns whether the state changed.
    pub fn update_state(&self, open: bool) -> bool {
        self.open.swap(open, Ordering::SeqCst) != open
    }

    fn handle_breakpoint_change(&self, breakpoint: Breakpoint) {
        if matches!(breakpoint, Breakpoint::Xs | Breakpoint::Sm) {
            self.update_state(false);
        }
    }

    /// Drop the event bindings
    pub fn disconnect(&self) {
        for subscription in self.bindings.lock().drain(..) {
            subscription.unsubscribe();
        }
    }
}

impl Component for Sidebar {
    fn name(&self) -> &'static str {
        "sidebar"
    }

    fn view(&self) -> View {
        self.view.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutConfig;
    use folio_networking::MemoryFetcher;
    use serde_json::json;

    fn loader() -> Arc<TemplateLoader> {
        Arc::new(TemplateLoader::new(Arc::new(MemoryFetcher::new())))
    }

    #[test]
    fn test_standalone_sidebar_answers_toggle_event() {
        let events = EventBus::new();
        let sidebar = Sidebar::new(loader(), &events, None);
        assert!(sidebar.is_open());

        events.emit("sidebar:toggle", json!({}));
        assert!(!sidebar.is_open());
        events.emit("sidebar:toggle", json!({}));
        assert!(sidebar.is_open());

        sidebar.disconnect();
        events.emit("sidebar:toggle", json!({}));
        assert!(sidebar.is_open());
    }

    #[test]
    fn test_closes_on_mobile_breakpoint() {
        let events = EventBus::new();
        let sidebar = Sidebar::new(loader(), &events, None);

        events.emit(
            "layout:breakpoint:change",
            json!({ "oldBreakpoint": "lg", "newBreakpoint": "md", "width": 800 }),
        );
        assert!(sidebar.is_open());

        events.emit(
            "layout:breakpoint:change",
            json!({ "oldBreakpoint": "md", "newBreakpoint": "sm", "width": 600 }),
        );
        assert!(!sidebar.is_open());
    }

    #[test]
    fn test_follows_layout_manager() {
        let events = Arc::new(EventBus::new());
        let layout = Arc::new(LayoutManager::new(LayoutConfig::default(), events.clone()));
        let sidebar = Sidebar::new(loader(), &events, Some(layout.clone()));

        layout.set_sidebar_state(false);
        assert!(!sidebar.is_open());

        sidebar.toggle();
        assert!(sidebar.is_open());
        assert!(layout.is_sidebar_open());
    }

    #[tokio::test]
    async fn test_loads_template() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("components/sidebar/sidebar.html", "<aside>nav</aside>");
        fetcher.insert("components/sidebar/sidebar.css", "aside{}");
        let events = EventBus::new();
        let sidebar = Sidebar::new(Arc::new(TemplateLoader::new(fetcher)), &events, None);

        let view = sidebar.load().await;
        assert!(!view.fallback);
        assert_eq!(view.html, "<aside>nav</aside>");
    }
}
