use std::sync::Arc;

use folio_core::EventBus;
use parking_lot::RwLock;
use serde_json::json;

use super::{load_or_fallback, Component, View};
use crate::layout::LayoutManager;
use crate::template::TemplateLoader;

const FALLBACK_CSS: &str = "\
.app-header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; \
padding: 1rem 0; position: fixed; top: 0; left: 0; right: 0; z-index: 1000; }
.header-content { max-width: 1200px; margin: 0 auto; padding: 0 2rem; display: flex; \
justify-content: space-between; align-items: center; }
.site-title { font-size: 1.5rem; font-weight: bold; margin: 0; }
.menu-toggle { display: flex; flex-direction: column; background: none; border: none; \
cursor: pointer; padding: 0.5rem; gap: 0.25rem; }
.hamburger { width: 25px; height: 3px; background-color: white; }";

const FALLBACK_HTML: &str = r#"<header class="app-header">
  <div class="header-content">
    <button class="menu-toggle" id="menuToggle" aria-label="Toggle sidebar">
      <span class="hamburger"></span><span class="hamburger"></span><span class="hamburger"></span>
    </button>
    <h1 class="site-title">My Personal Website</h1>
  </div>
</header>"#;

/// Site header with the sidebar menu toggle
pub struct Header {
    loader: Arc<TemplateLoader>,
    layout: Option<Arc<LayoutManager>>,
    events: Arc<EventBus>,
    view: RwLock<View>,
}

impl Header {
    pub fn new(loader: Arc<TemplateLoader>, events: Arc<EventBus>) -> Self {
        Self {
            loader,
            layout: None,
            events,
            view: RwLock::new(View::default()),
        }
    }

    /// Toggle the sidebar through `layout` instead of the event bus
    pub fn with_layout(mut self, layout: Arc<LayoutManager>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub async fn load(&self) -> View {
        let view = load_or_fallback(&self.loader, "header", || {
            View::fallback(FALLBACK_HTML, FALLBACK_CSS)
        })
        .await;
        *self.view.write() = view.clone();
        view
    }

    /// Menu button pressed
    pub fn toggle_sidebar(&self) {
        match &self.layout {
            Some(layout) => layout.toggle_sidebar(None),
            None => {
                self.events.emit("sidebar:toggle", json!({}));
            }
        }
    }
}

impl Component for Header {
    fn name(&self) -> &'static str {
        "header"
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
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn loader() -> Arc<TemplateLoader> {
        Arc::new(TemplateLoader::new(Arc::new(MemoryFetcher::new())))
    }

    #[tokio::test]
    async fn test_missing_template_renders_fallback() {
        let header = Header::new(loader(), Arc::new(EventBus::new()));
        let view = header.load().await;
        assert!(view.fallback);
        assert!(view.html.contains("menu-toggle"));
        assert_eq!(header.view(), view);
    }

    #[test]
    fn test_toggle_without_layout_emits_event() {
        let events = Arc::new(EventBus::new());
        let toggles = Arc::new(AtomicUsize::new(0));
        let t = toggles.clone();
        events.on("sidebar:toggle", move |_| {
            t.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        Header::new(loader(), events).toggle_sidebar();
        assert_eq!(toggles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_toggle_goes_through_layout() {
        let events = Arc::new(EventBus::new());
        let layout = Arc::new(LayoutManager::new(LayoutConfig::default(), events.clone()));
        let header = Header::new(loader(), events).with_layout(layout.clone());

        let before = layout.is_sidebar_open();
        header.toggle_sidebar();
        assert_eq!(layout.is_sidebar_open(), !before);
    }
}
