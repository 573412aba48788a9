//! Page shell
//!
//! [`Site`] builds every service from [`SiteSettings`], wires the
//! components to them and dispatches keyboard shortcuts.

use std::sync::Arc;

use folio_core::{ErrorHandler, EventBus, PerformanceMonitor};
use folio_navigation::{
    site_routes, HistoryBackend, MenuOptions, NavigateOptions, PageHost, Router, RouterConfig,
};
use folio_networking::Fetcher;
use serde_json::json;

use crate::accessibility::{AccessibilityManager, KeyInput, Politeness, ShortcutAction};
use crate::components::{
    ButtonAction, Component, ContentArea, ContentServices, Footer, Header, Sidebar,
};
use crate::content::{ContentConfig, ContentDataManager};
use crate::interaction::{InteractionManager, ModalOptions};
use crate::layout::{LayoutConfig, LayoutManager};
use crate::settings::SiteSettings;
use crate::template::TemplateLoader;

/// All services and components of one page
pub struct Site {
    events: Arc<EventBus>,
    errors: Arc<ErrorHandler>,
    perf: Arc<PerformanceMonitor>,
    router: Arc<Router>,
    content: Arc<ContentDataManager>,
    layout: Arc<LayoutManager>,
    accessibility: Arc<AccessibilityManager>,
    interaction: Arc<InteractionManager>,
    header: Header,
    sidebar: Arc<Sidebar>,
    footer: Footer,
    main: Arc<ContentArea>,
}

impl Site {
    pub fn new(
        settings: &SiteSettings,
        fetcher: Arc<dyn Fetcher>,
        history: Arc<dyn HistoryBackend>,
        page: Arc<dyn PageHost>,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let errors = Arc::new(ErrorHandler::new((&settings.errors).into()));
        let perf = Arc::new(PerformanceMonitor::new(settings.performance.thresholds));
        if !settings.performance.enabled {
            perf.disable();
        }

        let router = Arc::new(
            Router::new(
                RouterConfig::from(&settings.navigation),
                history,
                page,
                Arc::clone(&events),
            )
            .with_routes(site_routes()),
        );
        let content = Arc::new(ContentDataManager::new(
            Arc::clone(&fetcher),
            ContentConfig::from(&settings.content),
        ));
        let layout = Arc::new(LayoutManager::new(
            LayoutConfig::from(&settings.layout),
            Arc::clone(&events),
        ));
        layout.bind_events();

        let accessibility = Arc::new(AccessibilityManager::new(Arc::clone(&events)));
        let interaction = Arc::new(InteractionManager::new(Arc::clone(&events)));
        let loader = Arc::new(TemplateLoader::with_base(
            fetcher,
            &settings.network.component_base,
        ));

        let header = Header::new(Arc::clone(&loader), Arc::clone(&events))
            .with_layout(Arc::clone(&layout));
        let sidebar = Sidebar::new(Arc::clone(&loader), &events, Some(Arc::clone(&layout)));
        let footer = Footer::new(Arc::clone(&loader));
        let main = ContentArea::new(ContentServices {
            content: Arc::clone(&content),
            errors: Arc::clone(&errors),
            perf: Arc::clone(&perf),
            router: Arc::clone(&router),
            loader,
            interaction: Arc::clone(&interaction),
            events: Arc::clone(&events),
        });

        Self {
            events,
            errors,
            perf,
            router,
            content,
            layout,
            accessibility,
            interaction,
            header,
            sidebar,
            footer,
            main,
        }
    }

    /// Size the layout, load the chrome concurrently and reveal the main
    /// content area. Returns whether the main content loaded.
    pub async fn mount(&self, width: u32, height: u32) -> bool {
        self.layout.update_viewport(width, height);

        futures::join!(self.header.load(), self.sidebar.load(), self.footer.load());
        let fallbacks = [self.header.view(), self.sidebar.view(), self.footer.view()]
            .iter()
            .filter(|view| view.fallback)
            .count();
        if fallbacks > 0 {
            log::warn!("{} component(s) rendered their fallback", fallbacks);
        }

        let loaded = self.main.on_visible(1.0).await;
        self.events.emit(
            "site:mounted",
            json!({ "width": width, "height": height, "contentLoaded": loaded }),
        );
        loaded
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.layout.update_viewport(width, height);
    }

    /// Resolve a key press and carry out its shortcut
    pub async fn handle_key(&self, input: &KeyInput) -> Option<ShortcutAction> {
        let action = self.accessibility.handle_key(input)?;
        self.dispatch(action).await;
        Some(action)
    }

    async fn dispatch(&self, action: ShortcutAction) {
        match action {
            ShortcutAction::Focus(_) => {
                self.accessibility
                    .announce(&action.description(), Politeness::Polite);
            }
            ShortcutAction::NavigateHome => {
                self.router
                    .navigate_to_route("/", NavigateOptions::default())
                    .await;
            }
            ShortcutAction::ToggleMenu => self.header.toggle_sidebar(),
            ShortcutAction::ToggleTheme => {
                self.main
                    .handle_action(ButtonAction::action("toggle-theme"))
                    .await;
            }
            ShortcutAction::Back => {
                self.router.go_back().await;
            }
            ShortcutAction::Forward => self.router.go_forward(),
            ShortcutAction::QuickNavigate(index) => {
                let menu = self.router.menu_data(MenuOptions {
                    exclude_external: true,
                    ..Default::default()
                });
                match menu.get(index) {
                    Some(item) => {
                        self.router
                            .navigate_to_route(&item.id, NavigateOptions::default())
                            .await;
                    }
                    None => log::debug!("No route at position {}", index + 1),
                }
            }
            ShortcutAction::Escape => {
                if !self.interaction.handle_escape() && self.layout.is_mobile() {
                    self.layout.toggle_sidebar(Some(false));
                }
            }
            ShortcutAction::ShowHelp => {
                let rows: String = self
                    .accessibility
                    .shortcut_help()
                    .into_iter()
                    .map(|(key, description)| format!("<dt>{key}</dt><dd>{description}</dd>"))
                    .collect();
                self.interaction.show_modal(
                    &format!("<dl class=\"shortcut-help\">{rows}</dl>"),
                    ModalOptions {
                        title: "Keyboard shortcuts".to_string(),
                        footer: None,
                    },
                );
            }
        }
    }

    /// Every component's view, chrome first
    pub fn render(&self) -> String {
        let components: [&dyn Component; 4] =
            [&self.header, self.sidebar.as_ref(), self.main.as_ref(), &self.footer];
        components
            .iter()
            .map(|c| format!("<!-- {} -->\n{}", c.name(), c.view().render()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    pub fn performance(&self) -> &Arc<PerformanceMonitor> {
        &self.perf
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn content(&self) -> &Arc<ContentDataManager> {
        &self.content
    }

    pub fn layout(&self) -> &Arc<LayoutManager> {
        &self.layout
    }

    pub fn accessibility(&self) -> &Arc<AccessibilityManager> {
        &self.accessibility
    }

    pub fn interaction(&self) -> &Arc<InteractionManager> {
        &self.interaction
    }

    pub fn sidebar(&self) -> &Arc<Sidebar> {
        &self.sidebar
    }

    pub fn main_content(&self) -> &Arc<ContentArea> {
        &self.main
    }

    /// Detach components and stop timers
    pub fn shutdown(&self) {
        self.main.disconnect();
        self.sidebar.disconnect();
        self.layout.destroy();
        self.router.destroy();
        log::info!("Site shut down");
    }
}
