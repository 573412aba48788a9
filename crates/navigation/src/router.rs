//! The site router
//!
//! One navigation runs at a time. A request made while another is in flight
//! is rejected, never queued. Navigation failures never escape the router:
//! the public operations return `bool` and log the reason.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use folio_core::{EventBus, ListenerResult, ObserverId, ObserverList, Subscription};
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::json;

use crate::error::NavigationError;
use crate::history::{HistoryEntry, NavigationHistory, MAX_HISTORY_ENTRIES};
use crate::host::{HistoryBackend, HistoryState, PageHost, ScrollOptions};
use crate::route::{Breadcrumb, Route, RouteTable, RouteTarget};

/// Default time a navigated-to section stays highlighted
pub const DEFAULT_HIGHLIGHT_DURATION: Duration = Duration::from_millis(2000);

/// Hook run before a navigation; `Ok(false)` cancels it
pub type BeforeHook =
    Arc<dyn Fn(Route, NavigateOptions) -> BoxFuture<'static, Result<bool, NavigationError>> + Send + Sync>;

/// Hook run after a navigation; failures are logged only
pub type AfterHook =
    Arc<dyn Fn(Route, NavigateOptions) -> BoxFuture<'static, Result<(), NavigationError>> + Send + Sync>;

/// Custom handler replacing a route's default target
pub type RouteHandler =
    Arc<dyn Fn(Route, NavigateOptions) -> BoxFuture<'static, Result<(), NavigationError>> + Send + Sync>;

/// Options for [`Router::navigate_to_section`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SectionOptions {
    pub scroll: ScrollOptions,
    pub highlight: bool,
    #[serde(rename = "highlight_duration_ms", serialize_with = "serialize_millis")]
    pub highlight_duration: Duration,
}

impl Default for SectionOptions {
    fn default() -> Self {
        Self {
            scroll: ScrollOptions::default(),
            highlight: true,
            highlight_duration: DEFAULT_HIGHLIGHT_DURATION,
        }
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Options for [`Router::navigate_to_route`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigateOptions {
    /// Record the navigation in local and host history
    pub update_history: bool,
    /// URL pushed to the host history; `#<id>` when unset
    pub url: Option<String>,
    /// Used when the route targets a section
    pub section: SectionOptions,
    /// Used when the route targets an external URL
    pub new_tab: bool,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            update_history: true,
            url: None,
            section: SectionOptions::default(),
            new_tab: true,
        }
    }
}

impl NavigateOptions {
    /// Options that leave history untouched
    pub fn without_history() -> Self {
        Self {
            update_history: false,
            ..Default::default()
        }
    }
}

/// Delivered to navigation listeners after each completed navigation
#[derive(Debug, Clone, Serialize)]
pub struct NavigationChange {
    pub route: Route,
    pub previous: Option<String>,
    pub options: NavigateOptions,
}

/// Options for [`Router::menu_data`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuOptions {
    pub exclude_external: bool,
    /// Hide auth-only routes unless `is_authenticated`
    pub requires_auth: bool,
    pub is_authenticated: bool,
}

/// One navigation menu entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub external: bool,
    pub active: bool,
}

/// Router configuration
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub max_history: usize,
    /// Appended to route titles as `"<title> - <suffix>"`
    pub title_suffix: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY_ENTRIES,
            title_suffix: None,
        }
    }
}

/// Clears the in-flight flag when dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Route table, current route, history and hooks for one page
pub struct Router {
    routes: RwLock<RouteTable>,
    handlers: RwLock<HashMap<String, RouteHandler>>,
    current: RwLock<Option<Route>>,
    history: Mutex<NavigationHistory>,
    listeners: ObserverList<NavigationChange>,
    before_hooks: Mutex<Vec<BeforeHook>>,
    after_hooks: Mutex<Vec<AfterHook>>,
    navigating: AtomicBool,
    backend: Arc<dyn HistoryBackend>,
    page: Arc<dyn PageHost>,
    events: Arc<EventBus>,
    config: RouterConfig,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.read().len())
            .field("current", &self.current_route().map(|r| r.id))
            .field("history", &self.history.lock().len())
            .field("navigating", &self.is_navigating())
            .finish()
    }
}

impl Router {
    pub fn new(
        config: RouterConfig,
        backend: Arc<dyn HistoryBackend>,
        page: Arc<dyn PageHost>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            routes: RwLock::new(RouteTable::new()),
            handlers: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            history: Mutex::new(NavigationHistory::with_capacity(config.max_history)),
            listeners: ObserverList::new("navigation listener"),
            before_hooks: Mutex::new(Vec::new()),
            after_hooks: Mutex::new(Vec::new()),
            navigating: AtomicBool::new(false),
            backend,
            page,
            events,
            config,
        }
    }

    /// Replace the whole route table
    pub fn with_routes(self, table: RouteTable) -> Self {
        *self.routes.write() = table;
        self
    }

    /// Insert or replace a route. The route's id is set to `id`.
    pub fn add_route(&self, id: &str, mut route: Route) {
        route.id = id.to_string();
        self.routes.write().insert(route);
    }

    pub fn remove_route(&self, id: &str) -> Option<Route> {
        self.handlers.write().remove(id);
        self.routes.write().remove(id)
    }

    pub fn route(&self, id: &str) -> Option<Route> {
        self.routes.read().get(id).cloned()
    }

    /// All routes in insertion order
    pub fn routes(&self) -> Vec<Route> {
        self.routes.read().iter().cloned().collect()
    }

    /// Run `handler` instead of the route's target
    pub fn set_route_handler<F>(&self, id: &str, handler: F)
    where
        F: Fn(Route, NavigateOptions) -> BoxFuture<'static, Result<(), NavigationError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.write().insert(id.to_string(), Arc::new(handler));
    }

    pub fn current_route(&self) -> Option<Route> {
        self.current.read().clone()
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating.load(Ordering::SeqCst)
    }

    /// Navigate to a route. Returns false when rejected or aborted.
    pub async fn navigate_to_route(&self, id: &str, options: NavigateOptions) -> bool {
        self.navigate(id, options, true).await
    }

    async fn navigate(&self, id: &str, options: NavigateOptions, run_before_hooks: bool) -> bool {
        match self.try_navigate(id, options, run_before_hooks).await {
            Ok(()) => true,
            Err(NavigationError::InProgress) => {
                log::warn!("Navigation already in progress, '{}' rejected", id);
                false
            }
            Err(err @ NavigationError::RouteNotFound(_)) => {
                log::error!("{}", err);
                false
            }
            Err(NavigationError::Cancelled(_)) => {
                log::info!("Navigation to '{}' cancelled", id);
                false
            }
            Err(err) => {
                log::error!("Navigation failed: {}", err);
                false
            }
        }
    }

    async fn try_navigate(
        &self,
        id: &str,
        options: NavigateOptions,
        run_before_hooks: bool,
    ) -> Result<(), NavigationError> {
        let _in_flight = InFlight::acquire(&self.navigating).ok_or(NavigationError::InProgress)?;
        let route = self
            .route(id)
            .ok_or_else(|| NavigationError::RouteNotFound(id.to_string()))?;

        if run_before_hooks {
            self.run_before_hooks(&route, &options).await?;
        }

        let previous = self.current_route();
        if options.update_history {
            if let Some(prev) = &previous {
                self.history.lock().push(HistoryEntry::from_route(prev));
            }
            let url = options.url.clone().unwrap_or_else(|| format!("#{}", id));
            self.backend
                .push_state(HistoryState::now(id), &route.title, &url);
        }

        self.run_handler(&route, &options).await?;

        *self.current.write() = Some(route.clone());

        let change = NavigationChange {
            route: route.clone(),
            previous: previous.map(|r| r.id),
            options: options.clone(),
        };
        self.listeners.notify(&change);

        self.run_after_hooks(&route, &options).await;

        self.page.set_title(&self.page_title(&route));
        self.events.emit(
            "navigation:navigate",
            json!({
                "route": route.id,
                "title": route.title,
                "from": change.previous,
            }),
        );

        log::debug!("Navigated to {}", route.id);
        Ok(())
    }

    async fn run_before_hooks(
        &self,
        route: &Route,
        options: &NavigateOptions,
    ) -> Result<(), NavigationError> {
        let hooks: Vec<BeforeHook> = self.before_hooks.lock().clone();
        for hook in hooks {
            match hook(route.clone(), options.clone()).await {
                Ok(true) => {}
                Ok(false) => return Err(NavigationError::Cancelled(route.id.clone())),
                Err(err) => {
                    log::error!("Before navigation hook failed: {}", err);
                    return Err(NavigationError::HookFailed(err.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn run_after_hooks(&self, route: &Route, options: &NavigateOptions) {
        let hooks: Vec<AfterHook> = self.after_hooks.lock().clone();
        for hook in hooks {
            if let Err(err) = hook(route.clone(), options.clone()).await {
                log::error!("After navigation hook failed: {}", err);
            }
        }
    }

    async fn run_handler(
        &self,
        route: &Route,
        options: &NavigateOptions,
    ) -> Result<(), NavigationError> {
        let custom = self.handlers.read().get(&route.id).cloned();
        if let Some(handler) = custom {
            return handler(route.clone(), options.clone())
                .await
                .map_err(|e| match e {
                    NavigationError::HandlerFailed(_) => e,
                    other => NavigationError::HandlerFailed(other.to_string()),
                });
        }

        match &route.target {
            RouteTarget::Section(section) => {
                self.navigate_to_section(section, options.section);
            }
            RouteTarget::External(url) => {
                self.navigate_to_external_url(url, options.new_tab);
            }
            RouteTarget::None => {}
        }
        Ok(())
    }

    fn page_title(&self, route: &Route) -> String {
        match &self.config.title_suffix {
            Some(suffix) => format!("{} - {}", route.title, suffix),
            None => route.title.clone(),
        }
    }

    /// Scroll a section into view, optionally highlighting it for a while.
    ///
    /// Returns false if the page has no such section.
    pub fn navigate_to_section(&self, section: &str, options: SectionOptions) -> bool {
        if !self.page.scroll_into_view(section, &options.scroll) {
            log::warn!("Section '{}' not found", section);
            return false;
        }

        if options.highlight {
            self.highlight(section, options.highlight_duration);
        }

        self.events.emit(
            "navigation:section-navigate",
            json!({ "sectionId": section, "options": options }),
        );
        true
    }

    fn highlight(&self, section: &str, duration: Duration) {
        self.page.set_highlight(section, true);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let page = Arc::clone(&self.page);
                let section = section.to_string();
                handle.spawn(async move {
                    tokio::time::sleep(duration).await;
                    page.set_highlight(&section, false);
                });
            }
            Err(_) => {
                log::debug!("No async runtime, clearing highlight on '{}' immediately", section);
                self.page.set_highlight(section, false);
            }
        }
    }

    /// Open an external URL, in a new tab unless `new_tab` is false
    pub fn navigate_to_external_url(&self, url: &str, new_tab: bool) {
        self.page.open_url(url, new_tab);
        self.events.emit(
            "navigation:external-navigate",
            json!({ "url": url, "newTab": new_tab }),
        );
    }

    /// Return to the previous route, skipping before hooks.
    ///
    /// Falls back to the host history when the local stack is empty.
    pub async fn go_back(&self) -> bool {
        if self.is_navigating() {
            log::warn!("Navigation already in progress, back ignored");
            return false;
        }

        let previous = self.history.lock().pop();
        if let Some(entry) = previous {
            let moved = self
                .navigate(&entry.route, NavigateOptions::without_history(), false)
                .await;
            if !moved {
                // Keep the entry so a later back can still reach it
                self.history.lock().push(entry);
            }
            return moved;
        }

        if self.backend.len() > 1 {
            self.backend.back();
            return true;
        }
        false
    }

    pub fn go_forward(&self) {
        self.backend.forward();
    }

    /// Re-run navigation to the current route without touching history
    pub async fn refresh(&self) -> bool {
        match self.current_route() {
            Some(route) => {
                self.navigate_to_route(&route.id, NavigateOptions::without_history())
                    .await
            }
            None => false,
        }
    }

    /// Respond to the host moving through its own history
    pub async fn handle_pop_state(&self, state: Option<HistoryState>) -> bool {
        let Some(state) = state else {
            return false;
        };

        let navigated = self
            .navigate_to_route(&state.route, NavigateOptions::without_history())
            .await;
        self.events
            .emit("navigation:popstate", json!({ "route": state.route }));
        navigated
    }

    pub fn add_navigation_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NavigationChange) -> ListenerResult + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn remove_navigation_listener(&self, id: ObserverId) -> bool {
        self.listeners.remove(id)
    }

    pub fn add_before_navigation_hook<F>(&self, hook: F)
    where
        F: Fn(Route, NavigateOptions) -> BoxFuture<'static, Result<bool, NavigationError>>
            + Send
            + Sync
            + 'static,
    {
        self.before_hooks.lock().push(Arc::new(hook));
    }

    pub fn add_after_navigation_hook<F>(&self, hook: F)
    where
        F: Fn(Route, NavigateOptions) -> BoxFuture<'static, Result<(), NavigationError>>
            + Send
            + Sync
            + 'static,
    {
        self.after_hooks.lock().push(Arc::new(hook));
    }

    /// The last `limit` history entries, oldest first
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.lock().recent(limit)
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.lock().is_empty() || self.backend.len() > 1
    }

    /// Breadcrumb trail for a route, root first
    pub fn breadcrumbs(&self, id: &str) -> Vec<Breadcrumb> {
        self.routes.read().breadcrumbs(id)
    }

    /// Breadcrumb trail for the current route
    pub fn current_breadcrumbs(&self) -> Vec<Breadcrumb> {
        match self.current_route() {
            Some(route) => self.breadcrumbs(&route.id),
            None => Vec::new(),
        }
    }

    pub fn menu_data(&self, options: MenuOptions) -> Vec<MenuItem> {
        let current = self.current_route().map(|r| r.id);
        self.routes
            .read()
            .iter()
            .filter(|route| !(options.exclude_external && route.external))
            .filter(|route| {
                !(options.requires_auth && route.requires_auth && !options.is_authenticated)
            })
            .map(|route| MenuItem {
                id: route.id.clone(),
                title: route.title.clone(),
                description: route.description.clone(),
                icon: route.icon.clone(),
                external: route.external,
                active: current.as_deref() == Some(route.id.as_str()),
            })
            .collect()
    }

    /// Whether a link to `href` should be styled active.
    ///
    /// Matches exactly, or by prefix for non-root paths.
    pub fn is_active(&self, href: &str) -> bool {
        let Some(current) = self.current_route() else {
            return false;
        };
        current.id == href || (current.id != "/" && href != "/" && current.id.starts_with(href))
    }

    /// Drop listeners, hooks, routes, history and the current route
    pub fn destroy(&self) {
        self.listeners.clear();
        self.before_hooks.lock().clear();
        self.after_hooks.lock().clear();
        self.handlers.write().clear();
        self.routes.write().clear();
        self.history.lock().clear();
        *self.current.write() = None;
        log::debug!("Router destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HeadlessPage, MemoryHistory};
    use crate::route::site_routes;

    fn router() -> (Router, Arc<HeadlessPage>, Arc<MemoryHistory>) {
        let page = Arc::new(HeadlessPage::with_sections([
            "hero-section",
            "about-section",
            "skills-section",
        ]));
        let history = Arc::new(MemoryHistory::new());
        let router = Router::new(
            RouterConfig::default(),
            history.clone(),
            page.clone(),
            Arc::new(EventBus::new()),
        )
        .with_routes(site_routes());
        (router, page, history)
    }

    #[test]
    fn test_is_active_prefix_matching() {
        let (router, _, _) = router();
        assert!(!router.is_active("/"));
        *router.current.write() = router.route("/about");

        assert!(router.is_active("/about"));
        assert!(!router.is_active("/"));
        assert!(!router.is_active("/skills"));

        *router.current.write() = router.route("/");
        assert!(router.is_active("/"));
        assert!(!router.is_active("/about"));
    }

    #[test]
    fn test_menu_data_filters() {
        let (router, _, _) = router();
        router.add_route("/admin", Route::new("/admin").requires_auth(true));
        *router.current.write() = router.route("/about");

        let all = router.menu_data(MenuOptions::default());
        assert_eq!(all.len(), 8);
        assert!(all.iter().find(|m| m.id == "/about").unwrap().active);

        let filtered = router.menu_data(MenuOptions {
            exclude_external: true,
            requires_auth: true,
            is_authenticated: false,
        });
        assert!(filtered.iter().all(|m| m.id != "/blog" && m.id != "/admin"));
    }

    #[test]
    fn test_section_without_runtime_clears_highlight() {
        let (router, page, _) = router();
        assert!(router.navigate_to_section("about-section", SectionOptions::default()));
        assert!(!page.is_highlighted("about-section"));
        assert!(!router.navigate_to_section("nowhere", SectionOptions::default()));
    }

    #[test]
    fn test_destroy_clears_state() {
        let (router, _, _) = router();
        *router.current.write() = router.route("/");
        router.history.lock().push(HistoryEntry::from_route(&Route::new("/x")));
        router.destroy();

        assert!(router.routes().is_empty());
        assert!(router.current_route().is_none());
        assert!(router.history(10).is_empty());
    }
}
