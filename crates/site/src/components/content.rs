//! Main content area
//!
//! [`ContentArea`] loads its template the first time it becomes visible,
//! binds the shared content document into it and keeps it current as the
//! document changes. Button and feature-card actions are routed through the
//! [`Router`]. Load failures render an error view whose retry button is
//! gated by the error handler's retry counter.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use folio_core::{
    ErrorHandler, ErrorInfo, Fault, HandleOptions, PerformanceMonitor, RetryOptions, Severity,
    Subscription,
};
use folio_navigation::{NavigateOptions, NavigationChange, Router, SectionOptions};
use folio_networking::NetworkError;
use parking_lot::{Mutex, RwLock};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{escape_html, Component, View};
use crate::content::{ContentDataManager, ContentDocument, ContentError, ContentPatch, Preferences, Theme};
use crate::interaction::{InteractionManager, NotificationKind, REVEAL_THRESHOLD};
use crate::template::{Template, TemplateLoader};

/// Retry context of template loads
pub const LOAD_CONTEXT: &str = "content.load_template";

/// Retry context of external data loads
pub const DATA_CONTEXT: &str = "content.load_external_data";

/// Where the download-resume action points
pub const RESUME_URL: &str = "/assets/resume.pdf";

/// How long a data-load failure stays on screen
pub const DATA_ERROR_DURATION: Duration = Duration::from_millis(8000);

const TEMPLATE_NAME: &str = "content";

const FADE_IN_CSS: &str = "
.app-content { opacity: 0; animation: fadeIn 0.5s ease-in-out forwards; }
@keyframes fadeIn { from { opacity: 0; transform: translateY(20px); } to { opacity: 1; transform: translateY(0); } }";

const FALLBACK_CSS: &str = "\
.error-view { padding: 3rem 2rem; text-align: center; }
.error-icon { font-size: 3rem; }
.error-suggestions { list-style: none; padding: 0; color: #666; }
.retry-button { padding: 0.75rem 1.5rem; border: none; border-radius: 25px; \
background: #667eea; color: white; cursor: pointer; }";

/// Services a content area works with
#[derive(Clone)]
pub struct ContentServices {
    pub content: Arc<ContentDataManager>,
    pub errors: Arc<ErrorHandler>,
    pub perf: Arc<PerformanceMonitor>,
    pub router: Arc<Router>,
    pub loader: Arc<TemplateLoader>,
    pub interaction: Arc<InteractionManager>,
    pub events: Arc<folio_core::EventBus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

/// What the error view offers the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryAffordance {
    /// Attempts left: try the load again
    Retry,
    /// Attempts used up: reload the page
    Reload,
}

/// A button press inside the content area.
///
/// `action` wins over `route`, which wins over `url`, then `section`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonAction {
    pub action: Option<String>,
    pub route: Option<String>,
    pub url: Option<String>,
    pub section: Option<String>,
}

impl ButtonAction {
    pub fn action(action: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    load_state: LoadState,
    template: Option<Template>,
    view: View,
    affordance: Option<RetryAffordance>,
    active_route: Option<String>,
    last_endpoint: Option<String>,
    theme: Theme,
}

pub struct ContentArea {
    id: String,
    services: ContentServices,
    state: RwLock<State>,
    subscriptions: Mutex<Vec<Subscription>>,
    updates: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ContentArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentArea")
            .field("id", &self.id)
            .field("state", &self.state.read().load_state)
            .finish()
    }
}

impl ContentArea {
    pub fn new(services: ContentServices) -> Arc<Self> {
        let id = format!("content-{}", Uuid::new_v4().simple());
        let init_id = format!("{id}-init");
        services.perf.start_measure(
            &init_id,
            json!({ "component": "ContentArea", "type": "initialization" }),
        );

        let area = Arc::new(Self {
            id,
            services,
            state: RwLock::new(State::default()),
            subscriptions: Mutex::new(Vec::new()),
            updates: Mutex::new(None),
        });
        area.subscribe();

        area.services.perf.end_measure(&init_id, json!({}));
        area
    }

    fn subscribe(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let data = self.services.content.subscribe(move |_| {
            if let Some(area) = weak.upgrade() {
                area.rerender();
            }
            Ok(())
        });

        let weak: Weak<Self> = Arc::downgrade(self);
        let navigation = self.services.router.add_navigation_listener(move |change| {
            if let Some(area) = weak.upgrade() {
                area.on_navigation_change(change);
            }
            Ok(())
        });

        self.subscriptions.lock().extend([data, navigation]);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn load_state(&self) -> LoadState {
        self.state.read().load_state
    }

    pub fn retry_affordance(&self) -> Option<RetryAffordance> {
        self.state.read().affordance
    }

    pub fn active_route(&self) -> Option<String> {
        self.state.read().active_route.clone()
    }

    pub fn theme(&self) -> Theme {
        self.state.read().theme
    }

    /// Report the visible fraction of the area. The first report at or
    /// above the reveal threshold triggers the template load.
    pub async fn on_visible(self: &Arc<Self>, ratio: f64) -> bool {
        if ratio < REVEAL_THRESHOLD {
            return false;
        }
        match self.load_state() {
            LoadState::Idle => self.load_template().await,
            _ => false,
        }
    }

    /// Load and render the template, rendering the error view on failure.
    /// Returns whether the area ended up loaded.
    pub async fn load_template(self: &Arc<Self>) -> bool {
        match self.try_load().await {
            Ok(()) => self.load_state() == LoadState::Loaded,
            Err(e) => {
                self.fail_load(&e);
                false
            }
        }
    }

    async fn try_load(self: &Arc<Self>) -> Result<(), NetworkError> {
        {
            let mut state = self.state.write();
            if matches!(state.load_state, LoadState::Loading | LoadState::Loaded) {
                return Ok(());
            }
            state.load_state = LoadState::Loading;
        }

        let load_id = format!("{}-load", self.id);
        let perf = &self.services.perf;
        perf.start_measure(
            &load_id,
            json!({ "component": "ContentArea", "type": "template-load" }),
        );

        match self.services.loader.load_cached(TEMPLATE_NAME).await {
            Ok((template, from_cache)) => {
                perf.end_measure(&load_id, json!({ "fromCache": from_cache }));
                self.render_template(template);
                self.start_dynamic_updates();
                Ok(())
            }
            Err(e) => {
                perf.end_measure(&load_id, json!({ "success": false, "error": e.to_string() }));
                Err(e)
            }
        }
    }

    fn fail_load<E: Fault + ?Sized>(&self, error: &E) {
        let info = self.record_load_error(error);
        self.render_fallback(&info);
    }

    fn record_load_error<E: Fault + ?Sized>(&self, error: &E) -> ErrorInfo {
        self.services.errors.handle_error(
            error,
            LOAD_CONTEXT,
            HandleOptions {
                severity: Severity::High,
                recoverable: true,
            },
        )
    }

    fn render_template(&self, template: Template) {
        let render_id = format!("{}-render", self.id);
        self.services.perf.start_measure(
            &render_id,
            json!({ "component": "ContentArea", "type": "template-render" }),
        );

        let document = self.services.content.data();
        let view = View {
            html: bind_data(&template.html, &document),
            css: format!("{}{}", template.css, FADE_IN_CSS),
            fallback: false,
        };

        {
            let mut state = self.state.write();
            state.view = view;
            state.template = Some(template);
            state.affordance = None;
            state.load_state = LoadState::Loaded;
        }
        self.services
            .perf
            .end_measure(&render_id, json!({ "success": true }));
    }

    /// Re-bind the stored template after a content change
    fn rerender(&self) {
        let template = {
            let state = self.state.read();
            match (state.load_state, &state.template) {
                (LoadState::Loaded, Some(template)) => template.clone(),
                _ => return,
            }
        };
        let html = bind_data(&template.html, &self.services.content.data());
        self.state.write().view.html = html;
    }

    fn start_dynamic_updates(&self) {
        let mut updates = self.updates.lock();
        if updates.as_ref().map_or(true, |handle| handle.is_finished()) {
            *updates = self.services.content.spawn_dynamic_updates();
        }
    }

    /// Render the error view for `info`, offering Retry while the load
    /// context has attempts left
    pub fn render_fallback(&self, info: &ErrorInfo) -> View {
        let affordance = if self.services.errors.can_retry(LOAD_CONTEXT) {
            RetryAffordance::Retry
        } else {
            RetryAffordance::Reload
        };
        self.render_error_view(info, affordance)
    }

    fn render_error_view(&self, info: &ErrorInfo, affordance: RetryAffordance) -> View {
        let button = match affordance {
            RetryAffordance::Retry => r#"<button class="retry-button" data-action="retry">Retry</button>"#,
            RetryAffordance::Reload => {
                r#"<button class="retry-button" data-action="reload">Reload page</button>"#
            }
        };
        let suggestions: String = info
            .suggestions
            .iter()
            .map(|s| format!("<li>{}</li>", escape_html(s)))
            .collect();

        let view = View::fallback(
            format!(
                "<div class=\"app-content error-view\">\n  <div class=\"error-icon\">{}</div>\n  \
                 <h2>{}</h2>\n  <p>{}</p>\n  <ul class=\"error-suggestions\">{}</ul>\n  {}\n</div>",
                info.icon,
                escape_html(info.title),
                escape_html(info.message),
                suggestions,
                button
            ),
            FALLBACK_CSS,
        );

        let mut state = self.state.write();
        state.load_state = LoadState::Error;
        state.affordance = Some(affordance);
        state.view = view.clone();
        view
    }

    /// The error view's button was pressed.
    ///
    /// With attempts left this makes one delayed attempt (1s, backoff 1.5).
    /// The attempt that uses up the last retry leaves the view on "Reload
    /// page"; pressing that asks the page to reload via `content:reload`.
    pub async fn handle_retry(self: &Arc<Self>) -> bool {
        let errors = &self.services.errors;
        let reload_offered = self.retry_affordance() == Some(RetryAffordance::Reload);
        if reload_offered || !errors.can_retry(LOAD_CONTEXT) {
            log::info!("Retries for {} used up, requesting reload", LOAD_CONTEXT);
            self.services.events.emit("content:reload", json!({ "id": self.id }));
            return false;
        }

        let area = Arc::clone(self);
        let retry = errors.create_retry_function(
            move || {
                let area = Arc::clone(&area);
                async move { area.try_load().await }
            },
            LOAD_CONTEXT,
            RetryOptions {
                delay: Duration::from_millis(1000),
                backoff: 1.5,
            },
        );

        match retry.call().await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Retry failed: {}", e);
                // Exhaustion has already reset the counter
                let exhausted = e.is_exhausted();
                let info = match e.into_inner() {
                    Some(source) => self.record_load_error(&source),
                    None => ErrorInfo::from(folio_core::ErrorCategory::Generic),
                };
                if exhausted {
                    self.render_error_view(&info, RetryAffordance::Reload);
                } else {
                    self.render_fallback(&info);
                }
                false
            }
        }
    }

    fn on_navigation_change(&self, change: &NavigationChange) {
        self.state.write().active_route = Some(change.route.id.clone());
        self.services.perf.record_metric(
            "navigation_change",
            json!({ "routeId": change.route.id, "routeTitle": change.route.title }),
        );
    }

    /// Handle a button press. Returns false for an unknown action or an
    /// empty button.
    pub async fn handle_action(&self, button: ButtonAction) -> bool {
        self.services
            .perf
            .record_metric("button_click", json!(button));

        let router = &self.services.router;
        let handled = if let Some(action) = &button.action {
            self.execute_action(action).await
        } else if let Some(route) = &button.route {
            router.navigate_to_route(route, NavigateOptions::default()).await
        } else if let Some(url) = &button.url {
            router.navigate_to_external_url(url, true);
            true
        } else if let Some(section) = &button.section {
            router.navigate_to_section(section, SectionOptions::default())
        } else {
            false
        };

        self.services.events.emit("button-click", json!(button));
        handled
    }

    async fn execute_action(&self, action: &str) -> bool {
        let router = &self.services.router;
        match action {
            "download-resume" => {
                router.navigate_to_external_url(RESUME_URL, false);
                self.services.perf.record_metric("resume_download", json!({}));
                true
            }
            "contact-me" => router.navigate_to_route("/contact", NavigateOptions::default()).await,
            "view-projects" => {
                router
                    .navigate_to_route("/projects", NavigateOptions::default())
                    .await
            }
            "learn-more" => router.navigate_to_route("/about", NavigateOptions::default()).await,
            "scroll-to-top" => {
                self.services.interaction.handle_scroll(0.0);
                true
            }
            "toggle-theme" => {
                self.toggle_theme();
                true
            }
            "share-page" => {
                let route = self.active_route();
                self.services
                    .events
                    .emit("share-page", json!({ "route": route }));
                self.services.interaction.show_notification(
                    "Link copied to clipboard",
                    NotificationKind::Info,
                    crate::interaction::DEFAULT_NOTIFICATION_DURATION,
                );
                true
            }
            "print-page" => {
                self.services.events.emit("print-page", json!({}));
                true
            }
            other => {
                log::warn!("Unknown action: {}", other);
                false
            }
        }
    }

    fn toggle_theme(&self) -> Theme {
        let (old, new) = {
            let mut state = self.state.write();
            let old = state.theme;
            state.theme = match old {
                Theme::Light => Theme::Dark,
                Theme::Dark => Theme::Light,
            };
            (old, state.theme)
        };
        self.services
            .events
            .emit("theme-change", json!({ "oldTheme": old, "newTheme": new }));
        new
    }

    /// Handle a click on a feature card.
    ///
    /// `http` links open in a new tab, `#id` links scroll to a section,
    /// known route ids navigate, and anything else opens in this tab.
    pub async fn handle_feature_click(&self, title: &str, link: Option<&str>, route: Option<&str>) {
        self.services.perf.record_metric(
            "feature_card_click",
            json!({ "title": title, "link": link, "route": route }),
        );

        let router = &self.services.router;
        if let Some(route) = route {
            router.navigate_to_route(route, NavigateOptions::default()).await;
        } else if let Some(link) = link {
            if link.starts_with("http") {
                router.navigate_to_external_url(link, true);
            } else if let Some(section) = link.strip_prefix('#') {
                router.navigate_to_section(section, SectionOptions::default());
            } else if router.route(link).is_some() {
                router.navigate_to_route(link, NavigateOptions::default()).await;
            } else {
                router.navigate_to_external_url(link, false);
            }
        }

        self.services.events.emit(
            "feature-click",
            json!({ "title": title, "link": link, "route": route }),
        );
    }

    /// Merge `patch` into the shared document once the area is loaded
    pub fn update_content(&self, patch: ContentPatch) -> bool {
        if self.load_state() != LoadState::Loaded {
            return false;
        }
        self.services.content.merge_data(patch);
        true
    }

    pub fn personalized_content(&self, preferences: &Preferences) -> ContentDocument {
        self.services.content.personalized_content(preferences)
    }

    /// Load `endpoint` into the shared document.
    ///
    /// Failures are recorded with the error handler and shown as a
    /// notification before being returned.
    pub async fn load_external_data(&self, endpoint: &str) -> Result<Value, ContentError> {
        self.state.write().last_endpoint = Some(endpoint.to_string());
        let load_id = format!("{}-external-data", self.id);
        let perf = &self.services.perf;
        perf.start_measure(
            &load_id,
            json!({ "component": "ContentArea", "type": "external-data-load", "endpoint": endpoint }),
        );

        match self.services.content.load_from_api(endpoint).await {
            Ok(data) => {
                let size = data.to_string().len();
                perf.end_measure(&load_id, json!({ "success": true, "dataSize": size }));
                Ok(data)
            }
            Err(e) => {
                perf.end_measure(&load_id, json!({ "success": false, "error": e.to_string() }));
                let info = self.services.errors.handle_error(
                    &e,
                    DATA_CONTEXT,
                    HandleOptions {
                        severity: Severity::Warning,
                        recoverable: true,
                    },
                );
                self.services.interaction.show_notification(
                    &format!("{}: {}", info.title, info.message),
                    NotificationKind::Error,
                    DATA_ERROR_DURATION,
                );
                Err(e)
            }
        }
    }

    /// Retry the last external data load while attempts remain.
    ///
    /// The counter is cleared on success and when the last attempt fails.
    pub async fn handle_data_retry(&self) -> bool {
        let errors = &self.services.errors;
        let endpoint = self.state.read().last_endpoint.clone();
        let Some(endpoint) = endpoint else {
            return false;
        };
        if !errors.can_retry(DATA_CONTEXT) {
            return false;
        }

        let attempt = errors.increment_retry(DATA_CONTEXT);
        match self.load_external_data(&endpoint).await {
            Ok(_) => {
                errors.reset_retry(DATA_CONTEXT);
                self.start_dynamic_updates();
                true
            }
            Err(_) => {
                if attempt >= errors.max_retries() {
                    log::warn!("Data retry for {} failed after {} attempts", endpoint, attempt);
                    errors.reset_retry(DATA_CONTEXT);
                }
                false
            }
        }
    }

    /// Tear down subscriptions and timers and reset retry counters
    pub fn disconnect(&self) {
        for subscription in self.subscriptions.lock().drain(..) {
            subscription.unsubscribe();
        }
        if let Some(handle) = self.updates.lock().take() {
            handle.abort();
        }
        self.services.perf.cleanup();
        self.services.errors.reset_retry(LOAD_CONTEXT);
        self.services.errors.reset_retry(DATA_CONTEXT);
    }
}

impl Component for ContentArea {
    fn name(&self) -> &'static str {
        "content"
    }

    fn view(&self) -> View {
        self.state.read().view.clone()
    }
}

/// Fill the hero, feature and stat regions of `html` from `document`
pub fn bind_data(html: &str, document: &ContentDocument) -> String {
    let patterns = binding_patterns();
    let mut html = replace_first(
        html,
        &patterns.hero_title,
        &format!(r#"<h1 class="hero-title">{}</h1>"#, escape_html(&document.hero.title)),
    );
    html = replace_first(
        &html,
        &patterns.hero_subtitle,
        &format!(r#"<p class="hero-subtitle">{}</p>"#, escape_html(&document.hero.subtitle)),
    );

    if !document.features.is_empty() {
        let features: String = document
            .features
            .iter()
            .map(|f| {
                format!(
                    "<div class=\"feature-card\" data-link=\"{}\"><div class=\"feature-icon\">{}</div>\
                     <h3 class=\"feature-title\">{}</h3><p class=\"feature-description\">{}</p></div>",
                    escape_html(&f.link),
                    escape_html(&f.icon),
                    escape_html(&f.title),
                    escape_html(&f.description)
                )
            })
            .collect();
        html = replace_first(
            &html,
            &patterns.features,
            &format!(r#"<div class="features-grid">{features}</div>"#),
        );
    }

    if !document.stats.is_empty() {
        let stats: String = document
            .stats
            .iter()
            .map(|s| {
                format!(
                    "<div class=\"stat-item\"><div class=\"stat-number\">{}</div>\
                     <div class=\"stat-label\">{}</div></div>",
                    escape_html(&s.number),
                    escape_html(&s.label)
                )
            })
            .collect();
        html = replace_first(
            &html,
            &patterns.stats,
            &format!(r#"<div class="stats-grid">{stats}</div>"#),
        );
    }

    html
}

struct BindingPatterns {
    hero_title: Option<Regex>,
    hero_subtitle: Option<Regex>,
    features: Option<Regex>,
    stats: Option<Regex>,
}

fn binding_patterns() -> &'static BindingPatterns {
    static PATTERNS: OnceLock<BindingPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| BindingPatterns {
        hero_title: compile_pattern(r#"<h1 class="hero-title">[^<]*</h1>"#),
        hero_subtitle: compile_pattern(r#"<p class="hero-subtitle">[^<]*</p>"#),
        features: compile_pattern(r#"(?s)<div class="features-grid">.*?</div>"#),
        stats: compile_pattern(r#"(?s)<div class="stats-grid">.*?</div>"#),
    })
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    Regex::new(pattern)
        .map_err(|e| log::error!("Invalid binding pattern {}: {}", pattern, e))
        .ok()
}

/// A pattern that failed to compile leaves `html` untouched
fn replace_first(html: &str, pattern: &Option<Regex>, replacement: &str) -> String {
    match pattern {
        Some(re) => re.replace(html, NoExpand(replacement)).into_owned(),
        None => html.to_string(),
    }
}
