//! Routes and the route table
//!
//! A route is identified by its id (a name or a path). Routes may name a
//! parent, which is what breadcrumbs are derived from, and a target that
//! the router runs when no custom handler is registered for the route.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

/// What navigating to a route does by default
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RouteTarget {
    /// Scroll a page section into view
    Section(String),
    /// Open an external URL
    External(String),
    /// Only update router state
    None,
}

/// A named navigable unit of content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub parent: Option<String>,
    pub target: RouteTarget,
    pub external: bool,
    pub requires_auth: bool,
    pub metadata: HashMap<String, Value>,
}

impl Route {
    /// A route titled after its id, with no parent or target
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: String::new(),
            icon: "📄".to_string(),
            parent: None,
            target: RouteTarget::None,
            external: false,
            requires_auth: false,
            metadata: HashMap::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Navigate to a page section
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.target = RouteTarget::Section(section.into());
        self
    }

    /// Open an external URL; marks the route external
    pub fn external_url(mut self, url: impl Into<String>) -> Self {
        self.target = RouteTarget::External(url.into());
        self.external = true;
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// One step of a breadcrumb trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub id: String,
    pub title: String,
    pub icon: String,
}

/// Routes keyed by id, iterated in insertion order
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    order: Vec<String>,
    routes: HashMap<String, Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a route. A replaced route keeps its position.
    pub fn insert(&mut self, route: Route) {
        if !self.routes.contains_key(&route.id) {
            self.order.push(route.id.clone());
        }
        self.routes.insert(route.id.clone(), route);
    }

    pub fn remove(&mut self, id: &str) -> Option<Route> {
        let removed = self.routes.remove(id);
        if removed.is_some() {
            self.order.retain(|existing| existing != id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.routes.contains_key(id)
    }

    /// Routes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.order.iter().filter_map(|id| self.routes.get(id))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.routes.clear();
    }

    /// Ancestor chain of `id`, root first, ending with `id` itself.
    ///
    /// The walk stops at a route without a parent, at an id missing from
    /// the table, or when it would revisit a route.
    pub fn breadcrumbs(&self, id: &str) -> Vec<Breadcrumb> {
        let mut trail = Vec::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id.to_string());

        while let Some(current) = cursor {
            if !visited.insert(current.clone()) {
                log::warn!("Route parent cycle detected at '{}'", current);
                break;
            }
            let Some(route) = self.routes.get(&current) else {
                break;
            };
            trail.push(Breadcrumb {
                id: route.id.clone(),
                title: route.title.clone(),
                icon: route.icon.clone(),
            });
            cursor = route.parent.clone();
        }

        trail.reverse();
        trail
    }
}

/// The site's default route table
pub fn site_routes() -> RouteTable {
    let mut table = RouteTable::new();
    table.insert(
        Route::new("/")
            .title("Home")
            .description("Welcome to my personal site")
            .icon("🏠")
            .section("hero-section"),
    );
    table.insert(
        Route::new("/about")
            .title("About")
            .description("More about me")
            .icon("👤")
            .parent("/")
            .section("about-section"),
    );
    table.insert(
        Route::new("/projects")
            .title("Projects")
            .description("Selected project work")
            .icon("💼")
            .parent("/")
            .section("projects-section"),
    );
    table.insert(
        Route::new("/skills")
            .title("Skills")
            .description("Technical skills and expertise")
            .icon("🛠️")
            .parent("/about")
            .section("skills-section"),
    );
    table.insert(
        Route::new("/experience")
            .title("Experience")
            .description("Work history")
            .icon("💼")
            .parent("/about")
            .section("experience-section"),
    );
    table.insert(
        Route::new("/contact")
            .title("Contact")
            .description("Get in touch")
            .icon("📧")
            .parent("/")
            .section("contact-section"),
    );
    table.insert(
        Route::new("/blog")
            .title("Blog")
            .description("Technical writing")
            .icon("📝")
            .parent("/")
            .external_url("/blog"),
    );
    table
}
