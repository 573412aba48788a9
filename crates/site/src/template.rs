use std::collections::HashMap;
use std::sync::Arc;

use folio_networking::{Fetcher, NetworkError};
use parking_lot::RwLock;

/// Default directory component templates are served from
pub const DEFAULT_COMPONENT_BASE: &str = "components";

/// Markup and stylesheet of one component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub html: String,
    pub css: String,
}

/// Loader for component templates (`<base>/<name>/<name>.html` and `.css`)
pub struct TemplateLoader {
    /// Fetcher the fragments are requested through
    fetcher: Arc<dyn Fetcher>,
    /// Path prefix of the component directories
    base: String,
    /// Templates kept for the lifetime of the loader
    cache: RwLock<HashMap<String, Template>>,
}

impl std::fmt::Debug for TemplateLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateLoader")
            .field("base", &self.base)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

impl TemplateLoader {
    /// Create a loader rooted at [`DEFAULT_COMPONENT_BASE`]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_base(fetcher, DEFAULT_COMPONENT_BASE)
    }

    pub fn with_base(fetcher: Arc<dyn Fetcher>, base: &str) -> Self {
        Self {
            fetcher,
            base: base.trim_end_matches('/').to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Path of a component fragment with the given extension
    pub fn fragment_path(&self, name: &str, extension: &str) -> String {
        if self.base.is_empty() {
            format!("{name}/{name}.{extension}")
        } else {
            format!("{}/{name}/{name}.{extension}", self.base)
        }
    }

    /// Load a text fragment. Non-2xx answers are errors.
    async fn load_text(&self, path: &str) -> Result<String, NetworkError> {
        let response = self.fetcher.get(path).await?.error_for_status()?;
        response.body_text()
    }

    /// Load the markup fragment of a component
    pub async fn load_html(&self, name: &str) -> Result<String, NetworkError> {
        self.load_text(&self.fragment_path(name, "html")).await
    }

    /// Load the stylesheet fragment of a component
    pub async fn load_css(&self, name: &str) -> Result<String, NetworkError> {
        self.load_text(&self.fragment_path(name, "css")).await
    }

    /// Fetch both fragments concurrently; either failing fails the load
    pub async fn load_component(&self, name: &str) -> Result<Template, NetworkError> {
        let (html, css) =
            futures::future::try_join(self.load_html(name), self.load_css(name)).await?;
        log::debug!("Loaded template {} ({} bytes)", name, html.len() + css.len());
        Ok(Template { html, css })
    }

    /// Like [`load_component`](Self::load_component), but served from the
    /// loader's cache after the first success. The flag tells whether the
    /// template came from cache.
    pub async fn load_cached(&self, name: &str) -> Result<(Template, bool), NetworkError> {
        if let Some(template) = self.cache.read().get(name).cloned() {
            log::debug!("Serving cached template: {}", name);
            return Ok((template, true));
        }

        let template = self.load_component(name).await?;
        self.cache
            .write()
            .insert(name.to_string(), template.clone());
        Ok((template, false))
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.read().contains_key(name)
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_networking::MemoryFetcher;

    fn fetcher() -> Arc<MemoryFetcher> {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.insert("components/footer/footer.html", "<footer></footer>");
        fetcher.insert("components/footer/footer.css", ".app-footer {}");
        fetcher
    }

    #[tokio::test]
    async fn test_load_component() {
        let loader = TemplateLoader::new(fetcher());
        let template = loader.load_component("footer").await.unwrap();
        assert_eq!(template.html, "<footer></footer>");
        assert_eq!(template.css, ".app-footer {}");
    }

    #[tokio::test]
    async fn test_missing_stylesheet_fails_load() {
        let fetcher = fetcher();
        fetcher.remove("components/footer/footer.css");
        let loader = TemplateLoader::new(fetcher);

        let err = loader.load_component("footer").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_cached_load_skips_fetch() {
        let fetcher = fetcher();
        let loader = TemplateLoader::new(fetcher.clone());

        let (_, from_cache) = loader.load_cached("footer").await.unwrap();
        assert!(!from_cache);
        let (template, from_cache) = loader.load_cached("footer").await.unwrap();
        assert!(from_cache);
        assert_eq!(template.html, "<footer></footer>");
        assert_eq!(fetcher.request_count(), 2);
        assert!(loader.is_cached("footer"));
    }

    #[test]
    fn test_fragment_path() {
        let loader = TemplateLoader::with_base(Arc::new(MemoryFetcher::new()), "/static/");
        assert_eq!(loader.fragment_path("card", "css"), "/static/card/card.css");
        let bare = TemplateLoader::with_base(Arc::new(MemoryFetcher::new()), "");
        assert_eq!(bare.fragment_path("card", "html"), "card/card.html");
    }
}
