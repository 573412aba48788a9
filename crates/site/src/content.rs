//! Shared content document
//!
//! [`ContentDataManager`] owns the hero/features/stats document the content
//! area renders. Section changes fan out to subscribers, and JSON fetched
//! from the site API is cached for five minutes under `api-<endpoint>`.

use std::sync::{Arc, Weak};
use std::time::Duration;

use folio_core::{Fault, FaultKind, ListenerResult, ObserverList, Subscription};
use folio_networking::{CacheConfig, CacheStats, Fetcher, NetworkError, TtlCache, DEFAULT_TTL};
use parking_lot::RwLock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Label of the stat bumped by [`ContentDataManager::spawn_dynamic_updates`]
pub const COMMITS_LABEL: &str = "Code Commits";

/// Hero copy used for English-language visitors
pub const ENGLISH_HERO_TITLE: &str = "Welcome to My Personal Website";
pub const ENGLISH_HERO_SUBTITLE: &str = "Where I share technology and record growth";

/// Default period of the simulated stat updates
pub const DEFAULT_UPDATE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    pub title: String,
    pub subtitle: String,
}

/// Partial hero update; absent fields keep their value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeroPatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

impl Hero {
    fn apply(&mut self, patch: HeroPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(subtitle) = patch.subtitle {
            self.subtitle = subtitle;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub link: String,
}

impl Feature {
    pub fn new(icon: &str, title: &str, description: &str, link: &str) -> Self {
        Self {
            icon: icon.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            link: link.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Display value such as `"50+"`
    pub number: String,
    pub label: String,
}

impl Stat {
    pub fn new(number: &str, label: &str) -> Self {
        Self {
            number: number.to_string(),
            label: label.to_string(),
        }
    }

    /// Leading integer of the display value
    pub fn value(&self) -> Option<u64> {
        let digits: String = self
            .number
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

/// The document rendered by the content area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDocument {
    pub hero: Hero,
    pub features: Vec<Feature>,
    pub stats: Vec<Stat>,
}

impl Default for ContentDocument {
    fn default() -> Self {
        Self {
            hero: Hero {
                title: "Welcome to my corner of the web".to_string(),
                subtitle: "Notes on technology, projects and growing as an engineer".to_string(),
            },
            features: vec![
                Feature::new(
                    "📝",
                    "Tech Blog",
                    "Front-end development experience and technical write-ups",
                    "/blog",
                ),
                Feature::new(
                    "💼",
                    "Projects",
                    "Personal projects and open source contributions",
                    "/projects",
                ),
                Feature::new("🎨", "Design", "UI/UX design and creative work", "/design"),
                Feature::new("📚", "Study Notes", "Learning notes and summaries", "/notes"),
            ],
            stats: vec![
                Stat::new("50+", "Articles"),
                Stat::new("20+", "Open Source Projects"),
                Stat::new("5+", "Years of Experience"),
                Stat::new("1000+", COMMITS_LABEL),
            ],
        }
    }
}

/// Update merged by [`ContentDataManager::merge_data`].
///
/// The hero is merged field by field; features and stats replace the
/// existing lists wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPatch {
    pub hero: Option<HeroPatch>,
    pub features: Option<Vec<Feature>>,
    pub stats: Option<Vec<Stat>>,
}

/// Notification delivered to content subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ContentUpdate {
    Hero(Hero),
    Features(Vec<Feature>),
    Stats(Vec<Stat>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Visitor preferences used by [`ContentDataManager::personalized_content`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Option<Theme>,
    pub language: Option<String>,
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Invalid content payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl ContentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ContentError::Network(e) => e.is_retryable(),
            ContentError::Payload(_) => false,
        }
    }
}

impl Fault for ContentError {
    fn fault_kind(&self) -> FaultKind {
        match self {
            ContentError::Network(e) => e.fault_kind(),
            ContentError::Payload(_) => FaultKind::Syntax,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            ContentError::Network(e) => e.type_name(),
            ContentError::Payload(_) => "SyntaxError",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// How long a fetched API payload stays fresh
    pub cache_ttl: Duration,
    pub max_cache_entries: usize,
    /// Period of the commit counter updates; `None` turns them off
    pub update_period: Option<Duration>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_TTL,
            max_cache_entries: 64,
            update_period: Some(DEFAULT_UPDATE_PERIOD),
        }
    }
}

/// Owner of the shared [`ContentDocument`]
pub struct ContentDataManager {
    data: RwLock<ContentDocument>,
    subscribers: ObserverList<ContentUpdate>,
    cache: TtlCache<String, Value>,
    fetcher: Arc<dyn Fetcher>,
    config: ContentConfig,
}

impl std::fmt::Debug for ContentDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDataManager")
            .field("subscribers", &self.subscribers.len())
            .field("cached", &self.cache.len())
            .field("config", &self.config)
            .finish()
    }
}

impl ContentDataManager {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: ContentConfig) -> Self {
        let cache = TtlCache::new(CacheConfig {
            default_ttl: config.cache_ttl,
            max_entries: config.max_cache_entries,
        });

        Self {
            data: RwLock::new(ContentDocument::default()),
            subscribers: ObserverList::new("content subscriber"),
            cache,
            fetcher,
            config,
        }
    }

    /// Start from `document` instead of the built-in copy
    pub fn with_document(self, document: ContentDocument) -> Self {
        *self.data.write() = document;
        self
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ContentUpdate) -> ListenerResult + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Deliver an update to every subscriber. Returns the failure count.
    pub fn notify(&self, update: &ContentUpdate) -> usize {
        self.subscribers.notify(update)
    }

    /// Snapshot of the current document
    pub fn data(&self) -> ContentDocument {
        self.data.read().clone()
    }

    pub fn update_hero(&self, patch: HeroPatch) {
        let hero = {
            let mut data = self.data.write();
            data.hero.apply(patch);
            data.hero.clone()
        };
        self.notify(&ContentUpdate::Hero(hero));
    }

    pub fn update_features(&self, features: Vec<Feature>) {
        self.data.write().features = features.clone();
        self.notify(&ContentUpdate::Features(features));
    }

    pub fn update_stats(&self, stats: Vec<Stat>) {
        self.data.write().stats = stats.clone();
        self.notify(&ContentUpdate::Stats(stats));
    }

    /// Apply each section present in `patch`, one notification per section
    pub fn merge_data(&self, patch: ContentPatch) {
        if let Some(hero) = patch.hero {
            self.update_hero(hero);
        }
        if let Some(features) = patch.features {
            self.update_features(features);
        }
        if let Some(stats) = patch.stats {
            self.update_stats(stats);
        }
    }

    /// Fetch `endpoint` as JSON and merge it into the document.
    ///
    /// A fresh cached payload is returned as is, without merging again.
    /// Non-2xx responses and undecodable bodies fail and are not cached.
    pub async fn load_from_api(&self, endpoint: &str) -> Result<Value, ContentError> {
        let key = format!("api-{}", endpoint);
        if let Some(cached) = self.cache.get(&key) {
            log::debug!("Serving {} from cache", endpoint);
            return Ok(cached);
        }

        let result = self.fetch_payload(endpoint).await;
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("Failed to load data from {}: {}", endpoint, e);
                return Err(e);
            }
        };

        let patch: ContentPatch = serde_json::from_value(payload.clone())?;
        self.cache
            .put_with_ttl(key, payload.clone(), self.config.cache_ttl);
        self.merge_data(patch);
        Ok(payload)
    }

    async fn fetch_payload(&self, endpoint: &str) -> Result<Value, ContentError> {
        let response = self.fetcher.get(endpoint).await?.error_for_status()?;
        Ok(response.json()?)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The document as pretty-printed JSON
    pub fn export_data(&self) -> Result<String, ContentError> {
        Ok(serde_json::to_string_pretty(&*self.data.read())?)
    }

    /// Merge a JSON document. Returns false if it does not parse.
    pub fn import_data(&self, json: &str) -> bool {
        match serde_json::from_str::<ContentPatch>(json) {
            Ok(patch) => {
                self.merge_data(patch);
                true
            }
            Err(e) => {
                log::error!("Failed to import content data: {}", e);
                false
            }
        }
    }

    /// Copy of the document adjusted for a visitor
    pub fn personalized_content(&self, preferences: &Preferences) -> ContentDocument {
        let mut data = self.data();

        if preferences.theme == Some(Theme::Dark) {
            data.hero.title = format!("🌙 {}", data.hero.title);
        }

        if preferences.language.as_deref() == Some("en") {
            data.hero.title = ENGLISH_HERO_TITLE.to_string();
            data.hero.subtitle = ENGLISH_HERO_SUBTITLE.to_string();
        }

        data
    }

    /// Add 0 to 2 to the commit count stat and publish the stats
    pub fn bump_commit_count(&self) {
        let mut stats = self.data.read().stats.clone();
        let mut rng = rand::thread_rng();
        for stat in stats.iter_mut().filter(|s| s.label == COMMITS_LABEL) {
            if let Some(current) = stat.value() {
                stat.number = format!("{}+", current + rng.gen_range(0..=2));
            }
        }
        self.update_stats(stats);
    }

    /// Bump the commit count every `update_period` until the manager is
    /// dropped or the task is aborted. Returns `None` when updates are
    /// turned off.
    pub fn spawn_dynamic_updates(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let Some(period) = self.config.update_period.filter(|p| !p.is_zero()) else {
            log::debug!("Dynamic content updates are disabled");
            return None;
        };
        let weak: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(manager) => manager.bump_commit_count(),
                    None => break,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_networking::MemoryFetcher;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn manager() -> ContentDataManager {
        ContentDataManager::new(Arc::new(MemoryFetcher::new()), ContentConfig::default())
    }

    #[test]
    fn test_hero_is_merged_field_by_field() {
        let content = manager();
        let before = content.data().hero;
        content.update_hero(HeroPatch {
            title: Some("Hello".to_string()),
            subtitle: None,
        });

        let hero = content.data().hero;
        assert_eq!(hero.title, "Hello");
        assert_eq!(hero.subtitle, before.subtitle);
    }

    #[test]
    fn test_merge_notifies_once_per_section() {
        let content = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        content.subscribe(move |update| {
            let kind = match update {
                ContentUpdate::Hero(_) => "hero",
                ContentUpdate::Features(_) => "features",
                ContentUpdate::Stats(_) => "stats",
            };
            s.lock().push(kind);
            Ok(())
        });

        content.merge_data(ContentPatch {
            hero: None,
            features: Some(vec![Feature::new("🧪", "Lab", "Experiments", "/lab")]),
            stats: Some(Vec::new()),
        });

        assert_eq!(*seen.lock(), vec!["features", "stats"]);
        let data = content.data();
        assert_eq!(data.features.len(), 1);
        assert!(data.stats.is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let content = manager();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let sub = content.subscribe(move |_| {
            *c.lock() += 1;
            Ok(())
        });

        content.update_stats(Vec::new());
        assert!(sub.unsubscribe());
        content.update_stats(Vec::new());
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_import_and_export() {
        let content = manager();
        assert!(!content.import_data("{not json"));
        assert!(content.import_data(r#"{"hero":{"subtitle":"Imported"}}"#));
        assert_eq!(content.data().hero.subtitle, "Imported");

        let exported = content.export_data().unwrap();
        let round: ContentDocument = serde_json::from_str(&exported).unwrap();
        assert_eq!(round, content.data());
        assert!(exported.contains('\n'));
    }

    #[test]
    fn test_personalized_content() {
        let content = manager();
        let title = content.data().hero.title;

        let dark = content.personalized_content(&Preferences {
            theme: Some(Theme::Dark),
            language: None,
        });
        assert_eq!(dark.hero.title, format!("🌙 {}", title));

        let english = content.personalized_content(&Preferences {
            theme: Some(Theme::Dark),
            language: Some("en".to_string()),
        });
        assert_eq!(english.hero.title, ENGLISH_HERO_TITLE);
        assert_eq!(english.hero.subtitle, ENGLISH_HERO_SUBTITLE);

        // The shared document is untouched
        assert_eq!(content.data().hero.title, title);
    }

    #[test]
    fn test_bump_commit_count_stays_in_range() {
        let content = manager();
        for _ in 0..10 {
            content.bump_commit_count();
        }

        let stats = content.data().stats;
        let commits = stats.iter().find(|s| s.label == COMMITS_LABEL).unwrap();
        let value = commits.value().unwrap();
        assert!((1000..=1020).contains(&value));
        assert!(commits.number.ends_with('+'));

        let articles = stats.iter().find(|s| s.label == "Articles").unwrap();
        assert_eq!(articles.number, "50+");
    }

    #[test]
    fn test_stat_value_parses_leading_digits() {
        assert_eq!(Stat::new("1000+", "x").value(), Some(1000));
        assert_eq!(Stat::new("n/a", "x").value(), None);
    }

    #[test]
    fn test_update_serializes_with_type_tag() {
        let update = ContentUpdate::Stats(vec![Stat::new("1+", "Talks")]);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "stats");
        assert_eq!(json["data"][0]["label"], "Talks");
    }
}
