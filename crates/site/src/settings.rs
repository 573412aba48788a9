//! Site configuration
//!
//! [`SiteSettings`] holds one section per service and is stored as pretty
//! JSON. Every section has defaults, so a partial file only overrides what
//! it names.

use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_core::{ErrorHandlerConfig, Thresholds};
use folio_navigation::{RouterConfig, MAX_HISTORY_ENTRIES};
use folio_networking::{NetworkConfig, DEFAULT_TTL};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::{ContentConfig, DEFAULT_UPDATE_PERIOD};
use crate::layout::{LayoutConfig, SidebarPolicy};

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub network: NetworkSettings,
    pub content: ContentSettings,
    pub navigation: NavigationSettings,
    pub layout: LayoutSettings,
    pub performance: PerformanceSettings,
    pub errors: ErrorSettings,
}

/// Where and how site resources are fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Base URL relative resource paths resolve against
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub max_redirects: usize,
    /// Directory holding the component templates
    pub component_base: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        let config = NetworkConfig::default();
        Self {
            base_url: config.base_url,
            request_timeout_ms: config.request_timeout.as_millis() as u64,
            max_redirects: config.max_redirects,
            component_base: crate::template::DEFAULT_COMPONENT_BASE.to_string(),
        }
    }
}

impl From<&NetworkSettings> for NetworkConfig {
    fn from(settings: &NetworkSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            max_redirects: settings.max_redirects,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    pub cache_ttl_secs: u64,
    pub max_cache_entries: usize,
    /// Period of the commit counter updates; 0 disables them
    pub update_period_secs: u64,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            max_cache_entries: 64,
            update_period_secs: DEFAULT_UPDATE_PERIOD.as_secs(),
        }
    }
}

impl From<&ContentSettings> for ContentConfig {
    fn from(settings: &ContentSettings) -> Self {
        Self {
            cache_ttl: Duration::from_secs(settings.cache_ttl_secs),
            max_cache_entries: settings.max_cache_entries,
            update_period: match settings.update_period_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    pub max_history: usize,
    /// Appended to page titles as `"<title> - <suffix>"`
    pub title_suffix: Option<String>,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY_ENTRIES,
            title_suffix: Some("Folio".to_string()),
        }
    }
}

impl From<&NavigationSettings> for RouterConfig {
    fn from(settings: &NavigationSettings) -> Self {
        Self {
            max_history: settings.max_history,
            title_suffix: settings.title_suffix.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    pub sidebar_policy: SidebarPolicy,
    pub header_height: u32,
    pub footer_height: u32,
    pub sidebar_width: u32,
    pub content_padding: u32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        let config = LayoutConfig::default();
        Self {
            sidebar_policy: config.sidebar_policy,
            header_height: config.header_height,
            footer_height: config.footer_height,
            sidebar_width: config.sidebar_width,
            content_padding: config.content_padding,
        }
    }
}

impl From<&LayoutSettings> for LayoutConfig {
    fn from(settings: &LayoutSettings) -> Self {
        Self {
            sidebar_policy: settings.sidebar_policy,
            header_height: settings.header_height,
            footer_height: settings.footer_height,
            sidebar_width: settings.sidebar_width,
            content_padding: settings.content_padding,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSettings {
    pub enabled: bool,
    pub thresholds: Thresholds,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: Thresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorSettings {
    pub max_retries: u32,
    pub max_log_size: usize,
}

impl Default for ErrorSettings {
    fn default() -> Self {
        let config = ErrorHandlerConfig::default();
        Self {
            max_retries: config.max_retries,
            max_log_size: config.max_log_size,
        }
    }
}

impl From<&ErrorSettings> for ErrorHandlerConfig {
    fn from(settings: &ErrorSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            max_log_size: settings.max_log_size,
        }
    }
}

/// Settings manager
#[derive(Debug)]
pub struct SettingsManager {
    settings: SiteSettings,
    settings_file: PathBuf,
}

impl SettingsManager {
    /// Open the settings stored at `path`, or defaults when there is no file
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let settings_file = path.into();
        let settings = if settings_file.exists() {
            Self::load_settings(&settings_file)?
        } else {
            log::info!(
                "No settings at {}, using defaults",
                settings_file.display()
            );
            SiteSettings::default()
        };

        Ok(Self {
            settings,
            settings_file,
        })
    }

    /// Load settings from file
    pub fn load_settings(path: &Path) -> Result<SiteSettings, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: SiteSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to file, creating its directory
    pub fn save_settings(&self) -> Result<(), SettingsError> {
        if let Some(dir) = self.settings_file.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.settings_file, content)?;
        Ok(())
    }

    pub fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_file
    }

    /// Apply `updater` and save
    pub fn update_settings<F>(&mut self, updater: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut SiteSettings),
    {
        updater(&mut self.settings);
        self.save_settings()
    }

    pub fn reset_to_default(&mut self) -> Result<(), SettingsError> {
        self.settings = SiteSettings::default();
        self.save_settings()
    }

    pub fn export_settings(&self, path: &Path) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace the settings with those stored at `path` and save
    pub fn import_settings(&mut self, path: &Path) -> Result<(), SettingsError> {
        self.settings = Self::load_settings(path)?;
        self.save_settings()
    }

    /// Settings that are legal but probably not intended
    pub fn validate_settings(&self) -> Vec<SettingsWarning> {
        let mut warnings = Vec::new();
        let settings = &self.settings;

        if let Err(e) = url::Url::parse(&settings.network.base_url) {
            warnings.push(SettingsWarning::InvalidBaseUrl(e.to_string()));
        }

        if settings.network.request_timeout_ms == 0 {
            warnings.push(SettingsWarning::NoRequestTimeout);
        }

        if settings.content.cache_ttl_secs == 0 {
            warnings.push(SettingsWarning::CacheDisabled);
        }

        if settings.navigation.max_history == 0 {
            warnings.push(SettingsWarning::HistoryDisabled);
        }

        if settings.errors.max_retries == 0 {
            warnings.push(SettingsWarning::RetriesDisabled);
        }

        if !settings.performance.enabled {
            warnings.push(SettingsWarning::PerformanceMonitoringDisabled);
        }

        warnings
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsWarning {
    InvalidBaseUrl(String),
    NoRequestTimeout,
    CacheDisabled,
    HistoryDisabled,
    RetriesDisabled,
    PerformanceMonitoringDisabled,
}

impl std::fmt::Display for SettingsWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsWarning::InvalidBaseUrl(reason) => {
                write!(f, "Base URL is not a valid absolute URL ({}) - nothing can be fetched", reason)
            }
            SettingsWarning::NoRequestTimeout => {
                write!(f, "Request timeout is zero - every request will fail")
            }
            SettingsWarning::CacheDisabled => {
                write!(f, "Content cache TTL is zero - every load hits the network")
            }
            SettingsWarning::HistoryDisabled => {
                write!(f, "Navigation history is disabled - going back falls through to the host")
            }
            SettingsWarning::RetriesDisabled => {
                write!(f, "Retries are disabled - failed loads offer a reload only")
            }
            SettingsWarning::PerformanceMonitoringDisabled => {
                write!(f, "Performance monitoring is disabled - no timings will be reported")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("folio-settings-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_defaults_without_file() {
        let manager = SettingsManager::new(temp_path("settings.json")).unwrap();
        assert_eq!(manager.settings(), &SiteSettings::default());
        assert!(manager.validate_settings().is_empty());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = temp_path("settings.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{ "layout": { "sidebar_policy": "preserve_manual" } }"#).unwrap();

        let manager = SettingsManager::new(&path).unwrap();
        assert_eq!(
            manager.settings().layout.sidebar_policy,
            SidebarPolicy::PreserveManual
        );
        assert_eq!(manager.settings().layout.sidebar_width, 280);
        assert_eq!(manager.settings().errors.max_retries, 3);
    }

    #[test]
    fn test_update_saves_and_reloads() {
        let path = temp_path("nested/settings.json");
        let mut manager = SettingsManager::new(&path).unwrap();
        manager
            .update_settings(|s| s.navigation.title_suffix = Some("Jane".to_string()))
            .unwrap();

        let reloaded = SettingsManager::load_settings(&path).unwrap();
        assert_eq!(reloaded.navigation.title_suffix.as_deref(), Some("Jane"));

        manager.reset_to_default().unwrap();
        assert_eq!(
            SettingsManager::load_settings(&path).unwrap(),
            SiteSettings::default()
        );
    }

    #[test]
    fn test_export_import() {
        let path = temp_path("settings.json");
        let export = temp_path("export.json");
        std::fs::create_dir_all(export.parent().unwrap()).unwrap();

        let mut manager = SettingsManager::new(&path).unwrap();
        manager
            .update_settings(|s| s.content.max_cache_entries = 8)
            .unwrap();
        manager.export_settings(&export).unwrap();

        let mut other = SettingsManager::new(temp_path("other.json")).unwrap();
        other.import_settings(&export).unwrap();
        assert_eq!(other.settings().content.max_cache_entries, 8);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_path("settings.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SettingsManager::new(&path),
            Err(SettingsError::Serialization(_))
        ));
    }

    #[test]
    fn test_validation_warnings() {
        let mut manager = SettingsManager::new(temp_path("settings.json")).unwrap();
        manager.settings = SiteSettings {
            network: NetworkSettings {
                base_url: "not a url".to_string(),
                ..Default::default()
            },
            content: ContentSettings {
                cache_ttl_secs: 0,
                ..Default::default()
            },
            errors: ErrorSettings {
                max_retries: 0,
                ..Default::default()
            },
            performance: PerformanceSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };

        let warnings = manager.validate_settings();
        assert_eq!(warnings.len(), 4);
        assert!(matches!(warnings[0], SettingsWarning::InvalidBaseUrl(_)));
        assert_eq!(warnings[1], SettingsWarning::CacheDisabled);
        assert!(warnings[3].to_string().contains("Performance monitoring"));
    }

    #[test]
    fn test_conversions() {
        let settings = SiteSettings::default();
        let content = ContentConfig::from(&settings.content);
        assert_eq!(content.cache_ttl, Duration::from_secs(300));
        let router = RouterConfig::from(&settings.navigation);
        assert_eq!(router.max_history, 50);
        let layout = LayoutConfig::from(&settings.layout);
        assert_eq!(layout.breakpoints.len(), 6);
    }

    #[test]
    fn test_zero_update_period_turns_updates_off() {
        let mut content = ContentSettings::default();
        assert_eq!(
            ContentConfig::from(&content).update_period,
            Some(Duration::from_secs(30))
        );

        content.update_period_secs = 0;
        assert_eq!(ContentConfig::from(&content).update_period, None);
    }
}
