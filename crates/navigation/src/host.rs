//! Host integration points
//!
//! The router never touches a real browser. It talks to a
//! [`HistoryBackend`] for session history and to a [`PageHost`] for the
//! document. In-memory implementations are provided for headless use.

use std::collections::HashSet;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// State stored with each session history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
    pub route: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl HistoryState {
    pub fn now(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Session history of the host
pub trait HistoryBackend: Send + Sync {
    fn push_state(&self, state: HistoryState, title: &str, url: &str);
    fn replace_state(&self, state: Option<HistoryState>, title: &str, url: &str);
    fn back(&self);
    fn forward(&self);
    /// Number of entries in the session history
    fn len(&self) -> usize;
}

/// Alignment used when scrolling a section into view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollAlign {
    Start,
    Center,
    End,
    Nearest,
}

/// Scroll parameters for [`PageHost::scroll_into_view`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOptions {
    pub smooth: bool,
    pub block: ScrollAlign,
    pub inline: ScrollAlign,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            smooth: true,
            block: ScrollAlign::Start,
            inline: ScrollAlign::Nearest,
        }
    }
}

/// The document the router drives
pub trait PageHost: Send + Sync {
    fn set_title(&self, title: &str);
    /// Scroll a section into view; false when no such section exists
    fn scroll_into_view(&self, section: &str, options: &ScrollOptions) -> bool;
    fn set_highlight(&self, section: &str, highlighted: bool);
    fn open_url(&self, url: &str, new_tab: bool);
}

#[derive(Debug, Default)]
struct SessionEntries {
    entries: Vec<(Option<HistoryState>, String)>,
    index: usize,
}

/// Session history kept in memory
#[derive(Debug)]
pub struct MemoryHistory {
    inner: Mutex<SessionEntries>,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistory {
    /// History with the single initial entry every document starts with
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SessionEntries {
                entries: vec![(None, "/".to_string())],
                index: 0,
            }),
        }
    }

    /// State of the entry the session is currently on
    pub fn current_state(&self) -> Option<HistoryState> {
        let inner = self.inner.lock();
        inner.entries.get(inner.index).and_then(|(s, _)| s.clone())
    }

    pub fn current_url(&self) -> String {
        let inner = self.inner.lock();
        inner
            .entries
            .get(inner.index)
            .map(|(_, url)| url.clone())
            .unwrap_or_default()
    }
}

impl HistoryBackend for MemoryHistory {
    fn push_state(&self, state: HistoryState, _title: &str, url: &str) {
        let mut inner = self.inner.lock();
        let keep = inner.index + 1;
        inner.entries.truncate(keep);
        inner.entries.push((Some(state), url.to_string()));
        inner.index = inner.entries.len() - 1;
    }

    fn replace_state(&self, state: Option<HistoryState>, _title: &str, url: &str) {
        let mut inner = self.inner.lock();
        let index = inner.index;
        if let Some(entry) = inner.entries.get_mut(index) {
            *entry = (state, url.to_string());
        }
    }

    fn back(&self) {
        let mut inner = self.inner.lock();
        inner.index = inner.index.saturating_sub(1);
    }

    fn forward(&self) {
        let mut inner = self.inner.lock();
        if inner.index + 1 < inner.entries.len() {
            inner.index += 1;
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

/// Record of everything the router asked the page to do
#[derive(Debug, Default)]
pub struct HeadlessPage {
    sections: Mutex<HashSet<String>>,
    title: Mutex<String>,
    scrolled: Mutex<Vec<String>>,
    highlighted: Mutex<HashSet<String>>,
    opened: Mutex<Vec<(String, bool)>>,
}

impl HeadlessPage {
    /// A page containing the given section ids
    pub fn with_sections<I, S>(sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let page = Self::default();
        page.sections
            .lock()
            .extend(sections.into_iter().map(Into::into));
        page
    }

    pub fn add_section(&self, section: &str) {
        self.sections.lock().insert(section.to_string());
    }

    pub fn title(&self) -> String {
        self.title.lock().clone()
    }

    /// Sections scrolled to, in order
    pub fn scrolled(&self) -> Vec<String> {
        self.scrolled.lock().clone()
    }

    pub fn is_highlighted(&self, section: &str) -> bool {
        self.highlighted.lock().contains(section)
    }

    /// URLs opened, with whether each went to a new tab
    pub fn opened(&self) -> Vec<(String, bool)> {
        self.opened.lock().clone()
    }
}

impl PageHost for HeadlessPage {
    fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
    }

    fn scroll_into_view(&self, section: &str, _options: &ScrollOptions) -> bool {
        if !self.sections.lock().contains(section) {
            return false;
        }
        self.scrolled.lock().push(section.to_string());
        true
    }

    fn set_highlight(&self, section: &str, highlighted: bool) {
        let mut set = self.highlighted.lock();
        if highlighted {
            set.insert(section.to_string());
        } else {
            set.remove(section);
        }
    }

    fn open_url(&self, url: &str, new_tab: bool) {
        self.opened.lock().push((url.to_string(), new_tab));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_history_push_truncates_forward_entries() {
        let history = MemoryHistory::new();
        history.push_state(HistoryState::now("a"), "A", "#a");
        history.push_state(HistoryState::now("b"), "B", "#b");
        history.back();
        assert_eq!(history.current_state().unwrap().route, "a");

        history.push_state(HistoryState::now("c"), "C", "#c");
        assert_eq!(history.len(), 3);
        history.forward();
        assert_eq!(history.current_url(), "#c");
    }

    #[test]
    fn test_memory_history_back_stops_at_start() {
        let history = MemoryHistory::new();
        history.back();
        history.back();
        assert_eq!(history.current_url(), "/");
        assert!(history.current_state().is_none());
    }

    #[test]
    fn test_headless_page_scroll_requires_section() {
        let page = HeadlessPage::with_sections(["about-section"]);
        assert!(page.scroll_into_view("about-section", &ScrollOptions::default()));
        assert!(!page.scroll_into_view("missing", &ScrollOptions::default()));
        assert_eq!(page.scrolled(), vec!["about-section"]);
    }
}
