//! Keyboard and assistive technology support
//!
//! Keyboard shortcuts resolve to [`ShortcutAction`]s which the site shell
//! carries out. The manager also tracks keyboard-navigation mode, the
//! screen reader live region and the visitor's motion/contrast preferences.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use folio_core::EventBus;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// How long an announcement stays in the live region
pub const ANNOUNCEMENT_CLEAR_DELAY: Duration = Duration::from_millis(1000);

/// A key press as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
    /// Logical key, e.g. `"h"`, `"ArrowLeft"`, `"?"`
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyInput {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Default::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

/// Canonical `Ctrl+Alt+Shift+Meta+key` form of a key press.
///
/// Single letters are upper-cased. Shift is dropped for single symbol
/// characters since it is already implied by the character (`?`).
pub fn shortcut_key(input: &KeyInput) -> String {
    let mut chars = input.key.chars();
    let single = match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    };

    let key = match single {
        Some(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase().to_string(),
        _ => input.key.clone(),
    };
    let implied_shift = matches!(single, Some(c) if !c.is_alphanumeric() && !c.is_whitespace());

    let mut parts: Vec<&str> = Vec::with_capacity(5);
    if input.ctrl {
        parts.push("Ctrl");
    }
    if input.alt {
        parts.push("Alt");
    }
    if input.shift && !implied_shift {
        parts.push("Shift");
    }
    if input.meta {
        parts.push("Meta");
    }
    parts.push(&key);
    parts.join("+")
}

/// Page landmark a shortcut can move focus to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusTarget {
    MainContent,
    Navigation,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum ShortcutAction {
    Focus(FocusTarget),
    NavigateHome,
    ToggleMenu,
    ToggleTheme,
    Back,
    Forward,
    /// Navigate to the n-th route (0-based)
    QuickNavigate(usize),
    Escape,
    ShowHelp,
}

impl ShortcutAction {
    pub fn description(&self) -> String {
        match self {
            ShortcutAction::Focus(FocusTarget::MainContent) => "Jump to main content".into(),
            ShortcutAction::Focus(FocusTarget::Navigation) => "Jump to navigation".into(),
            ShortcutAction::Focus(FocusTarget::Search) => "Jump to search".into(),
            ShortcutAction::NavigateHome => "Go to the home page".into(),
            ShortcutAction::ToggleMenu => "Open or close the menu".into(),
            ShortcutAction::ToggleTheme => "Switch theme".into(),
            ShortcutAction::Back => "Go back".into(),
            ShortcutAction::Forward => "Go forward".into(),
            ShortcutAction::QuickNavigate(index) => format!("Open page {}", index + 1),
            ShortcutAction::Escape => "Close dialog or menu".into(),
            ShortcutAction::ShowHelp => "Show keyboard shortcuts".into(),
        }
    }
}

/// The built-in shortcut table.
///
/// Alt+1..3 move focus; Alt+4..9 open the route at that position.
pub fn default_shortcuts() -> BTreeMap<String, ShortcutAction> {
    let mut map = BTreeMap::new();
    map.insert("Alt+1".into(), ShortcutAction::Focus(FocusTarget::MainContent));
    map.insert("Alt+2".into(), ShortcutAction::Focus(FocusTarget::Navigation));
    map.insert("Alt+3".into(), ShortcutAction::Focus(FocusTarget::Search));
    for digit in 4..=9 {
        map.insert(
            format!("Alt+{}", digit),
            ShortcutAction::QuickNavigate(digit - 1),
        );
    }
    map.insert("Alt+H".into(), ShortcutAction::NavigateHome);
    map.insert("Alt+M".into(), ShortcutAction::ToggleMenu);
    map.insert("Alt+T".into(), ShortcutAction::ToggleTheme);
    map.insert("Alt+ArrowLeft".into(), ShortcutAction::Back);
    map.insert("Alt+ArrowRight".into(), ShortcutAction::Forward);
    map.insert("Escape".into(), ShortcutAction::Escape);
    map.insert("?".into(), ShortcutAction::ShowHelp);
    map
}

/// Where Tab should go inside a focus trap.
///
/// Returns `Some(index)` when focus must wrap around, `None` when the
/// default order applies.
pub fn trap_focus(current: Option<usize>, len: usize, backwards: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let last = len - 1;
    match (current, backwards) {
        (Some(0), true) => Some(last),
        (Some(i), false) if i == last => Some(0),
        (None, true) => Some(last),
        (None, false) => Some(0),
        _ => None,
    }
}

/// Next index for arrow-key movement within a menu of `len` items
pub fn roving_index(current: usize, len: usize, key: &str) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = match key {
        "ArrowDown" | "ArrowRight" => (current + 1) % len,
        "ArrowUp" | "ArrowLeft" => (current + len - 1) % len,
        "Home" => 0,
        "End" => len - 1,
        _ => return None,
    };
    (next != current).then_some(next)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Politeness {
    #[default]
    Polite,
    Assertive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub message: String,
    pub politeness: Politeness,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessibilityPreferences {
    pub reduced_motion: bool,
    pub high_contrast: bool,
}

#[derive(Default)]
struct LiveRegion {
    current: Mutex<Option<Announcement>>,
    generation: AtomicU64,
}

/// Shortcut resolution and assistive state for one page
pub struct AccessibilityManager {
    shortcuts: RwLock<BTreeMap<String, ShortcutAction>>,
    keyboard_navigation: AtomicBool,
    live_region: Arc<LiveRegion>,
    preferences: RwLock<AccessibilityPreferences>,
    events: Arc<EventBus>,
}

impl fmt::Debug for AccessibilityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessibilityManager")
            .field("shortcuts", &self.shortcuts.read().len())
            .field("keyboard_navigation", &self.is_keyboard_navigation())
            .field("preferences", &*self.preferences.read())
            .finish()
    }
}

impl AccessibilityManager {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            shortcuts: RwLock::new(default_shortcuts()),
            keyboard_navigation: AtomicBool::new(false),
            live_region: Arc::new(LiveRegion::default()),
            preferences: RwLock::new(AccessibilityPreferences::default()),
            events,
        }
    }

    /// Resolve a key press.
    ///
    /// Tab switches the page into keyboard-navigation mode. A matching
    /// shortcut is announced on the bus as `accessibility:shortcut`.
    pub fn handle_key(&self, input: &KeyInput) -> Option<ShortcutAction> {
        if input.key == "Tab" && !self.keyboard_navigation.swap(true, Ordering::SeqCst) {
            self.events
                .emit("accessibility:keyboard-navigation", json!({ "active": true }));
        }

        let key = shortcut_key(input);
        let action = self.shortcuts.read().get(&key).copied()?;
        log::debug!("Shortcut {} -> {:?}", key, action);
        self.events.emit(
            "accessibility:shortcut",
            json!({ "key": key, "shortcut": action }),
        );
        Some(action)
    }

    /// A pointer press ends keyboard-navigation mode
    pub fn handle_pointer_down(&self) {
        if self.keyboard_navigation.swap(false, Ordering::SeqCst) {
            self.events
                .emit("accessibility:keyboard-navigation", json!({ "active": false }));
        }
    }

    pub fn is_keyboard_navigation(&self) -> bool {
        self.keyboard_navigation.load(Ordering::SeqCst)
    }

    /// Bind a normalised key (see [`shortcut_key`]) to an action
    pub fn bind_shortcut(&self, key: &str, action: ShortcutAction) {
        self.shortcuts.write().insert(key.to_string(), action);
    }

    pub fn unbind_shortcut(&self, key: &str) -> Option<ShortcutAction> {
        self.shortcuts.write().remove(key)
    }

    /// `(key, description)` pairs for the help dialog
    pub fn shortcut_help(&self) -> Vec<(String, String)> {
        self.shortcuts
            .read()
            .iter()
            .map(|(key, action)| (key.clone(), action.description()))
            .collect()
    }

    /// Put `message` in the live region; it clears itself after
    /// [`ANNOUNCEMENT_CLEAR_DELAY`] unless replaced first
    pub fn announce(&self, message: &str, politeness: Politeness) {
        let generation = self.live_region.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.live_region.current.lock() = Some(Announcement {
            message: message.to_string(),
            politeness,
        });
        self.events.emit(
            "accessibility:announce",
            json!({ "message": message, "politeness": politeness }),
        );

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let region = Arc::clone(&self.live_region);
        handle.spawn(async move {
            tokio::time::sleep(ANNOUNCEMENT_CLEAR_DELAY).await;
            if region.generation.load(Ordering::SeqCst) == generation {
                *region.current.lock() = None;
            }
        });
    }

    /// What the live region currently says
    pub fn live_region(&self) -> Option<Announcement> {
        self.live_region.current.lock().clone()
    }

    pub fn preferences(&self) -> AccessibilityPreferences {
        *self.preferences.read()
    }

    pub fn set_reduced_motion(&self, enabled: bool) {
        self.update_preferences(|p| p.reduced_motion = enabled);
    }

    pub fn set_high_contrast(&self, enabled: bool) {
        self.update_preferences(|p| p.high_contrast = enabled);
    }

    fn update_preferences(&self, apply: impl FnOnce(&mut AccessibilityPreferences)) {
        let (before, after) = {
            let mut prefs = self.preferences.write();
            let before = *prefs;
            apply(&mut prefs);
            (before, *prefs)
        };
        if before != after {
            self.events
                .emit("accessibility:preferences", json!(after));
        }
    }
}
