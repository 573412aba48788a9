//! Micro-interactions
//!
//! Ripple geometry, scroll reveal, notifications, the modal stack, the
//! scroll-to-top button and the debounce/throttle helpers used by the
//! shell. Timed removals run as tokio tasks; without a runtime they are
//! left to the caller.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use folio_core::EventBus;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use uuid::Uuid;

/// Lifetime of a click ripple
pub const RIPPLE_DURATION: Duration = Duration::from_millis(600);

/// Extra reveal delay per registered element
pub const REVEAL_STAGGER: Duration = Duration::from_millis(100);

/// Visible fraction at which an element is revealed
pub const REVEAL_THRESHOLD: f64 = 0.1;

/// Default notification lifetime
pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(3000);

/// Scroll offset past which the scroll-to-top button shows
pub const SCROLL_TOP_OFFSET: f64 = 300.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// A square ripple centred on the click point, relative to the element
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ripple {
    pub size: f64,
    pub x: f64,
    pub y: f64,
}

pub fn ripple_geometry(rect: Rect, client_x: f64, client_y: f64) -> Ripple {
    let size = rect.width.max(rect.height);
    Ripple {
        size,
        x: client_x - rect.left - size / 2.0,
        y: client_y - rect.top - size / 2.0,
    }
}

fn release_ripple(ripples: &Mutex<HashMap<String, usize>>, element: &str) {
    let mut ripples = ripples.lock();
    if let Some(count) = ripples.get_mut(element) {
        *count -= 1;
        if *count == 0 {
            ripples.remove(element);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalOptions {
    pub title: String,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modal {
    pub id: Uuid,
    pub content: String,
    pub options: ModalOptions,
}

#[derive(Debug, Clone, Copy)]
struct RevealSlot {
    delay: Duration,
    revealed: bool,
}

/// Page-wide interaction state
pub struct InteractionManager {
    notifications: Arc<Mutex<Vec<Notification>>>,
    modals: Mutex<Vec<Modal>>,
    reveal: Mutex<(Vec<String>, HashMap<String, RevealSlot>)>,
    ripples: Arc<Mutex<HashMap<String, usize>>>,
    scroll_top_visible: AtomicBool,
    events: Arc<EventBus>,
}

impl fmt::Debug for InteractionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionManager")
            .field("notifications", &self.notifications.lock().len())
            .field("modals", &self.modals.lock().len())
            .finish()
    }
}

impl InteractionManager {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            notifications: Arc::new(Mutex::new(Vec::new())),
            modals: Mutex::new(Vec::new()),
            reveal: Mutex::new((Vec::new(), HashMap::new())),
            ripples: Arc::new(Mutex::new(HashMap::new())),
            scroll_top_visible: AtomicBool::new(false),
            events,
        }
    }

    /// Start a ripple on `element`; it is removed after [`RIPPLE_DURATION`]
    pub fn ripple(&self, element: &str, rect: Rect, client_x: f64, client_y: f64) -> Ripple {
        let ripple = ripple_geometry(rect, client_x, client_y);
        *self.ripples.lock().entry(element.to_string()).or_insert(0) += 1;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let ripples = Arc::clone(&self.ripples);
                let element = element.to_string();
                handle.spawn(async move {
                    tokio::time::sleep(RIPPLE_DURATION).await;
                    release_ripple(&ripples, &element);
                });
            }
            Err(_) => {
                log::debug!("No async runtime, removing ripple on '{}' immediately", element);
                release_ripple(&self.ripples, element);
            }
        }
        ripple
    }

    /// Ripples currently shown on `element`
    pub fn active_ripples(&self, element: &str) -> usize {
        self.ripples.lock().get(element).copied().unwrap_or(0)
    }

    /// Register an element for scroll reveal.
    ///
    /// Without an explicit delay the element waits `index * 100ms`, where
    /// index is its registration order. Returns the delay in effect.
    pub fn register_reveal(&self, element: &str, delay: Option<Duration>) -> Duration {
        let mut reveal = self.reveal.lock();
        let (order, slots) = &mut *reveal;
        if let Some(slot) = slots.get(element) {
            return slot.delay;
        }

        let delay = delay.unwrap_or_else(|| REVEAL_STAGGER * order.len() as u32);
        order.push(element.to_string());
        slots.insert(
            element.to_string(),
            RevealSlot {
                delay,
                revealed: false,
            },
        );
        delay
    }

    /// Report how much of `element` is visible.
    ///
    /// Returns the animation delay the first time the element crosses
    /// [`REVEAL_THRESHOLD`], `None` otherwise.
    pub fn on_intersection(&self, element: &str, ratio: f64) -> Option<Duration> {
        if ratio < REVEAL_THRESHOLD {
            return None;
        }
        let mut reveal = self.reveal.lock();
        let slot = reveal.1.get_mut(element)?;
        if slot.revealed {
            return None;
        }
        slot.revealed = true;
        Some(slot.delay)
    }

    pub fn is_revealed(&self, element: &str) -> bool {
        self.reveal
            .lock()
            .1
            .get(element)
            .map(|slot| slot.revealed)
            .unwrap_or(false)
    }

    /// Show a notification. A zero duration keeps it until dismissed.
    pub fn show_notification(&self, message: &str, kind: NotificationKind, duration: Duration) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            message: message.to_string(),
            kind,
            created_at: Utc::now(),
        };
        let id = notification.id;
        self.notifications.lock().push(notification);
        self.events.emit(
            "interaction:notification",
            json!({ "id": id, "message": message, "kind": kind }),
        );

        if !duration.is_zero() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let notifications = Arc::clone(&self.notifications);
                    handle.spawn(async move {
                        tokio::time::sleep(duration).await;
                        notifications.lock().retain(|n| n.id != id);
                    });
                }
                Err(_) => {
                    log::debug!("No async runtime, dismissing notification {} immediately", id);
                    self.dismiss_notification(id);
                }
            }
        }
        id
    }

    pub fn dismiss_notification(&self, id: Uuid) -> bool {
        let mut notifications = self.notifications.lock();
        let before = notifications.len();
        notifications.retain(|n| n.id != id);
        notifications.len() < before
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Open a modal on top of the stack
    pub fn show_modal(&self, content: &str, options: ModalOptions) -> Uuid {
        let modal = Modal {
            id: Uuid::new_v4(),
            content: content.to_string(),
            options,
        };
        let id = modal.id;
        self.modals.lock().push(modal);
        self.events.emit("interaction:modal-open", json!({ "id": id }));
        id
    }

    pub fn close_modal(&self, id: Uuid) -> bool {
        let closed = {
            let mut modals = self.modals.lock();
            let before = modals.len();
            modals.retain(|m| m.id != id);
            modals.len() < before
        };
        if closed {
            self.events.emit("interaction:modal-close", json!({ "id": id }));
        }
        closed
    }

    /// Close the top modal, as Escape does. False if none is open.
    pub fn handle_escape(&self) -> bool {
        let top = self.modals.lock().last().map(|m| m.id);
        match top {
            Some(id) => self.close_modal(id),
            None => false,
        }
    }

    pub fn modals(&self) -> Vec<Modal> {
        self.modals.lock().clone()
    }

    /// Track the page scroll offset. Returns whether the scroll-to-top
    /// button is visible.
    pub fn handle_scroll(&self, offset: f64) -> bool {
        let visible = offset > SCROLL_TOP_OFFSET;
        if self.scroll_top_visible.swap(visible, Ordering::SeqCst) != visible {
            self.events
                .emit("interaction:scroll-top", json!({ "visible": visible }));
        }
        visible
    }

    pub fn scroll_top_visible(&self) -> bool {
        self.scroll_top_visible.load(Ordering::SeqCst)
    }
}

/// Runs only the last of a burst of calls, `wait` after it
#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule `f`, cancelling any call still waiting.
    ///
    /// Must be called within a tokio runtime.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let wait = self.wait;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if current.load(Ordering::SeqCst) == generation {
                f();
            }
        });
    }
}

/// Lets at most one call through per `limit`
#[derive(Debug)]
pub struct Throttle {
    limit: Duration,
    last: RwLock<Option<Instant>>,
}

impl Throttle {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            last: RwLock::new(None),
        }
    }

    /// Run `f` unless a call went through less than `limit` ago
    pub fn call<F: FnOnce()>(&self, f: F) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last.write();
            if matches!(*last, Some(at) if now.saturating_duration_since(at) < self.limit) {
                return false;
            }
            *last = Some(now);
        }
        f();
        true
    }
}
