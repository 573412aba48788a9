//! Observer lists and the page-wide event bus
//!
//! Every service that fans out notifications (content updates, navigation
//! listeners, layout observers) does it through [`ObserverList`]. Callbacks
//! run in registration order and a failing callback is logged without
//! stopping delivery to the rest.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// Error type returned by listener callbacks
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by listener callbacks
pub type ListenerResult = Result<(), ListenerError>;

type Callback<T> = Arc<dyn Fn(&T) -> ListenerResult + Send + Sync>;

/// Identifier handed out for every registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Slots<T> {
    next_id: u64,
    entries: Vec<(ObserverId, Callback<T>)>,
}

/// Ordered list of callbacks with per-callback failure isolation
pub struct ObserverList<T> {
    inner: Arc<Mutex<Slots<T>>>,
    label: &'static str,
}

impl<T> Clone for ObserverList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            label: self.label,
        }
    }
}

impl<T: 'static> std::fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverList")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}

impl<T: 'static> ObserverList<T> {
    /// Create an empty list. The label shows up in failure logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
            label,
        }
    }

    /// Register a callback and get a handle that can remove it again
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) -> ListenerResult + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.inner.lock();
            let id = ObserverId(slots.next_id);
            slots.next_id += 1;
            slots.entries.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            id,
            cancel: Some(Box::new(move || match weak.upgrade() {
                Some(inner) => remove_entry(&inner, id),
                None => false,
            })),
        }
    }

    /// Remove a callback by id. Returns false if it was not registered.
    pub fn remove(&self, id: ObserverId) -> bool {
        remove_entry(&self.inner, id)
    }

    /// Deliver `value` to every callback in registration order.
    ///
    /// Returns the number of callbacks that failed.
    pub fn notify(&self, value: &T) -> usize {
        // Snapshot so callbacks may subscribe/unsubscribe while we iterate.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        let mut failures = 0;
        for callback in callbacks {
            if let Err(err) = callback(value) {
                failures += 1;
                log::error!("{} callback failed: {}", self.label, err);
            }
        }
        failures
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registered callback
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

fn remove_entry<T>(inner: &Mutex<Slots<T>>, id: ObserverId) -> bool {
    let mut slots = inner.lock();
    let before = slots.entries.len();
    slots.entries.retain(|(entry_id, _)| *entry_id != id);
    slots.entries.len() < before
}

/// Handle returned by [`ObserverList::subscribe`].
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: ObserverId,
    cancel: Option<Box<dyn FnOnce() -> bool + Send + Sync>>,
}

impl Subscription {
    /// Id of the registered callback
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Remove the callback. Returns false if the list is gone or the
    /// callback was already removed.
    pub fn unsubscribe(mut self) -> bool {
        match self.cancel.take() {
            Some(cancel) => cancel(),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// A named event with a JSON detail payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub name: String,
    pub detail: Value,
}

impl Event {
    /// Deserialize the detail payload into a typed value
    pub fn detail_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.detail.clone()).ok()
    }
}

/// In-process pub/sub bus keyed by event name
#[derive(Debug)]
pub struct EventBus {
    channels: Mutex<HashMap<String, ObserverList<Event>>>,
    wildcard: ObserverList<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            wildcard: ObserverList::new("event bus"),
        }
    }

    /// Listen for events with the given name
    pub fn on<F>(&self, name: &str, callback: F) -> Subscription
    where
        F: Fn(&Event) -> ListenerResult + Send + Sync + 'static,
    {
        let list = self
            .channels
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| ObserverList::new("event listener"))
            .clone();
        list.subscribe(callback)
    }

    /// Listen for every event
    pub fn on_any<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Event) -> ListenerResult + Send + Sync + 'static,
    {
        self.wildcard.subscribe(callback)
    }

    /// Emit an event. Returns the number of listeners that failed.
    pub fn emit(&self, name: &str, detail: Value) -> usize {
        let event = Event {
            name: name.to_string(),
            detail,
        };
        log::debug!("event {}", event.name);

        let named = self.channels.lock().get(name).cloned();
        let mut failures = 0;
        if let Some(list) = named {
            failures += list.notify(&event);
        }
        failures + self.wildcard.notify(&event)
    }

    /// Number of listeners registered for a name (wildcards excluded)
    pub fn listener_count(&self, name: &str) -> usize {
        self.channels.lock().get(name).map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_debug_shows_label_and_len() {
        let list: ObserverList<u32> = ObserverList::new("resize");
        let _sub = list.subscribe(|_: &u32| Ok(()));
        let debug = format!("{:?}", list);
        assert!(debug.contains("\"resize\""));
        assert!(debug.contains("len: 1"));
    }

    #[test]
    fn test_notify_in_registration_order() {
        let list: ObserverList<u32> = ObserverList::new("test");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            list.subscribe(move |v: &u32| {
                seen.lock().push(format!("{}{}", tag, v));
                Ok(())
            });
        }

        assert_eq!(list.notify(&1), 0);
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_failing_callback_is_isolated() {
        let list: ObserverList<()> = ObserverList::new("test");
        let calls = Arc::new(Mutex::new(0));

        list.subscribe(|_| Err("boom".into()));
        let counter = calls.clone();
        list.subscribe(move |_| {
            *counter.lock() += 1;
            Ok(())
        });

        assert_eq!(list.notify(&()), 1);
        assert_eq!(*calls.lock(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_callback() {
        let list: ObserverList<()> = ObserverList::new("test");
        let first = list.subscribe(|_| Ok(()));
        let _second = list.subscribe(|_| Ok(()));

        assert_eq!(list.len(), 2);
        assert!(first.unsubscribe());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_unsubscribe_after_list_dropped() {
        let list: ObserverList<()> = ObserverList::new("test");
        let sub = list.subscribe(|_| Ok(()));
        drop(list);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_callback_can_subscribe_during_notify() {
        let list: ObserverList<()> = ObserverList::new("test");
        let inner = list.clone();
        list.subscribe(move |_| {
            inner.subscribe(|_| Ok(()));
            Ok(())
        });

        list.notify(&());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_event_bus_routes_by_name() {
        let bus = EventBus::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let h = hits.clone();
        bus.on("layout:sidebar:change", move |e| {
            h.lock().push(e.detail["isOpen"].as_bool());
            Ok(())
        });

        bus.emit("layout:sidebar:change", json!({ "isOpen": true }));
        bus.emit("navigation:navigate", json!({}));

        assert_eq!(*hits.lock(), vec![Some(true)]);
        assert_eq!(bus.listener_count("layout:sidebar:change"), 1);
        assert_eq!(bus.listener_count("navigation:navigate"), 0);
    }

    #[test]
    fn test_event_bus_wildcard_sees_everything() {
        let bus = EventBus::new();
        let names = Arc::new(Mutex::new(Vec::new()));
        let n = names.clone();
        bus.on_any(move |e| {
            n.lock().push(e.name.clone());
            Ok(())
        });

        bus.emit("a", Value::Null);
        bus.emit("b", Value::Null);
        assert_eq!(*names.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_listener_may_emit_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        let seen = Arc::new(Mutex::new(0));

        bus.on("first", move |_| {
            inner.emit("second", Value::Null);
            Ok(())
        });
        let s = seen.clone();
        bus.on("second", move |_| {
            *s.lock() += 1;
            Ok(())
        });

        bus.emit("first", Value::Null);
        assert_eq!(*seen.lock(), 1);
    }
}
