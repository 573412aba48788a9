use std::sync::Arc;

use folio_core::EventBus;
use folio_site::layout::{ContentLayout, LayoutNotice};
use folio_site::{Breakpoint, LayoutConfig, LayoutManager, SidebarPolicy};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn layout(policy: SidebarPolicy) -> (Arc<LayoutManager>, Arc<EventBus>) {
    let events = Arc::new(EventBus::new());
    let layout = Arc::new(LayoutManager::new(
        LayoutConfig {
            sidebar_policy: policy,
            ..Default::default()
        },
        events.clone(),
    ));
    layout.bind_events();
    (layout, events)
}

fn record(events: &EventBus, name: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    events.on(name, move |e| {
        s.lock().push(e.detail.clone());
        Ok(())
    });
    seen
}

#[test]
fn test_800px_is_medium() {
    let (layout, events) = layout(SidebarPolicy::Force);
    let changes = record(&events, "layout:breakpoint:change");

    layout.update_viewport(800, 600);
    assert_eq!(layout.breakpoint(), Breakpoint::Md);
    assert!(layout.is_tablet());
    assert_eq!(
        *changes.lock(),
        vec![json!({ "oldBreakpoint": "lg", "newBreakpoint": "md", "width": 800 })]
    );

    layout.update_viewport(810, 600);
    assert_eq!(changes.lock().len(), 1);
}

#[test]
fn test_force_policy_overrides_manual_choice() {
    let (layout, _events) = layout(SidebarPolicy::Force);
    layout.update_viewport(1280, 800);
    assert!(layout.is_sidebar_open());

    layout.set_sidebar_state(false);
    layout.update_viewport(1000, 800);
    assert_eq!(layout.breakpoint(), Breakpoint::Lg);
    assert!(layout.is_sidebar_open());

    layout.update_viewport(500, 800);
    assert!(!layout.is_sidebar_open());
}

#[test]
fn test_preserve_manual_until_device_class_changes() {
    let (layout, _events) = layout(SidebarPolicy::PreserveManual);
    layout.update_viewport(1280, 800);
    assert!(layout.is_sidebar_open());

    layout.set_sidebar_state(false);
    layout.update_viewport(1000, 800);
    assert!(!layout.is_sidebar_open());

    layout.update_viewport(800, 800);
    assert!(!layout.is_sidebar_open());

    layout.update_viewport(1280, 800);
    assert!(layout.is_sidebar_open());
}

#[test]
fn test_toggle_event_and_sidebar_change() {
    let (layout, events) = layout(SidebarPolicy::Force);
    let sidebar = record(&events, "layout:sidebar:change");
    let updates = record(&events, "layout:layout:update");
    layout.update_viewport(1280, 800);
    sidebar.lock().clear();
    updates.lock().clear();

    events.emit("sidebar:toggle", json!({}));
    assert!(!layout.is_sidebar_open());
    events.emit("sidebar:toggle", json!({ "force": true }));
    events.emit("sidebar:toggle", json!({ "force": true }));
    assert!(layout.is_sidebar_open());

    assert_eq!(
        *sidebar.lock(),
        vec![
            json!({ "isOpen": false, "width": 0 }),
            json!({ "isOpen": true, "width": 280 }),
            json!({ "isOpen": true, "width": 280 }),
        ]
    );
    assert_eq!(
        updates.lock().last().cloned(),
        Some(json!({ "sidebarWidth": 280, "availableWidth": 1000, "breakpoint": "xl" }))
    );
}

#[test]
fn test_mobile_content_spans_viewport() {
    let (layout, _events) = layout(SidebarPolicy::Force);
    layout.update_viewport(400, 800);
    layout.set_sidebar_state(true);

    assert_eq!(
        layout.update_content_layout(),
        ContentLayout {
            sidebar_width: 280,
            available_width: 120,
            breakpoint: Breakpoint::Xs,
            margin_left: 0,
            width: None,
        }
    );
}

#[test]
fn test_observers_and_orientation() {
    let (layout, events) = layout(SidebarPolicy::Force);
    let orientation = record(&events, "layout:orientation:change");
    let notices = Arc::new(Mutex::new(Vec::new()));
    let n = notices.clone();
    let sub = layout.add_observer(move |notice| {
        n.lock().push(notice.clone());
        Ok(())
    });

    layout.update_viewport(1024, 768);
    layout.handle_element_resize("hero", 300, 200);
    layout.handle_orientation_change(90);

    assert_eq!(
        *notices.lock(),
        vec![
            LayoutNotice::Resize {
                width: 1024,
                height: 768,
                breakpoint: Breakpoint::Lg,
            },
            LayoutNotice::ElementResize {
                element: "hero".to_string(),
                width: 300,
                height: 200,
            },
        ]
    );
    assert_eq!(
        *orientation.lock(),
        vec![json!({ "orientation": 90, "breakpoint": "lg" })]
    );

    assert!(layout.remove_observer(sub.id()));
}
