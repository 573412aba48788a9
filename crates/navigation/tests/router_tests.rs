use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use folio_core::EventBus;
use folio_navigation::{
    site_routes, HeadlessPage, HistoryBackend, HistoryState, MemoryHistory, NavigateOptions,
    NavigationError, Route, Router, RouterConfig, MAX_HISTORY_ENTRIES,
};
use futures::FutureExt;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

struct Fixture {
    router: Arc<Router>,
    page: Arc<HeadlessPage>,
    history: Arc<MemoryHistory>,
    events: Arc<EventBus>,
}

fn fixture() -> Fixture {
    let page = Arc::new(HeadlessPage::with_sections([
        "hero-section",
        "about-section",
        "projects-section",
        "skills-section",
        "contact-section",
    ]));
    let history = Arc::new(MemoryHistory::new());
    let events = Arc::new(EventBus::new());
    let router = Router::new(
        RouterConfig {
            title_suffix: Some("Folio".to_string()),
            ..Default::default()
        },
        history.clone(),
        page.clone(),
        events.clone(),
    )
    .with_routes(site_routes());

    Fixture {
        router: Arc::new(router),
        page,
        history,
        events,
    }
}

#[tokio::test]
async fn test_unknown_route_leaves_state_unchanged() {
    let f = fixture();
    assert!(f.router.navigate_to_route("/about", NavigateOptions::default()).await);

    assert!(!f.router.navigate_to_route("/missing", NavigateOptions::default()).await);
    assert_eq!(f.router.current_route().unwrap().id, "/about");
    assert!(f.router.history(10).is_empty());
    assert!(!f.router.is_navigating());
}

#[tokio::test]
async fn test_navigation_updates_page_history_and_events() {
    let f = fixture();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    f.events.on("navigation:navigate", move |e| {
        s.lock().push(e.detail["route"].as_str().unwrap_or_default().to_string());
        Ok(())
    });

    assert!(f.router.navigate_to_route("/", NavigateOptions::default()).await);
    assert!(f.router.navigate_to_route("/skills", NavigateOptions::default()).await);

    assert_eq!(f.page.title(), "Skills - Folio");
    assert_eq!(f.page.scrolled(), vec!["hero-section", "skills-section"]);
    assert_eq!(f.history.current_url(), "#/skills");
    assert_eq!(f.history.len(), 3);
    assert_eq!(*seen.lock(), vec!["/", "/skills"]);

    let local: Vec<String> = f.router.history(10).into_iter().map(|e| e.route).collect();
    assert_eq!(local, vec!["/"]);
}

#[tokio::test]
async fn test_custom_url_and_no_history() {
    let f = fixture();
    f.router
        .navigate_to_route(
            "/about",
            NavigateOptions {
                url: Some("/about".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(f.history.current_url(), "/about");

    f.router
        .navigate_to_route("/projects", NavigateOptions::without_history())
        .await;
    assert_eq!(f.history.current_url(), "/about");
    assert!(f.router.history(10).is_empty());
}

#[tokio::test]
async fn test_overlapping_navigation_is_rejected() {
    let f = fixture();
    let release = Arc::new(Notify::new());
    let entered = Arc::new(Notify::new());

    let (r, e) = (release.clone(), entered.clone());
    f.router.set_route_handler("/projects", move |_, _| {
        let (r, e) = (r.clone(), e.clone());
        async move {
            e.notify_one();
            r.notified().await;
            Ok(())
        }
        .boxed()
    });

    let router = f.router.clone();
    let first = tokio::spawn(async move {
        router
            .navigate_to_route("/projects", NavigateOptions::default())
            .await
    });

    entered.notified().await;
    assert!(f.router.is_navigating());
    assert!(!f.router.navigate_to_route("/about", NavigateOptions::default()).await);
    assert!(f.router.current_route().is_none());

    release.notify_one();
    assert!(first.await.unwrap());
    assert_eq!(f.router.current_route().unwrap().id, "/projects");
    assert!(!f.router.is_navigating());
}

#[tokio::test]
async fn test_history_capacity_evicts_oldest() {
    let f = fixture();
    for i in 0..=MAX_HISTORY_ENTRIES + 1 {
        let id = format!("/page-{}", i);
        f.router.add_route(&id, Route::new(&id));
        assert!(f.router.navigate_to_route(&id, NavigateOptions::default()).await);
    }

    // 52 navigations leave 51 previous routes; the oldest is evicted
    let history = f.router.history(usize::MAX);
    assert_eq!(history.len(), MAX_HISTORY_ENTRIES);
    assert_eq!(history[0].route, "/page-1");
    assert_eq!(history.last().unwrap().route, "/page-50");
}

#[tokio::test]
async fn test_before_hook_aborts() {
    let f = fixture();
    f.router.add_before_navigation_hook(|route, _| {
        async move { Ok(route.id != "/contact") }.boxed()
    });

    assert!(!f.router.navigate_to_route("/contact", NavigateOptions::default()).await);
    assert!(f.router.current_route().is_none());
    assert!(f.router.navigate_to_route("/about", NavigateOptions::default()).await);
}

#[tokio::test]
async fn test_failing_before_hook_aborts() {
    let f = fixture();
    f.router.add_before_navigation_hook(|_, _| {
        async { Err(NavigationError::HookFailed("guard exploded".into())) }.boxed()
    });
    assert!(!f.router.navigate_to_route("/", NavigateOptions::default()).await);
    assert!(!f.router.is_navigating());
}

#[tokio::test]
async fn test_after_hook_failure_is_not_fatal() {
    let f = fixture();
    let after_calls = Arc::new(AtomicUsize::new(0));
    let calls = after_calls.clone();
    f.router.add_after_navigation_hook(move |_, _| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(NavigationError::HookFailed("analytics offline".into())) }.boxed()
    });

    assert!(f.router.navigate_to_route("/", NavigateOptions::default()).await);
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_handler_aborts() {
    let f = fixture();
    f.router.set_route_handler("/about", |_, _| {
        async { Err(NavigationError::HandlerFailed("render failed".into())) }.boxed()
    });
    assert!(!f.router.navigate_to_route("/about", NavigateOptions::default()).await);
    assert!(f.router.current_route().is_none());
}

#[tokio::test]
async fn test_go_back_bypasses_before_hooks() {
    let f = fixture();
    f.router.navigate_to_route("/", NavigateOptions::default()).await;
    f.router.navigate_to_route("/about", NavigateOptions::default()).await;

    let blocked = Arc::new(AtomicUsize::new(0));
    let b = blocked.clone();
    f.router.add_before_navigation_hook(move |_, _| {
        b.fetch_add(1, Ordering::SeqCst);
        async { Ok(false) }.boxed()
    });

    assert!(f.router.go_back().await);
    assert_eq!(f.router.current_route().unwrap().id, "/");
    assert_eq!(blocked.load(Ordering::SeqCst), 0);
    assert!(f.router.history(10).is_empty());
}

#[tokio::test]
async fn test_failed_go_back_keeps_history_entry() {
    let f = fixture();
    f.router.navigate_to_route("/projects", NavigateOptions::default()).await;
    f.router.navigate_to_route("/about", NavigateOptions::default()).await;
    f.router.remove_route("/projects");

    assert!(!f.router.go_back().await);
    assert_eq!(f.router.current_route().unwrap().id, "/about");
    let history = f.router.history(10);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].route, "/projects");
}

#[tokio::test]
async fn test_go_back_falls_back_to_host_history() {
    let f = fixture();
    assert!(!f.router.go_back().await);

    f.history.push_state(HistoryState::now("/about"), "About", "#/about");
    assert!(f.router.go_back().await);
    assert_eq!(f.history.current_url(), "/");
    assert!(f.router.can_go_back());
}

#[tokio::test]
async fn test_listeners_are_isolated() {
    let f = fixture();
    let seen = Arc::new(AtomicUsize::new(0));
    f.router.add_navigation_listener(|_| Err("listener bug".into()));
    let s = seen.clone();
    let sub = f.router.add_navigation_listener(move |change| {
        assert_eq!(change.route.id, "/");
        s.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(f.router.navigate_to_route("/", NavigateOptions::default()).await);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    assert!(f.router.remove_navigation_listener(sub.id()));
    f.router.navigate_to_route("/", NavigateOptions::default()).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_external_route_opens_new_tab() {
    let f = fixture();
    let opened = Arc::new(Mutex::new(Vec::new()));
    let o = opened.clone();
    f.events.on("navigation:external-navigate", move |e| {
        o.lock().push(e.detail["url"].clone());
        Ok(())
    });

    assert!(f.router.navigate_to_route("/blog", NavigateOptions::default()).await);
    assert_eq!(f.page.opened(), vec![("/blog".to_string(), true)]);
    assert_eq!(opened.lock().len(), 1);
}

#[tokio::test]
async fn test_pop_state_navigates_without_history() {
    let f = fixture();
    f.router.navigate_to_route("/", NavigateOptions::default()).await;

    let popped = Arc::new(AtomicUsize::new(0));
    let p = popped.clone();
    f.events.on("navigation:popstate", move |_| {
        p.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(f.router.handle_pop_state(Some(HistoryState::now("/skills"))).await);
    assert_eq!(f.router.current_route().unwrap().id, "/skills");
    assert!(f.router.history(10).is_empty());
    assert_eq!(popped.load(Ordering::SeqCst), 1);
    assert!(!f.router.handle_pop_state(None).await);
}

#[tokio::test]
async fn test_refresh_renavigates_current_route() {
    let f = fixture();
    assert!(!f.router.refresh().await);
    f.router.navigate_to_route("/about", NavigateOptions::default()).await;
    assert!(f.router.refresh().await);
    assert_eq!(f.page.scrolled(), vec!["about-section", "about-section"]);
    assert!(f.router.history(10).is_empty());
}

#[tokio::test]
async fn test_breadcrumbs_follow_parent_chain() {
    let f = fixture();
    let trail: Vec<String> = f
        .router
        .breadcrumbs("/skills")
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(trail, vec!["/", "/about", "/skills"]);

    f.router.navigate_to_route("/experience", NavigateOptions::default()).await;
    let titles: Vec<String> = f
        .router
        .current_breadcrumbs()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["Home", "About", "Experience"]);
}

#[tokio::test(start_paused = true)]
async fn test_section_highlight_reverts() {
    let f = fixture();
    assert!(f.router.navigate_to_route("/about", NavigateOptions::default()).await);
    assert!(f.page.is_highlighted("about-section"));

    tokio::time::sleep(Duration::from_millis(2001)).await;
    assert!(!f.page.is_highlighted("about-section"));
}

#[test_log::test(tokio::test)]
async fn test_missing_section_still_completes_navigation() {
    let f = fixture();
    f.router.add_route("/talks", Route::new("/talks").section("talks-section"));
    assert!(f.router.navigate_to_route("/talks", NavigateOptions::default()).await);
    assert!(f.page.scrolled().is_empty());
}
