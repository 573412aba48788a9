//! Folio navigation
//!
//! Route table with parent links, a bounded navigation history and the
//! [`Router`] that ties them to a host page and session history.

pub mod error;
pub mod history;
pub mod host;
pub mod route;
pub mod router;

pub use error::NavigationError;
pub use history::{HistoryEntry, NavigationHistory, MAX_HISTORY_ENTRIES};
pub use host::{
    HeadlessPage, HistoryBackend, HistoryState, MemoryHistory, PageHost, ScrollAlign,
    ScrollOptions,
};
pub use route::{site_routes, Breadcrumb, Route, RouteTable, RouteTarget};
pub use router::{
    AfterHook, BeforeHook, MenuItem, MenuOptions, NavigateOptions, NavigationChange, RouteHandler,
    Router, RouterConfig, SectionOptions, DEFAULT_HIGHLIGHT_DURATION,
};
