//! Folio site
//!
//! The page-level services of the personal site (content, layout,
//! accessibility and interaction), the components that render it and the
//! [`Site`] shell that wires them together.

pub mod accessibility;
pub mod cli;
pub mod components;
pub mod content;
pub mod interaction;
pub mod layout;
pub mod settings;
pub mod site;
pub mod template;

// Re-export common types
pub use accessibility::{AccessibilityManager, KeyInput, Politeness, ShortcutAction};
pub use components::{ButtonAction, Card, Component, ContentArea, Footer, Header, Sidebar, View};
pub use content::{
    ContentConfig, ContentDataManager, ContentDocument, ContentError, ContentPatch, ContentUpdate,
    Preferences, Theme,
};
pub use interaction::{InteractionManager, NotificationKind};
pub use layout::{Breakpoint, LayoutConfig, LayoutManager, SidebarPolicy};
pub use settings::{SettingsError, SettingsManager, SettingsWarning, SiteSettings};
pub use site::Site;
pub use template::{Template, TemplateLoader};
