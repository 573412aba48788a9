//! Page components
//!
//! Every component renders into a [`View`]: its stylesheet and markup, or a
//! built-in fallback when the template could not be loaded.

pub mod card;
pub mod content;
pub mod footer;
pub mod header;
pub mod sidebar;

pub use card::{Card, CardVariant};
pub use content::{ButtonAction, ContentArea, ContentServices, LoadState};
pub use footer::Footer;
pub use header::Header;
pub use sidebar::Sidebar;

use crate::template::{Template, TemplateLoader};

/// Rendered output of a component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub html: String,
    pub css: String,
    /// Whether this is the built-in fallback rather than the loaded template
    pub fallback: bool,
}

impl View {
    pub fn fallback(html: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            fallback: true,
        }
    }

    /// Stylesheet followed by markup, as mounted into the page
    pub fn render(&self) -> String {
        format!("<style>{}</style>\n{}", self.css, self.html)
    }
}

impl From<Template> for View {
    fn from(template: Template) -> Self {
        Self {
            html: template.html,
            css: template.css,
            fallback: false,
        }
    }
}

/// Something the page shell can mount
pub trait Component: Send + Sync {
    fn name(&self) -> &'static str;

    /// The view as last rendered
    fn view(&self) -> View;
}

/// Load the component's template, degrading to `fallback` on any failure
pub(crate) async fn load_or_fallback<F>(loader: &TemplateLoader, name: &str, fallback: F) -> View
where
    F: FnOnce() -> View,
{
    match loader.load_component(name).await {
        Ok(template) => View::from(template),
        Err(e) => {
            log::warn!("Failed to load {} template: {}", name, e);
            fallback()
        }
    }
}

/// Escape text for insertion into markup
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
