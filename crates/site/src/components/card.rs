use std::str::FromStr;
use std::sync::Arc;

use folio_core::EventBus;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{escape_html, Component, View};

const CARD_CSS: &str = "\
:host { display: block; margin: 16px 0; }
.card { padding: 20px; background-color: #ffffff; border: 2px solid #e0e0e0; border-radius: 12px; \
box-shadow: 0 2px 8px rgba(0, 0, 0, 0.1); transition: all 0.3s ease; color: #333; }
.card:hover { border-color: #4a90e2; transform: translateY(-2px); }
.card.clickable { cursor: pointer; }
.card-title { margin: 0 0 12px 0; font-size: 1.25rem; font-weight: 600; color: #2c3e50; }
.card-content { margin: 0; font-size: 0.95rem; line-height: 1.6; color: #555; }
.card.primary { border-color: #4a90e2; }
.card.success { border-color: #28a745; }
.card.warning { border-color: #ffc107; }
@media (max-width: 768px) { .card { padding: 16px; border-radius: 8px; } }";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardVariant {
    #[default]
    Plain,
    Primary,
    Success,
    Warning,
}

impl CardVariant {
    /// CSS class of the variant; empty for a plain card
    pub fn as_str(&self) -> &'static str {
        match self {
            CardVariant::Plain => "",
            CardVariant::Primary => "primary",
            CardVariant::Success => "success",
            CardVariant::Warning => "warning",
        }
    }
}

impl FromStr for CardVariant {
    type Err = std::convert::Infallible;

    /// Unknown names give a plain card
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "primary" => CardVariant::Primary,
            "success" => CardVariant::Success,
            "warning" => CardVariant::Warning,
            _ => CardVariant::Plain,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Attributes {
    title: String,
    content: String,
    variant: CardVariant,
    clickable: bool,
}

/// Rounded content card, optionally clickable
pub struct Card {
    attributes: RwLock<Attributes>,
    view: RwLock<View>,
    renders: RwLock<u64>,
    events: Arc<EventBus>,
}

impl Card {
    pub fn new(events: Arc<EventBus>) -> Self {
        let card = Self {
            attributes: RwLock::new(Attributes::default()),
            view: RwLock::new(View::default()),
            renders: RwLock::new(0),
            events,
        };
        card.render();
        card
    }

    /// Set one of `title`, `content`, `variant` or `clickable`.
    ///
    /// The card re-renders only when the value actually changes. For
    /// `clickable`, `None` removes the attribute and any value sets it.
    pub fn set_attribute(&self, name: &str, value: Option<&str>) -> bool {
        let changed = {
            let mut attrs = self.attributes.write();
            match name {
                "title" => replace(&mut attrs.title, value.unwrap_or_default().to_string()),
                "content" => replace(&mut attrs.content, value.unwrap_or_default().to_string()),
                "variant" => {
                    let variant = value
                        .and_then(|v| v.parse().ok())
                        .unwrap_or_default();
                    replace(&mut attrs.variant, variant)
                }
                "clickable" => replace(&mut attrs.clickable, value.is_some()),
                _ => {
                    log::debug!("Ignoring unknown card attribute {}", name);
                    false
                }
            }
        };
        if changed {
            self.render();
        }
        changed
    }

    pub fn title(&self) -> String {
        self.attributes.read().title.clone()
    }

    pub fn content(&self) -> String {
        self.attributes.read().content.clone()
    }

    pub fn variant(&self) -> CardVariant {
        self.attributes.read().variant
    }

    pub fn is_clickable(&self) -> bool {
        self.attributes.read().clickable
    }

    /// How many times the card has rendered
    pub fn render_count(&self) -> u64 {
        *self.renders.read()
    }

    fn render(&self) {
        let attrs = self.attributes.read().clone();
        let class = ["card", attrs.variant.as_str(), if attrs.clickable { "clickable" } else { "" }]
            .iter()
            .filter(|c| !c.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");

        let title = if attrs.title.is_empty() {
            String::new()
        } else {
            format!("<h3 class=\"card-title\">{}</h3>", escape_html(&attrs.title))
        };
        let content = if attrs.content.is_empty() {
            "<slot></slot>".to_string()
        } else {
            attrs.content.clone()
        };

        *self.view.write() = View {
            html: format!(
                "<div class=\"{class}\">{title}<div class=\"card-content\">{content}</div></div>"
            ),
            css: CARD_CSS.to_string(),
            fallback: false,
        };
        *self.renders.write() += 1;
    }

    /// Card clicked. Emits `card-click` when the card is clickable.
    pub fn click(&self) -> bool {
        let attrs = self.attributes.read().clone();
        if !attrs.clickable {
            return false;
        }
        self.events.emit(
            "card-click",
            json!({
                "title": attrs.title,
                "content": attrs.content,
                "variant": attrs.variant.as_str(),
            }),
        );
        true
    }
}

impl Component for Card {
    fn name(&self) -> &'static str {
        "card"
    }

    fn view(&self) -> View {
        self.view.read().clone()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_rerenders_only_on_change() {
        let card = Card::new(Arc::new(EventBus::new()));
        assert_eq!(card.render_count(), 1);

        assert!(card.set_attribute("title", Some("Rust")));
        assert!(!card.set_attribute("title", Some("Rust")));
        assert!(card.set_attribute("variant", Some("primary")));
        assert!(!card.set_attribute("colour", Some("red")));
        assert_eq!(card.render_count(), 3);

        let view = card.view();
        assert!(view.html.starts_with("<div class=\"card primary\">"));
        assert!(view.html.contains("<h3 class=\"card-title\">Rust</h3>"));
        assert!(view.html.contains("<slot></slot>"));
    }

    #[test]
    fn test_click_only_when_clickable() {
        let events = Arc::new(EventBus::new());
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let c = clicks.clone();
        events.on("card-click", move |e| {
            c.lock().push(e.detail.clone());
            Ok(())
        });

        let card = Card::new(events);
        card.set_attribute("title", Some("Blog"));
        card.set_attribute("content", Some("Posts"));
        assert!(!card.click());

        card.set_attribute("clickable", Some(""));
        assert!(card.is_clickable());
        assert!(card.click());

        let clicks = clicks.lock();
        assert_eq!(clicks.len(), 1);
        assert_eq!(
            clicks[0],
            json!({ "title": "Blog", "content": "Posts", "variant": "" })
        );
    }

    #[test]
    fn test_unknown_variant_is_plain() {
        assert_eq!("neon".parse::<CardVariant>(), Ok(CardVariant::Plain));
        assert_eq!("warning".parse::<CardVariant>(), Ok(CardVariant::Warning));
    }
}
