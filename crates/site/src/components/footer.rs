use std::sync::Arc;

use chrono::Datelike;
use parking_lot::RwLock;
use regex::Regex;

use super::{load_or_fallback, Component, View};
use crate::template::TemplateLoader;

const FALLBACK_CSS: &str =
    ".app-footer { background: #2c3e50; color: white; padding: 2rem; text-align: center; }";

/// Write `year` into the element carrying `id="current-year"`
pub fn fill_current_year(html: &str, year: i32) -> String {
    match Regex::new(r#"(<[^>]*\bid="current-year"[^>]*>)[^<]*(</)"#) {
        Ok(re) => re.replace(html, format!("${{1}}{year}${{2}}")).into_owned(),
        Err(e) => {
            log::error!("Invalid year pattern: {}", e);
            html.to_string()
        }
    }
}

pub struct Footer {
    loader: Arc<TemplateLoader>,
    view: RwLock<View>,
}

impl Footer {
    pub fn new(loader: Arc<TemplateLoader>) -> Self {
        Self {
            loader,
            view: RwLock::new(View::default()),
        }
    }

    pub async fn load(&self) -> View {
        let year = chrono::Local::now().year();
        let mut view = load_or_fallback(&self.loader, "footer", || {
            View::fallback(
                format!("<footer class=\"app-footer\">\n  <p>&copy; {year} My Website</p>\n</footer>"),
                FALLBACK_CSS,
            )
        })
        .await;
        if !view.fallback {
            view.html = fill_current_year(&view.html, year);
        }
        *self.view.write() = view.clone();
        view
    }
}

impl Component for Footer {
    fn name(&self) -> &'static str {
        "footer"
    }

    fn view(&self) -> View {
        self.view.read().clone()
    }
}
