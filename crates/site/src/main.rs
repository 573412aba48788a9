use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use folio_core::ExportFormat;
use folio_navigation::{HeadlessPage, MemoryHistory, NavigateOptions};
use folio_networking::{Fetcher, HttpFetcher, MemoryFetcher, NetworkConfig};
use folio_site::cli::Cli;
use folio_site::{KeyInput, SettingsManager, Site};

const SECTIONS: [&str; 5] = [
    "hero-section",
    "about-section",
    "projects-section",
    "skills-section",
    "contact-section",
];

/// Templates served when running with `--offline`
fn demo_fetcher() -> MemoryFetcher {
    let fetcher = MemoryFetcher::new();
    fetcher.insert(
        "components/header/header.html",
        r#"<header class="app-header"><button class="menu-toggle"></button><h1 class="site-title">Folio</h1></header>"#,
    );
    fetcher.insert("components/header/header.css", ".app-header { position: fixed; }");
    fetcher.insert(
        "components/footer/footer.html",
        r#"<footer class="app-footer"><p>&copy; <span id="current-year"></span> Folio</p></footer>"#,
    );
    fetcher.insert("components/footer/footer.css", ".app-footer { text-align: center; }");
    fetcher.insert(
        "components/content/content.html",
        r#"<main class="app-content">
  <section id="hero-section"><h1 class="hero-title"></h1><p class="hero-subtitle"></p></section>
  <section><div class="features-grid"></div></section>
  <section><div class="stats-grid"></div></section>
</main>"#,
    );
    fetcher.insert("components/content/content.css", ".app-content { padding: 20px; }");
    fetcher
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    env_logger::init();

    log::info!("Starting Folio v{}", env!("CARGO_PKG_VERSION"));

    let manager = SettingsManager::new(cli.settings.clone())?;
    for warning in manager.validate_settings() {
        log::warn!("{}", warning);
    }
    let settings = manager.settings().clone();

    let fetcher: Arc<dyn Fetcher> = if cli.offline {
        log::info!("Serving built-in demo templates");
        Arc::new(demo_fetcher())
    } else {
        Arc::new(HttpFetcher::new(&NetworkConfig::from(&settings.network))?)
    };

    let page = Arc::new(HeadlessPage::with_sections(SECTIONS));
    let site = Site::new(&settings, fetcher, Arc::new(MemoryHistory::new()), page.clone());

    let loaded = site.mount(1280, 800).await;
    log::info!("Main content loaded: {}", loaded);

    site.router()
        .navigate_to_route("/about", NavigateOptions::default())
        .await;
    site.handle_key(&KeyInput::new("m").alt()).await;
    site.resize(600, 900);
    log::info!(
        "Title: {:?}, breakpoint: {}, sidebar open: {}",
        page.title(),
        site.layout().breakpoint(),
        site.sidebar().is_open()
    );

    println!("{}", site.render());
    println!("{}", site.performance().export_data(ExportFormat::Json)?);
    if site.errors().log_len() > 0 {
        println!("{}", site.errors().export_error_log(ExportFormat::Json)?);
    }

    site.shutdown();
    Ok(())
}
