//! Resource fetching
//!
//! Services depend on the [`Fetcher`] trait. [`HttpFetcher`] is the reqwest
//! implementation; [`MemoryFetcher`] serves fixed bodies for headless runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use url::Url;

use crate::error::NetworkError;
use crate::response::Response;
use crate::NetworkConfig;

/// Something that can GET a site resource by path
pub trait Fetcher: Send + Sync {
    /// Fetch `path`. Non-2xx responses are returned, not turned into errors.
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Response, NetworkError>>;
}

/// Fetcher backed by a reqwest client, resolving paths against a base URL
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let base_url = Url::parse(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a relative or absolute path against the base URL
    pub fn resolve(&self, path: &str) -> Result<Url, NetworkError> {
        Ok(self.base_url.join(path)?)
    }

    async fn fetch(&self, path: &str) -> Result<Response, NetworkError> {
        let url = self.resolve(path)?;
        log::debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                log::warn!("Request for {} timed out", path);
            }
            NetworkError::from(e)
        })?;

        let response = Response::from_reqwest(response).await?;
        log::info!(
            "Fetched {} ({} bytes, status {})",
            path,
            response.body().len(),
            response.status()
        );
        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Response, NetworkError>> {
        Box::pin(self.fetch(path))
    }
}

const MEMORY_BASE_URL: &str = "memory://site/";

/// In-memory fetcher serving registered bodies; unknown paths answer 404
#[derive(Debug)]
pub struct MemoryFetcher {
    routes: RwLock<HashMap<String, (u16, Bytes, Option<String>)>>,
    requests: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Serve `body` with status 200
    pub fn insert(&self, path: &str, body: impl Into<Bytes>) {
        self.insert_with_status(path, 200, body);
    }

    pub fn insert_with_status(&self, path: &str, status: u16, body: impl Into<Bytes>) {
        self.routes
            .write()
            .insert(normalize(path), (status, body.into(), None));
    }

    /// Make `path` fail with a connection error
    pub fn fail(&self, path: &str, reason: &str) {
        self.routes
            .write()
            .insert(normalize(path), (0, Bytes::new(), Some(reason.to_string())));
    }

    pub fn remove(&self, path: &str) {
        self.routes.write().remove(&normalize(path));
    }

    /// Number of requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn respond(&self, path: &str) -> Result<Response, NetworkError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let url = Url::parse(MEMORY_BASE_URL)?.join(path)?;
        let route = self.routes.read().get(&normalize(path)).cloned();

        match route {
            Some((_, _, Some(reason))) => Err(NetworkError::ConnectionError(reason)),
            Some((status, body, None)) => Ok(Response::new(status, body, url)),
            None => Ok(Response::new(404, Bytes::new(), url)),
        }
    }
}

impl Default for MemoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for MemoryFetcher {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Response, NetworkError>> {
        Box::pin(async move { self.respond(path) })
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}
