use bytes::Bytes;
use url::Url;

use crate::error::NetworkError;

/// A fetched site resource: status, whole body and the URL it came from
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    body: Bytes,
    url: Url,
}

impl Response {
    pub fn new(status: u16, body: Bytes, url: Url) -> Self {
        Self { status, body, url }
    }

    /// Read a reqwest response to the end
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, NetworkError> {
        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.bytes().await?;
        Ok(Self::new(status, body, url))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`NetworkError::StatusError`]
    pub fn error_for_status(self) -> Result<Self, NetworkError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(NetworkError::StatusError {
                status: self.status,
                url: self.url.to_string(),
            })
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8, as template fragments are served
    pub fn body_text(&self) -> Result<String, NetworkError> {
        std::str::from_utf8(&self.body)
            .map(str::to_owned)
            .map_err(|e| NetworkError::ResourceError(format!("{} is not UTF-8: {}", self.url, e)))
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetworkError> {
        serde_json::from_slice(&self.body).map_err(NetworkError::SerializationError)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
