//! Page fetching against the remote data source
//!
//! A [`PageSource`] answers one page request at a time. [`HttpPageSource`]
//! is the production implementation: it issues
//! `GET <base_url>?page=<n>&pageSize=<m>` and decodes a JSON array of record
//! objects. An empty array means the source is exhausted.

use crate::config::SourceConfig;
use crate::error::{Error, Result, SourceError};
use crate::types::Record;
use async_trait::async_trait;
use tracing::debug;

/// Trait for anything that can serve pages of records
///
/// Implementations must not retry on their own; the acquisition loop owns the
/// retry policy.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page
    ///
    /// # Arguments
    ///
    /// * `page` - 1-based page number
    /// * `page_size` - Number of records requested
    ///
    /// # Returns
    ///
    /// The records on that page, or an empty vector once the source is exhausted.
    async fn fetch(&self, page: u32, page_size: u32)
    -> std::result::Result<Vec<Record>, SourceError>;
}

/// HTTP implementation of [`PageSource`]
pub struct HttpPageSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpPageSource {
    /// Create a page source from the source configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    /// Endpoint pages are requested from
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(
        &self,
        page: u32,
        page_size: u32,
    ) -> std::result::Result<Vec<Record>, SourceError> {
        debug!(page, page_size, url = %self.base_url, "Requesting page");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("page", page), ("pageSize", page_size)])
            .send()
            .await
            .map_err(|source| SourceError::Transport { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                page,
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| SourceError::Transport { page, source })?;

        decode_page(page, &body)
    }
}

/// Decode a page body into records
///
/// The body must be a JSON array whose elements are all objects.
pub fn decode_page(page: u32, body: &[u8]) -> std::result::Result<Vec<Record>, SourceError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| SourceError::Decode {
            page,
            reason: e.to_string(),
        })?;

    let serde_json::Value::Array(items) = value else {
        return Err(SourceError::Decode {
            page,
            reason: "expected a JSON array of records".to_string(),
        });
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            serde_json::Value::Object(record) => Ok(record),
            other => Err(SourceError::Decode {
                page,
                reason: format!("element {} is not an object: {}", index, other),
            }),
        })
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
