use log::{debug, warn};
use reqwest::{Client, StatusCode};

use crate::error::FeedError;

/// Shared HTTP client for upstream feeds. Cloning is cheap and keeps the connection pool.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    pub fn new() -> reqwest::Result<Self> {
        Ok(FeedClient {
            client: Client::builder().build()?,
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let fetch_error = |source| {
            warn!("Failed to get XML from {}: {}", url, source);
            FeedError::Fetch {
                url: url.to_string(),
                source,
            }
        };

        let resp = self.client.get(url).send().await.map_err(fetch_error)?;
        let status = resp.status();

        // Drain the body either way so the connection goes back to the pool.
        let body = resp.bytes().await;

        if status != StatusCode::OK {
            warn!("Can't download the file {}: {}", url, status);
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = body.map_err(fetch_error)?;
        debug!("Downloaded {} bytes from {}", body.len(), url);

        Ok(body.to_vec())
    }
}
