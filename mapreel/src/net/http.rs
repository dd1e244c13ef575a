//! `reqwest`-backed fetcher.

use std::time::Duration;

use tracing::debug;

use super::{FetchError, Fetcher, Request, Response};
use crate::cache::BoxFuture;

/// Real network access using an async reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestFetcher {
    /// Creates a fetcher without a request timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::build(None)
    }

    /// Creates a fetcher whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Self::build(Some(timeout))
    }

    fn build(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| FetchError::Network {
            url: String::new(),
            reason: format!("Failed to create HTTP client: {}", e),
        })?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        match self.timeout {
            Some(t) if err.is_timeout() => FetchError::Timeout {
                url: url.to_string(),
                secs: t.as_secs(),
            },
            _ => FetchError::Network {
                url: url.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>> {
        Box::pin(async move {
            let url = request.url.as_str();
            let mut builder = self
                .client
                .request(request.method.clone(), request.url.clone());
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.body(body.clone());
            }

            let response = builder.send().await.map_err(|e| self.map_error(url, e))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();
            let body = response.bytes().await.map_err(|e| self.map_error(url, e))?;

            debug!(url = %url, status, bytes = body.len(), "Network response");
            Ok(Response {
                status,
                headers,
                body,
            })
        })
    }
}
