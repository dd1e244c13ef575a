//! Network abstraction for the cache worker.
//!
//! The worker never talks to `reqwest` directly; it goes through the
//! [`Fetcher`] trait so tests can swap in a scripted network and simulate
//! going offline.

mod http;

pub use http::ReqwestFetcher;

use std::fmt;

use bytes::Bytes;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::BoxFuture;

/// Errors from a network fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be completed (DNS, connection, TLS, offline).
    #[error("Network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// The configured timeout elapsed.
    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The URL could not be parsed.
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}

/// An outbound request as seen by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    /// A GET request with no headers.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Parses `url` into a GET request.
    pub fn parse_get(url: &str) -> Result<Self, FetchError> {
        let url = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        Ok(Self::get(url))
    }

    /// A request with an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Key under which responses to this request are stored.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A response, either fresh from the network or read back from a pool.
///
/// The body is a reference-counted [`Bytes`]; cloning a response yields an
/// independent value sharing the same immutable buffer, so one copy can be
/// stored while the other is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Size used when weighing pool entries.
    pub fn weight(&self) -> u64 {
        let headers: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        (self.body.len() + headers) as u64
    }
}

/// Performs network requests.
///
/// Implementations must be usable from many concurrent fetch tasks.
pub trait Fetcher: Send + Sync {
    /// Sends the request once. HTTP error statuses are returned as
    /// responses; only transport failures are errors.
    fn fetch<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, FetchError>>;
}
