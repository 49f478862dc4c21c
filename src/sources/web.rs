//! HTML page fetching.

use crate::error::AnalysisError;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single page fetch.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

/// Fetches an HTML document by URL.
pub trait HtmlSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<String, AnalysisError>;
}

/// Blocking HTTP fetcher.
pub struct HttpHtmlSource {
    http: reqwest::blocking::Client,
    timeout_seconds: u64,
}

impl HttpHtmlSource {
    pub fn new(timeout_seconds: u64) -> Result<Self, AnalysisError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("YoAnalyst/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnalysisError::Fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            timeout_seconds,
        })
    }
}

impl HtmlSource for HttpHtmlSource {
    fn fetch(&self, url: &str) -> Result<String, AnalysisError> {
        debug!("Fetching page: {}", url);

        let response = self.http.get(url).send().map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Fetch(format!(
                    "Request to {} timed out after {}s",
                    url, self.timeout_seconds
                ))
            } else if e.is_connect() {
                AnalysisError::Fetch(format!("Cannot connect to {}", url))
            } else {
                AnalysisError::Fetch(format!("Failed to fetch {}: {}", url, e))
            }
        })?;

        if !response.status().is_success() {
            return Err(AnalysisError::Fetch(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .map_err(|e| AnalysisError::Fetch(format!("Failed to read body of {}: {}", url, e)))
    }
}
