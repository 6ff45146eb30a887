//! Directions HTTP client.
//!
//! Issues driving-directions lookups and converts the response into a
//! [`DirectionsOutcome`]. Concurrency is capped by a semaphore so a burst
//! of edits cannot flood the upstream quota.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::domain::Coordinate;

use super::DirectionsService;
use super::error::DirectionsError;
use super::types::{DirectionsOutcome, DirectionsResponse};

/// Default base URL for the directions API.
const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/directions";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Configuration for the directions client.
#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    /// API key sent as the `key` query parameter
    pub api_key: String,
    /// Base URL for the API (defaults to the production endpoint)
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl DirectionsConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 10,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Directions API client.
#[derive(Debug, Clone)]
pub struct DirectionsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl DirectionsClient {
    /// Create a new directions client with the given configuration.
    pub fn new(config: DirectionsConfig) -> Result<Self, DirectionsError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// Look up a driving route between two points.
    pub async fn get_directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsOutcome, DirectionsError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| DirectionsError::Api {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let url = format!("{}/json", self.base_url);
        debug!(%origin, %destination, "requesting directions");

        let response = self
            .http
            .get(&url)
            .query(&[
                ("origin", origin.to_string()),
                ("destination", destination.to_string()),
                ("mode", "driving".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DirectionsError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DirectionsError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectionsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await.map_err(map_send_error)?;
        parse_body(&body)
    }
}

impl DirectionsService for DirectionsClient {
    async fn directions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<DirectionsOutcome, DirectionsError> {
        self.get_directions(origin, destination).await
    }
}

fn map_send_error(err: reqwest::Error) -> DirectionsError {
    if err.is_timeout() {
        DirectionsError::Timeout
    } else {
        DirectionsError::Http(err)
    }
}

/// Parse a response body into an outcome.
fn parse_body(body: &str) -> Result<DirectionsOutcome, DirectionsError> {
    let response: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| DirectionsError::Json {
            message: e.to_string(),
            body: Some(body.chars().take(500).collect()),
        })?;

    response.into_outcome()
}
