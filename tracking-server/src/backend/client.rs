//! Shipment backend HTTP client.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{LocationSample, ShipmentId, ShipmentRecord};

use super::error::BackendError;

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `https://dispatch.example.com/api`
    pub base_url: String,
    /// Bearer token, if the backend requires one
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout_secs: 10,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Client for shipment records and vehicle positions.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    /// Fetch the shipment record: status and route timing.
    pub async fn fetch_shipment(&self, id: &ShipmentId) -> Result<ShipmentRecord, BackendError> {
        let url = format!("{}/shipments/{}", self.base_url, id);
        debug!(shipment = %id, "fetching shipment record");

        let response = self.send(self.http.get(&url), id).await?;
        let body = response.text().await.map_err(map_send_error)?;
        parse_json(&body)
    }

    /// Latest backend-reported vehicle position.
    ///
    /// `None` when the vehicle has not reported yet (204 or a `null` body).
    pub async fn current_position(
        &self,
        id: &ShipmentId,
    ) -> Result<Option<LocationSample>, BackendError> {
        let url = format!("{}/shipments/{}/location", self.base_url, id);

        let response = self.send(self.http.get(&url), id).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await.map_err(map_send_error)?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        parse_json(&body)
    }

    /// Report a driver's accepted sample.
    pub async fn push_location(
        &self,
        id: &ShipmentId,
        sample: &LocationSample,
    ) -> Result<(), BackendError> {
        let url = format!("{}/shipments/{}/location", self.base_url, id);
        debug!(shipment = %id, position = %sample.coordinate, "pushing location");

        self.send(self.http.post(&url).json(sample), id).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, id: &ShipmentId) -> Result<Response, BackendError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(id.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response)
    }
}

fn map_send_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Http(err)
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(500).collect()),
    })
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::ShipmentStatus;

    #[test]
    fn config_builder() {
        let config = BackendConfig::new("http://localhost:9000")
            .with_token("secret")
            .with_timeout(3);

        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 3);
    }

    #[test]
    fn config_defaults() {
        let config = BackendConfig::new("http://localhost:9000");
        assert!(config.token.is_none());
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn malformed_body_is_json_error() {
        let err = parse_json::<ShipmentRecord>("not json").unwrap_err();
        assert!(matches!(err, BackendError::Json { .. }));
    }

    #[test]
    fn null_position_is_none() {
        let pos: Option<LocationSample> = parse_json("null").unwrap();
        assert!(pos.is_none());
    }

    /// Serve a stub backend on an ephemeral port.
    async fn stub_backend() -> String {
        async fn shipment(Path(id): Path<String>) -> Result<Json<Value>, HttpStatus> {
            match id.as_str() {
                "SHP-1" => Ok(Json(json!({
                    "id": "SHP-1",
                    "status": "In Transit",
                    "routeInfo": { "routeStarted": "2024-01-01T08:00:00Z" }
                }))),
                "SECRET" => Err(HttpStatus::FORBIDDEN),
                _ => Err(HttpStatus::NOT_FOUND),
            }
        }

        async fn location(Path(id): Path<String>) -> Result<Json<Value>, HttpStatus> {
            match id.as_str() {
                "SHP-1" => Ok(Json(json!({
                    "latitude": 51.5,
                    "longitude": -0.12,
                    "speed": 8.5,
                    "timestamp": "2024-01-01T08:05:00Z"
                }))),
                "QUIET" => Err(HttpStatus::NO_CONTENT),
                _ => Err(HttpStatus::INTERNAL_SERVER_ERROR),
            }
        }

        async fn push(headers: HeaderMap, Json(body): Json<Value>) -> HttpStatus {
            let authorised = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == "Bearer secret");
            if authorised && body.get("latitude").is_some() {
                HttpStatus::ACCEPTED
            } else {
                HttpStatus::UNAUTHORIZED
            }
        }

        let app = Router::new()
            .route("/shipments/:id", get(shipment))
            .route("/shipments/:id/location", get(location).post(push));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn id(s: &str) -> ShipmentId {
        ShipmentId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn fetches_shipment_record() {
        let client = BackendClient::new(BackendConfig::new(stub_backend().await)).unwrap();

        let record = client.fetch_shipment(&id("SHP-1")).await.unwrap();
        assert_eq!(record.status, ShipmentStatus::InTransit);
        assert!(record.route_info.route_started.is_some());
        assert!(record.route_info.actual_duration.is_none());
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let client = BackendClient::new(BackendConfig::new(stub_backend().await)).unwrap();

        let missing = client.fetch_shipment(&id("NOPE")).await.unwrap_err();
        assert!(matches!(missing, BackendError::NotFound(ref s) if s == "NOPE"));

        let forbidden = client.fetch_shipment(&id("SECRET")).await.unwrap_err();
        assert!(matches!(forbidden, BackendError::Unauthorized));

        let broken = client.current_position(&id("BROKEN")).await.unwrap_err();
        assert!(matches!(broken, BackendError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn reads_position() {
        let client = BackendClient::new(BackendConfig::new(stub_backend().await)).unwrap();

        let sample = client.current_position(&id("SHP-1")).await.unwrap().unwrap();
        assert_eq!(sample.coordinate.latitude(), 51.5);
        assert_eq!(sample.speed, Some(8.5));
        assert!(sample.accuracy.is_none());

        assert!(client.current_position(&id("QUIET")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_sends_bearer_token() {
        let base = stub_backend().await;
        let sample = LocationSample::new(
            crate::domain::Coordinate::new(51.5, -0.12).unwrap(),
            chrono::Utc::now(),
        );

        let anonymous = BackendClient::new(BackendConfig::new(base.clone())).unwrap();
        assert!(matches!(
            anonymous.push_location(&id("SHP-1"), &sample).await,
            Err(BackendError::Unauthorized)
        ));

        let authed = BackendClient::new(BackendConfig::new(base).with_token("secret")).unwrap();
        authed.push_location(&id("SHP-1"), &sample).await.unwrap();
    }
}
