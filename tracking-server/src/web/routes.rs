//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::backend::{BackendError, BackendPositionProvider, BackendSink};
use crate::directions::DirectionsService;
use crate::domain::{InvalidCoordinate, InvalidShipmentId, LocationSample, ShipmentId};
use crate::geo::RouteEstimate;
use crate::route::{RouteError, RouteOutcome};
use crate::tracking::{SessionClosed, TrackingRole};

use super::dto::*;
use super::state::{AppState, Directions};
use super::views::ShipmentView;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/estimate", get(estimate))
        .route(
            "/api/shipments/:id/tracking",
            post(open_tracking).get(get_tracking).delete(close_tracking),
        )
        .route("/api/shipments/:id/tracking/live", put(set_live))
        .route("/api/shipments/:id/tracking/retry", post(retry_permission))
        .route("/api/shipments/:id/tracking/refresh", post(refresh_tracking))
        .route("/api/shipments/:id/route", post(request_route).get(get_route))
        .route("/api/shipments/:id/driver/fix", post(driver_fix))
        .route("/api/shipments/:id/driver/permission", put(driver_permission))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Straight-line distance and ETA between two points.
async fn estimate(Query(req): Query<EstimateRequest>) -> Result<Json<RouteEstimate>, AppError> {
    Ok(Json(req.estimate()?))
}

fn parse_id(raw: &str) -> Result<ShipmentId, AppError> {
    Ok(ShipmentId::parse(raw)?)
}

async fn open_view(
    state: &AppState,
    id: &ShipmentId,
) -> Result<Arc<ShipmentView<Directions>>, AppError> {
    state.views.get(id).await.ok_or_else(|| AppError::NotFound {
        message: format!("no open view for shipment {id}"),
    })
}

async fn view_response<D: DirectionsService>(view: &ShipmentView<D>) -> ViewResponse {
    ViewResponse {
        shipment_id: view.shipment().clone(),
        shipment_status: view.shipment_status().await,
        role: view.role(),
        tracking: view.tracking(),
        elapsed: view.elapsed().await,
    }
}

/// Open (or reopen) tracking for a shipment.
async fn open_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<OpenTrackingRequest>,
) -> Result<Json<ViewResponse>, AppError> {
    let id = parse_id(&id)?;
    let record = state.backend.fetch_shipment(&id).await?;

    let view = match req.role.unwrap_or(TrackingRole::Viewer) {
        TrackingRole::Viewer => {
            let provider = BackendPositionProvider::new(state.backend.clone(), id);
            state.views.open_viewer(&record, provider).await
        }
        TrackingRole::Driver => {
            let sink = BackendSink::new(state.backend.clone());
            state.views.open_driver(&record, sink).await
        }
    };

    Ok(Json(view_response(&view).await))
}

async fn get_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    Ok(Json(view_response(&view).await))
}

/// Close the view: stops polling and releases the history.
async fn close_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    if state.views.close(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound {
            message: format!("no open view for shipment {id}"),
        })
    }
}

async fn set_live(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LiveRequest>,
) -> Result<Json<ViewResponse>, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    view.set_live_tracking(req.enabled).await?;
    Ok(Json(view_response(&view).await))
}

async fn retry_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    view.retry_permission().await?;
    Ok(Json(view_response(&view).await))
}

/// Re-read the shipment record so status and timing changes take effect.
async fn refresh_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ViewResponse>, AppError> {
    let id = parse_id(&id)?;
    let view = open_view(&state, &id).await?;
    let record = state.backend.fetch_shipment(&id).await?;
    view.apply_record(&record).await?;
    Ok(Json(view_response(&view).await))
}

/// Request a route. Answers with the straight-line estimate alongside the
/// routed result.
async fn request_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    let estimate = RouteEstimate::between(req.origin, req.destination);

    let response = match view.request_route(req.origin, req.destination).await? {
        RouteOutcome::Committed { request_id, route } => {
            RouteResponse::new(request_id, false, Some(&route))
        }
        RouteOutcome::Superseded { request_id, .. } => {
            RouteResponse::new(request_id, true, view.route().as_ref())
        }
    };

    Ok(Json(response.with_estimate(estimate)))
}

async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RouteResponse>, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    Ok(Json(RouteResponse::new(
        view.latest_route_request(),
        false,
        view.route().as_ref(),
    )))
}

/// Fix reported by the driver's device.
async fn driver_fix(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(sample): Json<LocationSample>,
) -> Result<StatusCode, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    let device = view.device().ok_or_else(not_a_driver)?;
    device.publish(sample);
    Ok(StatusCode::ACCEPTED)
}

/// Device location permission changed.
async fn driver_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PermissionRequest>,
) -> Result<Json<ViewResponse>, AppError> {
    let view = open_view(&state, &parse_id(&id)?).await?;
    let device = view.device().ok_or_else(not_a_driver)?;

    if req.granted {
        device.grant();
        view.retry_permission().await?;
    } else {
        device.deny();
    }
    Ok(Json(view_response(&view).await))
}

fn not_a_driver() -> AppError {
    AppError::Conflict {
        message: "view is not tracking a driver device".to_string(),
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Conflict { message: String },
    Upstream { message: String },
}

impl From<InvalidShipmentId> for AppError {
    fn from(e: InvalidShipmentId) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<InvalidCoordinate> for AppError {
    fn from(e: InvalidCoordinate) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::NotFound(_) => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::Upstream {
                message: e.to_string(),
            },
        }
    }
}

impl From<RouteError> for AppError {
    fn from(e: RouteError) -> Self {
        AppError::Upstream {
            message: e.to_string(),
        }
    }
}

impl From<SessionClosed> for AppError {
    fn from(e: SessionClosed) -> Self {
        AppError::Conflict {
            message: e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Conflict { message } => (StatusCode::CONFLICT, message),
            AppError::Upstream { message } => (StatusCode::BAD_GATEWAY, message),
        };

        warn!(%status, %message, "request failed");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::backend::{BackendClient, BackendConfig};
    use crate::directions::{DirectionsClient, DirectionsConfig};
    use crate::route::{CachedDirections, RouteCacheConfig, RouteFetcherConfig};
    use crate::tracking::TrackingConfig;

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, "ok");
    }

    #[tokio::test]
    async fn estimate_handler() {
        let req = EstimateRequest {
            from_lat: 51.5074,
            from_lng: -0.1278,
            to_lat: 51.5074,
            to_lng: -0.1278,
            speed_kmh: None,
        };
        let Json(estimate) = estimate(Query(req)).await.unwrap();
        assert_eq!(estimate.distance_km, 0.0);
        assert_eq!(estimate.eta_minutes, 0);
    }

    #[test]
    fn error_statuses() {
        let cases = [
            (AppError::from(BackendError::NotFound("X".into())), StatusCode::NOT_FOUND),
            (AppError::from(BackendError::Timeout), StatusCode::BAD_GATEWAY),
            (AppError::from(SessionClosed), StatusCode::CONFLICT),
            (
                AppError::from(ShipmentId::parse("a b").unwrap_err()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    /// Serve the router with upstreams that are never reached.
    async fn serve() -> String {
        let directions = DirectionsClient::new(
            DirectionsConfig::new("test-key").with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let backend =
            BackendClient::new(BackendConfig::new("http://127.0.0.1:9").with_timeout(1)).unwrap();
        let state = AppState::new(
            CachedDirections::new(directions, &RouteCacheConfig::default()),
            backend,
            RouteFetcherConfig::default(),
            TrackingConfig::default(),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn router_endpoints() {
        let base = serve().await;
        let http = reqwest::Client::new();

        let health = http.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);

        let estimate: Value = http
            .get(format!(
                "{base}/api/estimate?from_lat=0&from_lng=0&to_lat=0&to_lng=1&speed_kmh=60"
            ))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(estimate["eta_minutes"], 111);

        let bad = http
            .get(format!("{base}/api/estimate?from_lat=95&from_lng=0&to_lat=0&to_lng=1"))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

        let missing = http
            .get(format!("{base}/api/shipments/SHP-1/tracking"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);
        let body: Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "no open view for shipment SHP-1");

        let invalid = http
            .delete(format!("{base}/api/shipments/bad%20id/tracking"))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status(), reqwest::StatusCode::BAD_REQUEST);

        let unreachable = http
            .post(format!("{base}/api/shipments/SHP-1/tracking"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap();
        assert_eq!(unreachable.status(), reqwest::StatusCode::BAD_GATEWAY);
    }
}
