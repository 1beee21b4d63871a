// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use super::errors::ApiError;
use crate::orchestrator::{CaptionError, CaptionRequest, CaptionResponse, CaptionService};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CaptionService>,
    /// Bearer token for `/admin`; admin routes answer 401 when unset
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(service: Arc<CaptionService>, admin_token: Option<String>) -> Self {
        Self {
            service,
            admin_token,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/status", get(admin_status_handler))
        .route("/quota/:identity", get(admin_quota_handler))
        .route("/blocks", get(admin_blocks_handler))
        .route("/blocks/:identity", delete(admin_unblock_handler))
        .route("/keys/reactivate-all", post(admin_reactivate_all_handler))
        .route("/keys/:id/deactivate", post(admin_deactivate_handler))
        .route("/keys/:id/reactivate", post(admin_reactivate_handler))
        .route("/cache/purge", post(admin_purge_cache_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/captions", post(captions_handler))
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until `shutdown` is cancelled
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Caption gate listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return ApiErrorResponse(ApiError::Unauthorized(
            "Admin API is disabled".to_string(),
        ))
        .into_response();
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(request).await
        }
        _ => ApiErrorResponse(ApiError::Unauthorized(
            "Missing or invalid admin token".to_string(),
        ))
        .into_response(),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::version::get_version_info(),
    }))
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.service.metrics().render(),
    )
}

async fn captions_handler(
    State(state): State<AppState>,
    payload: Result<Json<CaptionRequest>, JsonRejection>,
) -> Result<Json<CaptionResponse>, ApiErrorResponse> {
    let Json(request) = payload.map_err(|e| {
        ApiErrorResponse(CaptionError::InvalidInput(e.body_text()).into())
    })?;

    let span = info_span!(
        "caption_request",
        request_id = %Uuid::new_v4(),
        identity = %request.identity.quota_key()
    );
    state
        .service
        .generate(&request)
        .instrument(span)
        .await
        .map(Json)
        .map_err(|e| ApiErrorResponse(e.into()))
}

async fn admin_status_handler(State(state): State<AppState>) -> Result<Response, ApiErrorResponse> {
    let snapshot = state
        .service
        .admin_snapshot()
        .await
        .map_err(|e| ApiErrorResponse(e.into()))?;
    Ok(Json(snapshot).into_response())
}

async fn admin_quota_handler(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let snapshot = state
        .service
        .quota_remaining(&identity)
        .await
        .map_err(|e| ApiErrorResponse(e.into()))?;
    Ok(Json(snapshot).into_response())
}

async fn admin_blocks_handler(State(state): State<AppState>) -> Result<Response, ApiErrorResponse> {
    let blocks = state
        .service
        .active_blocks()
        .await
        .map_err(|e| ApiErrorResponse(e.into()))?;
    Ok(Json(json!({ "count": blocks.len(), "blocks": blocks })).into_response())
}

async fn admin_unblock_handler(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let removed = state
        .service
        .unblock(&identity)
        .await
        .map_err(|e| ApiErrorResponse(e.into()))?;
    if !removed {
        return Err(ApiErrorResponse(ApiError::NotFound(format!(
            "No block for '{}'",
            identity
        ))));
    }
    Ok(Json(json!({ "unblocked": identity })).into_response())
}

async fn admin_deactivate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let status = state
        .service
        .deactivate_credential(&id)
        .map_err(|e| ApiErrorResponse(e.into()))?;
    Ok(Json(status).into_response())
}

async fn admin_reactivate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let status = state
        .service
        .reactivate_credential(&id)
        .map_err(|e| ApiErrorResponse(e.into()))?;
    Ok(Json(status).into_response())
}

async fn admin_reactivate_all_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.reactivate_all_credentials())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurgeParams {
    older_than_days: Option<u32>,
}

async fn admin_purge_cache_handler(
    State(state): State<AppState>,
    Query(params): Query<PurgeParams>,
) -> Result<Response, ApiErrorResponse> {
    let days = params
        .older_than_days
        .unwrap_or_else(|| state.service.cache().config().max_age_days);
    let purged = state
        .service
        .purge_cache(days)
        .await
        .map_err(|e| ApiErrorResponse(e.into()))?;
    Ok(Json(json!({ "purged": purged, "olderThanDays": days })).into_response())
}

// Error response wrapper
pub struct ApiErrorResponse(pub ApiError);

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.0.to_response();

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = self.0.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
