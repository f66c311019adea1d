//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use surelink_common::ServiceStat;

use super::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    node_id: String,
    cache: bool,
}

/// Readiness check (is the cache store reachable?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    match state.cache.ping().await {
        Ok(()) => Ok(Json(ReadyResponse {
            status: "ready",
            node_id: state.config.node_id.clone(),
            cache: true,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            // Return 503 if not ready
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[derive(Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    stats: ServiceStat,
    queue_depth: usize,
    queue_capacity: usize,
}

/// Service counters as last published, plus live queue depth
pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    let stats = state.stat_cache.current().await?;
    let queue = state.captcha.queue();

    Ok(Json(MetricsResponse {
        stats,
        queue_depth: queue.len().await?,
        queue_capacity: queue.capacity(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::create_router;
    use crate::routes::test_support::{body_json, state};

    #[tokio::test]
    async fn test_health() {
        let (state, _) = state();
        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_reflects_store() {
        let (state, cache) = state();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        cache.set_available(false);
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_reports_queue() {
        let (state, _) = state();
        state.refill.run().await.unwrap();

        let response = create_router(state)
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["queue_depth"], 3);
        assert_eq!(body["queue_capacity"], 3);
        assert_eq!(body["node_id"], "node-test");
    }
}
