//! HTTP route handlers for Surelink.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use surelink_common::SurelinkError;

use crate::state::AppState;

mod captcha;
mod health;
mod links;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // CAPTCHA endpoints
        .route("/captcha", get(captcha::issue_challenge))
        .route("/captcha/verify", post(captcha::verify_challenge))

        // Links
        .route("/links", post(links::create_link))
        .route("/{code}", get(links::redirect))

        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))

        // Add shared state
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Engine error rendered as a JSON response
pub struct ApiError(pub SurelinkError);

impl From<SurelinkError> for ApiError {
    fn from(err: SurelinkError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if !self.0.is_user_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::captcha::test_support::StubRenderer;
    use crate::config::AppConfig;
    use crate::links::MemoryLinkStore;
    use crate::random::RandomGenerator;
    use crate::redirect::test_support::CountingValidator;
    use crate::state::AppState;
    use crate::store::MemoryStore;

    pub fn state() -> (AppState, Arc<MemoryStore>) {
        let mut config = AppConfig::default();
        config.captcha.queue_capacity = 3;
        config.node_id = "node-test".into();

        let cache = Arc::new(MemoryStore::new());
        let state = AppState::from_parts(
            config,
            cache.clone(),
            Arc::new(MemoryLinkStore::new()),
            Arc::new(StubRenderer::default()),
            Arc::new(CountingValidator::denying(&["evil.test"])),
            Arc::new(RandomGenerator::seeded(5)),
        );
        (state, cache)
    }

    pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
