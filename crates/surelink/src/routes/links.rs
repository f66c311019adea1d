//! Captcha-gated link creation and redirection.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use surelink_common::SurelinkError;

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateLinkRequest {
    destination: String,
    captcha_id: String,
    captcha_answer: String,
}

#[derive(Serialize)]
pub struct CreateLinkResponse {
    code: String,
    destination: String,
    created_at: DateTime<Utc>,
}

/// Create a short link once the captcha answer checks out
pub async fn create_link(
    State(state): State<AppState>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), ApiError> {
    let solved = state
        .captcha
        .validate(&payload.captcha_id, &payload.captcha_answer)
        .await?;
    if !solved {
        return Err(SurelinkError::IncorrectAnswer.into());
    }

    let link = state.redirection.create(&payload.destination).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLinkResponse {
            code: link.code,
            destination: link.destination,
            created_at: link.created_at,
        }),
    ))
}

/// 307 to the destination behind `code`
pub async fn redirect(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Redirect, ApiError> {
    let destination = state.redirection.resolve(&code).await?;
    Ok(Redirect::temporary(&destination))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use surelink_common::constants::cache_keys;

    use crate::routes::create_router;
    use crate::routes::test_support::{body_json, state};
    use crate::state::AppState;
    use crate::store::{CacheStore, MemoryStore};

    async fn solved_captcha(state: &AppState, cache: &MemoryStore) -> (String, String) {
        let issued = state.captcha.issue().await.unwrap();
        let answer = cache
            .get(&cache_keys::captcha(&issued.identity))
            .await
            .unwrap()
            .unwrap();
        (issued.identity, answer)
    }

    fn create_request(destination: &str, id: &str, answer: &str) -> Request<Body> {
        Request::post("/links")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({
                    "destination": destination,
                    "captcha_id": id,
                    "captcha_answer": answer,
                })
                .to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_follow_redirect() {
        let (state, cache) = state();
        let (id, answer) = solved_captcha(&state, &cache).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(create_request("https://example.com", &id, &answer))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let code = body["code"].as_str().unwrap().to_string();
        assert_eq!(code.len(), 6);

        let response = app
            .oneshot(Request::get(format!("/{code}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn test_wrong_answer_is_forbidden_and_consumes() {
        let (state, cache) = state();
        let (id, answer) = solved_captcha(&state, &cache).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(create_request("https://example.com", &id, "nope!!"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "Incorrect captcha answer");

        let response = app
            .oneshot(create_request("https://example.com", &id, &answer))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "Challenge not found");
    }

    #[tokio::test]
    async fn test_rejected_host_and_bad_url() {
        let (state, cache) = state();
        let (id, answer) = solved_captcha(&state, &cache).await;
        let (id2, answer2) = solved_captcha(&state, &cache).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(create_request("https://evil.test/", &id, &answer))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .oneshot(create_request("javascript:alert(1)", &id2, &answer2))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let (state, _) = state();
        let response = create_router(state)
            .oneshot(Request::get("/zzzzzz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
