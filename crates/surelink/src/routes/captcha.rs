//! CAPTCHA issuance and verification endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use surelink_common::{IssuedChallenge, SurelinkError};

use super::ApiError;
use crate::state::AppState;

/// Hand out a challenge
pub async fn issue_challenge(
    State(state): State<AppState>,
) -> Result<Json<IssuedChallenge>, ApiError> {
    Ok(Json(state.captcha.issue().await?))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    challenge_id: String,
    answer: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

/// Verify a CAPTCHA answer. Consumes the challenge either way.
pub async fn verify_challenge(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let response = match state
        .captcha
        .validate(&payload.challenge_id, &payload.answer)
        .await
    {
        Ok(true) => VerifyResponse {
            success: true,
            error_message: None,
        },
        Ok(false) => VerifyResponse {
            success: false,
            error_message: Some("Incorrect answer".to_string()),
        },
        Err(SurelinkError::ChallengeNotFound) => VerifyResponse {
            success: false,
            error_message: Some("Challenge expired or invalid".to_string()),
        },
        Err(e) => return Err(e.into()),
    };

    Ok(Json(response))
}
