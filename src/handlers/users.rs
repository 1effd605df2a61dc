//! # User Enrollment Endpoints
//!
//! Enrollment creates the user row locally and forwards the reference clip
//! to the audio-analysis service, which owns the recognition model. The
//! clip itself is never written to local disk.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub surname: String,
    /// The user's reference clip as a base64-encoded WAV file.
    pub audio_base64: String,
}

/// GET /api/users
pub async fn list_users(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let users = state.store().list_users()?;
    Ok(HttpResponse::Ok().json(users))
}

/// POST /api/users
pub async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    let name = body.name.trim();
    let surname = body.surname.trim();
    if name.is_empty() || surname.is_empty() {
        return Err(AppError::BadRequest("name and surname are required".to_string()));
    }

    let clip = BASE64
        .decode(body.audio_base64.as_bytes())
        .map_err(|err| AppError::BadRequest(format!("invalid audio payload: {}", err)))?;
    if clip.is_empty() {
        return Err(AppError::BadRequest("audio payload is empty".to_string()));
    }

    let user_id = state.store().insert_user(name, surname)?;

    // The user row stays even if enrollment fails; re-enrollment is a
    // retry of this endpoint, not a new identity.
    if let Err(err) = state.services().audio.enroll(user_id, &clip).await {
        error!(user_id, error = %err, "enrollment upload failed");
        return Err(AppError::Upstream(format!(
            "user {} created but the recognition service rejected the clip: {}",
            user_id, err
        )));
    }

    info!(user_id, name, "user enrolled");

    Ok(HttpResponse::Created().json(json!({
        "status": "success",
        "user_id": user_id,
        "message": "User created and reference clip enrolled"
    })))
}
