use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use livewall_types::api::{ProfileResponse, UpsertProfileRequest};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Create an anonymous profile, or rename one the device already holds.
/// The client persists `{id, username}` locally and sends the id back on
/// every later visit, so the same device keeps one identity.
pub async fn upsert_profile(
    State(state): State<AppState>,
    Json(req): Json<UpsertProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::Creation("username must not be empty".into()));
    }

    let created = req.id.is_none();
    let id = req.id.unwrap_or_else(Uuid::new_v4);

    let db = state.db.clone();
    let (profile_id, name) = (id.to_string(), username.clone());
    tokio::task::spawn_blocking(move || db.upsert_profile(&profile_id, &name)).await??;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ProfileResponse { id, username })))
}
