use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;
use uuid::Uuid;

use livewall_types::api::{AnnouncementRequest, Claims};
use livewall_types::events::ChangeEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Fire-and-forget host broadcast. Nothing is stored: whoever is connected
/// right now gets a popup, everyone else never knows it happened.
pub async fn broadcast_announcement(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<StatusCode> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::Submit(
            "announcement message must not be empty".into(),
        ));
    }

    let db = state.db.clone();
    let event = tokio::task::spawn_blocking(move || db.get_event_by_id(&event_id.to_string()))
        .await??
        .ok_or(ApiError::NotFound)?;
    if event.host_id != claims.sub.to_string() {
        return Err(ApiError::Unauthorized);
    }

    info!("Host {} announcing on event {}", claims.sub, event.event_code);
    state.dispatcher.broadcast(ChangeEvent::Announcement {
        event_code: event.event_code,
        message,
    });

    Ok(StatusCode::ACCEPTED)
}
