use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use livewall_types::api::{ToggleLikeRequest, ToggleLikeResponse};
use livewall_types::events::ChangeEvent;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// One like per participant per note, toggled. The change event carries no
/// event id — feed views resolve the note's event themselves and discard
/// what is not theirs.
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Json(req): Json<ToggleLikeRequest>,
) -> ApiResult<Json<ToggleLikeResponse>> {
    let lookup = state.db.clone();
    let note_key = note_id.to_string();
    let participant_key = req.participant_id.to_string();
    let (note_event, participant) = tokio::task::spawn_blocking(move || {
        anyhow::Ok((
            lookup.note_event_id(&note_key)?,
            lookup.get_participant(&participant_key)?,
        ))
    })
    .await??;

    let note_event = note_event.ok_or_else(|| ApiError::Submit("note no longer exists".into()))?;
    let participant =
        participant.ok_or_else(|| ApiError::Submit("unknown participant".into()))?;
    if participant.event_id != note_event {
        return Err(ApiError::Submit(
            "participant belongs to a different event".into(),
        ));
    }

    let db = state.db.clone();
    let like_id = Uuid::new_v4();
    let (note_key, participant_key) = (note_id.to_string(), req.participant_id.to_string());
    let liked = tokio::task::spawn_blocking(move || {
        db.toggle_like(&like_id.to_string(), &note_key, &participant_key)
    })
    .await?
    .map_err(|e| ApiError::Submit(format!("like toggle rejected: {}", e)))?;

    if liked {
        state.dispatcher.broadcast(ChangeEvent::LikeCreated {
            note_id,
            participant_id: req.participant_id,
        });
    } else {
        state.dispatcher.broadcast(ChangeEvent::LikeDeleted {
            note_id,
            participant_id: req.participant_id,
        });
    }

    Ok(Json(ToggleLikeResponse { liked }))
}
