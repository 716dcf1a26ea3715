use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use livewall_db::Database;
use livewall_db::models::{EventRow, NoteRow};
use livewall_feed::NoteSource;
use livewall_gateway::source::{DbNoteSource, note_from_row};
use livewall_types::api::{Claims, CreateNoteRequest, FavoriteRequest, NoteWithAuthor};
use livewall_types::events::ChangeEvent;
use livewall_types::models::EventStatus;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct NotesQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Participant whose own likes should come back flagged.
    pub viewer: Option<Uuid>,
}

fn default_limit() -> u32 {
    50
}

pub async fn create_note(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<CreateNoteRequest>,
) -> ApiResult<impl IntoResponse> {
    let lookup = state.db.clone();
    let participant_key = req.participant_id.to_string();
    let (event, participant) = tokio::task::spawn_blocking(move || {
        let event = lookup.get_event_by_id(&event_id.to_string())?;
        let participant = lookup.get_participant(&participant_key)?;
        anyhow::Ok((event, participant))
    })
    .await??;

    let event = event.ok_or(ApiError::NotFound)?;
    if EventStatus::parse(&event.status) != Some(EventStatus::Active) {
        return Err(ApiError::State(
            "notes can only be posted while the event is active".into(),
        ));
    }
    let participant = participant.ok_or_else(|| ApiError::Submit("unknown participant".into()))?;
    if participant.event_id != event.id {
        return Err(ApiError::Submit(
            "participant belongs to a different event".into(),
        ));
    }

    let note_id = Uuid::new_v4();
    let db = state.db.clone();
    let content = req.content;
    let row = tokio::task::spawn_blocking(move || {
        db.insert_note(
            &note_id.to_string(),
            &event.id,
            &participant.id,
            content.kind(),
            content.data(),
            &chrono::Utc::now().to_rfc3339(),
        )
        .map_err(|e| ApiError::Submit(format!("note insert rejected: {}", e)))?;
        db.get_note_with_author(&note_id.to_string())
            .map_err(ApiError::from)?
            .ok_or(ApiError::NotFound)
    })
    .await??;

    // Subscribers learn the id only and fetch the row themselves.
    state.dispatcher.broadcast(ChangeEvent::NoteCreated {
        id: note_id,
        event_id,
    });

    let note = note_from_row(row, 0, false)
        .ok_or_else(|| ApiError::Database(anyhow::anyhow!("inserted note failed to map")))?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(query): Query<NotesQuery>,
) -> ApiResult<Json<Vec<NoteWithAuthor>>> {
    let lookup = state.db.clone();
    let exists =
        tokio::task::spawn_blocking(move || lookup.get_event_by_id(&event_id.to_string()))
            .await??;
    if exists.is_none() {
        return Err(ApiError::NotFound);
    }

    let limit = query.limit.min(100);
    let source = DbNoteSource::new(state.db.clone(), query.viewer.unwrap_or(Uuid::nil()));
    let notes = source.list_notes(event_id, limit).await?;
    Ok(Json(notes))
}

/// Host-only. Applied to the store first; the feed reorders through the
/// change event.
pub async fn set_favorite(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FavoriteRequest>,
) -> ApiResult<StatusCode> {
    let (note, event) = fetch_note_and_event(&state.db, note_id).await?;
    if event.host_id != claims.sub.to_string() {
        return Err(ApiError::Unauthorized);
    }

    let db = state.db.clone();
    let changed =
        tokio::task::spawn_blocking(move || db.set_note_favorited(&note.id, req.is_favorited))
            .await??;
    if !changed {
        return Err(ApiError::NotFound);
    }

    state.dispatcher.broadcast(ChangeEvent::NoteUpdated {
        id: note_id,
        event_id: event.id.parse().map_err(anyhow::Error::from)?,
        is_favorited: req.is_favorited,
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Host-only.
pub async fn delete_note(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<StatusCode> {
    let (note, event) = fetch_note_and_event(&state.db, note_id).await?;
    if event.host_id != claims.sub.to_string() {
        return Err(ApiError::Unauthorized);
    }

    let db = state.db.clone();
    let removed = tokio::task::spawn_blocking(move || db.delete_note(&note.id)).await??;
    if !removed {
        return Err(ApiError::NotFound);
    }

    state.dispatcher.broadcast(ChangeEvent::NoteDeleted {
        id: note_id,
        event_id: event.id.parse().map_err(anyhow::Error::from)?,
    });

    info!("Host {} deleted note {}", claims.sub, note_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_note_and_event(
    db: &Arc<Database>,
    note_id: Uuid,
) -> ApiResult<(NoteRow, EventRow)> {
    let db = db.clone();
    let pair = tokio::task::spawn_blocking(move || {
        let note = db.get_note_with_author(&note_id.to_string())?;
        let event = match &note {
            Some(n) => db.get_event_by_id(&n.event_id)?,
            None => None,
        };
        anyhow::Ok((note, event))
    })
    .await??;

    match pair {
        (Some(note), Some(event)) => Ok((note, event)),
        _ => Err(ApiError::NotFound),
    }
}
