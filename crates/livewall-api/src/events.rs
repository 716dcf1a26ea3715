use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use livewall_db::models::EventRow;
use livewall_db::{Database, parse_timestamp};
use livewall_types::api::{Claims, CreateEventRequest, EventResponse, SetStatusRequest};
use livewall_types::models::{EventMode, EventStatus};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

const CODE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 6;
const CODE_ATTEMPTS: u32 = 10;

fn random_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Draw codes until one is free; after ten collisions, salt the last draw
/// with the clock. A concurrent grab of the same code is still possible
/// between check and insert — the UNIQUE constraint on `event_code` is the
/// backstop, surfaced as a creation failure.
pub(crate) async fn generate_unique_code(db: &Arc<Database>) -> ApiResult<String> {
    let mut code = String::new();
    for _ in 0..CODE_ATTEMPTS {
        code = random_code();
        let db = db.clone();
        let candidate = code.clone();
        let exists = tokio::task::spawn_blocking(move || db.event_code_exists(&candidate)).await??;
        if !exists {
            return Ok(code);
        }
    }
    let suffix = chrono::Utc::now().timestamp().rem_euclid(100);
    Ok(format!("{code}{suffix:02}"))
}

pub(crate) fn event_response(row: EventRow) -> ApiResult<EventResponse> {
    let status = EventStatus::parse(&row.status)
        .ok_or_else(|| anyhow::anyhow!("unknown status '{}' on event {}", row.status, row.id))?;
    let event_mode = EventMode::parse(&row.event_mode)
        .ok_or_else(|| anyhow::anyhow!("unknown mode '{}' on event {}", row.event_mode, row.id))?;

    Ok(EventResponse {
        id: row.id.parse().map_err(anyhow::Error::from)?,
        host_id: row.host_id.parse().map_err(anyhow::Error::from)?,
        title: row.title,
        join_url: join_url(&row.event_code),
        event_code: row.event_code,
        event_mode,
        status,
        created_at: parse_timestamp(&row.created_at),
    })
}

/// The attendee-facing path; QR codes encode this under the site origin.
fn join_url(code: &str) -> String {
    format!("/event/{code}")
}

pub async fn create_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Creation("event title must not be empty".into()));
    }

    let event_code = generate_unique_code(&state.db).await?;
    let event_id = Uuid::new_v4();

    let db = state.db.clone();
    let host_id = claims.sub.to_string();
    let code = event_code.clone();
    let mode = req.event_mode.as_str();
    let row = tokio::task::spawn_blocking(move || {
        db.insert_event(&event_id.to_string(), &host_id, &title, &code, mode)
            .map_err(|e| ApiError::Creation(format!("event insert rejected: {}", e)))?;
        db.get_event_by_id(&event_id.to_string())
            .map_err(ApiError::from)?
            .ok_or(ApiError::NotFound)
    })
    .await??;

    info!("Host {} created event {} ({})", claims.sub, event_code, event_id);
    Ok((StatusCode::CREATED, Json(event_response(row)?)))
}

/// Attendee entry point: case-insensitive code lookup.
pub async fn lookup_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<EventResponse>> {
    let db = state.db.clone();
    let normalized = code.to_uppercase();
    let row = tokio::task::spawn_blocking(move || db.get_event_by_code(&normalized))
        .await??
        .ok_or(ApiError::NotFound)?;
    Ok(Json(event_response(row)?))
}

/// The transition is validated against a fresh read, then applied with a
/// compare-and-set, so a stale client-held status can never drive it.
pub(crate) async fn apply_status_change(
    db: &Arc<Database>,
    event_id: Uuid,
    host_id: Uuid,
    next: EventStatus,
) -> ApiResult<EventRow> {
    let fetch = db.clone();
    let row = tokio::task::spawn_blocking(move || fetch.get_event_by_id(&event_id.to_string()))
        .await??
        .ok_or(ApiError::NotFound)?;

    if row.host_id != host_id.to_string() {
        return Err(ApiError::Unauthorized);
    }

    let current = EventStatus::parse(&row.status)
        .ok_or_else(|| anyhow::anyhow!("unknown status '{}' on event {}", row.status, row.id))?;
    if !current.can_transition_to(next) {
        return Err(ApiError::State(format!(
            "cannot move a {} event to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let cas = db.clone();
    let moved = tokio::task::spawn_blocking(move || {
        cas.update_event_status(&event_id.to_string(), current.as_str(), next.as_str())
    })
    .await??;
    if !moved {
        return Err(ApiError::State(
            "event status changed concurrently, reload and retry".into(),
        ));
    }

    let reread = db.clone();
    tokio::task::spawn_blocking(move || reread.get_event_by_id(&event_id.to_string()))
        .await??
        .ok_or(ApiError::NotFound)
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<EventResponse>> {
    let row = apply_status_change(&state.db, event_id, claims.sub, req.status).await?;
    info!(
        "Host {} moved event {} to {}",
        claims.sub, event_id, row.status
    );
    Ok(Json(event_response(row)?))
}

/// The dashboard surfaces only the most recent event.
pub async fn latest_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Option<EventResponse>>> {
    let db = state.db.clone();
    let host_id = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || db.latest_event_for_host(&host_id)).await??;
    Ok(Json(row.map(event_response).transpose()?))
}
