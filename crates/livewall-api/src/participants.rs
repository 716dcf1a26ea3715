use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use livewall_db::Database;
use livewall_db::models::ParticipantRow;
use livewall_db::parse_timestamp;
use livewall_types::api::{ConsentDecl, JoinRequest, ParticipantResponse};
use livewall_types::events::ChangeEvent;
use livewall_types::models::{EventStatus, Role};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Idempotent join: the first call for an `(event, profile)` pair inserts a
/// participant row, every later call returns that same row unchanged. The
/// returned flag says whether this call created it.
pub(crate) async fn join_event(
    db: &Arc<Database>,
    event_id: Uuid,
    profile_id: Uuid,
) -> ApiResult<(ParticipantRow, bool)> {
    let lookup = db.clone();
    let (event, existing) = tokio::task::spawn_blocking(move || {
        let event = lookup.get_event_by_id(&event_id.to_string())?;
        let existing = lookup.find_participant(&event_id.to_string(), &profile_id.to_string())?;
        anyhow::Ok((event, existing))
    })
    .await??;

    let event = event.ok_or(ApiError::NotFound)?;
    match EventStatus::parse(&event.status) {
        Some(EventStatus::Active) => {}
        Some(EventStatus::Pending) => {
            return Err(ApiError::State("event has not started yet".into()));
        }
        Some(EventStatus::Finished) => {
            return Err(ApiError::State("event has finished".into()));
        }
        None => {
            return Err(ApiError::Database(anyhow::anyhow!(
                "unknown status '{}' on event {}",
                event.status,
                event.id
            )));
        }
    }

    if let Some(row) = existing {
        return Ok((row, false));
    }

    let insert = db.clone();
    let row = tokio::task::spawn_blocking(move || {
        insert.insert_participant(
            &Uuid::new_v4().to_string(),
            &event_id.to_string(),
            &profile_id.to_string(),
            Role::Attendee.as_str(),
        )
    })
    .await?
    .map_err(|e| ApiError::Join(format!("participant insert rejected: {}", e)))?;

    Ok((row, true))
}

/// Best-effort consent persistence. Failures are logged and swallowed — a
/// lost consent write never aborts the join that carried it.
async fn persist_consents(
    db: &Arc<Database>,
    profile_id: Uuid,
    event_id: Uuid,
    consents: Vec<ConsentDecl>,
) {
    for decl in consents {
        let db = db.clone();
        let scope = decl
            .consent_type
            .is_event_scoped()
            .then(|| event_id.to_string());
        let outcome = tokio::task::spawn_blocking(move || {
            db.replace_consent(
                &Uuid::new_v4().to_string(),
                &profile_id.to_string(),
                scope.as_deref(),
                decl.consent_type.as_str(),
                decl.consented,
            )
        })
        .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                "Recording {} consent for {} failed: {}",
                decl.consent_type.as_str(),
                profile_id,
                e
            ),
            Err(e) => warn!("Consent task for {} failed: {}", profile_id, e),
        }
    }
}

fn participant_response(row: ParticipantRow) -> ApiResult<ParticipantResponse> {
    let role = Role::parse(&row.role)
        .ok_or_else(|| anyhow::anyhow!("unknown role '{}' on participant {}", row.role, row.id))?;
    Ok(ParticipantResponse {
        id: row.id.parse().map_err(anyhow::Error::from)?,
        event_id: row.event_id.parse().map_err(anyhow::Error::from)?,
        profile_id: row.profile_id.parse().map_err(anyhow::Error::from)?,
        role,
        joined_at: parse_timestamp(&row.joined_at),
    })
}

pub async fn join(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<JoinRequest>,
) -> ApiResult<impl IntoResponse> {
    let lookup = state.db.clone();
    let profile_key = req.profile_id.to_string();
    let profile = tokio::task::spawn_blocking(move || lookup.get_profile(&profile_key)).await??;
    if profile.is_none() {
        return Err(ApiError::Join("unknown profile".into()));
    }

    let (row, created) = join_event(&state.db, event_id, req.profile_id).await?;

    if created {
        // Consents ride along on first join only.
        persist_consents(&state.db, req.profile_id, event_id, req.consents).await;

        state.dispatcher.broadcast(ChangeEvent::ParticipantJoined {
            id: row.id.parse().map_err(anyhow::Error::from)?,
            event_id,
            profile_id: req.profile_id,
        });
        info!("Profile {} joined event {}", req.profile_id, event_id);
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(participant_response(row)?)))
}
