use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;
use uuid::Uuid;

use livewall_db::models::NoteRow;
use livewall_db::{Database, parse_timestamp};
use livewall_feed::NoteSource;
use livewall_types::api::NoteWithAuthor;
use livewall_types::models::NoteContent;

/// [`NoteSource`] backed by the SQLite store. Every query hops off the async
/// runtime via `spawn_blocking`.
#[derive(Clone)]
pub struct DbNoteSource {
    db: Arc<Database>,
    viewer: Uuid,
}

impl DbNoteSource {
    /// `viewer` is the participant whose own likes show up as
    /// `liked_by_viewer`. Pass `Uuid::nil()` for viewerless reads.
    pub fn new(db: Arc<Database>, viewer: Uuid) -> Self {
        Self { db, viewer }
    }
}

impl NoteSource for DbNoteSource {
    async fn list_notes(&self, event_id: Uuid, limit: u32) -> Result<Vec<NoteWithAuthor>> {
        let db = self.db.clone();
        let viewer = self.viewer.to_string();
        tokio::task::spawn_blocking(move || {
            let rows = db.list_notes_for_event(&event_id.to_string(), limit)?;

            let note_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            let likes = db.likes_for_notes(&note_ids)?;

            // Group likes by note: count plus whether the viewer is among them.
            let mut like_map: HashMap<String, (u32, bool)> = HashMap::new();
            for like in &likes {
                let entry = like_map.entry(like.note_id.clone()).or_default();
                entry.0 += 1;
                if like.participant_id == viewer {
                    entry.1 = true;
                }
            }

            Ok(rows
                .into_iter()
                .filter_map(|row| {
                    let (like_count, liked_by_viewer) =
                        like_map.get(&row.id).copied().unwrap_or((0, false));
                    note_from_row(row, like_count, liked_by_viewer)
                })
                .collect())
        })
        .await?
    }

    async fn fetch_note(&self, note_id: Uuid) -> Result<Option<NoteWithAuthor>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let row = db.get_note_with_author(&note_id.to_string())?;
            Ok(row.and_then(|r| note_from_row(r, 0, false)))
        })
        .await?
    }

    async fn note_event_id(&self, note_id: Uuid) -> Result<Option<Uuid>> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let event_id = db.note_event_id(&note_id.to_string())?;
            Ok(event_id.and_then(|id| id.parse().ok()))
        })
        .await?
    }
}

/// Convert a joined note row into the API shape. Rows with an unknown content
/// tag or corrupt ids are logged and skipped rather than shown mangled.
pub fn note_from_row(
    row: NoteRow,
    like_count: u32,
    liked_by_viewer: bool,
) -> Option<NoteWithAuthor> {
    let Some(content) = NoteContent::from_parts(&row.content_type, row.content_data) else {
        warn!("Unknown content type '{}' on note {}", row.content_type, row.id);
        return None;
    };

    let parse_id = |raw: &str, what: &str| -> Option<Uuid> {
        raw.parse().ok().or_else(|| {
            warn!("Corrupt {} '{}' on note {}", what, raw, row.id);
            None
        })
    };

    Some(NoteWithAuthor {
        id: parse_id(&row.id, "id")?,
        event_id: parse_id(&row.event_id, "event_id")?,
        participant_id: parse_id(&row.participant_id, "participant_id")?,
        username: row.author_username,
        content,
        created_at: parse_timestamp(&row.created_at),
        is_favorited: row.is_favorited,
        like_count,
        liked_by_viewer,
    })
}
