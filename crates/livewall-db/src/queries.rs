use crate::Database;
use crate::models::{EventRow, HostRow, LikeRow, NoteRow, ParticipantRow, ProfileRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Hosts --

    pub fn create_host(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO hosts (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_host_by_username(&self, username: &str) -> Result<Option<HostRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, username, password, created_at FROM hosts WHERE username = ?1",
                )?
                .query_row([username], |row| {
                    Ok(HostRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Profiles --

    /// Insert a profile, or rename it in place when the id is already known.
    /// Re-joining with a new name updates the existing row; it never forks a
    /// second identity for the same device.
    pub fn upsert_profile(&self, id: &str, username: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, username) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET username = excluded.username",
                (id, username),
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare("SELECT id, username, created_at FROM profiles WHERE id = ?1")?
                .query_row([id], |row| {
                    Ok(ProfileRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Events --

    /// Insert a new event. A duplicate `event_code` trips the UNIQUE
    /// constraint and surfaces here as an error; that constraint is the final
    /// backstop for the code-generation race.
    pub fn insert_event(
        &self,
        id: &str,
        host_id: &str,
        title: &str,
        event_code: &str,
        event_mode: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (id, host_id, title, event_code, event_mode, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                (id, host_id, title, event_code, event_mode),
            )?;
            Ok(())
        })
    }

    pub fn event_code_exists(&self, event_code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM events WHERE event_code = ?1",
                    [event_code],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn get_event_by_code(&self, event_code: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, "event_code", event_code))
    }

    pub fn get_event_by_id(&self, id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, "id", id))
    }

    /// The dashboard surfaces only the host's most recent event.
    pub fn latest_event_for_host(&self, host_id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, host_id, title, event_code, event_mode, status, created_at
                     FROM events WHERE host_id = ?1
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1",
                )?
                .query_row([host_id], map_event_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Compare-and-set status update: the transition only lands if the stored
    /// status still equals the one the caller just read. Returns false when a
    /// concurrent transition won.
    pub fn update_event_status(&self, id: &str, from: &str, to: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE events SET status = ?1 WHERE id = ?2 AND status = ?3",
                (to, id, from),
            )?;
            Ok(changed == 1)
        })
    }

    // -- Participants --

    pub fn find_participant(
        &self,
        event_id: &str,
        profile_id: &str,
    ) -> Result<Option<ParticipantRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, event_id, profile_id, role, joined_at
                     FROM participants WHERE event_id = ?1 AND profile_id = ?2",
                )?
                .query_row([event_id, profile_id], map_participant_row)
                .optional()?;
            Ok(row)
        })
    }

    pub fn insert_participant(
        &self,
        id: &str,
        event_id: &str,
        profile_id: &str,
        role: &str,
    ) -> Result<ParticipantRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO participants (id, event_id, profile_id, role)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, event_id, profile_id, role),
            )?;
            let row = conn
                .prepare(
                    "SELECT id, event_id, profile_id, role, joined_at
                     FROM participants WHERE id = ?1",
                )?
                .query_row([id], map_participant_row)?;
            Ok(row)
        })
    }

    pub fn get_participant(&self, id: &str) -> Result<Option<ParticipantRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, event_id, profile_id, role, joined_at
                     FROM participants WHERE id = ?1",
                )?
                .query_row([id], map_participant_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Resolve a participant to their display name, for join notices.
    pub fn get_participant_username(&self, participant_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let username = conn
                .query_row(
                    "SELECT pr.username FROM participants p
                     JOIN profiles pr ON p.profile_id = pr.id
                     WHERE p.id = ?1",
                    [participant_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(username)
        })
    }

    // -- Notes --

    pub fn insert_note(
        &self,
        id: &str,
        event_id: &str,
        participant_id: &str,
        content_type: &str,
        content_data: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notes (id, event_id, participant_id, content_type, content_data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (id, event_id, participant_id, content_type, content_data, created_at),
            )?;
            Ok(())
        })
    }

    /// Fetch one note with its author resolved through participant -> profile.
    pub fn get_note_with_author(&self, id: &str) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("{NOTE_SELECT} WHERE n.id = ?1"))?
                .query_row([id], map_note_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Backfill query: favorited notes first, newest first within each tier.
    pub fn list_notes_for_event(&self, event_id: &str, limit: u32) -> Result<Vec<NoteRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{NOTE_SELECT}
                 WHERE n.event_id = ?1
                 ORDER BY n.is_favorited DESC, n.created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![event_id, limit], map_note_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Scope resolution for like changes, which carry no event id.
    pub fn note_event_id(&self, note_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let event_id = conn
                .query_row(
                    "SELECT event_id FROM notes WHERE id = ?1",
                    [note_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(event_id)
        })
    }

    pub fn set_note_favorited(&self, id: &str, is_favorited: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notes SET is_favorited = ?1 WHERE id = ?2",
                (is_favorited, id),
            )?;
            Ok(changed == 1)
        })
    }

    /// Delete a note; its likes go with it via ON DELETE CASCADE.
    pub fn delete_note(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM notes WHERE id = ?1", [id])?;
            Ok(changed == 1)
        })
    }

    // -- Likes --

    /// Toggle a like: removes if present, inserts if not.
    /// Returns true when the like was inserted, false when removed.
    pub fn toggle_like(&self, id: &str, note_id: &str, participant_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM note_likes WHERE note_id = ?1 AND participant_id = ?2",
                    [note_id, participant_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                conn.execute("DELETE FROM note_likes WHERE id = ?1", [&existing_id])?;
                Ok(false)
            } else {
                conn.execute(
                    "INSERT INTO note_likes (id, note_id, participant_id) VALUES (?1, ?2, ?3)",
                    (id, note_id, participant_id),
                )?;
                Ok(true)
            }
        })
    }

    /// Batch-fetch likes for a set of note IDs; counts and viewer flags are
    /// grouped by the caller.
    pub fn likes_for_notes(&self, note_ids: &[String]) -> Result<Vec<LikeRow>> {
        if note_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=note_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT note_id, participant_id FROM note_likes WHERE note_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = note_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(LikeRow {
                        note_id: row.get(0)?,
                        participant_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Consents --

    /// Upsert by delete-then-insert: the scope key is nullable, so a plain
    /// UNIQUE upsert cannot express it. Not transactional across the two
    /// statements.
    pub fn replace_consent(
        &self,
        id: &str,
        profile_id: &str,
        event_id: Option<&str>,
        consent_type: &str,
        consented: bool,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM consents
                 WHERE profile_id = ?1 AND consent_type = ?2 AND event_id IS ?3",
                rusqlite::params![profile_id, consent_type, event_id],
            )?;
            conn.execute(
                "INSERT INTO consents (id, profile_id, event_id, consent_type, consented)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, profile_id, event_id, consent_type, consented],
            )?;
            Ok(())
        })
    }
}

const NOTE_SELECT: &str = "SELECT n.id, n.event_id, n.participant_id, pr.username,
            n.content_type, n.content_data, n.is_favorited, n.created_at
     FROM notes n
     JOIN participants p ON n.participant_id = p.id
     JOIN profiles pr ON p.profile_id = pr.id";

fn map_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        participant_id: row.get(2)?,
        author_username: row.get(3)?,
        content_type: row.get(4)?,
        content_data: row.get(5)?,
        is_favorited: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        host_id: row.get(1)?,
        title: row.get(2)?,
        event_code: row.get(3)?,
        event_mode: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_participant_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParticipantRow> {
    Ok(ParticipantRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        profile_id: row.get(2)?,
        role: row.get(3)?,
        joined_at: row.get(4)?,
    })
}

fn query_event(conn: &Connection, column: &str, value: &str) -> Result<Option<EventRow>> {
    let row = conn
        .prepare(&format!(
            "SELECT id, host_id, title, event_code, event_mode, status, created_at
             FROM events WHERE {column} = ?1"
        ))?
        .query_row([value], map_event_row)
        .optional()?;
    Ok(row)
}
