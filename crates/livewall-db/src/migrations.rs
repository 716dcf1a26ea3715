use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS hosts (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS profiles (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS events (
            id          TEXT PRIMARY KEY,
            host_id     TEXT NOT NULL REFERENCES hosts(id),
            title       TEXT NOT NULL,
            event_code  TEXT NOT NULL UNIQUE,
            event_mode  TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_events_host
            ON events(host_id, created_at);

        CREATE TABLE IF NOT EXISTS participants (
            id          TEXT PRIMARY KEY,
            event_id    TEXT NOT NULL REFERENCES events(id),
            profile_id  TEXT NOT NULL REFERENCES profiles(id),
            role        TEXT NOT NULL DEFAULT 'attendee',
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(event_id, profile_id)
        );

        CREATE TABLE IF NOT EXISTS notes (
            id              TEXT PRIMARY KEY,
            event_id        TEXT NOT NULL REFERENCES events(id),
            participant_id  TEXT NOT NULL REFERENCES participants(id),
            content_type    TEXT NOT NULL,
            content_data    TEXT NOT NULL,
            is_favorited    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notes_event
            ON notes(event_id, is_favorited, created_at);

        CREATE TABLE IF NOT EXISTS note_likes (
            id              TEXT PRIMARY KEY,
            note_id         TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
            participant_id  TEXT NOT NULL REFERENCES participants(id),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(note_id, participant_id)
        );

        CREATE INDEX IF NOT EXISTS idx_note_likes_note
            ON note_likes(note_id);

        -- event_id is NULL for the global consent kinds, so the logical key
        -- (profile_id, consent_type, event_id) is maintained by the writer.
        CREATE TABLE IF NOT EXISTS consents (
            id            TEXT PRIMARY KEY,
            profile_id    TEXT NOT NULL REFERENCES profiles(id),
            event_id      TEXT REFERENCES events(id),
            consent_type  TEXT NOT NULL,
            consented     INTEGER NOT NULL,
            consented_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_consents_profile
            ON consents(profile_id, consent_type);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
