/// Database row types — these map directly to SQLite rows.
/// Distinct from the livewall-types API models to keep the DB layer
/// independent.

pub struct HostRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct EventRow {
    pub id: String,
    pub host_id: String,
    pub title: String,
    pub event_code: String,
    pub event_mode: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug)]
pub struct ParticipantRow {
    pub id: String,
    pub event_id: String,
    pub profile_id: String,
    pub role: String,
    pub joined_at: String,
}

pub struct NoteRow {
    pub id: String,
    pub event_id: String,
    pub participant_id: String,
    pub author_username: String,
    pub content_type: String,
    pub content_data: String,
    pub is_favorited: bool,
    pub created_at: String,
}

pub struct LikeRow {
    pub note_id: String,
    pub participant_id: String,
}
