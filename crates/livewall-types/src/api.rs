use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConsentKind, EventMode, EventStatus, NoteContent, Role};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the host-only handlers.
/// Canonical definition lives here to keep the two in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Host auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub host_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub host_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Profiles --

/// Anonymous attendees mint their own id client-side and keep it on-device;
/// re-joining with a known id renames the profile instead of creating one.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub id: Option<Uuid>,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
}

// -- Events --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEventRequest {
    pub title: String,
    pub event_mode: EventMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub event_code: String,
    pub event_mode: EventMode,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    /// Path attendees open (and QR codes encode) to reach the event.
    pub join_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatusRequest {
    pub status: EventStatus,
}

// -- Participants --

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ConsentDecl {
    pub consent_type: ConsentKind,
    pub consented: bool,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub profile_id: Uuid,
    #[serde(default)]
    pub consents: Vec<ConsentDecl>,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub id: Uuid,
    pub event_id: Uuid,
    pub profile_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

// -- Notes --

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub participant_id: Uuid,
    #[serde(flatten)]
    pub content: NoteContent,
}

/// A feed entry with its author resolved and like state aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteWithAuthor {
    pub id: Uuid,
    pub event_id: Uuid,
    pub participant_id: Uuid,
    pub username: String,
    #[serde(flatten)]
    pub content: NoteContent,
    pub created_at: DateTime<Utc>,
    pub is_favorited: bool,
    pub like_count: u32,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FavoriteRequest {
    pub is_favorited: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleLikeRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub liked: bool,
}

// -- Feed --

/// Aggregates recomputed from the local feed after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub total_messages: usize,
    pub total_likes: u64,
    pub image_messages: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub notes: Vec<NoteWithAuthor>,
    pub stats: FeedStats,
}

// -- Announcements --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnouncementRequest {
    pub message: String,
}

// -- Media --

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}
