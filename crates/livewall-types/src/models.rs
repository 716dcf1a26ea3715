use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an event. Only the host moves an event between states,
/// and only along the transitions in [`EventStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Active,
    Finished,
}

impl EventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    /// Allowed transitions: start, pause, end, restart.
    /// There is deliberately no `pending -> finished` path.
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Pending)
                | (Self::Active, Self::Finished)
                | (Self::Finished, Self::Active)
        )
    }
}

/// Visual theme of an event. The server only stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventMode {
    General,
    Birthday,
    Party,
}

impl EventMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Birthday => "birthday",
            Self::Party => "party",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "birthday" => Some(Self::Birthday),
            "party" => Some(Self::Party),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Attendee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Attendee => "attendee",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "host" => Some(Self::Host),
            "attendee" => Some(Self::Attendee),
            _ => None,
        }
    }
}

/// What a note carries. The wire shape is the flat
/// `{content_type, content_data}` pair the feed clients expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content_type", content = "content_data", rename_all = "lowercase")]
pub enum NoteContent {
    Text(String),
    Image(String),
    Emotion(String),
}

impl NoteContent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Emotion(_) => "emotion",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            Self::Text(s) | Self::Image(s) | Self::Emotion(s) => s,
        }
    }

    pub fn from_parts(kind: &str, data: String) -> Option<Self> {
        match kind {
            "text" => Some(Self::Text(data)),
            "image" => Some(Self::Image(data)),
            "emotion" => Some(Self::Emotion(data)),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    Gdpr,
    Policy,
    Cookie,
    EventDataSharing,
}

impl ConsentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gdpr => "gdpr",
            Self::Policy => "policy",
            Self::Cookie => "cookie",
            Self::EventDataSharing => "event_data_sharing",
        }
    }

    /// Event-data-sharing consent is scoped to one event; the rest are global
    /// per profile.
    pub fn is_event_scoped(self) -> bool {
        matches!(self, Self::EventDataSharing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub event_code: String,
    pub event_mode: EventMode,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub event_id: Uuid,
    pub profile_id: Uuid,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}
