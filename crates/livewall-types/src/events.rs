use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::FeedSnapshot;

/// Row-level change notifications fanned out to every feed subscriber.
///
/// Note events carry the scope key plus the row id only; subscribers fetch the
/// full row themselves. Like events carry no event id at all — the affected
/// note's event must be resolved by the subscriber before the event is applied
/// or discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    NoteCreated {
        id: Uuid,
        event_id: Uuid,
    },
    NoteUpdated {
        id: Uuid,
        event_id: Uuid,
        is_favorited: bool,
    },
    NoteDeleted {
        id: Uuid,
        event_id: Uuid,
    },
    LikeCreated {
        note_id: Uuid,
        participant_id: Uuid,
    },
    LikeDeleted {
        note_id: Uuid,
        participant_id: Uuid,
    },
    ParticipantJoined {
        id: Uuid,
        event_id: Uuid,
        profile_id: Uuid,
    },
    /// Ephemeral host broadcast, scoped by event code and never persisted.
    Announcement {
        event_code: String,
        message: String,
    },
}

impl ChangeEvent {
    /// Returns the event id if this change is scoped to one event.
    /// Like changes return `None`: their scope must be resolved by lookup.
    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            Self::NoteCreated { event_id, .. }
            | Self::NoteUpdated { event_id, .. }
            | Self::NoteDeleted { event_id, .. }
            | Self::ParticipantJoined { event_id, .. } => Some(*event_id),
            Self::LikeCreated { .. } | Self::LikeDeleted { .. } | Self::Announcement { .. } => None,
        }
    }
}

/// Events sent over the WebSocket gateway to a subscribed viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Subscription accepted; the first `Feed` follows immediately.
    Ready {
        event_id: Uuid,
        participant_id: Uuid,
    },

    /// The viewer's current feed after a mutation was applied.
    Feed(FeedSnapshot),

    /// One-shot host announcement.
    Announcement { message: String },

    /// Someone else joined the event.
    ParticipantJoined { username: String },

    /// Subscription rejected; the server closes the socket after sending this.
    SubscriptionError { message: String },
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Attach this connection to one event's live feed.
    Subscribe {
        event_code: String,
        participant_id: Uuid,
    },
}
