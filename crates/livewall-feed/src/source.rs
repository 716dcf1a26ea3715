use std::future::Future;

use anyhow::Result;
use uuid::Uuid;

use livewall_types::api::NoteWithAuthor;

/// Read side of the store that a feed view issues its fetches against.
///
/// Change notifications carry key columns only, so the view pulls full rows
/// itself: the baseline list on open, one row per inserted note, and the
/// owning event of a note when a like change has to be scoped.
pub trait NoteSource: Send + Sync + 'static {
    /// Baseline fetch: notes for one event, favorited first then newest
    /// first, with like counts and the viewer's own like state resolved.
    fn list_notes(
        &self,
        event_id: Uuid,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<NoteWithAuthor>>> + Send;

    /// Fetch one note with its author joined in. Like state defaults to
    /// zero/false — a freshly inserted note has no likes yet, and any that
    /// raced ahead are recovered on the next resync.
    fn fetch_note(
        &self,
        note_id: Uuid,
    ) -> impl Future<Output = Result<Option<NoteWithAuthor>>> + Send;

    /// Resolve which event a note belongs to. `None` when the note is gone,
    /// which makes stray like changes for deleted notes discardable.
    fn note_event_id(&self, note_id: Uuid) -> impl Future<Output = Result<Option<Uuid>>> + Send;
}
