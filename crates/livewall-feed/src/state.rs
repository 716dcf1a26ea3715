use std::collections::HashSet;

use uuid::Uuid;

use livewall_types::api::{FeedSnapshot, FeedStats, NoteWithAuthor};

/// The in-memory feed for one open event view.
///
/// All mutations are idempotent and order-tolerant: a backfill and a stream of
/// change events touching the same rows converge to the same list no matter
/// how they interleave. Deleted note ids are tombstoned so a backfill read
/// before the delete cannot resurrect the row.
pub struct FeedState {
    viewer: Uuid,
    notes: Vec<NoteWithAuthor>,
    deleted: HashSet<Uuid>,
    stats: FeedStats,
}

impl FeedState {
    pub fn new(viewer: Uuid) -> Self {
        Self {
            viewer,
            notes: Vec::new(),
            deleted: HashSet::new(),
            stats: FeedStats::default(),
        }
    }

    pub fn notes(&self) -> &[NoteWithAuthor] {
        &self.notes
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            notes: self.notes.clone(),
            stats: self.stats,
        }
    }

    /// Merge a full-list fetch into local state, keyed by note id. Never a
    /// blind overwrite: rows already removed locally stay removed, rows we
    /// already hold are patched, and like counts keep whichever side has seen
    /// more. The viewer's own like flag keeps the local value — the viewer is
    /// the only writer of that bit and local knowledge is newer.
    pub fn merge_backfill(&mut self, rows: Vec<NoteWithAuthor>) {
        for row in rows {
            if self.deleted.contains(&row.id) {
                continue;
            }
            match self.notes.iter_mut().find(|n| n.id == row.id) {
                Some(existing) => {
                    existing.username = row.username;
                    existing.content = row.content;
                    existing.is_favorited = row.is_favorited;
                    existing.like_count = existing.like_count.max(row.like_count);
                }
                None => self.notes.push(row),
            }
        }
        self.rebuild();
    }

    /// Apply an inserted note fetched after its change notification. A
    /// duplicate id (the backfill raced ahead) or a tombstoned id is a no-op.
    pub fn insert_note(&mut self, note: NoteWithAuthor) {
        if self.deleted.contains(&note.id) || self.notes.iter().any(|n| n.id == note.id) {
            return;
        }
        self.notes.insert(0, note);
        self.rebuild();
    }

    /// Only `is_favorited` ever changes on a stored note; patch it and
    /// re-sort, since favorites reorder the feed. Unknown ids are ignored.
    pub fn set_favorited(&mut self, id: Uuid, is_favorited: bool) {
        if let Some(note) = self.notes.iter_mut().find(|n| n.id == id) {
            note.is_favorited = is_favorited;
            self.rebuild();
        }
    }

    /// Remove a note and tombstone its id. Absent ids are fine — the actor's
    /// own optimistic delete may have beaten the change event here.
    pub fn remove_note(&mut self, id: Uuid) {
        self.deleted.insert(id);
        self.notes.retain(|n| n.id != id);
        self.rebuild();
    }

    pub fn apply_like(&mut self, note_id: Uuid, participant_id: Uuid) {
        if let Some(note) = self.notes.iter_mut().find(|n| n.id == note_id) {
            note.like_count += 1;
            if participant_id == self.viewer {
                note.liked_by_viewer = true;
            }
            self.rebuild();
        }
    }

    /// Floored at zero: a like-delete delivered before its like-insert must
    /// not push the count negative.
    pub fn remove_like(&mut self, note_id: Uuid, participant_id: Uuid) {
        if let Some(note) = self.notes.iter_mut().find(|n| n.id == note_id) {
            note.like_count = note.like_count.saturating_sub(1);
            if participant_id == self.viewer {
                note.liked_by_viewer = false;
            }
            self.rebuild();
        }
    }

    /// Sort favorited-first then newest-first (stable, so equal timestamps
    /// keep arrival order), and recompute the derived aggregates.
    fn rebuild(&mut self) {
        self.notes.sort_by(|a, b| {
            b.is_favorited
                .cmp(&a.is_favorited)
                .then(b.created_at.cmp(&a.created_at))
        });
        self.stats = FeedStats {
            total_messages: self.notes.len(),
            total_likes: self.notes.iter().map(|n| u64::from(n.like_count)).sum(),
            image_messages: self.notes.iter().filter(|n| n.content.is_image()).count(),
        };
    }
}
