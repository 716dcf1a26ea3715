pub mod source;
pub mod state;

pub use source::NoteSource;
pub use state::FeedState;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use livewall_types::api::FeedSnapshot;
use livewall_types::events::ChangeEvent;

/// How many notes the baseline fetch pulls.
pub const BACKFILL_LIMIT: u32 = 50;

/// A live, ordered view of one event's notes.
///
/// Spawning a view opens exactly one change subscription (the receiver passed
/// in — created *before* the worker starts, so nothing published during the
/// baseline fetch is missed) and a worker task that owns the [`FeedState`].
/// Every applied mutation publishes a fresh [`FeedSnapshot`] through a watch
/// channel. Dropping or closing the view cancels the worker; results of
/// fetches still in flight at that point are discarded, not applied.
pub struct FeedView {
    snapshot_rx: watch::Receiver<FeedSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl FeedView {
    pub fn spawn<S: NoteSource>(
        event_id: Uuid,
        viewer: Uuid,
        source: S,
        changes: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(FeedSnapshot::default());

        let worker = Worker {
            event_id,
            state: FeedState::new(viewer),
            source,
            changes,
            snapshot_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        Self {
            snapshot_rx,
            cancel,
            task: Some(task),
        }
    }

    /// Current feed contents and stats.
    pub fn snapshot(&self) -> FeedSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// A receiver that resolves whenever the feed changes.
    pub fn watch(&self) -> watch::Receiver<FeedSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Tear the view down and wait for the worker to stop.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FeedView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker<S: NoteSource> {
    event_id: Uuid,
    state: FeedState,
    source: S,
    changes: broadcast::Receiver<ChangeEvent>,
    snapshot_tx: watch::Sender<FeedSnapshot>,
    cancel: CancellationToken,
}

impl<S: NoteSource> Worker<S> {
    async fn run(mut self) {
        // Baseline. The subscription is already open, so this is a merge, not
        // an overwrite: change events applied before or after it converge to
        // the same list.
        self.resync().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.changes.recv() => match result {
                    Ok(change) => self.apply(change).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Feed view for event {} lagged by {} changes, resyncing", self.event_id, n);
                        self.resync().await;
                    }
                    // Transport gone; the surrounding connection decides
                    // whether to reopen a view. No automatic resubscribe.
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    async fn apply(&mut self, change: ChangeEvent) {
        // Scoped changes for other events are dropped up front; like changes
        // carry no scope and are resolved below.
        if let Some(scope) = change.event_id() {
            if scope != self.event_id {
                return;
            }
        }

        match change {
            ChangeEvent::NoteCreated { id, .. } => {
                let fetched = self.source.fetch_note(id).await;
                if self.cancel.is_cancelled() {
                    return;
                }
                match fetched {
                    Ok(Some(note)) => {
                        self.state.insert_note(note);
                        self.publish();
                    }
                    // Deleted again before we got to it; nothing to show.
                    Ok(None) => {}
                    Err(e) => {
                        // Dropped, not retried; the next resync heals it.
                        warn!("Fetch for inserted note {} failed: {}", id, e);
                    }
                }
            }
            ChangeEvent::NoteUpdated {
                id, is_favorited, ..
            } => {
                self.state.set_favorited(id, is_favorited);
                self.publish();
            }
            ChangeEvent::NoteDeleted { id, .. } => {
                self.state.remove_note(id);
                self.publish();
            }
            ChangeEvent::LikeCreated {
                note_id,
                participant_id,
            } => {
                if self.like_in_scope(note_id).await {
                    self.state.apply_like(note_id, participant_id);
                    self.publish();
                }
            }
            ChangeEvent::LikeDeleted {
                note_id,
                participant_id,
            } => {
                if self.like_in_scope(note_id).await {
                    self.state.remove_like(note_id, participant_id);
                    self.publish();
                }
            }
            // Presence and announcements are the connection layer's concern.
            ChangeEvent::ParticipantJoined { .. } | ChangeEvent::Announcement { .. } => {}
        }
    }

    /// Resolve the owning event of a liked note. Misses (note already
    /// deleted), mismatches, and lookup failures all discard the change.
    async fn like_in_scope(&mut self, note_id: Uuid) -> bool {
        let resolved = self.source.note_event_id(note_id).await;
        if self.cancel.is_cancelled() {
            return false;
        }
        match resolved {
            Ok(Some(event_id)) => event_id == self.event_id,
            Ok(None) => false,
            Err(e) => {
                warn!("Scope lookup for liked note {} failed: {}", note_id, e);
                false
            }
        }
    }

    async fn resync(&mut self) {
        match self.source.list_notes(self.event_id, BACKFILL_LIMIT).await {
            Ok(rows) => {
                if self.cancel.is_cancelled() {
                    return;
                }
                self.state.merge_backfill(rows);
                self.publish();
            }
            Err(e) => {
                warn!("Feed backfill for event {} failed: {}", self.event_id, e);
            }
        }
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.state.snapshot());
    }
}
