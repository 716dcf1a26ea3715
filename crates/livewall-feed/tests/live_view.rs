//! Worker-level behavior of [`FeedView`]: secondary fetches, scope filtering
//! of like changes, and teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use livewall_feed::{FeedView, NoteSource};
use livewall_types::api::{FeedSnapshot, NoteWithAuthor};
use livewall_types::events::ChangeEvent;
use livewall_types::models::NoteContent;

/// Store stand-in. Fetches resolve against whatever rows are currently held,
/// the way the real store answers a corrective fetch.
#[derive(Clone, Default)]
struct StubSource {
    rows: Arc<Mutex<HashMap<Uuid, NoteWithAuthor>>>,
}

impl StubSource {
    fn put(&self, note: NoteWithAuthor) {
        self.rows.lock().unwrap().insert(note.id, note);
    }

    fn remove(&self, id: Uuid) {
        self.rows.lock().unwrap().remove(&id);
    }
}

impl NoteSource for StubSource {
    async fn list_notes(&self, event_id: Uuid, _limit: u32) -> Result<Vec<NoteWithAuthor>> {
        let rows = self.rows.lock().unwrap();
        let mut notes: Vec<NoteWithAuthor> = rows
            .values()
            .filter(|n| n.event_id == event_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| {
            b.is_favorited
                .cmp(&a.is_favorited)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(notes)
    }

    async fn fetch_note(&self, note_id: Uuid) -> Result<Option<NoteWithAuthor>> {
        Ok(self.rows.lock().unwrap().get(&note_id).cloned().map(|mut n| {
            n.like_count = 0;
            n.liked_by_viewer = false;
            n
        }))
    }

    async fn note_event_id(&self, note_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.rows.lock().unwrap().get(&note_id).map(|n| n.event_id))
    }
}

fn note(event_id: Uuid, secs: i64) -> NoteWithAuthor {
    NoteWithAuthor {
        id: Uuid::new_v4(),
        event_id,
        participant_id: Uuid::new_v4(),
        username: "ada".to_string(),
        content: NoteContent::Text("hello".to_string()),
        created_at: Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(secs),
        is_favorited: false,
        like_count: 0,
        liked_by_viewer: false,
    }
}

async fn wait_until<F>(rx: &mut watch::Receiver<FeedSnapshot>, mut pred: F) -> FeedSnapshot
where
    F: FnMut(&FeedSnapshot) -> bool,
{
    let deadline = Duration::from_secs(2);
    loop {
        {
            let current = rx.borrow();
            if pred(&current) {
                return current.clone();
            }
        }
        tokio::time::timeout(deadline, rx.changed())
            .await
            .expect("feed view went quiet before the expected state")
            .expect("feed view dropped its snapshot channel");
    }
}

#[tokio::test]
async fn inserted_note_is_fetched_and_applied() {
    let event_id = Uuid::new_v4();
    let source = StubSource::default();
    let (tx, rx) = broadcast::channel(64);

    let view = FeedView::spawn(event_id, Uuid::new_v4(), source.clone(), rx);
    let mut watch_rx = view.watch();

    let n = note(event_id, 5);
    source.put(n.clone());
    tx.send(ChangeEvent::NoteCreated {
        id: n.id,
        event_id,
    })
    .unwrap();

    let snapshot = wait_until(&mut watch_rx, |s| s.stats.total_messages == 1).await;
    assert_eq!(snapshot.notes[0].id, n.id);
    assert_eq!(snapshot.notes[0].like_count, 0);

    view.close().await;
}

#[tokio::test]
async fn backfill_race_yields_a_single_entry() {
    let event_id = Uuid::new_v4();
    let source = StubSource::default();
    let n = note(event_id, 5);
    source.put(n.clone());

    let (tx, rx) = broadcast::channel(64);
    // The change notification is already queued when the view opens, so it is
    // processed alongside the backfill that also returns the row.
    tx.send(ChangeEvent::NoteCreated {
        id: n.id,
        event_id,
    })
    .unwrap();

    let view = FeedView::spawn(event_id, Uuid::new_v4(), source.clone(), rx);
    let mut watch_rx = view.watch();

    let snapshot = wait_until(&mut watch_rx, |s| s.stats.total_messages >= 1).await;
    assert_eq!(snapshot.notes.len(), 1);

    // Give the second path time to land as well, then confirm no duplicate.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(view.snapshot().notes.len(), 1);

    view.close().await;
}

#[tokio::test]
async fn likes_from_other_events_are_discarded() {
    let our_event = Uuid::new_v4();
    let other_event = Uuid::new_v4();
    let source = StubSource::default();

    let ours = note(our_event, 5);
    let theirs = note(other_event, 5);
    source.put(ours.clone());
    source.put(theirs.clone());

    let (tx, rx) = broadcast::channel(64);
    let view = FeedView::spawn(our_event, Uuid::new_v4(), source.clone(), rx);
    let mut watch_rx = view.watch();
    wait_until(&mut watch_rx, |s| s.stats.total_messages == 1).await;

    tx.send(ChangeEvent::LikeCreated {
        note_id: theirs.id,
        participant_id: Uuid::new_v4(),
    })
    .unwrap();
    tx.send(ChangeEvent::LikeCreated {
        note_id: ours.id,
        participant_id: Uuid::new_v4(),
    })
    .unwrap();

    let snapshot = wait_until(&mut watch_rx, |s| s.stats.total_likes == 1).await;
    assert_eq!(snapshot.notes[0].like_count, 1);
    assert_eq!(snapshot.stats.total_likes, 1);

    view.close().await;
}

#[tokio::test]
async fn like_for_a_deleted_note_is_discarded() {
    let event_id = Uuid::new_v4();
    let source = StubSource::default();
    let n = note(event_id, 5);
    source.put(n.clone());

    let (tx, rx) = broadcast::channel(64);
    let view = FeedView::spawn(event_id, Uuid::new_v4(), source.clone(), rx);
    let mut watch_rx = view.watch();
    wait_until(&mut watch_rx, |s| s.stats.total_messages == 1).await;

    // Host deletes while an attendee's like is in flight: the delete lands
    // first, then the stray like change resolves to nothing and is dropped.
    source.remove(n.id);
    tx.send(ChangeEvent::NoteDeleted {
        id: n.id,
        event_id,
    })
    .unwrap();
    tx.send(ChangeEvent::LikeCreated {
        note_id: n.id,
        participant_id: Uuid::new_v4(),
    })
    .unwrap();

    let snapshot = wait_until(&mut watch_rx, |s| s.stats.total_messages == 0).await;
    assert!(snapshot.notes.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(view.snapshot().notes.is_empty());

    view.close().await;
}

#[tokio::test]
async fn closed_view_stops_applying_changes() {
    let event_id = Uuid::new_v4();
    let source = StubSource::default();
    let (tx, rx) = broadcast::channel(64);

    let view = FeedView::spawn(event_id, Uuid::new_v4(), source.clone(), rx);
    let mut watch_rx = view.watch();
    wait_until(&mut watch_rx, |s| s.notes.is_empty()).await;

    let frozen = view.snapshot();
    view.close().await;

    let n = note(event_id, 5);
    source.put(n.clone());
    // The worker is gone; this send has no subscribers left.
    let _ = tx.send(ChangeEvent::NoteCreated {
        id: n.id,
        event_id,
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(*watch_rx.borrow(), frozen);
}
