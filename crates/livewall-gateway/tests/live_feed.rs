//! End-to-end feed scenarios: two participants watching one event through
//! real [`FeedView`]s backed by the SQLite store and the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use livewall_db::Database;
use livewall_feed::FeedView;
use livewall_gateway::dispatcher::Dispatcher;
use livewall_gateway::source::DbNoteSource;
use livewall_types::api::FeedSnapshot;
use livewall_types::events::ChangeEvent;
use livewall_types::models::NoteContent;

struct Fixture {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    event_id: Uuid,
    p1: Uuid,
    p2: Uuid,
}

fn fixture() -> Fixture {
    let db = Arc::new(Database::open_in_memory().unwrap());

    let host_id = Uuid::new_v4();
    db.create_host(&host_id.to_string(), "host", "hash").unwrap();

    let event_id = Uuid::new_v4();
    db.insert_event(
        &event_id.to_string(),
        &host_id.to_string(),
        "Launch party",
        "AB12CD",
        "party",
    )
    .unwrap();
    db.update_event_status(&event_id.to_string(), "pending", "active")
        .unwrap();

    let mut participants = [Uuid::nil(); 2];
    for (i, name) in ["ada", "grace"].iter().enumerate() {
        let profile_id = Uuid::new_v4();
        db.upsert_profile(&profile_id.to_string(), name).unwrap();
        let participant_id = Uuid::new_v4();
        db.insert_participant(
            &participant_id.to_string(),
            &event_id.to_string(),
            &profile_id.to_string(),
            "attendee",
        )
        .unwrap();
        participants[i] = participant_id;
    }

    Fixture {
        db,
        dispatcher: Dispatcher::new(),
        event_id,
        p1: participants[0],
        p2: participants[1],
    }
}

impl Fixture {
    fn open_view(&self, viewer: Uuid) -> FeedView {
        FeedView::spawn(
            self.event_id,
            viewer,
            DbNoteSource::new(self.db.clone(), viewer),
            self.dispatcher.subscribe(),
        )
    }

    /// Write a note the way the REST handler does: store first, then the
    /// thin change notification.
    fn post_note(&self, author: Uuid, content: &NoteContent) -> Uuid {
        let note_id = Uuid::new_v4();
        self.db
            .insert_note(
                &note_id.to_string(),
                &self.event_id.to_string(),
                &author.to_string(),
                content.kind(),
                content.data(),
                &Utc::now().to_rfc3339(),
            )
            .unwrap();
        self.dispatcher.broadcast(ChangeEvent::NoteCreated {
            id: note_id,
            event_id: self.event_id,
        });
        note_id
    }

    fn like_note(&self, note_id: Uuid, participant: Uuid) {
        let liked = self
            .db
            .toggle_like(
                &Uuid::new_v4().to_string(),
                &note_id.to_string(),
                &participant.to_string(),
            )
            .unwrap();
        assert!(liked);
        self.dispatcher.broadcast(ChangeEvent::LikeCreated {
            note_id,
            participant_id: participant,
        });
    }
}

async fn wait_until<F>(rx: &mut watch::Receiver<FeedSnapshot>, mut pred: F) -> FeedSnapshot
where
    F: FnMut(&FeedSnapshot) -> bool,
{
    loop {
        {
            let current = rx.borrow();
            if pred(&current) {
                return current.clone();
            }
        }
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("feed went quiet before the expected state")
            .expect("feed view dropped");
    }
}

#[tokio::test]
async fn posted_note_reaches_the_other_participant_live() {
    let fx = fixture();
    let view2 = fx.open_view(fx.p2);
    let mut rx2 = view2.watch();
    wait_until(&mut rx2, |s| s.notes.is_empty()).await;

    fx.post_note(fx.p1, &NoteContent::Text("hello".to_string()));

    let snapshot = wait_until(&mut rx2, |s| s.stats.total_messages == 1).await;
    let entry = &snapshot.notes[0];
    assert_eq!(entry.content, NoteContent::Text("hello".to_string()));
    assert_eq!(entry.username, "ada");
    assert_eq!(entry.like_count, 0);
    assert!(!entry.liked_by_viewer);

    view2.close().await;
}

#[tokio::test]
async fn like_counts_and_viewer_flags_diverge_per_viewer() {
    let fx = fixture();
    let view1 = fx.open_view(fx.p1);
    let view2 = fx.open_view(fx.p2);
    let (mut rx1, mut rx2) = (view1.watch(), view2.watch());

    let note_id = fx.post_note(fx.p1, &NoteContent::Text("hello".to_string()));
    wait_until(&mut rx1, |s| s.stats.total_messages == 1).await;
    wait_until(&mut rx2, |s| s.stats.total_messages == 1).await;

    fx.like_note(note_id, fx.p1);

    let s1 = wait_until(&mut rx1, |s| s.stats.total_likes == 1).await;
    assert!(s1.notes[0].liked_by_viewer, "the liker sees their own like");

    let s2 = wait_until(&mut rx2, |s| s.stats.total_likes == 1).await;
    assert_eq!(s2.notes[0].like_count, 1);
    assert!(!s2.notes[0].liked_by_viewer, "someone else's like is not mine");

    view1.close().await;
    view2.close().await;
}

#[tokio::test]
async fn favorite_reorders_every_view() {
    let fx = fixture();
    let view = fx.open_view(fx.p2);
    let mut rx = view.watch();

    let first = fx.post_note(fx.p1, &NoteContent::Text("first".to_string()));
    tokio::time::sleep(Duration::from_millis(5)).await;
    fx.post_note(fx.p1, &NoteContent::Emotion("🎉".to_string()));
    let snapshot = wait_until(&mut rx, |s| s.stats.total_messages == 2).await;
    assert_eq!(snapshot.notes[1].id, first, "older note sorts below");

    assert!(fx.db.set_note_favorited(&first.to_string(), true).unwrap());
    fx.dispatcher.broadcast(ChangeEvent::NoteUpdated {
        id: first,
        event_id: fx.event_id,
        is_favorited: true,
    });

    let snapshot =
        wait_until(&mut rx, |s| !s.notes.is_empty() && s.notes[0].id == first).await;
    assert!(snapshot.notes[0].is_favorited);

    view.close().await;
}

#[tokio::test]
async fn host_delete_wins_the_race_against_a_like() {
    let fx = fixture();
    let view1 = fx.open_view(fx.p1);
    let view2 = fx.open_view(fx.p2);
    let (mut rx1, mut rx2) = (view1.watch(), view2.watch());

    let note_id = fx.post_note(fx.p1, &NoteContent::Text("going away".to_string()));
    wait_until(&mut rx1, |s| s.stats.total_messages == 1).await;
    wait_until(&mut rx2, |s| s.stats.total_messages == 1).await;

    // Host deletes; the attendee's like notification arrives after the row
    // is gone and must resolve to nothing.
    assert!(fx.db.delete_note(&note_id.to_string()).unwrap());
    fx.dispatcher.broadcast(ChangeEvent::NoteDeleted {
        id: note_id,
        event_id: fx.event_id,
    });
    fx.dispatcher.broadcast(ChangeEvent::LikeCreated {
        note_id,
        participant_id: fx.p2,
    });

    let s1 = wait_until(&mut rx1, |s| s.stats.total_messages == 0).await;
    let s2 = wait_until(&mut rx2, |s| s.stats.total_messages == 0).await;
    assert!(s1.notes.is_empty());
    assert!(s2.notes.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(view1.snapshot().stats.total_likes, 0);
    assert_eq!(view2.snapshot().stats.total_likes, 0);

    view1.close().await;
    view2.close().await;
}

#[tokio::test]
async fn notes_from_other_events_never_leak_in() {
    let fx = fixture();

    // Second event with its own participant.
    let other_event = Uuid::new_v4();
    let event_row = fx.db.get_event_by_id(&fx.event_id.to_string()).unwrap().unwrap();
    fx.db
        .insert_event(
            &other_event.to_string(),
            &event_row.host_id,
            "Other party",
            "ZZ99ZZ",
            "general",
        )
        .unwrap();
    let other_profile = Uuid::new_v4();
    fx.db
        .upsert_profile(&other_profile.to_string(), "eve")
        .unwrap();
    let other_participant = Uuid::new_v4();
    fx.db
        .insert_participant(
            &other_participant.to_string(),
            &other_event.to_string(),
            &other_profile.to_string(),
            "attendee",
        )
        .unwrap();

    let view = fx.open_view(fx.p1);
    let mut rx = view.watch();
    wait_until(&mut rx, |s| s.notes.is_empty()).await;

    // A note lands in the other event...
    let foreign_note = Uuid::new_v4();
    fx.db
        .insert_note(
            &foreign_note.to_string(),
            &other_event.to_string(),
            &other_participant.to_string(),
            "text",
            "wrong room",
            &Utc::now().to_rfc3339(),
        )
        .unwrap();
    fx.dispatcher.broadcast(ChangeEvent::NoteCreated {
        id: foreign_note,
        event_id: other_event,
    });
    fx.dispatcher.broadcast(ChangeEvent::LikeCreated {
        note_id: foreign_note,
        participant_id: other_participant,
    });

    // ...and one in ours, which is the only one we should see.
    fx.post_note(fx.p1, &NoteContent::Text("right room".to_string()));
    let snapshot = wait_until(&mut rx, |s| s.stats.total_messages >= 1).await;
    assert_eq!(snapshot.notes.len(), 1);
    assert_eq!(
        snapshot.notes[0].content,
        NoteContent::Text("right room".to_string())
    );
    assert_eq!(snapshot.stats.total_likes, 0);

    view.close().await;
}
