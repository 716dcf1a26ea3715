//! Order-independence of the feed merge: a baseline backfill and a stream of
//! note change events must land on the same final list no matter how they
//! interleave.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use livewall_feed::FeedState;
use livewall_types::api::{FeedSnapshot, NoteWithAuthor};
use livewall_types::models::NoteContent;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

fn note(id: Uuid, secs: i64, content: NoteContent) -> NoteWithAuthor {
    NoteWithAuthor {
        id,
        event_id: Uuid::nil(),
        participant_id: Uuid::new_v4(),
        username: "ada".to_string(),
        content,
        created_at: ts(secs),
        is_favorited: false,
        like_count: 0,
        liked_by_viewer: false,
    }
}

#[derive(Clone)]
enum Op {
    Backfill(Vec<NoteWithAuthor>),
    Insert(NoteWithAuthor),
    Favorite(Uuid, bool),
    Delete(Uuid),
}

fn apply(state: &mut FeedState, op: &Op) {
    match op {
        Op::Backfill(rows) => state.merge_backfill(rows.clone()),
        Op::Insert(n) => state.insert_note(n.clone()),
        Op::Favorite(id, fav) => state.set_favorited(*id, *fav),
        Op::Delete(id) => state.remove_note(*id),
    }
}

fn run(ops: &[Op]) -> FeedSnapshot {
    let mut state = FeedState::new(Uuid::new_v4());
    for op in ops {
        apply(&mut state, op);
    }
    state.snapshot()
}

/// Heap's algorithm; the op sets are small enough to enumerate exhaustively.
fn permutations(ops: Vec<Op>) -> Vec<Vec<Op>> {
    fn heap(k: usize, ops: &mut Vec<Op>, out: &mut Vec<Vec<Op>>) {
        if k <= 1 {
            out.push(ops.clone());
            return;
        }
        for i in 0..k {
            heap(k - 1, ops, out);
            if k % 2 == 0 {
                ops.swap(i, k - 1);
            } else {
                ops.swap(0, k - 1);
            }
        }
    }
    let mut out = Vec::new();
    let mut ops = ops;
    let len = ops.len();
    heap(len, &mut ops, &mut out);
    out
}

fn assert_sorted_and_unique(snapshot: &FeedSnapshot) {
    for pair in snapshot.notes.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.is_favorited >= b.is_favorited,
            "favorited note {:?} sorted below {:?}",
            b.id,
            a.id
        );
        if a.is_favorited == b.is_favorited {
            assert!(a.created_at >= b.created_at, "feed not newest-first");
        }
    }
    let mut ids: Vec<Uuid> = snapshot.notes.iter().map(|n| n.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), snapshot.notes.len(), "duplicate note ids");
}

#[test]
fn backfill_and_live_events_converge_in_any_order() {
    let fresh = note(Uuid::new_v4(), 30, NoteContent::Text("just posted".into()));
    let starred = note(Uuid::new_v4(), 20, NoteContent::Emotion("🎉".into()));
    let doomed = note(Uuid::new_v4(), 10, NoteContent::Image("/media/a.png".into()));

    // The backfill read reflects the final store state: the fresh note has
    // picked up a like, the starred one its favorite flag.
    let mut backfill_fresh = fresh.clone();
    backfill_fresh.like_count = 1;
    let mut backfill_starred = starred.clone();
    backfill_starred.is_favorited = true;
    let backfill = vec![backfill_fresh, backfill_starred, doomed.clone()];

    let ops = vec![
        Op::Backfill(backfill),
        Op::Insert(fresh.clone()),
        Op::Insert(doomed.clone()),
        Op::Favorite(starred.id, true),
        Op::Delete(doomed.id),
    ];

    let reference = run(&ops);
    assert_eq!(
        reference.notes.iter().map(|n| n.id).collect::<Vec<_>>(),
        vec![starred.id, fresh.id]
    );
    assert!(reference.notes[0].is_favorited);
    assert_eq!(reference.notes[1].like_count, 1);
    assert_eq!(reference.stats.total_messages, 2);
    assert_eq!(reference.stats.total_likes, 1);
    assert_eq!(reference.stats.image_messages, 0);

    for permuted in permutations(ops) {
        let outcome = run(&permuted);
        assert_eq!(outcome, reference);
        assert_sorted_and_unique(&outcome);
    }
}

#[test]
fn double_backfill_is_idempotent() {
    let a = note(Uuid::new_v4(), 1, NoteContent::Text("a".into()));
    let b = note(Uuid::new_v4(), 2, NoteContent::Text("b".into()));
    let rows = vec![a, b];

    let once = run(&[Op::Backfill(rows.clone())]);
    let twice = run(&[Op::Backfill(rows.clone()), Op::Backfill(rows)]);
    assert_eq!(once, twice);
}

#[test]
fn sort_invariant_survives_a_busy_session() {
    let mut state = FeedState::new(Uuid::new_v4());
    let notes: Vec<NoteWithAuthor> = (0..8)
        .map(|i| note(Uuid::new_v4(), i * 3, NoteContent::Text(format!("n{i}"))))
        .collect();

    state.merge_backfill(notes[..4].to_vec());
    for n in &notes[4..] {
        state.insert_note(n.clone());
    }
    state.set_favorited(notes[1].id, true);
    state.set_favorited(notes[6].id, true);
    state.remove_note(notes[3].id);
    state.set_favorited(notes[6].id, false);
    state.remove_note(notes[0].id);

    let snapshot = state.snapshot();
    assert_eq!(snapshot.notes.len(), 6);
    assert_eq!(snapshot.notes[0].id, notes[1].id);
    assert_sorted_and_unique(&snapshot);
    assert_eq!(snapshot.stats.total_messages, 6);
}
