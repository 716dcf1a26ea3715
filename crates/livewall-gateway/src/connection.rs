use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use livewall_db::Database;
use livewall_db::models::{EventRow, ParticipantRow};
use livewall_feed::FeedView;
use livewall_types::events::{ChangeEvent, GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::source::DbNoteSource;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh connection gets to send its Subscribe command.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection.
///
/// The client opens with `Subscribe { event_code, participant_id }`; once the
/// binding checks out, the connection owns one [`FeedView`] for that event and
/// forwards every snapshot change, plus announcements and join notices, until
/// either side goes away. Closing the socket tears the view down — there is
/// no resubscribe; a client that wants back in reconnects.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, db: Arc<Database>) {
    let (mut sender, mut receiver) = socket.split();

    let Some((event, participant)) = wait_for_subscribe(&mut receiver, &mut sender, &db).await
    else {
        warn!("WebSocket client failed to subscribe, closing");
        return;
    };

    let (Ok(event_id), Ok(participant_id), Ok(own_profile_id)) = (
        event.id.parse::<Uuid>(),
        participant.id.parse::<Uuid>(),
        participant.profile_id.parse::<Uuid>(),
    ) else {
        warn!("Corrupt ids on event {} / participant {}", event.id, participant.id);
        return;
    };

    info!(
        "Participant {} watching event {} ({})",
        participant_id, event.event_code, event_id
    );

    // Subscribe to changes before the view opens so nothing slips between
    // the baseline fetch and the live stream.
    let mut changes = dispatcher.subscribe();
    let view = FeedView::spawn(
        event_id,
        participant_id,
        DbNoteSource::new(db.clone(), participant_id),
        dispatcher.subscribe(),
    );
    let mut feed_rx = view.watch();

    let ready = GatewayEvent::Ready {
        event_id,
        participant_id,
    };
    if !send_event(&mut sender, &ready).await {
        view.close().await;
        return;
    }
    let first = feed_rx.borrow_and_update().clone();
    if !send_event(&mut sender, &GatewayEvent::Feed(first)).await {
        view.close().await;
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;
    let mut pong_received = true;

    loop {
        tokio::select! {
            result = feed_rx.changed() => {
                if result.is_err() {
                    break;
                }
                let snapshot = feed_rx.borrow_and_update().clone();
                if !send_event(&mut sender, &GatewayEvent::Feed(snapshot)).await {
                    break;
                }
            }

            result = changes.recv() => match result {
                Ok(ChangeEvent::Announcement { event_code, message })
                    if event_code == event.event_code =>
                {
                    if !send_event(&mut sender, &GatewayEvent::Announcement { message }).await {
                        break;
                    }
                }
                Ok(ChangeEvent::ParticipantJoined { id, event_id: joined_event, profile_id })
                    if joined_event == event_id && profile_id != own_profile_id =>
                {
                    // Best-effort: a failed name lookup just means no notice.
                    match lookup_username(&db, id).await {
                        Ok(Some(username)) => {
                            if !send_event(
                                &mut sender,
                                &GatewayEvent::ParticipantJoined { username },
                            )
                            .await
                            {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Join notice lookup for {} failed: {}", id, e),
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Connection receiver lagged by {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Pong(_))) => pong_received = true,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },

            _ = heartbeat.tick() => {
                if pong_received {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!(
                            "Heartbeat timeout (missed {} pongs), dropping connection",
                            missed_heartbeats
                        );
                        break;
                    }
                }
                pong_received = false;
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    view.close().await;
    info!(
        "Participant {} left event {}",
        participant_id, event.event_code
    );
}

/// Wait for the opening Subscribe command and validate the binding: the event
/// code must resolve and the participant must belong to that event. Rejections
/// are reported to the client before the connection is dropped.
async fn wait_for_subscribe(
    receiver: &mut SplitStream<WebSocket>,
    sender: &mut SplitSink<WebSocket, Message>,
    db: &Arc<Database>,
) -> Option<(EventRow, ParticipantRow)> {
    let command = tokio::time::timeout(SUBSCRIBE_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => return Some(cmd),
                    Err(e) => {
                        warn!("Bad gateway command: {} -- raw: {}", e, &text[..text.len().min(200)]);
                    }
                }
            }
        }
        None
    })
    .await
    .ok()
    .flatten()?;

    let GatewayCommand::Subscribe {
        event_code,
        participant_id,
    } = command;

    let lookup = {
        let db = db.clone();
        let code = event_code.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let event = db.get_event_by_code(&code)?;
            let participant = db.get_participant(&participant_id.to_string())?;
            anyhow::Ok((event, participant))
        })
        .await
    };

    let rejection = match lookup {
        Ok(Ok((Some(event), Some(participant)))) if participant.event_id == event.id => {
            return Some((event, participant));
        }
        Ok(Ok((None, _))) => "unknown event code".to_string(),
        Ok(Ok((Some(_), _))) => "participant has not joined this event".to_string(),
        Ok(Err(e)) => {
            warn!("Subscribe lookup failed: {}", e);
            "lookup failed".to_string()
        }
        Err(e) => {
            warn!("Subscribe lookup task failed: {}", e);
            "lookup failed".to_string()
        }
    };

    let _ = send_event(
        sender,
        &GatewayEvent::SubscriptionError { message: rejection },
    )
    .await;
    None
}

async fn lookup_username(db: &Arc<Database>, participant_id: Uuid) -> anyhow::Result<Option<String>> {
    let db = db.clone();
    tokio::task::spawn_blocking(move || db.get_participant_username(&participant_id.to_string()))
        .await?
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = serde_json::to_string(event).expect("gateway event serialization");
    sender.send(Message::Text(text.into())).await.is_ok()
}
