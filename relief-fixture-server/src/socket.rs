use crate::{FixtureState, Outbound};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use relief_core::events::{JOIN_DISASTER, LEAVE_DISASTER};
use relief_core::frame::{self, Frame};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub async fn socket_handler(ws: WebSocketUpgrade, State(state): State<FixtureState>) -> Response {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: FixtureState) {
    let (id, mut events) = state.open_session();
    let sid = format!("fixture-{id}");
    let (mut sink, mut stream) = socket.split();
    info!(%sid, "socket session opened");

    let (ping_interval, ping_timeout) = state.heartbeat();
    let open = json!({
        "sid": sid,
        "upgrades": [],
        "pingInterval": ping_interval.as_millis() as u64,
        "pingTimeout": ping_timeout.as_millis() as u64,
    });
    if sink.send(Message::Text(format!("0{open}"))).await.is_err() {
        state.close_session(id);
        return;
    }

    let mut pings = interval_at(Instant::now() + ping_interval, ping_interval);
    pings.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let reply = tokio::select! {
            _ = pings.tick() => (!state.pings_paused()).then(|| frame::PING.to_string()),
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match frame::decode(&text) {
                    Ok(Frame::Connected) => Some(format!("{}{}", frame::CONNECT, json!({ "sid": sid }))),
                    Ok(Frame::Ping) => Some(frame::PONG.to_string()),
                    Ok(Frame::Disconnected) | Ok(Frame::Close) => break,
                    Ok(Frame::Event { name, payload }) => {
                        on_client_event(&state, id, &name, &payload);
                        None
                    }
                    Ok(_) => None,
                    Err(err) => {
                        warn!(%sid, error = %err, "bad frame from client");
                        None
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => None,
            },
            outbound = events.recv() => match outbound {
                Ok(Outbound::Event { room, frame }) => match room {
                    Some(room) if !state.in_room(id, &room) => None,
                    _ => Some(frame),
                },
                Ok(Outbound::Kick) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(%sid, missed, "session lagged behind broadcast");
                    None
                }
                Err(RecvError::Closed) => break,
            },
        };

        if let Some(text) = reply {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    }

    state.close_session(id);
    info!(%sid, "socket session closed");
}

fn on_client_event(state: &FixtureState, session: u64, name: &str, payload: &Value) {
    let Some(room) = payload.as_str() else {
        debug!(event = name, "ignoring event without room id");
        return;
    };
    match name {
        JOIN_DISASTER => {
            state.join(session, room);
            debug!(session, room, "joined");
        }
        LEAVE_DISASTER => {
            state.leave(session, room);
            debug!(session, room, "left");
        }
        other => debug!(event = other, "ignoring client event"),
    }
}
