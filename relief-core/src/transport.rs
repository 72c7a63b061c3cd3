//! Push-channel adapter over a Socket.IO websocket.
//!
//! One background task owns the socket. Room changes and shutdown reach it
//! through a command queue; typed events and link status leave it through
//! the engine's inbox, so everything the engine sees is already ordered.

use crate::config::ReconnectPolicy;
use crate::engine::{Inbound, LinkStatus};
use crate::error::ConnectionError;
use crate::events::{decode_event, EventName, JOIN_DISASTER, LEAVE_DISASTER};
use crate::frame::{self, Frame};
use crate::subscription::RoomChannel;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

pub type Inbox = mpsc::UnboundedSender<Inbound>;

#[async_trait]
pub trait PushChannel: RoomChannel {
    async fn disconnect(&self);
}

#[derive(Debug)]
enum Command {
    Join(String),
    Leave(String),
    Listen(EventName),
    Shutdown,
}

pub struct TransportAdapter {
    commands: mpsc::UnboundedSender<Command>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransportAdapter {
    /// Starts the connection task. Must be called inside a tokio runtime.
    ///
    /// The first connection attempt happens in the background; its outcome
    /// reaches the inbox as [`LinkStatus`].
    pub fn connect(
        socket_url: &Url,
        policy: ReconnectPolicy,
        inbox: Inbox,
    ) -> Result<Self, ConnectionError> {
        let endpoint = engine_endpoint(socket_url)?;
        let (commands, rx) = mpsc::unbounded_channel();
        let session = Session {
            endpoint,
            policy,
            inbox,
            commands: rx,
            room: None,
            listening: HashSet::new(),
            heartbeat: DEFAULT_HEARTBEAT,
        };
        let task = tokio::spawn(session.run());
        Ok(Self {
            commands,
            task: Mutex::new(Some(task)),
        })
    }

    /// Starts forwarding one event kind to the inbox.
    pub fn on(&self, name: EventName) -> Result<(), ConnectionError> {
        self.send(Command::Listen(name))
    }

    fn send(&self, command: Command) -> Result<(), ConnectionError> {
        self.commands
            .send(command)
            .map_err(|_| ConnectionError::Closed)
    }
}

impl RoomChannel for TransportAdapter {
    fn subscribe(&self, room: &str) -> Result<(), ConnectionError> {
        self.send(Command::Join(room.to_string()))
    }

    fn unsubscribe(&self, room: &str) -> Result<(), ConnectionError> {
        self.send(Command::Leave(room.to_string()))
    }
}

#[async_trait]
impl PushChannel for TransportAdapter {
    async fn disconnect(&self) {
        let _ = self.send(Command::Shutdown);
        let task = match self.task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "push channel task ended abnormally");
            }
        }
    }
}

fn engine_endpoint(socket_url: &Url) -> Result<Url, ConnectionError> {
    if !matches!(socket_url.scheme(), "ws" | "wss") {
        return Err(ConnectionError::InvalidEndpoint(socket_url.to_string()));
    }
    let mut endpoint = socket_url
        .join("socket.io/")
        .map_err(|_| ConnectionError::InvalidEndpoint(socket_url.to_string()))?;
    endpoint.set_query(Some("EIO=4&transport=websocket"));
    Ok(endpoint)
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bound on a single connection attempt, handshake included.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
/// Silence allowed before the server's handshake says otherwise
/// (Engine.IO defaults: 25s ping interval plus 20s ping timeout).
const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(45_000);

enum Exit {
    Shutdown,
    Lost(ConnectionError),
}

struct Session {
    endpoint: Url,
    policy: ReconnectPolicy,
    inbox: Inbox,
    commands: mpsc::UnboundedReceiver<Command>,
    room: Option<String>,
    listening: HashSet<EventName>,
    heartbeat: Duration,
}

impl Session {
    async fn run(mut self) {
        let mut attempt = 0u32;
        loop {
            let lost = match self.open().await {
                None => return,
                Some(Ok(socket)) => {
                    debug!(endpoint = %self.endpoint, "websocket open");
                    match self.drive(socket, &mut attempt).await {
                        Exit::Shutdown => return,
                        Exit::Lost(err) => err,
                    }
                }
                Some(Err(err)) => err,
            };

            let delay = self.policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(error = %lost, retry_in_ms = delay.as_millis() as u64, "push channel down");
            if self.inbox.send(Inbound::Link(LinkStatus::Down(lost))).is_err() {
                return;
            }
            if !self.wait(delay).await {
                return;
            }
        }
    }

    /// One connection attempt. Room changes keep being tracked while it is
    /// pending; returns `None` on shutdown.
    async fn open(&mut self) -> Option<Result<Socket, ConnectionError>> {
        let request = self.endpoint.to_string();
        let connecting = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request));
        tokio::pin!(connecting);
        loop {
            tokio::select! {
                result = &mut connecting => {
                    let reason = match result {
                        Ok(Ok((socket, _))) => return Some(Ok(socket)),
                        Ok(Err(err)) => err.to_string(),
                        Err(_) => format!("no handshake within {}s", CONNECT_TIMEOUT.as_secs()),
                    };
                    return Some(Err(ConnectionError::Unreachable {
                        endpoint: self.endpoint.to_string(),
                        reason,
                    }));
                }
                command = self.commands.recv() => {
                    if !self.note(command) {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleeps out the backoff while still tracking room changes. Returns
    /// false on shutdown.
    async fn wait(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => {
                    if !self.note(command) {
                        return false;
                    }
                }
            }
        }
    }

    /// Records a command received while no socket is open.
    fn note(&mut self, command: Option<Command>) -> bool {
        match command {
            None | Some(Command::Shutdown) => return false,
            Some(Command::Join(room)) => self.room = Some(room),
            Some(Command::Leave(room)) => self.forget(&room),
            Some(Command::Listen(name)) => {
                self.listening.insert(name);
            }
        }
        true
    }

    fn forget(&mut self, room: &str) {
        if self.room.as_deref() == Some(room) {
            self.room = None;
        }
    }

    async fn drive(&mut self, socket: Socket, attempt: &mut u32) -> Exit {
        let (mut sink, mut stream) = socket.split();
        let mut connected = false;
        let silence = tokio::time::sleep(self.heartbeat);
        tokio::pin!(silence);

        loop {
            let outgoing = tokio::select! {
                _ = &mut silence => {
                    warn!(
                        endpoint = %self.endpoint,
                        silent_ms = self.heartbeat.as_millis() as u64,
                        "push channel missed its heartbeat"
                    );
                    return Exit::Lost(ConnectionError::Silent(self.heartbeat));
                }
                command = self.commands.recv() => match command {
                    None | Some(Command::Shutdown) => {
                        let _ = sink.send(Message::Text(frame::DISCONNECT.into())).await;
                        let _ = sink.close().await;
                        info!("push channel closed");
                        return Exit::Shutdown;
                    }
                    Some(Command::Join(room)) => {
                        self.room = Some(room.clone());
                        connected.then(|| frame::encode_event(JOIN_DISASTER, &Value::String(room)))
                    }
                    Some(Command::Leave(room)) => {
                        self.forget(&room);
                        connected.then(|| frame::encode_event(LEAVE_DISASTER, &Value::String(room)))
                    }
                    Some(Command::Listen(name)) => {
                        self.listening.insert(name);
                        None
                    }
                },
                message = stream.next() => {
                    let reply = match message {
                        None => return Exit::Lost(ConnectionError::Closed),
                        Some(Err(err)) => {
                            return Exit::Lost(ConnectionError::Unreachable {
                                endpoint: self.endpoint.to_string(),
                                reason: err.to_string(),
                            })
                        }
                        Some(Ok(Message::Close(_))) => return Exit::Lost(ConnectionError::Closed),
                        Some(Ok(Message::Text(text))) => match self.on_text(&text, &mut connected) {
                            Ok(reply) => {
                                if connected {
                                    *attempt = 0;
                                }
                                reply
                            }
                            Err(exit) => return exit,
                        },
                        Some(Ok(_)) => None,
                    };
                    silence.as_mut().reset(Instant::now() + self.heartbeat);
                    reply
                }
            };

            if let Some(text) = outgoing {
                if let Err(err) = sink.send(Message::Text(text)).await {
                    return Exit::Lost(ConnectionError::Unreachable {
                        endpoint: self.endpoint.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    /// Handles one text frame, returning the reply to send, if any.
    fn on_text(&mut self, text: &str, connected: &mut bool) -> Result<Option<String>, Exit> {
        let frame = match frame::decode(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "skipping undecodable frame");
                return Ok(None);
            }
        };
        match frame {
            Frame::Open(handshake) => {
                if handshake.ping_interval > 0 {
                    self.heartbeat = Duration::from_millis(
                        handshake.ping_interval.saturating_add(handshake.ping_timeout),
                    );
                }
                debug!(
                    sid = %handshake.sid,
                    heartbeat_ms = self.heartbeat.as_millis() as u64,
                    "engine handshake"
                );
                Ok(Some(frame::CONNECT.to_string()))
            }
            Frame::Ping => Ok(Some(frame::PONG.to_string())),
            Frame::Connected => {
                *connected = true;
                info!(endpoint = %self.endpoint, "push channel connected");
                self.forward(Inbound::Link(LinkStatus::Up))?;
                Ok(self
                    .room
                    .as_ref()
                    .map(|room| frame::encode_event(JOIN_DISASTER, &Value::String(room.clone()))))
            }
            Frame::Close | Frame::Disconnected => Err(Exit::Lost(ConnectionError::Closed)),
            Frame::ConnectError(message) => Err(Exit::Lost(ConnectionError::Protocol(message))),
            Frame::Event { name, payload } => {
                let Ok(name) = name.parse::<EventName>() else {
                    debug!(event = %name, "ignoring unknown event");
                    return Ok(None);
                };
                if !self.listening.contains(&name) {
                    debug!(event = name.as_str(), "no listener for event");
                    return Ok(None);
                }
                let event = decode_event(name, payload, self.room.as_deref());
                self.forward(Inbound::Live(event))?;
                Ok(None)
            }
            Frame::Pong | Frame::Noop | Frame::Ack => Ok(None),
        }
    }

    fn forward(&self, inbound: Inbound) -> Result<(), Exit> {
        self.inbox.send(inbound).map_err(|_| Exit::Shutdown)
    }
}
