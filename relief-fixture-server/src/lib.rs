//! In-memory stand-in for the coordination backend.
//!
//! Serves the REST routes the client reads and writes, and a Socket.IO
//! websocket that fans out live events to joined rooms. Used by the
//! end-to-end tests and by `relief-client --demo`.

pub mod seed;
pub mod socket;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use disaster_registry::{
    CreateDisasterRequest, Disaster, OfficialUpdate, PostsEnvelope, Resource, ResourcesEnvelope,
    SocialMediaPost, UpdatesEnvelope,
};
use relief_core::api::USER_ID_HEADER;
use relief_core::events::EventName;
use relief_core::frame;
use relief_core::{DetailKind, DetailSnapshot};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const BROADCAST_CAPACITY: usize = 256;
const PING_INTERVAL: Duration = Duration::from_millis(25_000);
const PING_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Something every websocket session should see.
#[derive(Clone, Debug)]
pub enum Outbound {
    /// An encoded event frame, restricted to one room when `room` is set.
    Event { room: Option<String>, frame: String },
    /// Drop every open session.
    Kick,
}

#[derive(Default)]
struct Store {
    disasters: Vec<Disaster>,
    social_media: HashMap<String, Vec<SocialMediaPost>>,
    resources: HashMap<String, Vec<Resource>>,
    updates: HashMap<String, Vec<OfficialUpdate>>,
    next_id: u64,
}

#[derive(Clone)]
pub struct FixtureState {
    store: Arc<Mutex<Store>>,
    rooms: Arc<Mutex<HashMap<u64, HashSet<String>>>>,
    sessions: Arc<AtomicU64>,
    events: broadcast::Sender<Outbound>,
    ping_interval: Duration,
    ping_timeout: Duration,
    pings_paused: Arc<AtomicBool>,
    scoped_events: bool,
}

impl Default for FixtureState {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureState {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            store: Arc::new(Mutex::new(Store::default())),
            rooms: Arc::new(Mutex::new(HashMap::new())),
            sessions: Arc::new(AtomicU64::new(0)),
            events,
            ping_interval: PING_INTERVAL,
            ping_timeout: PING_TIMEOUT,
            pings_paused: Arc::new(AtomicBool::new(false)),
            scoped_events: true,
        }
    }

    /// Heartbeat advertised in the handshake. Sessions ping every `interval`.
    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.ping_interval = interval;
        self.ping_timeout = timeout;
        self
    }

    /// Detail events go out without `disaster_id`; only the room scopes them.
    pub fn without_event_scope(mut self) -> Self {
        self.scoped_events = false;
        self
    }

    /// Sessions stay open but stop pinging, like a peer that went away
    /// without closing the connection.
    pub fn pause_pings(&self) {
        self.pings_paused.store(true, Ordering::SeqCst);
    }

    pub fn resume_pings(&self) {
        self.pings_paused.store(false, Ordering::SeqCst);
    }

    pub(crate) fn heartbeat(&self) -> (Duration, Duration) {
        (self.ping_interval, self.ping_timeout)
    }

    pub(crate) fn pings_paused(&self) -> bool {
        self.pings_paused.load(Ordering::SeqCst)
    }

    pub fn seeded() -> Self {
        let state = Self::new();
        seed::seed_demo_data(&state);
        state
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<u64, HashSet<String>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn disasters(&self) -> Vec<Disaster> {
        self.store().disasters.clone()
    }

    /// Inserts without broadcasting.
    pub fn insert_disaster(&self, disaster: Disaster) {
        let mut store = self.store();
        store.disasters.retain(|d| d.id != disaster.id);
        store.disasters.insert(0, disaster);
    }

    pub fn create_disaster(&self, request: CreateDisasterRequest, owner_id: &str) -> Disaster {
        let disaster = {
            let mut store = self.store();
            store.next_id += 1;
            let disaster = Disaster {
                id: format!("fixture-{}", store.next_id),
                title: request.title,
                location_name: request.location_name,
                description: request.description,
                tags: request.tags,
                owner_id: owner_id.to_string(),
                created_at: Utc::now(),
                reports: None,
            };
            store.disasters.insert(0, disaster.clone());
            disaster
        };
        self.publish(None, EventName::DisasterCreated, &disaster);
        disaster
    }

    /// Replaces the content of an existing disaster and broadcasts it.
    /// Returns `None` for unknown ids.
    pub fn update_disaster(&self, id: &str, request: CreateDisasterRequest) -> Option<Disaster> {
        let updated = {
            let mut store = self.store();
            let existing = store.disasters.iter_mut().find(|d| d.id == id)?;
            existing.title = request.title;
            existing.location_name = request.location_name;
            existing.description = request.description;
            existing.tags = request.tags;
            existing.clone()
        };
        self.publish(None, EventName::DisasterUpdated, &updated);
        Some(updated)
    }

    pub fn detail(&self, id: &str, kind: DetailKind) -> DetailSnapshot {
        let store = self.store();
        match kind {
            DetailKind::SocialMedia => {
                DetailSnapshot::SocialMedia(store.social_media.get(id).cloned().unwrap_or_default())
            }
            DetailKind::Resources => {
                DetailSnapshot::Resources(store.resources.get(id).cloned().unwrap_or_default())
            }
            DetailKind::OfficialUpdates => {
                DetailSnapshot::OfficialUpdates(store.updates.get(id).cloned().unwrap_or_default())
            }
        }
    }

    /// Stores a collection without broadcasting.
    pub fn set_detail(&self, id: &str, snapshot: DetailSnapshot) {
        let mut store = self.store();
        let id = id.to_string();
        match snapshot {
            DetailSnapshot::SocialMedia(posts) => {
                store.social_media.insert(id, posts);
            }
            DetailSnapshot::Resources(resources) => {
                store.resources.insert(id, resources);
            }
            DetailSnapshot::OfficialUpdates(updates) => {
                store.updates.insert(id, updates);
            }
        }
    }

    /// Stores a collection and pushes the matching replace-event to the room.
    pub fn replace_detail(&self, id: &str, snapshot: DetailSnapshot) {
        let kind = snapshot.kind();
        self.set_detail(id, snapshot.clone());
        let scope = self.scoped_events.then(|| id.to_string());
        let payload = envelope(snapshot, scope);
        self.publish(Some(id.to_string()), EventName::for_detail(kind), &payload);
    }

    fn publish<T: Serialize>(&self, room: Option<String>, name: EventName, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(event = name.as_str(), error = %err, "failed to encode payload");
                return;
            }
        };
        let frame = frame::encode_event(name.as_str(), &payload);
        // No receivers just means nobody is connected.
        let _ = self.events.send(Outbound::Event { room, frame });
    }

    /// Closes every open websocket session. Clients are expected to reconnect.
    pub fn kick_all(&self) {
        let _ = self.events.send(Outbound::Kick);
    }

    pub fn room_members(&self, room: &str) -> usize {
        self.rooms().values().filter(|joined| joined.contains(room)).count()
    }

    pub(crate) fn open_session(&self) -> (u64, broadcast::Receiver<Outbound>) {
        let id = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.rooms().insert(id, HashSet::new());
        (id, self.events.subscribe())
    }

    pub(crate) fn close_session(&self, session: u64) {
        self.rooms().remove(&session);
    }

    pub(crate) fn join(&self, session: u64, room: &str) {
        if let Some(joined) = self.rooms().get_mut(&session) {
            joined.insert(room.to_string());
        }
    }

    pub(crate) fn leave(&self, session: u64, room: &str) {
        if let Some(joined) = self.rooms().get_mut(&session) {
            joined.remove(room);
        }
    }

    pub(crate) fn in_room(&self, session: u64, room: &str) -> bool {
        self.rooms()
            .get(&session)
            .is_some_and(|joined| joined.contains(room))
    }
}

fn envelope(snapshot: DetailSnapshot, disaster_id: Option<String>) -> Value {
    let encoded = match snapshot {
        DetailSnapshot::SocialMedia(posts) => serde_json::to_value(PostsEnvelope { posts, disaster_id }),
        DetailSnapshot::Resources(resources) => {
            serde_json::to_value(ResourcesEnvelope { resources, disaster_id })
        }
        DetailSnapshot::OfficialUpdates(updates) => {
            serde_json::to_value(UpdatesEnvelope { updates, disaster_id })
        }
    };
    encoded.unwrap_or(Value::Null)
}

pub fn router(state: FixtureState) -> Router {
    Router::new()
        .route("/api/disasters", get(list_disasters).post(create_disaster))
        .route("/api/disasters/:id", put(update_disaster))
        .route("/api/social-media/:id/social-media", get(social_media))
        .route("/api/resources/:id/resources", get(resources))
        .route("/api/updates/:id/official-updates", get(official_updates))
        .route("/fixture/:kind/:id", put(replace_detail))
        .route("/socket.io/", get(socket::socket_handler))
        .with_state(state)
}

/// Binds `addr` and serves the router on a background task.
pub async fn spawn(
    addr: SocketAddr,
    state: FixtureState,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = router(state);
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "fixture server stopped");
        }
    });
    info!(%local, "fixture server listening");
    Ok((local, handle))
}

fn require_user(headers: &HeaderMap) -> Result<String, StatusCode> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)
}

fn valid_request(
    body: Result<Json<CreateDisasterRequest>, JsonRejection>,
) -> Result<CreateDisasterRequest, StatusCode> {
    let Json(request) = body.map_err(|_| StatusCode::BAD_REQUEST)?;
    request.validate().map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(request)
}

async fn list_disasters(
    State(state): State<FixtureState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Disaster>>, StatusCode> {
    require_user(&headers)?;
    Ok(Json(state.disasters()))
}

async fn create_disaster(
    State(state): State<FixtureState>,
    headers: HeaderMap,
    body: Result<Json<CreateDisasterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Disaster>), StatusCode> {
    let user = require_user(&headers)?;
    let request = valid_request(body)?;
    let created = state.create_disaster(request, &user);
    info!(disaster_id = %created.id, "created disaster");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_disaster(
    State(state): State<FixtureState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreateDisasterRequest>, JsonRejection>,
) -> Result<Json<Disaster>, StatusCode> {
    require_user(&headers)?;
    let request = valid_request(body)?;
    state
        .update_disaster(&id, request)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn social_media(
    State(state): State<FixtureState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    read_detail(&state, &id, DetailKind::SocialMedia, &headers)
}

async fn resources(
    State(state): State<FixtureState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    read_detail(&state, &id, DetailKind::Resources, &headers)
}

async fn official_updates(
    State(state): State<FixtureState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    read_detail(&state, &id, DetailKind::OfficialUpdates, &headers)
}

fn read_detail(
    state: &FixtureState,
    id: &str,
    kind: DetailKind,
    headers: &HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    require_user(headers)?;
    Ok(Json(envelope(state.detail(id, kind), None)))
}

async fn replace_detail(
    State(state): State<FixtureState>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(items): Json<Value>,
) -> StatusCode {
    if require_user(&headers).is_err() {
        return StatusCode::UNAUTHORIZED;
    }
    let Ok(kind) = kind.parse::<DetailKind>() else {
        return StatusCode::NOT_FOUND;
    };
    let snapshot = match kind {
        DetailKind::SocialMedia => serde_json::from_value(items).map(DetailSnapshot::SocialMedia),
        DetailKind::Resources => serde_json::from_value(items).map(DetailSnapshot::Resources),
        DetailKind::OfficialUpdates => {
            serde_json::from_value(items).map(DetailSnapshot::OfficialUpdates)
        }
    };
    match snapshot {
        Ok(snapshot) => {
            state.replace_detail(&id, snapshot);
            StatusCode::NO_CONTENT
        }
        Err(_) => StatusCode::BAD_REQUEST,
    }
}
