use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use disaster_registry::{Disaster, DisasterDraft, SocialMediaPost, Urgency};
use relief_client::context::ReliefContext;
use relief_client::runtime::{ReliefHandle, ReliefRuntime};
use relief_client::sink::WatchSink;
use relief_client::ClientError;
use relief_core::error::{ApiError, ApiFailure, ApiOperation};
use relief_core::events::LiveEvent;
use relief_core::loader::SnapshotSource;
use relief_core::submitter::DisasterWriter;
use relief_core::subscription::RoomChannel;
use relief_core::transport::{Inbox, PushChannel};
use relief_core::{ConnectionError, DetailKind, DetailSnapshot, Inbound, ReliefState, SubmitError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

fn disaster(id: &str, title: &str) -> Disaster {
    Disaster {
        id: id.into(),
        title: title.into(),
        location_name: "Manhattan, NYC".into(),
        description: "desc".into(),
        tags: vec!["flood".into()],
        owner_id: "netrunnerX".into(),
        created_at: Utc.with_ymd_and_hms(2025, 6, 20, 10, 0, 0).unwrap(),
        reports: None,
    }
}

fn posts_for(id: &str, n: usize) -> Vec<SocialMediaPost> {
    (0..n)
        .map(|i| SocialMediaPost {
            id: format!("{id}-post-{i}"),
            platform: "twitter".into(),
            user: "citizen".into(),
            content: format!("about {id}"),
            timestamp: "2025-06-20T10:00:00Z".into(),
            location: "NYC".into(),
            urgency: Urgency::Medium,
            verified: false,
        })
        .collect()
}

/// Detail fetches block until their disaster's gate is opened.
#[derive(Default)]
struct GatedSource {
    disasters: Mutex<Vec<Disaster>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    finished: Mutex<HashMap<String, usize>>,
    list_calls: AtomicUsize,
    fail_lists: AtomicBool,
}

impl GatedSource {
    fn gate(&self, id: &str) -> Arc<Semaphore> {
        let mut gates = self.gates.lock().expect("lock");
        Arc::clone(
            gates
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(0))),
        )
    }

    fn open(&self, id: &str) {
        self.gate(id).add_permits(DetailKind::ALL.len());
    }

    fn finished(&self, id: &str) -> usize {
        self.finished.lock().expect("lock").get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SnapshotSource for GatedSource {
    async fn fetch_disasters(&self) -> Result<Vec<Disaster>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(ApiError {
                operation: ApiOperation::ListDisasters,
                endpoint: "fake".into(),
                disaster_id: None,
                failure: ApiFailure::Status(503),
            });
        }
        Ok(self.disasters.lock().expect("lock").clone())
    }

    async fn fetch_detail(
        &self,
        disaster_id: &str,
        kind: DetailKind,
    ) -> Result<DetailSnapshot, ApiError> {
        let gate = self.gate(disaster_id);
        gate.acquire().await.expect("gate").forget();
        *self
            .finished
            .lock()
            .expect("lock")
            .entry(disaster_id.to_string())
            .or_default() += 1;
        Ok(match kind {
            DetailKind::SocialMedia => DetailSnapshot::SocialMedia(posts_for(disaster_id, 2)),
            DetailKind::Resources => DetailSnapshot::Resources(Vec::new()),
            DetailKind::OfficialUpdates => DetailSnapshot::OfficialUpdates(Vec::new()),
        })
    }
}

#[derive(Default)]
struct RecordingWriter {
    calls: AtomicUsize,
}

#[async_trait]
impl DisasterWriter for RecordingWriter {
    async fn post_disaster(
        &self,
        request: &disaster_registry::CreateDisasterRequest,
    ) -> Result<Disaster, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(disaster("created-1", &request.title))
    }
}

#[derive(Default)]
struct FakeChannel {
    log: Mutex<Vec<String>>,
    disconnected: AtomicBool,
}

impl RoomChannel for FakeChannel {
    fn subscribe(&self, room: &str) -> Result<(), ConnectionError> {
        self.log.lock().expect("lock").push(format!("join:{room}"));
        Ok(())
    }

    fn unsubscribe(&self, room: &str) -> Result<(), ConnectionError> {
        self.log.lock().expect("lock").push(format!("leave:{room}"));
        Ok(())
    }
}

#[async_trait]
impl PushChannel for FakeChannel {
    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    source: Arc<GatedSource>,
    writer: Arc<RecordingWriter>,
    channel: Arc<FakeChannel>,
    inbox: Inbox,
    handle: ReliefHandle,
    view: watch::Receiver<ReliefState>,
}

fn start(initial: Vec<Disaster>) -> Harness {
    let source = Arc::new(GatedSource::default());
    *source.disasters.lock().expect("lock") = initial;
    let writer = Arc::new(RecordingWriter::default());
    let channel = Arc::new(FakeChannel::default());
    let context = ReliefContext::from_parts(source.clone(), writer.clone(), channel.clone());
    let inbox = context.inbox_sender();
    let (sink, view) = WatchSink::new();
    let handle = ReliefRuntime::spawn(context, sink);
    Harness {
        source,
        writer,
        channel,
        inbox,
        handle,
        view,
    }
}

async fn wait_until(view: &mut watch::Receiver<ReliefState>, done: impl FnMut(&ReliefState) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), view.wait_for(done))
        .await
        .expect("state in time")
        .expect("runtime alive");
}

async fn settle(source: &GatedSource, id: &str) {
    for _ in 0..200 {
        if source.finished(id) == DetailKind::ALL.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn loads_disaster_list_on_start() {
    let mut h = start(vec![disaster("d1", "Flood"), disaster("d2", "Fire")]);
    wait_until(&mut h.view, |s| s.disasters.len() == 2 && !s.loading).await;
    assert_eq!(h.source.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn late_fetch_for_previous_selection_never_lands() {
    let mut h = start(vec![disaster("d1", "Flood"), disaster("d2", "Fire")]);
    h.handle.select(Some("d1")).expect("select");
    h.handle.select(Some("d2")).expect("select");

    h.source.open("d2");
    wait_until(&mut h.view, |s| s.social_media.len() == 2).await;
    h.source.open("d1");
    settle(&h.source, "d1").await;

    let state = h.handle.snapshot().await.expect("snapshot");
    assert_eq!(state.selected.as_deref(), Some("d2"));
    assert!(state.social_media.iter().all(|p| p.id.starts_with("d2-")));
    assert_eq!(
        *h.channel.log.lock().expect("lock"),
        vec!["join:d1", "leave:d1", "join:d2"]
    );
}

#[tokio::test]
async fn live_update_replaces_entry_in_place() {
    let mut h = start(vec![disaster("d0", "Fire"), disaster("d1", "Flood")]);
    wait_until(&mut h.view, |s| s.disasters.len() == 2).await;

    let mut severe = disaster("d1", "Flood - Severe");
    severe.tags = vec!["flood".into(), "severe".into()];
    h.inbox
        .send(Inbound::Live(Ok(LiveEvent::DisasterUpdated(severe))))
        .expect("inbox");
    wait_until(&mut h.view, |s| s.disasters[1].title == "Flood - Severe").await;

    let state = h.handle.snapshot().await.expect("snapshot");
    assert_eq!(state.disasters.len(), 2);
    assert_eq!(state.disasters[1].tags, vec!["flood", "severe"]);
}

#[tokio::test]
async fn invalid_draft_is_rejected_without_request() {
    let h = start(Vec::new());
    let err = h
        .handle
        .create_disaster(DisasterDraft::default())
        .await
        .expect_err("invalid");
    let ClientError::Submit(SubmitError::Validation(validation)) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(validation.field, "title");
    assert_eq!(h.writer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn successful_create_refreshes_list() {
    let mut h = start(Vec::new());
    wait_until(&mut h.view, |s| !s.loading).await;
    h.source
        .disasters
        .lock()
        .expect("lock")
        .push(disaster("created-1", "Blackout"));

    let created = h
        .handle
        .create_disaster(DisasterDraft {
            title: "Blackout".into(),
            location_name: "Brooklyn".into(),
            description: "Power out".into(),
            tags: String::new(),
        })
        .await
        .expect("created");
    assert_eq!(created.id, "created-1");
    wait_until(&mut h.view, |s| s.disaster("created-1").is_some()).await;
    assert_eq!(h.source.list_calls.load(Ordering::SeqCst), 2);

    // The live event for the same disaster must not duplicate it.
    h.inbox
        .send(Inbound::Live(Ok(LiveEvent::DisasterCreated(created))))
        .expect("inbox");
    let state = h.handle.snapshot().await.expect("snapshot");
    assert_eq!(state.disasters.len(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_list_and_records_error() {
    let mut h = start(vec![disaster("d1", "Flood")]);
    wait_until(&mut h.view, |s| s.disasters.len() == 1).await;
    h.source.fail_lists.store(true, Ordering::SeqCst);
    h.handle.refresh().expect("refresh");
    wait_until(&mut h.view, |s| s.last_error.is_some()).await;
    let state = h.handle.snapshot().await.expect("snapshot");
    assert_eq!(state.disasters.len(), 1);
    assert!(!state.loading);
}

#[tokio::test]
async fn clearing_selection_leaves_room_and_empties_details() {
    let mut h = start(vec![disaster("d1", "Flood")]);
    h.handle.select(Some("d1")).expect("select");
    h.source.open("d1");
    wait_until(&mut h.view, |s| s.social_media.len() == 2).await;

    h.handle.select(None).expect("clear");
    wait_until(&mut h.view, |s| s.selected.is_none()).await;
    let state = h.handle.snapshot().await.expect("snapshot");
    assert!(state.social_media.is_empty());
    assert_eq!(
        h.channel.log.lock().expect("lock").last().map(String::as_str),
        Some("leave:d1")
    );
}

#[tokio::test]
async fn shutdown_disconnects_and_stops() {
    let h = start(Vec::new());
    h.handle.shutdown().await;
    assert!(h.channel.disconnected.load(Ordering::SeqCst));
    assert!(matches!(h.handle.refresh(), Err(ClientError::Stopped)));
}
