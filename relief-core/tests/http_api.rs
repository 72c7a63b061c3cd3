use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use relief_core::api::HttpApi;
use relief_core::error::{ApiFailure, ApiOperation};
use relief_core::loader::SnapshotSource;
use relief_core::submitter::create_disaster;
use relief_core::{DetailKind, DetailSnapshot, ReliefConfig, SubmitError};
use disaster_registry::DisasterDraft;
use serde_json::{json, Value};
use std::time::Duration;

fn disaster_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "location_name": "Manhattan, NYC",
        "description": "water rising",
        "tags": ["flood"],
        "owner_id": "netrunnerX",
        "created_at": "2025-06-20T10:00:00Z"
    })
}

async fn list(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    match headers.get("x-user-id").and_then(|v| v.to_str().ok()) {
        Some("netrunnerX") => Ok(Json(json!([
            disaster_json("d1", "Flood"),
            disaster_json("d2", "Fire"),
            disaster_json("d1", "Flood duplicate"),
        ]))),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

async fn posts(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "d1" => Ok(Json(json!({
            "posts": [{
                "id": "p1",
                "platform": "twitter",
                "user": "citizen1",
                "content": "need water",
                "timestamp": "2025-06-20T10:05:00Z",
                "location": "Delancey St",
                "urgency": "high"
            }]
        }))),
        "broken" => Ok(Json(json!({ "items": [] }))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({ "resources": [] }))
}

async fn create(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let title = body.get("title").and_then(Value::as_str).unwrap_or_default();
    (StatusCode::CREATED, Json(disaster_json("new-1", title)))
}

async fn stub() -> ReliefConfig {
    let app = Router::new()
        .route("/api/disasters", get(list).post(create))
        .route("/api/social-media/:id/social-media", get(posts))
        .route("/api/resources/:id/resources", get(slow));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    ReliefConfig::new(&format!("http://{addr}"), "netrunnerX").expect("config")
}

#[tokio::test]
async fn list_sends_identity_and_normalizes() {
    let api = HttpApi::new(&stub().await).expect("api");
    let list = api.fetch_disasters().await.expect("list");
    let ids: Vec<_> = list.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2"]);
    assert_eq!(list[0].title, "Flood");
}

#[tokio::test]
async fn wrong_identity_is_status_error() {
    let mut config = stub().await;
    config.user_id = "someoneElse".into();
    let api = HttpApi::new(&config).expect("api");
    let err = api.fetch_disasters().await.expect_err("unauthorized");
    assert_eq!(err.operation, ApiOperation::ListDisasters);
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn detail_fetch_decodes_envelope() {
    let api = HttpApi::new(&stub().await).expect("api");
    let snapshot = api
        .fetch_detail("d1", DetailKind::SocialMedia)
        .await
        .expect("posts");
    let DetailSnapshot::SocialMedia(posts) = snapshot else {
        panic!("expected posts");
    };
    assert_eq!(posts.len(), 1);
    assert!(!posts[0].verified);
}

#[tokio::test]
async fn detail_errors_carry_context() {
    let api = HttpApi::new(&stub().await).expect("api");

    let missing = api
        .fetch_detail("d9", DetailKind::SocialMedia)
        .await
        .expect_err("404");
    assert_eq!(missing.status(), Some(404));
    assert_eq!(missing.disaster_id.as_deref(), Some("d9"));
    assert_eq!(missing.detail_kind(), Some(DetailKind::SocialMedia));

    let broken = api
        .fetch_detail("broken", DetailKind::SocialMedia)
        .await
        .expect_err("decode");
    assert!(matches!(broken.failure, ApiFailure::Decode(_)));
}

#[tokio::test]
async fn reserved_characters_stay_inside_the_disaster_id() {
    let api = HttpApi::new(&stub().await).expect("api");
    for id in ["d1/social-media#", "d1?x=1", "d1%2Fsocial-media"] {
        let err = api
            .fetch_detail(id, DetailKind::SocialMedia)
            .await
            .expect_err("another disaster's posts");
        assert_eq!(err.status(), Some(404), "{id}");
        assert_eq!(err.disaster_id.as_deref(), Some(id));
    }
}

#[tokio::test]
async fn dot_segment_ids_are_rejected_before_sending() {
    let api = HttpApi::new(&stub().await).expect("api");
    for id in ["..", ".", ""] {
        let err = api
            .fetch_detail(id, DetailKind::SocialMedia)
            .await
            .expect_err("unaddressable");
        assert_eq!(err.failure, ApiFailure::UnaddressableId);
    }
}

#[tokio::test]
async fn slow_response_times_out() {
    let mut config = stub().await;
    config.request_timeout = Duration::from_millis(200);
    let api = HttpApi::new(&config).expect("api");
    let err = api
        .fetch_detail("d1", DetailKind::Resources)
        .await
        .expect_err("timeout");
    assert_eq!(err.failure, ApiFailure::Timeout);
}

#[tokio::test]
async fn unreachable_api_is_transport_error() {
    let config = ReliefConfig::new("http://127.0.0.1:9", "netrunnerX").expect("config");
    let api = HttpApi::new(&config).expect("api");
    let err = api.fetch_disasters().await.expect_err("unreachable");
    assert!(matches!(err.failure, ApiFailure::Transport(_)));
}

#[tokio::test]
async fn create_posts_validated_draft() {
    let api = HttpApi::new(&stub().await).expect("api");
    let draft = DisasterDraft {
        title: "  Blackout ".into(),
        location_name: "Brooklyn".into(),
        description: "Power outage".into(),
        tags: "power".into(),
    };
    let created = create_disaster(&api, &draft).await.expect("created");
    assert_eq!(created.id, "new-1");
    assert_eq!(created.title, "Blackout");

    let invalid = DisasterDraft::default();
    assert!(matches!(
        create_disaster(&api, &invalid).await,
        Err(SubmitError::Validation(_))
    ));
}
