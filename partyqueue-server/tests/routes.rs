use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use partyqueue_collab::{Collab, Database, MemoryDatabase};
use partyqueue_core::{Config, ManualTime};
use partyqueue_server::{app, ServerContext, ServerSentEvents};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestServer {
    app: axum::Router,
    database: Arc<MemoryDatabase>,
    time: ManualTime,
}

fn setup_test_server() -> TestServer {
    let database = Arc::new(MemoryDatabase::new());
    let time = ManualTime::at_epoch();

    let shared: Arc<dyn Database> = database.clone();
    let collab = Collab::with_time(Config::default(), shared, Arc::new(time.clone()));

    let context = ServerContext {
        collab: Arc::new(collab),
        sse: ServerSentEvents::new(),
    };

    TestServer {
        app: app(context),
        database,
        time,
    }
}

impl TestServer {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(path);

        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, value)
    }

    async fn create_room(&self, id: &str) {
        let (status, _) = self
            .request(Method::POST, "/v1/rooms", Some(json!({ "id": id })))
            .await;

        assert_eq!(status, StatusCode::OK, "room {} is created", id);
    }

    async fn enqueue(&self, room: &str, song: &str, duration: u64) -> StatusCode {
        let path = format!("/v1/rooms/{}/queue", room);
        let body = json!({ "songId": song, "durationMs": duration });

        self.request(Method::POST, &path, Some(body)).await.0
    }

    async fn action(&self, room: &str, action: Value) -> StatusCode {
        let path = format!("/v1/rooms/{}/actions", room);
        self.request(Method::POST, &path, Some(action)).await.0
    }
}

#[tokio::test]
async fn test_create_and_read_room() {
    let server = setup_test_server();

    let (status, created) = server
        .request(Method::POST, "/v1/rooms", Some(json!({})))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["hostToken"].as_str().map(str::len), Some(32), "host token is returned");

    let id = created["room"]["id"].as_str().unwrap().to_string();
    let (status, room) = server
        .request(Method::GET, &format!("/v1/rooms/{}", id), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(room["status"], "idle", "new rooms are idle");
    assert!(room.get("hostToken").is_none(), "the host token is not exposed");

    let (_, rooms) = server.request(Method::GET, "/v1/rooms", None).await;
    assert_eq!(rooms.as_array().map(Vec::len), Some(1), "room is listed");
}

#[tokio::test]
async fn test_duplicate_room_conflicts() {
    let server = setup_test_server();
    server.create_room("party").await;

    let (status, _) = server
        .request(Method::POST, "/v1/rooms", Some(json!({ "id": "party" })))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_missing_room() {
    let server = setup_test_server();

    let (status, _) = server.request(Method::GET, "/v1/rooms/nope/queue", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_queue_flow() {
    let server = setup_test_server();
    server.create_room("party").await;

    assert_eq!(server.enqueue("party", "songA", 1_000).await, StatusCode::OK);
    assert_eq!(server.enqueue("party", "songB", 2_000).await, StatusCode::OK);

    let (_, now_playing) = server
        .request(Method::GET, "/v1/rooms/party/now-playing", None)
        .await;

    assert_eq!(now_playing["status"], "playing", "first song plays");
    assert_eq!(now_playing["item"]["songId"], "songA");
    assert_eq!(now_playing["remainingMs"], 1_000);

    let (_, queue) = server
        .request(Method::GET, "/v1/rooms/party/queue", None)
        .await;

    assert_eq!(queue[0]["songId"], "songB", "second song waits");
    assert_eq!(queue.as_array().map(Vec::len), Some(1));

    server.time.advance_millis(400);

    let status = server
        .action("party", json!({ "type": "skip", "songId": "songA" }))
        .await;
    assert_eq!(status, StatusCode::OK, "skip of the playing song works");

    let status = server
        .action("party", json!({ "type": "skip", "songId": "songA" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "a stale skip is rejected");

    let (_, now_playing) = server
        .request(Method::GET, "/v1/rooms/party/now-playing", None)
        .await;

    assert_eq!(now_playing["item"]["songId"], "songB", "songB is playing");
    assert_eq!(now_playing["remainingMs"], 2_000);
}

#[tokio::test]
async fn test_actions_map_transitions() {
    let server = setup_test_server();
    server.create_room("party").await;

    let status = server.action("party", json!({ "type": "pause" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "idle rooms cannot pause");

    server.enqueue("party", "song", 180_000).await;

    assert_eq!(server.action("party", json!({ "type": "pause" })).await, StatusCode::OK);
    assert_eq!(
        server.action("party", json!({ "type": "pause" })).await,
        StatusCode::CONFLICT,
        "pausing twice conflicts"
    );
    assert_eq!(server.action("party", json!({ "type": "resume" })).await, StatusCode::OK);
}

#[tokio::test]
async fn test_enqueue_returns_the_committed_song() {
    let server = setup_test_server();
    server.create_room("party").await;

    let path = "/v1/rooms/party/queue";

    let (status, first) = server
        .request(Method::POST, path, Some(json!({ "songId": "a", "durationMs": 1 })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["songId"], "a");
    assert_eq!(first["playing"], true, "the first song is returned playing");

    // Once a has played, enqueueing it again is a fresh insert rather than an error
    server.time.advance_millis(1);
    server
        .action("party", json!({ "type": "skip", "songId": "a" }))
        .await;

    let (status, again) = server
        .request(Method::POST, path, Some(json!({ "songId": "a", "durationMs": 1_000 })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["votes"], 1, "a was inserted again");
}

#[tokio::test]
async fn test_boost() {
    let server = setup_test_server();
    server.create_room("party").await;

    for song in ["a", "b", "c", "d"] {
        server.enqueue("party", song, 1_000).await;
    }

    server.time.advance_millis(10);

    let (status, boosted) = server
        .request(Method::POST, "/v1/rooms/party/queue/d/boost", None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(boosted["votes"], 2, "the vote is counted");

    let (_, queue) = server
        .request(Method::GET, "/v1/rooms/party/queue", None)
        .await;

    let order: Vec<_> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["songId"].as_str().unwrap().to_string())
        .collect();

    assert_eq!(order, ["b", "d", "c"], "d moved ahead of c");

    let (status, _) = server
        .request(Method::POST, "/v1/rooms/party/queue/ghost/boost", None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND, "unknown songs cannot be boosted");
}

#[tokio::test]
async fn test_invalid_bodies() {
    let server = setup_test_server();
    server.create_room("party").await;

    assert_eq!(
        server.enqueue("party", "", 1_000).await,
        StatusCode::BAD_REQUEST,
        "empty song ids are rejected"
    );
    assert_eq!(
        server.enqueue("party", "song", 0).await,
        StatusCode::BAD_REQUEST,
        "songs need a duration"
    );
    assert_eq!(
        server.enqueue("party", "song", i64::MAX as u64 + 1).await,
        StatusCode::BAD_REQUEST,
        "durations that cannot be stored are rejected"
    );
    assert_eq!(
        server.enqueue("party", "song", u64::MAX).await,
        StatusCode::BAD_REQUEST,
        "the largest duration is rejected too"
    );

    let (_, queue) = server
        .request(Method::GET, "/v1/rooms/party/queue", None)
        .await;

    assert_eq!(queue.as_array().map(Vec::len), Some(0), "nothing was queued");
}

#[tokio::test]
async fn test_unavailable_storage() {
    let server = setup_test_server();
    server.create_room("party").await;
    server.enqueue("party", "a", 1_000).await;

    server.database.set_unavailable(true);

    assert_eq!(
        server.enqueue("party", "b", 1_000).await,
        StatusCode::SERVICE_UNAVAILABLE,
        "storage failures are reported"
    );

    server.database.set_unavailable(false);

    let (_, queue) = server
        .request(Method::GET, "/v1/rooms/party/queue", None)
        .await;

    assert_eq!(queue.as_array().map(Vec::len), Some(0), "nothing was queued");
}

#[tokio::test]
async fn test_metadata_is_joined() {
    let server = setup_test_server();
    server.create_room("party").await;

    let (status, _) = server
        .request(
            Method::PUT,
            "/v1/songs/b",
            Some(json!({ "title": "Title", "artist": "Artist" })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "metadata is stored");

    server.enqueue("party", "a", 1_000).await;
    server.enqueue("party", "b", 1_000).await;
    server.enqueue("party", "c", 1_000).await;

    let (_, queue) = server
        .request(Method::GET, "/v1/rooms/party/queue", None)
        .await;

    assert_eq!(queue[0]["metadata"]["title"], "Title", "known songs have metadata");
    assert!(queue[1]["metadata"].is_null(), "unknown songs have none");
}

#[tokio::test]
async fn test_api_document() {
    let server = setup_test_server();
    let (status, api) = server.request(Method::GET, "/api.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(api["paths"]["/v1/rooms"].is_object(), "rooms are documented");
}
