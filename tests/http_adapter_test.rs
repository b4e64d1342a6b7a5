//! Integration tests for the HTTP transport.
//!
//! A small axum server stands in for the remote store. It serves a
//! `MemoryTransport` over the same REST shape the real store uses:
//! `GET/POST /{collection}` and `GET/PUT/DELETE /{collection}/{id}`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use scrumsync::engine::{SyncEngine, SyncSettings};
use scrumsync::models::{NewTask, Task, TaskStatus};
use scrumsync::remote::{HttpTransport, MemoryTransport, RemoteError, RemoteStore, Transport};
use scrumsync::seed;

#[derive(Clone)]
struct Server {
    store: Arc<MemoryTransport>,
    per_page: Arc<AtomicU32>,
}

fn reply(result: Result<Value, RemoteError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(RemoteError::NotFound { .. }) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn list(
    State(server): State<Server>,
    Path(collection): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if collection == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    let per_page = query
        .get("per_page")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    server.per_page.store(per_page, Ordering::SeqCst);
    reply(server.store.list(&collection, per_page).await)
}

async fn create(
    State(server): State<Server>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if body.get("title") == Some(&json!("")) {
        return (StatusCode::UNPROCESSABLE_ENTITY, "title required").into_response();
    }
    reply(server.store.create(&collection, body).await)
}

async fn fetch(
    State(server): State<Server>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    reply(server.store.get(&collection, &id).await)
}

async fn replace(
    State(server): State<Server>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    reply(server.store.replace(&collection, &id, body).await)
}

async fn remove(
    State(server): State<Server>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    match server.store.delete(&collection, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => reply(Err(e)),
    }
}

/// Start the stand-in store on an ephemeral port.
async fn spawn_server() -> (Server, SocketAddr) {
    let server = Server {
        store: Arc::new(MemoryTransport::new()),
        per_page: Arc::new(AtomicU32::new(0)),
    };
    let app = Router::new()
        .route("/:collection", get(list).post(create))
        .route("/:collection/:id", get(fetch).put(replace).delete(remove))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, addr)
}

fn transport(addr: SocketAddr) -> HttpTransport {
    HttpTransport::new(&format!("http://{}/", addr), Some(Duration::from_secs(5))).unwrap()
}

fn remote(addr: SocketAddr) -> RemoteStore {
    RemoteStore::new(Arc::new(transport(addr)))
}

#[tokio::test]
async fn test_engine_round_trip_over_http() {
    let (server, addr) = spawn_server().await;
    let id = server.store.insert("tasks", json!({"title": "Existing", "status": "new"}));
    let engine = SyncEngine::new(remote(addr), SyncSettings::default());

    let summary = engine.load_all().await.unwrap();
    assert_eq!(summary.tasks, 1);

    let created = engine.create_task(NewTask::new("Over the wire")).await.unwrap();
    assert!(!created.id.starts_with("tmp-"));
    assert_eq!(server.store.len("tasks"), 2);

    let moved = engine.move_task(&id, TaskStatus::InProgress).await.unwrap();
    assert_eq!(moved.status, TaskStatus::InProgress);
    assert_eq!(
        server.store.record("tasks", &id).unwrap()["status"],
        "in-progress"
    );

    engine.delete_task(&created.id).await.unwrap();
    assert_eq!(server.store.len("tasks"), 1);
}

#[tokio::test]
async fn test_list_sends_page_size() {
    let (server, addr) = spawn_server().await;
    let remote = remote(addr).with_per_page(250);

    let tasks = remote.list::<Task>().await.unwrap();
    assert!(tasks.is_empty());
    assert_eq!(server.per_page.load(Ordering::SeqCst), 250);
}

#[tokio::test]
async fn test_missing_record_maps_to_not_found() {
    let (_server, addr) = spawn_server().await;
    let err = remote(addr).get::<Task>("99").await.unwrap_err();
    assert_eq!(
        err,
        RemoteError::NotFound {
            collection: "tasks".to_string(),
            id: "99".to_string(),
        }
    );
}

#[tokio::test]
async fn test_client_error_maps_to_validation_rejected() {
    let (_server, addr) = spawn_server().await;
    let task = Task::new(String::new(), String::new());
    let err = remote(addr).create(&task).await.unwrap_err();
    assert_eq!(err.category(), "validation_rejected");
    assert!(err.to_string().contains("title required"));
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let (_server, addr) = spawn_server().await;
    let err = transport(addr).list("broken", 10).await.unwrap_err();
    assert_eq!(err.category(), "remote_unavailable");
}

#[tokio::test]
async fn test_refused_connection_is_unavailable() {
    let addr = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let err = remote(addr).list::<Task>().await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)));
}

#[tokio::test]
async fn test_truncated_body_is_unavailable() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Promises more body than it sends, then hangs up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n[{\"id\": 1")
            .await;
        let _ = socket.shutdown().await;
    });

    let err = remote(addr).list::<Task>().await.unwrap_err();
    assert!(matches!(err, RemoteError::Unavailable(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_seed_over_http_runs_once() {
    let (server, addr) = spawn_server().await;
    let remote = remote(addr);

    assert!(seed::init_database(&remote).await.unwrap());
    assert_eq!(server.store.len("sprints"), 2);
    assert!(server.store.len("tasks") > 0);
    assert!(!seed::init_database(&remote).await.unwrap());
    assert_eq!(server.store.len("sprints"), 2);
}
