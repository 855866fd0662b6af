//! Integration tests for the todo REST API and change feed.
//!
//! Each test spins up an Axum server on a random port and talks to it over
//! real HTTP (reqwest) and WebSocket (tokio-tungstenite) connections.

use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use todo_app::todos::{AppState, TodoStore, todo_routes};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start an Axum server on a random port, return its base URL.
async fn start_server(store: TodoStore) -> String {
    let app = todo_routes(AppState::new(store));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("127.0.0.1:{port}")
}

fn seeded() -> TodoStore {
    let mut store = TodoStore::in_memory();
    store.seed_demo().unwrap();
    store
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── REST Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_counts() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(seeded()).await;

        let resp = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "OK");
        assert_eq!(body["totalTodos"], 2);
        assert_eq!(body["completedTodos"], 1);
        assert!(body["timestamp"].is_string());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn crud_round_trip() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(TodoStore::in_memory()).await;
        let client = reqwest::Client::new();

        // Create
        let resp = client
            .post(format!("http://{addr}/api/todos"))
            .json(&json!({ "title": "  Write report  " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let created: Value = resp.json().await.unwrap();
        assert_eq!(created["id"], 1);
        assert_eq!(created["title"], "Write report");
        assert_eq!(created["completed"], false);
        assert!(created["completedAt"].is_null());

        // Update
        let resp = client
            .put(format!("http://{addr}/api/todos/1"))
            .json(&json!({ "completed": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let updated: Value = resp.json().await.unwrap();
        assert_eq!(updated["completed"], true);
        assert!(updated["completedAt"].is_string());

        // Read
        let fetched: Value = reqwest::get(format!("http://{addr}/api/todos/1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(fetched, updated);

        // Delete
        let resp = client
            .delete(format!("http://{addr}/api/todos/1"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Todo deleted");
        assert_eq!(body["todo"]["id"], 1);

        let resp = reqwest::get(format!("http://{addr}/api/todos/1")).await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Todo 1 not found");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn create_rejects_blank_title() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(TodoStore::in_memory()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("http://{addr}/api/todos"))
            .json(&json!({ "title": "   " }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Title is required");

        let todos: Value = reqwest::get(format!("http://{addr}/api/todos"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(todos.as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn list_filters_by_status() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(seeded()).await;

        let all: Value = reqwest::get(format!("http://{addr}/api/todos"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let all = all.as_array().unwrap();
        assert_eq!(all.len(), 2);
        // Newest first.
        assert_eq!(all[0]["title"], "First demo todo");

        let done: Value = reqwest::get(format!("http://{addr}/api/todos?status=completed"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let done = done.as_array().unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0]["completed"], true);

        let resp = reqwest::get(format!("http://{addr}/api/todos?status=someday"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn clear_completed_keeps_pending() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(seeded()).await;
        let client = reqwest::Client::new();

        let body: Value = client
            .delete(format!("http://{addr}/api/todos?completed=true"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["deleted"], 1);

        let todos: Value = reqwest::get(format!("http://{addr}/api/todos"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let todos = todos.as_array().unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0]["completed"], false);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(TodoStore::in_memory()).await;

        let resp = reqwest::get(format!("http://{addr}/api/nothing-here")).await.unwrap();
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "API endpoint not found");
    })
    .await
    .expect("test timed out");
}

// ── WebSocket Tests ─────────────────────────────────────────────────

#[tokio::test]
async fn ws_connect_receives_sync() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(seeded()).await;

        let (mut ws, _resp) = connect_async(format!("ws://{addr}/ws/todos"))
            .await
            .expect("WS connect failed");

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);

        assert_eq!(json["type"], "todos_sync");
        assert_eq!(json["todos"].as_array().unwrap().len(), 2);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_receives_rest_changes() {
    timeout(TEST_TIMEOUT, async {
        let addr = start_server(TodoStore::in_memory()).await;
        let client = reqwest::Client::new();

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws/todos")).await.unwrap();
        let sync = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(sync["type"], "todos_sync");
        assert!(sync["todos"].as_array().unwrap().is_empty());

        client
            .post(format!("http://{addr}/api/todos"))
            .json(&json!({ "text": "From the feed" }))
            .send()
            .await
            .unwrap();

        let created = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(created["type"], "todo_created");
        assert_eq!(created["todo"]["title"], "From the feed");

        client
            .delete(format!("http://{addr}/api/todos/1"))
            .send()
            .await
            .unwrap();

        let deleted = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(deleted["type"], "todo_deleted");
        assert_eq!(deleted["id"], 1);
    })
    .await
    .expect("test timed out");
}
