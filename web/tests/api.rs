//! Integration tests for the ticket HTTP API.
//!
//! Runs the full router against the in-memory backend and asserts the wire
//! contracts: response shapes, status codes per error class, and the
//! end-to-end lifecycle through HTTP alone.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum_test::TestServer;
use queueline_testing::helpers::{EngineFixture, engine_with_branch};
use queueline_web::{AppState, build_router};
use serde_json::{Value, json};
use uuid::Uuid;

// ============================================================================
// Test Fixtures
// ============================================================================

fn server(fixture: &EngineFixture) -> TestServer {
    TestServer::new(build_router(AppState::new(fixture.engine.clone()))).unwrap()
}

fn branch_uuid(fixture: &EngineFixture) -> String {
    fixture.branch_id.as_uuid().to_string()
}

async fn issue(server: &TestServer, branch_id: &str, service_type: &str) -> Value {
    let response = server
        .post("/tickets")
        .json(&json!({
            "branch_id": branch_id,
            "service_type": service_type,
        }))
        .await;
    response.assert_status(http::StatusCode::CREATED);
    response.json::<Value>()
}

async fn set_status(server: &TestServer, ticket_id: &str, status: &str) -> Value {
    let response = server
        .patch(&format!("/tickets/{ticket_id}/status"))
        .json(&json!({ "status": status }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

// ============================================================================
// Issuance
// ============================================================================

#[tokio::test]
async fn test_issue_ticket_returns_created_waiting_ticket() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);

    let response = server
        .post("/tickets")
        .json(&json!({
            "branch_id": branch_uuid(&fixture),
            "service_type": "teller",
            "customer_name": "Dana",
            "priority": 3,
        }))
        .await;

    response.assert_status(http::StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "WAITING");
    assert_eq!(body["service_type"], "teller");
    assert_eq!(body["customer_name"], "Dana");
    assert_eq!(body["priority"], 3);
    assert!(body["called_at"].is_null());
}

#[tokio::test]
async fn test_issue_with_empty_service_type_is_400() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);

    let response = server
        .post("/tickets")
        .json(&json!({
            "branch_id": branch_uuid(&fixture),
            "service_type": "  ",
        }))
        .await;

    response.assert_status(http::StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_issue_against_unknown_branch_is_404() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);

    let response = server
        .post("/tickets")
        .json(&json!({
            "branch_id": Uuid::new_v4().to_string(),
            "service_type": "teller",
        }))
        .await;

    response.assert_status(http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issue_at_capacity_is_409() {
    let fixture = engine_with_branch(1);
    let server = server(&fixture);
    let branch = branch_uuid(&fixture);

    issue(&server, &branch, "teller").await;
    let response = server
        .post("/tickets")
        .json(&json!({ "branch_id": branch, "service_type": "teller" }))
        .await;

    response.assert_status(http::StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "CONFLICT");
}

// ============================================================================
// Transitions
// ============================================================================

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let fixture = engine_with_branch(2);
    let server = server(&fixture);
    let branch = branch_uuid(&fixture);

    let ticket = issue(&server, &branch, "loans").await;
    let id = ticket["id"].as_str().unwrap().to_string();

    let called = set_status(&server, &id, "CALLED").await;
    assert_eq!(called["status"], "CALLED");
    assert!(!called["called_at"].is_null());

    set_status(&server, &id, "SERVING").await;
    let completed = set_status(&server, &id, "COMPLETED").await;
    assert_eq!(completed["status"], "COMPLETED");

    // The slot is back after the terminal transition.
    assert_eq!(
        fixture
            .store
            .branch_snapshot(fixture.branch_id)
            .unwrap()
            .occupied,
        0
    );

    let events = server.get(&format!("/tickets/{id}/events")).await;
    events.assert_status_ok();
    let kinds: Vec<String> = events
        .json::<Vec<Value>>()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["CREATED", "CALLED", "SERVING", "COMPLETED"]);
}

#[tokio::test]
async fn test_unknown_status_string_is_400() {
    let fixture = engine_with_branch(2);
    let server = server(&fixture);
    let ticket = issue(&server, &branch_uuid(&fixture), "teller").await;
    let id = ticket["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/tickets/{id}/status"))
        .json(&json!({ "status": "TELEPORTED" }))
        .await;

    response.assert_status(http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_illegal_transition_is_409() {
    let fixture = engine_with_branch(2);
    let server = server(&fixture);
    let ticket = issue(&server, &branch_uuid(&fixture), "teller").await;
    let id = ticket["id"].as_str().unwrap();

    let response = server
        .patch(&format!("/tickets/{id}/status"))
        .json(&json!({ "status": "SERVING" }))
        .await;

    response.assert_status(http::StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_transition_on_unknown_ticket_is_404() {
    let fixture = engine_with_branch(2);
    let server = server(&fixture);

    let response = server
        .patch(&format!("/tickets/{}/status", Uuid::new_v4()))
        .json(&json!({ "status": "CALLED" }))
        .await;

    response.assert_status(http::StatusCode::NOT_FOUND);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_list_branch_tickets_in_queue_order() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);
    let branch = branch_uuid(&fixture);

    issue(&server, &branch, "teller").await;
    let vip = server
        .post("/tickets")
        .json(&json!({
            "branch_id": branch,
            "service_type": "teller",
            "priority": 9,
        }))
        .await
        .json::<Value>();

    let response = server.get(&format!("/tickets/branch/{branch}")).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["total"], 2);
    assert_eq!(body["tickets"][0]["id"], vip["id"]);
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);
    let branch = branch_uuid(&fixture);

    let ticket = issue(&server, &branch, "teller").await;
    issue(&server, &branch, "teller").await;
    set_status(&server, ticket["id"].as_str().unwrap(), "CALLED").await;

    let response = server
        .get(&format!("/tickets/branch/{branch}?status=WAITING"))
        .await;
    let body = response.json::<Value>();
    assert_eq!(body["total"], 1);
    assert_eq!(body["tickets"][0]["status"], "WAITING");
}

#[tokio::test]
async fn test_next_ticket_and_empty_queue() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);
    let branch = branch_uuid(&fixture);

    let empty = server.get(&format!("/tickets/next/{branch}")).await;
    empty.assert_status_ok();
    assert!(empty.json::<Value>()["ticket"].is_null());

    let issued = issue(&server, &branch, "teller").await;
    let next = server.get(&format!("/tickets/next/{branch}")).await;
    assert_eq!(next.json::<Value>()["ticket"]["id"], issued["id"]);
}

#[tokio::test]
async fn test_analytics_shape() {
    let fixture = engine_with_branch(5);
    let server = server(&fixture);
    let branch = branch_uuid(&fixture);

    let ticket = issue(&server, &branch, "teller").await;
    let id = ticket["id"].as_str().unwrap().to_string();
    for status in ["CALLED", "SERVING", "COMPLETED"] {
        set_status(&server, &id, status).await;
    }

    let response = server.get(&format!("/tickets/analytics/{branch}")).await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["total"], 1);
    assert_eq!(body["by_status"]["COMPLETED"], 1);
    assert_eq!(body["by_service_type"]["teller"], 1);
    // The fixture clock steps one minute per action.
    assert!(body["avg_wait_time"].as_f64().unwrap() > 0.0);
    assert!(body["avg_service_time"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_health() {
    let fixture = engine_with_branch(1);
    let server = server(&fixture);
    server.get("/health").await.assert_status_ok();
}
