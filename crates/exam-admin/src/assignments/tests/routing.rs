use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{engine, engine_with_store, read_json_body, router_with_engine, UnavailableStore};
use crate::assignments::IDENTITY_HEADER;
use std::sync::Arc;

async fn send_json(router: &Router, method: Method, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
        .expect("build request");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

async fn send(router: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

async fn send_as_student(router: &Router, method: Method, uri: &str, identity: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(IDENTITY_HEADER, identity)
        .body(Body::empty())
        .expect("build request");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

async fn register_over_http(router: &Router, identity: &str, institute: &str) -> Response {
    let body = json!({
        "full_name": format!("Student {identity}"),
        "email": format!("{identity}@example.edu"),
        "roll_number": format!("R-{identity}"),
        "institute_name": institute,
    });
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/register")
        .header(header::CONTENT_TYPE, "application/json")
        .header(IDENTITY_HEADER, identity)
        .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
        .expect("build request");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

#[tokio::test]
async fn institute_creation_distinguishes_created_reactivated_and_conflict() {
    let router = router_with_engine(engine());

    let response = send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "Acme Polytechnic"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["message"], json!("Institute created successfully"));
    assert_eq!(payload["institute"]["name"], json!("acme polytechnic"));
    let institute_id = payload["institute"]["id"].as_i64().expect("institute id");

    let response = send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "ACME Polytechnic"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], json!(false));
    assert_eq!(payload["field"], json!("institute_name"));

    let response = send(
        &router,
        Method::DELETE,
        &format!("/api/institutes/{institute_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Institute deleted successfully"));

    let response = send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "ACME Polytechnic"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Institute reactivated successfully"));
    assert_eq!(payload["institute"]["id"].as_i64(), Some(institute_id));
    assert_eq!(payload["institute"]["display_name"], json!("ACME Polytechnic"));
}

#[tokio::test]
async fn institute_creation_rejects_blank_names() {
    let router = router_with_engine(engine());

    let response = send_json(&router, Method::POST, "/api/institutes", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], json!(false));
    assert!(payload["message"]
        .as_str()
        .unwrap_or_default()
        .contains("required"));
}

#[tokio::test]
async fn deleting_a_missing_institute_returns_not_found() {
    let router = router_with_engine(engine());

    let response = send(&router, Method::DELETE, "/api/institutes/42").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registration_requires_the_identity_header() {
    let router = router_with_engine(engine());

    let response = send_json(
        &router,
        Method::POST,
        "/api/register",
        json!({
            "full_name": "Priya Sharma",
            "email": "priya@example.edu",
            "roll_number": "R-1",
            "institute_name": "Acme Polytechnic",
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert!(payload["message"]
        .as_str()
        .unwrap_or_default()
        .contains("x-subject-id"));
}

#[tokio::test]
async fn duplicate_registration_maps_to_conflict() {
    let router = router_with_engine(engine());

    let response = register_over_http(&router, "uid-1", "Acme Polytechnic").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = register_over_http(&router, "uid-1", "Acme Polytechnic").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["field"], json!("external_identity"));
}

#[tokio::test]
async fn student_tests_route_reports_unknown_identities() {
    let router = router_with_engine(engine());

    let response = send_as_student(&router, Method::GET, "/api/student/tests", "uid-9").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["message"]
        .as_str()
        .unwrap_or_default()
        .contains("uid-9"));
}

#[tokio::test]
async fn assignment_lifecycle_over_http() {
    let router = router_with_engine(engine());

    let response = send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "Acme Polytechnic"}),
    )
    .await;
    let institute_id = read_json_body(response).await["institute"]["id"]
        .as_i64()
        .expect("institute id");

    let response = register_over_http(&router, "uid-1", "Acme Polytechnic").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Registration successful"));
    assert_eq!(payload["backfilled_tests"], json!([]));

    let response = send_json(
        &router,
        Method::POST,
        "/api/tests",
        json!({"title": "Algebra Fundamentals", "description": "Limits and sums"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let test_id = read_json_body(response).await["test"]["id"]
        .as_i64()
        .expect("test id");

    let response = send_json(
        &router,
        Method::POST,
        &format!("/api/institutes/{institute_id}/assign-test"),
        json!({"test_id": test_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["assigned_count"], json!(1));
    assert_eq!(payload["institute_assignment"], json!(true));
    assert!(payload["message"]
        .as_str()
        .unwrap_or_default()
        .contains("1 existing student(s)"));

    let response = send_as_student(&router, Method::GET, "/api/student/tests", "uid-1").await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["tests"][0]["title"], json!("Algebra Fundamentals"));

    let response = register_over_http(&router, "uid-2", "ACME POLYTECHNIC").await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["backfilled_tests"], json!([test_id]));

    let response = send(
        &router,
        Method::GET,
        &format!("/api/institutes/{institute_id}/assigned-tests"),
    )
    .await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["tests"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["tests"][0]["is_institute_level"], json!(true));

    let response = send(
        &router,
        Method::GET,
        "/api/institutes/Acme%20Polytechnic/resolved-tests",
    )
    .await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["test_ids"], json!([test_id]));

    let response = send(
        &router,
        Method::GET,
        &format!("/api/tests/{test_id}/assignments"),
    )
    .await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["assignments"].as_array().map(Vec::len), Some(2));
    assert_eq!(
        payload["assignments"][0]["full_name"],
        json!("Student uid-1")
    );

    let response = send(&router, Method::GET, "/api/institutes").await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["institutes"][0]["student_count"], json!(2));
    assert_eq!(payload["institutes"][0]["assigned_tests_count"], json!(1));

    let response = send(
        &router,
        Method::DELETE,
        &format!("/api/institutes/{institute_id}/unassign-test/{test_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["removed_student_assignments"], json!(2));

    let response = send_as_student(&router, Method::GET, "/api/student/tests", "uid-1").await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["tests"], json!([]));
}

#[tokio::test]
async fn institute_assignment_route_requires_test_id() {
    let router = router_with_engine(engine());
    let response = send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "Acme Polytechnic"}),
    )
    .await;
    let institute_id = read_json_body(response).await["institute"]["id"]
        .as_i64()
        .expect("institute id");

    let response = send_json(
        &router,
        Method::POST,
        &format!("/api/institutes/{institute_id}/assign-test"),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("test_id is required"));
}

#[tokio::test]
async fn batch_assignment_route_requires_test_and_students() {
    let router = router_with_engine(engine());

    let response = send_json(&router, Method::POST, "/api/tests/assign", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send_json(
        &router,
        Method::POST,
        "/api/tests/assign",
        json!({"test_id": 1, "student_ids": []}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_assignment_route_counts_assigned_students() {
    let router = router_with_engine(engine());
    send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "Acme Polytechnic"}),
    )
    .await;

    let response = register_over_http(&router, "uid-1", "Acme Polytechnic").await;
    let first = read_json_body(response).await["student"]["id"]
        .as_i64()
        .expect("first student id");
    let response = register_over_http(&router, "uid-2", "Acme Polytechnic").await;
    let second = read_json_body(response).await["student"]["id"]
        .as_i64()
        .expect("second student id");

    let response = send_json(
        &router,
        Method::POST,
        "/api/tests",
        json!({"title": "Physics Mock Test 1"}),
    )
    .await;
    let test_id = read_json_body(response).await["test"]["id"]
        .as_i64()
        .expect("test id");

    let response = send_json(
        &router,
        Method::POST,
        "/api/tests/assign",
        json!({"test_id": test_id, "student_ids": [first, second]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["message"], json!("Test assigned to 2 student(s)"));
    assert_eq!(payload["assigned_count"], json!(2));
}

#[tokio::test]
async fn deleting_a_test_cascades_student_rows() {
    let router = router_with_engine(engine());
    send_json(
        &router,
        Method::POST,
        "/api/institutes",
        json!({"institute_name": "Acme Polytechnic"}),
    )
    .await;
    let response = register_over_http(&router, "uid-1", "Acme Polytechnic").await;
    let student_id = read_json_body(response).await["student"]["id"]
        .as_i64()
        .expect("student id");

    let response = send_json(
        &router,
        Method::POST,
        "/api/tests",
        json!({"title": "Physics Mock Test 1"}),
    )
    .await;
    let test_id = read_json_body(response).await["test"]["id"]
        .as_i64()
        .expect("test id");
    send_json(
        &router,
        Method::POST,
        "/api/tests/assign",
        json!({"test_id": test_id, "student_ids": [student_id]}),
    )
    .await;

    let response = send(&router, Method::DELETE, &format!("/api/tests/{test_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&router, Method::GET, "/api/tests").await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["tests"], json!([]));

    let response = send_as_student(&router, Method::GET, "/api/student/tests", "uid-1").await;
    let payload = read_json_body(response).await;
    assert_eq!(payload["tests"], json!([]));
}

#[tokio::test]
async fn institute_students_route_sorts_members_by_name() {
    let router = router_with_engine(engine());
    register_over_http(&router, "zz-9", "Acme Polytechnic").await;
    register_over_http(&router, "aa-1", "Acme Polytechnic").await;

    let response = send(
        &router,
        Method::GET,
        "/api/institutes/Acme%20Polytechnic/students",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["students"][0]["full_name"], json!("Student aa-1"));
    assert_eq!(payload["students"][1]["full_name"], json!("Student zz-9"));
}

#[tokio::test]
async fn unknown_test_roster_is_not_found() {
    let router = router_with_engine(engine());

    let response = send(&router, Method::GET, "/api/tests/99/assignments").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_maps_to_internal_error() {
    let router = router_with_engine(engine_with_store(Arc::new(UnavailableStore)));

    let response = send(&router, Method::GET, "/api/tests").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], json!(false));
}
