use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::directory::InstituteCreation;
use super::domain::{InstituteId, NewTest, StudentId, StudentRegistration, TestId};
use super::engine::AssignmentEngine;
use super::error::EngineError;
use super::store::EntityStore;

/// Header carrying the caller's external identity, set by the identity
/// provider in front of this service.
pub const IDENTITY_HEADER: &str = "x-subject-id";

#[derive(Debug, Deserialize)]
pub struct CreateInstituteRequest {
    #[serde(default)]
    pub institute_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignTestRequest {
    pub test_id: Option<TestId>,
}

#[derive(Debug, Deserialize)]
pub struct BatchAssignRequest {
    pub test_id: Option<TestId>,
    #[serde(default)]
    pub student_ids: Vec<StudentId>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roll_number: String,
    #[serde(default)]
    pub institute_name: String,
}

/// Router builder exposing the assignment endpoints over one shared engine.
pub fn assignment_router<S>(engine: Arc<AssignmentEngine<S>>) -> Router
where
    S: EntityStore + 'static,
{
    Router::new()
        .route(
            "/api/institutes",
            post(create_institute_handler::<S>).get(list_institutes_handler::<S>),
        )
        .route(
            "/api/institutes/:institute",
            delete(delete_institute_handler::<S>),
        )
        .route(
            "/api/institutes/:institute/students",
            get(institute_students_handler::<S>),
        )
        .route(
            "/api/institutes/:institute/assigned-tests",
            get(institute_assigned_tests_handler::<S>),
        )
        .route(
            "/api/institutes/:institute/resolved-tests",
            get(resolved_tests_handler::<S>),
        )
        .route(
            "/api/institutes/:institute/assign-test",
            post(assign_test_handler::<S>),
        )
        .route(
            "/api/institutes/:institute/unassign-test/:test",
            delete(unassign_test_handler::<S>),
        )
        .route(
            "/api/tests",
            post(create_test_handler::<S>).get(list_tests_handler::<S>),
        )
        .route("/api/tests/assign", post(batch_assign_handler::<S>))
        .route("/api/tests/:test", delete(delete_test_handler::<S>))
        .route(
            "/api/tests/:test/assignments",
            get(test_assignees_handler::<S>),
        )
        .route("/api/register", post(register_handler::<S>))
        .route("/api/student/tests", get(student_tests_handler::<S>))
        .with_state(engine)
}

pub(crate) async fn create_institute_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    axum::Json(payload): axum::Json<CreateInstituteRequest>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.create_institute(&payload.institute_name) {
        Ok(InstituteCreation::Created(institute)) => {
            let payload = json!({
                "success": true,
                "message": "Institute created successfully",
                "institute": institute,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Ok(InstituteCreation::Reactivated(institute)) => {
            let payload = json!({
                "success": true,
                "message": "Institute reactivated successfully",
                "institute": institute,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_institutes_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.institute_overview() {
        Ok(institutes) => {
            let payload = json!({
                "success": true,
                "institutes": institutes,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_institute_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(institute_id): Path<i64>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.deactivate_institute(InstituteId(institute_id)) {
        Ok(_) => {
            let payload = json!({
                "success": true,
                "message": "Institute deleted successfully",
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn institute_students_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(institute_name): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.institute_students(&institute_name) {
        Ok(students) => {
            let payload = json!({
                "success": true,
                "institute": institute_name,
                "students": students,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn institute_assigned_tests_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(institute_id): Path<i64>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.institute_assigned_tests(InstituteId(institute_id)) {
        Ok((institute, tests)) => {
            let payload = json!({
                "success": true,
                "institute": institute,
                "tests": tests,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn resolved_tests_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(institute_name): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.resolve_tests_for_institute(&institute_name) {
        Ok(test_ids) => {
            let payload = json!({
                "success": true,
                "institute": institute_name,
                "test_ids": test_ids,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn assign_test_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(institute_id): Path<i64>,
    axum::Json(payload): axum::Json<AssignTestRequest>,
) -> Response
where
    S: EntityStore + 'static,
{
    let test_id = match payload.test_id {
        Some(test_id) => test_id,
        None => {
            return EngineError::Validation("test_id is required".to_string()).into_response()
        }
    };

    match engine.assign_test_to_institute(InstituteId(institute_id), test_id) {
        Ok(outcome) => {
            let payload = json!({
                "success": true,
                "message": outcome.summary(),
                "assigned_count": outcome.students_touched,
                "institute_assignment": true,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn unassign_test_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path((institute_id, test_id)): Path<(i64, i64)>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.unassign_test_from_institute(InstituteId(institute_id), TestId(test_id)) {
        Ok(outcome) => {
            let payload = json!({
                "success": true,
                "message": "Test unassigned successfully from institute",
                "removed_student_assignments": outcome.students_removed,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn create_test_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    axum::Json(payload): axum::Json<NewTest>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.create_test(&payload) {
        Ok(test) => {
            let payload = json!({
                "success": true,
                "message": "Test created successfully",
                "test": test,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn list_tests_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.list_tests() {
        Ok(tests) => {
            let payload = json!({
                "success": true,
                "tests": tests,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn batch_assign_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    axum::Json(payload): axum::Json<BatchAssignRequest>,
) -> Response
where
    S: EntityStore + 'static,
{
    let test_id = match payload.test_id {
        Some(test_id) if !payload.student_ids.is_empty() => test_id,
        _ => {
            return EngineError::Validation(
                "test_id and student_ids are required".to_string(),
            )
            .into_response()
        }
    };

    match engine.assign_test_to_students(test_id, &payload.student_ids) {
        Ok(assigned) => {
            let payload = json!({
                "success": true,
                "message": format!("Test assigned to {} student(s)", assigned),
                "assigned_count": assigned,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn delete_test_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(test_id): Path<i64>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.delete_test(TestId(test_id)) {
        Ok(()) => {
            let payload = json!({
                "success": true,
                "message": "Test deleted successfully",
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn test_assignees_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    Path(test_id): Path<i64>,
) -> Response
where
    S: EntityStore + 'static,
{
    match engine.test_assignees(TestId(test_id)) {
        Ok((test, assignments)) => {
            let payload = json!({
                "success": true,
                "test_id": test.id,
                "assignments": assignments,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn register_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<RegisterRequest>,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match subject_identity(&headers) {
        Some(identity) => identity,
        None => return missing_identity_response(),
    };

    let registration = StudentRegistration {
        external_identity: identity,
        full_name: payload.full_name,
        email: payload.email,
        roll_number: payload.roll_number,
        institute_name: payload.institute_name,
    };
    match engine.register_student(&registration) {
        Ok(registered) => {
            let payload = json!({
                "success": true,
                "message": "Registration successful",
                "student": registered.student,
                "backfilled_tests": registered.backfilled_tests,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn student_tests_handler<S>(
    State(engine): State<Arc<AssignmentEngine<S>>>,
    headers: HeaderMap,
) -> Response
where
    S: EntityStore + 'static,
{
    let identity = match subject_identity(&headers) {
        Some(identity) => identity,
        None => return missing_identity_response(),
    };

    match engine.tests_for_student(&identity) {
        Ok(tests) => {
            let payload = json!({
                "success": true,
                "tests": tests,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn subject_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn missing_identity_response() -> Response {
    let payload = json!({
        "success": false,
        "message": format!("missing {} header", IDENTITY_HEADER),
    });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}
