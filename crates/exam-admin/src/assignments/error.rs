use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::domain::{InstituteId, StudentId, TestId};
use super::store::{StoreError, UniqueConstraint};

/// Which referenced entity a failed lookup was after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingEntity {
    Institute(InstituteId),
    InstituteNamed(String),
    Student(StudentId),
    StudentIdentity(String),
    Test(TestId),
}

impl fmt::Display for MissingEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingEntity::Institute(id) => write!(f, "institute {}", id.0),
            MissingEntity::InstituteNamed(name) => write!(f, "institute '{name}'"),
            MissingEntity::Student(id) => write!(f, "student {}", id.0),
            MissingEntity::StudentIdentity(identity) => {
                write!(f, "student with identity '{identity}'")
            }
            MissingEntity::Test(id) => write!(f, "test {}", id.0),
        }
    }
}

/// Which unique field a registration or creation collided on. Registration
/// checks in precedence order: identity, then email, then roll number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Identity,
    Email,
    RollNumber,
    InstituteName,
}

impl ConflictField {
    pub const fn label(self) -> &'static str {
        match self {
            ConflictField::Identity => "external_identity",
            ConflictField::Email => "email",
            ConflictField::RollNumber => "roll_number",
            ConflictField::InstituteName => "institute_name",
        }
    }
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::Identity => write!(f, "identity already registered"),
            ConflictField::Email => write!(f, "email already registered"),
            ConflictField::RollNumber => write!(f, "roll number already registered"),
            ConflictField::InstituteName => write!(f, "institute already exists"),
        }
    }
}

impl From<UniqueConstraint> for ConflictField {
    fn from(value: UniqueConstraint) -> Self {
        match value {
            UniqueConstraint::InstituteName => ConflictField::InstituteName,
            UniqueConstraint::StudentIdentity => ConflictField::Identity,
            UniqueConstraint::StudentEmail => ConflictField::Email,
            UniqueConstraint::StudentRollNumber => ConflictField::RollNumber,
        }
    }
}

/// Error raised by the assignment engine and its components.
///
/// `NotFound` and `Conflict` are expected, recoverable outcomes carrying
/// enough detail for the caller to act; `Store` failures are opaque and the
/// engine never retries them. Any failure inside a multi-step operation
/// rolls the whole transaction back.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(MissingEntity),
    #[error("{0}")]
    Conflict(ConflictField),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            EngineError::Conflict(field) => Json(json!({
                "success": false,
                "message": self.to_string(),
                "field": field.label(),
            })),
            _ => Json(json!({ "success": false, "message": self.to_string() })),
        };

        (status, body).into_response()
    }
}
