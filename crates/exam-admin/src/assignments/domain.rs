use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for an institute row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstituteId(pub i64);

/// Identifier for a student row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub i64);

/// Identifier for a test row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(pub i64);

/// Normalized institute identity key.
///
/// Students are linked to institutes by case-insensitive string equality
/// rather than a foreign key, so trimming and lowercasing must happen in
/// exactly one place. This constructor is that place: every component that
/// touches institute identity goes through [`InstituteName::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct InstituteName(String);

impl InstituteName {
    /// Builds the canonical lookup key from raw input, or `None` when the
    /// input is blank.
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstituteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Institute row. Soft-deleted via `is_active` rather than removed; the
/// normalized `name` is the unique key, `display_name` keeps the original
/// casing for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Institute {
    pub id: InstituteId,
    pub name: InstituteName,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Student row. `institute_name` is denormalized on purpose: membership is
/// resolved by normalized string match, never by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: StudentId,
    pub external_identity: Option<String>,
    pub full_name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub institute_name: InstituteName,
    pub created_at: DateTime<Utc>,
}

/// Test row. Question content is owned elsewhere and never consulted here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Test {
    pub id: TestId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Policy row: every member of the institute, present and future, receives
/// the test. Unique on `(institute_id, test_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstituteTestAssignment {
    pub institute_id: InstituteId,
    pub test_id: TestId,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
}

/// Materialized per-student record; the row actually read when listing a
/// student's tests. Unique on `(test_id, student_id)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentTestAssignment {
    pub student_id: StudentId,
    pub test_id: TestId,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
}

/// Store-level input for a student insert.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub external_identity: Option<String>,
    pub full_name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub institute_name: InstituteName,
}

/// Store-level input for a test insert. Both fields default to empty so
/// that presence checks stay with the engine's validation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Raw registration payload. The external identity comes from the identity
/// provider; everything else is student-supplied free text, validated and
/// normalized by the registration coordinator.
#[derive(Debug, Clone)]
pub struct StudentRegistration {
    pub external_identity: String,
    pub full_name: String,
    pub email: String,
    pub roll_number: String,
    pub institute_name: String,
}
