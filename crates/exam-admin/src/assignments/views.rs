//! Read models returned by the listing operations. These are projections
//! assembled by the engine, shaped for serialization rather than storage.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{InstituteId, InstituteName, StudentId, TestId};

/// One row of the institute listing: identity plus live member and
/// assignment counts. `assigned_tests_count` unions both assignment levels,
/// so an institute whose tests were inherited by members before the
/// institute-level row existed still shows them.
#[derive(Debug, Clone, Serialize)]
pub struct InstituteOverview {
    pub id: InstituteId,
    pub name: InstituteName,
    pub display_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub student_count: usize,
    pub assigned_tests_count: usize,
}

/// One member row of an institute's student listing.
#[derive(Debug, Clone, Serialize)]
pub struct InstituteStudentView {
    pub id: StudentId,
    pub full_name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub institute_name: InstituteName,
    pub created_at: DateTime<Utc>,
    pub assigned_tests_count: usize,
}

/// One test in an institute's assignment listing. `is_institute_level`
/// distinguishes policy rows from tests only held by members.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedTestView {
    pub test_id: TestId,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institute_assigned_at: Option<DateTime<Utc>>,
    pub is_institute_level: bool,
}

/// One test in a student's own listing, newest assignment first.
#[derive(Debug, Clone, Serialize)]
pub struct StudentTestView {
    pub test_id: TestId,
    pub title: String,
    pub description: String,
    pub assigned_at: DateTime<Utc>,
}

/// One student holding a given test, for the per-test roster.
#[derive(Debug, Clone, Serialize)]
pub struct TestAssigneeView {
    pub student_id: StudentId,
    pub full_name: String,
    pub email: String,
    pub roll_number: Option<String>,
    pub institute_name: InstituteName,
    pub assigned_at: DateTime<Utc>,
}
