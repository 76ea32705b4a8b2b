use super::domain::{
    Institute, InstituteId, InstituteName, InstituteTestAssignment, NewStudent, NewTest, Student,
    StudentId, StudentTestAssignment, Test, TestId,
};

/// Storage abstraction over the durable entity tables.
///
/// Every public engine operation opens exactly one transaction, performs all
/// of its statements against it, and either commits or drops it; a dropped
/// transaction must discard every change. The transaction is the sole
/// serialization boundary; the engine takes no additional lock.
pub trait EntityStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn EntityTransaction + '_>, StoreError>;
}

/// One unit of transactional work. Uniqueness is enforced here; referential
/// existence is the caller's job (components validate before writing).
/// Deleting a student or test removes its dependent assignment rows, the
/// way a relational store cascades.
pub trait EntityTransaction {
    // Institutes. `name` is always the normalized key.
    fn institute(&self, id: InstituteId) -> Result<Option<Institute>, StoreError>;
    fn institute_by_name(&self, name: &InstituteName) -> Result<Option<Institute>, StoreError>;
    fn institutes(&self) -> Result<Vec<Institute>, StoreError>;
    fn insert_institute(
        &mut self,
        name: &InstituteName,
        display_name: &str,
    ) -> Result<Institute, StoreError>;
    fn update_institute(&mut self, institute: Institute) -> Result<Institute, StoreError>;

    // Students. Membership queries match on the normalized institute name.
    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;
    fn student_by_identity(&self, identity: &str) -> Result<Option<Student>, StoreError>;
    fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError>;
    fn student_by_roll_number(&self, roll_number: &str) -> Result<Option<Student>, StoreError>;
    fn insert_student(&mut self, student: &NewStudent) -> Result<Student, StoreError>;
    fn students_by_institute(&self, name: &InstituteName) -> Result<Vec<Student>, StoreError>;
    fn delete_student(&mut self, id: StudentId) -> Result<bool, StoreError>;

    // Tests.
    fn test(&self, id: TestId) -> Result<Option<Test>, StoreError>;
    fn tests(&self) -> Result<Vec<Test>, StoreError>;
    fn insert_test(&mut self, test: &NewTest) -> Result<Test, StoreError>;
    fn delete_test(&mut self, id: TestId) -> Result<bool, StoreError>;

    // Institute-level assignments.
    fn active_institute_assignments(
        &self,
        institute_id: InstituteId,
    ) -> Result<Vec<InstituteTestAssignment>, StoreError>;
    fn upsert_institute_assignment(
        &mut self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<InstituteTestAssignment, StoreError>;
    fn delete_institute_assignment(
        &mut self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<bool, StoreError>;

    // Student-level assignments. The upsert is insert-or-reactivate with a
    // refreshed `assigned_at`; each pair targets its own unique key, so a
    // batch carries no inter-row dependency.
    fn active_student_assignments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentTestAssignment>, StoreError>;
    fn active_test_assignments(
        &self,
        test_id: TestId,
    ) -> Result<Vec<StudentTestAssignment>, StoreError>;
    /// Distinct test ids held by active student-level rows of members of the
    /// named institute, ascending.
    fn active_member_test_ids(&self, name: &InstituteName) -> Result<Vec<TestId>, StoreError>;
    fn upsert_student_assignments(
        &mut self,
        pairs: &[(StudentId, TestId)],
    ) -> Result<usize, StoreError>;
    fn delete_student_assignments(
        &mut self,
        test_id: TestId,
        students: &[StudentId],
    ) -> Result<usize, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: UniqueConstraint },
    #[error("entity store unavailable: {0}")]
    Unavailable(String),
}

/// Which unique index rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraint {
    InstituteName,
    StudentIdentity,
    StudentEmail,
    StudentRollNumber,
}

impl std::fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            UniqueConstraint::InstituteName => "institute_name",
            UniqueConstraint::StudentIdentity => "student_identity",
            UniqueConstraint::StudentEmail => "student_email",
            UniqueConstraint::StudentRollNumber => "student_roll_number",
        };
        f.write_str(label)
    }
}
