use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::assignments::domain::{
    Institute, InstituteId, InstituteName, InstituteTestAssignment, NewStudent, NewTest, Student,
    StudentId, StudentRegistration, StudentTestAssignment, Test, TestId,
};
use crate::assignments::store::{EntityStore, EntityTransaction, StoreError};
use crate::assignments::{
    assignment_router, AssignmentEngine, MemoryEntityStore, PropagationConfig,
};

pub(super) fn engine() -> AssignmentEngine<MemoryEntityStore> {
    engine_with_store(Arc::new(MemoryEntityStore::default()))
}

pub(super) fn engine_with_store<S>(store: Arc<S>) -> AssignmentEngine<S>
where
    S: EntityStore,
{
    AssignmentEngine::new(store, PropagationConfig::default())
}

pub(super) fn name(raw: &str) -> InstituteName {
    InstituteName::normalize(raw).expect("normalized name")
}

pub(super) fn new_student(
    identity: Option<&str>,
    email: &str,
    roll: Option<&str>,
    institute: &InstituteName,
) -> NewStudent {
    NewStudent {
        external_identity: identity.map(str::to_string),
        full_name: "Test Student".to_string(),
        email: email.to_string(),
        roll_number: roll.map(str::to_string),
        institute_name: institute.clone(),
    }
}

pub(super) fn new_test(title: &str) -> NewTest {
    NewTest {
        title: title.to_string(),
        description: String::new(),
    }
}

pub(super) fn registration(identity: &str, institute: &str) -> StudentRegistration {
    StudentRegistration {
        external_identity: identity.to_string(),
        full_name: format!("Student {identity}"),
        email: format!("{identity}@example.edu"),
        roll_number: format!("R-{identity}"),
        institute_name: institute.to_string(),
    }
}

pub(super) fn router_with_engine<S>(engine: AssignmentEngine<S>) -> axum::Router
where
    S: EntityStore + 'static,
{
    assignment_router(Arc::new(engine))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store whose every transaction fails to open.
pub(super) struct UnavailableStore;

impl EntityStore for UnavailableStore {
    fn begin(&self) -> Result<Box<dyn EntityTransaction + '_>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

/// Store that behaves normally except that student-assignment upserts fail,
/// for proving that multi-step operations roll back whole.
#[derive(Default)]
pub(super) struct SabotagedStore {
    inner: MemoryEntityStore,
}

impl EntityStore for SabotagedStore {
    fn begin(&self) -> Result<Box<dyn EntityTransaction + '_>, StoreError> {
        Ok(Box::new(SabotagedTransaction {
            inner: self.inner.begin()?,
        }))
    }
}

pub(super) struct SabotagedTransaction<'a> {
    inner: Box<dyn EntityTransaction + 'a>,
}

impl EntityTransaction for SabotagedTransaction<'_> {
    fn institute(&self, id: InstituteId) -> Result<Option<Institute>, StoreError> {
        self.inner.institute(id)
    }

    fn institute_by_name(&self, name: &InstituteName) -> Result<Option<Institute>, StoreError> {
        self.inner.institute_by_name(name)
    }

    fn institutes(&self) -> Result<Vec<Institute>, StoreError> {
        self.inner.institutes()
    }

    fn insert_institute(
        &mut self,
        name: &InstituteName,
        display_name: &str,
    ) -> Result<Institute, StoreError> {
        self.inner.insert_institute(name, display_name)
    }

    fn update_institute(&mut self, institute: Institute) -> Result<Institute, StoreError> {
        self.inner.update_institute(institute)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        self.inner.student(id)
    }

    fn student_by_identity(&self, identity: &str) -> Result<Option<Student>, StoreError> {
        self.inner.student_by_identity(identity)
    }

    fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        self.inner.student_by_email(email)
    }

    fn student_by_roll_number(&self, roll_number: &str) -> Result<Option<Student>, StoreError> {
        self.inner.student_by_roll_number(roll_number)
    }

    fn insert_student(&mut self, student: &NewStudent) -> Result<Student, StoreError> {
        self.inner.insert_student(student)
    }

    fn students_by_institute(&self, name: &InstituteName) -> Result<Vec<Student>, StoreError> {
        self.inner.students_by_institute(name)
    }

    fn delete_student(&mut self, id: StudentId) -> Result<bool, StoreError> {
        self.inner.delete_student(id)
    }

    fn test(&self, id: TestId) -> Result<Option<Test>, StoreError> {
        self.inner.test(id)
    }

    fn tests(&self) -> Result<Vec<Test>, StoreError> {
        self.inner.tests()
    }

    fn insert_test(&mut self, test: &NewTest) -> Result<Test, StoreError> {
        self.inner.insert_test(test)
    }

    fn delete_test(&mut self, id: TestId) -> Result<bool, StoreError> {
        self.inner.delete_test(id)
    }

    fn active_institute_assignments(
        &self,
        institute_id: InstituteId,
    ) -> Result<Vec<InstituteTestAssignment>, StoreError> {
        self.inner.active_institute_assignments(institute_id)
    }

    fn upsert_institute_assignment(
        &mut self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<InstituteTestAssignment, StoreError> {
        self.inner.upsert_institute_assignment(institute_id, test_id)
    }

    fn delete_institute_assignment(
        &mut self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<bool, StoreError> {
        self.inner.delete_institute_assignment(institute_id, test_id)
    }

    fn active_student_assignments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentTestAssignment>, StoreError> {
        self.inner.active_student_assignments(student_id)
    }

    fn active_test_assignments(
        &self,
        test_id: TestId,
    ) -> Result<Vec<StudentTestAssignment>, StoreError> {
        self.inner.active_test_assignments(test_id)
    }

    fn active_member_test_ids(&self, name: &InstituteName) -> Result<Vec<TestId>, StoreError> {
        self.inner.active_member_test_ids(name)
    }

    fn upsert_student_assignments(
        &mut self,
        _pairs: &[(StudentId, TestId)],
    ) -> Result<usize, StoreError> {
        Err(StoreError::Unavailable(
            "assignment upsert rejected".to_string(),
        ))
    }

    fn delete_student_assignments(
        &mut self,
        test_id: TestId,
        students: &[StudentId],
    ) -> Result<usize, StoreError> {
        self.inner.delete_student_assignments(test_id, students)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit()
    }
}
