use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::directory::{normalized_name, InstituteCreation, InstituteDirectory};
use super::domain::{
    Institute, InstituteId, NewTest, StudentId, StudentRegistration, Test, TestId,
};
use super::error::{EngineError, MissingEntity};
use super::propagator::{
    AssignmentPropagator, InstitutePropagation, PropagationConfig, UnassignOutcome,
};
use super::registration::{RegisteredStudent, RegistrationCoordinator};
use super::resolver::AssignmentResolver;
use super::store::EntityStore;
use super::views::{
    AssignedTestView, InstituteOverview, InstituteStudentView, StudentTestView, TestAssigneeView,
};

/// Facade over the assignment services. One engine owns one store; the
/// directory, resolver, propagator and registration coordinator all share
/// it, so every operation sees the same rows.
pub struct AssignmentEngine<S> {
    directory: InstituteDirectory<S>,
    resolver: AssignmentResolver<S>,
    propagator: AssignmentPropagator<S>,
    registration: RegistrationCoordinator<S>,
    store: Arc<S>,
}

impl<S> AssignmentEngine<S>
where
    S: EntityStore,
{
    pub fn new(store: Arc<S>, config: PropagationConfig) -> Self {
        Self {
            directory: InstituteDirectory::new(Arc::clone(&store)),
            resolver: AssignmentResolver::new(Arc::clone(&store)),
            propagator: AssignmentPropagator::new(Arc::clone(&store), config.clone()),
            registration: RegistrationCoordinator::new(Arc::clone(&store), config),
            store,
        }
    }

    pub fn create_institute(&self, raw_name: &str) -> Result<InstituteCreation, EngineError> {
        self.directory.create(raw_name)
    }

    pub fn deactivate_institute(&self, id: InstituteId) -> Result<Institute, EngineError> {
        self.directory.deactivate(id)
    }

    pub fn resolve_tests_for_institute(&self, raw_name: &str) -> Result<Vec<TestId>, EngineError> {
        self.resolver.resolve(raw_name)
    }

    pub fn assign_test_to_institute(
        &self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<InstitutePropagation, EngineError> {
        self.propagator.assign_test_to_institute(institute_id, test_id)
    }

    pub fn assign_test_to_students(
        &self,
        test_id: TestId,
        student_ids: &[StudentId],
    ) -> Result<usize, EngineError> {
        self.propagator.assign_test_to_students(test_id, student_ids)
    }

    pub fn unassign_test_from_institute(
        &self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<UnassignOutcome, EngineError> {
        self.propagator.unassign_test_from_institute(institute_id, test_id)
    }

    pub fn register_student(
        &self,
        registration: &StudentRegistration,
    ) -> Result<RegisteredStudent, EngineError> {
        self.registration.register(registration)
    }

    /// Active institutes, newest first, each with member and test counts.
    /// Unlike resolution, the test count unions both assignment levels.
    pub fn institute_overview(&self) -> Result<Vec<InstituteOverview>, EngineError> {
        let tx = self.store.begin()?;
        let mut rows = Vec::new();
        for institute in tx.institutes()?.into_iter().filter(|row| row.is_active) {
            let members = tx.students_by_institute(&institute.name)?;
            let mut test_ids: BTreeSet<TestId> = tx
                .active_institute_assignments(institute.id)?
                .into_iter()
                .map(|row| row.test_id)
                .collect();
            test_ids.extend(tx.active_member_test_ids(&institute.name)?);
            rows.push(InstituteOverview {
                id: institute.id,
                name: institute.name,
                display_name: institute.display_name,
                is_active: institute.is_active,
                created_at: institute.created_at,
                student_count: members.len(),
                assigned_tests_count: test_ids.len(),
            });
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    /// Members of the named institute, alphabetical. An unknown name yields
    /// an empty list rather than an error.
    pub fn institute_students(
        &self,
        raw_name: &str,
    ) -> Result<Vec<InstituteStudentView>, EngineError> {
        let name = normalized_name(raw_name)?;
        let tx = self.store.begin()?;
        let mut rows = Vec::new();
        for student in tx.students_by_institute(&name)? {
            let assignments = tx.active_student_assignments(student.id)?;
            rows.push(InstituteStudentView {
                id: student.id,
                full_name: student.full_name,
                email: student.email,
                roll_number: student.roll_number,
                institute_name: student.institute_name,
                created_at: student.created_at,
                assigned_tests_count: assignments.len(),
            });
        }
        rows.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    /// Tests visible on an institute, by title: the institute-level rows
    /// plus tests held only by members, flagged apart.
    pub fn institute_assigned_tests(
        &self,
        institute_id: InstituteId,
    ) -> Result<(Institute, Vec<AssignedTestView>), EngineError> {
        let tx = self.store.begin()?;
        let institute = tx
            .institute(institute_id)?
            .filter(|row| row.is_active)
            .ok_or(EngineError::NotFound(MissingEntity::Institute(
                institute_id,
            )))?;

        let by_test: BTreeMap<TestId, DateTime<Utc>> = tx
            .active_institute_assignments(institute_id)?
            .into_iter()
            .map(|row| (row.test_id, row.assigned_at))
            .collect();
        let mut test_ids: BTreeSet<TestId> = by_test.keys().copied().collect();
        test_ids.extend(tx.active_member_test_ids(&institute.name)?);

        let mut rows = Vec::new();
        for test_id in test_ids {
            if let Some(test) = tx.test(test_id)? {
                rows.push(AssignedTestView {
                    test_id,
                    title: test.title,
                    description: test.description,
                    institute_assigned_at: by_test.get(&test_id).copied(),
                    is_institute_level: by_test.contains_key(&test_id),
                });
            }
        }
        rows.sort_by(|a, b| a.title.cmp(&b.title).then(a.test_id.cmp(&b.test_id)));
        Ok((institute, rows))
    }

    /// Active assignments of the student with the given external identity,
    /// most recently assigned first.
    pub fn tests_for_student(&self, identity: &str) -> Result<Vec<StudentTestView>, EngineError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(EngineError::Validation(
                "student identity is required".to_string(),
            ));
        }

        let tx = self.store.begin()?;
        let student = tx.student_by_identity(identity)?.ok_or_else(|| {
            EngineError::NotFound(MissingEntity::StudentIdentity(identity.to_string()))
        })?;
        let mut assignments = tx.active_student_assignments(student.id)?;
        assignments.sort_by(|a, b| {
            b.assigned_at
                .cmp(&a.assigned_at)
                .then(b.test_id.cmp(&a.test_id))
        });

        let mut rows = Vec::new();
        for assignment in assignments {
            if let Some(test) = tx.test(assignment.test_id)? {
                rows.push(StudentTestView {
                    test_id: assignment.test_id,
                    title: test.title,
                    description: test.description,
                    assigned_at: assignment.assigned_at,
                });
            }
        }
        Ok(rows)
    }

    pub fn create_test(&self, new_test: &NewTest) -> Result<Test, EngineError> {
        let title = new_test.title.trim();
        if title.is_empty() {
            return Err(EngineError::Validation("test title is required".to_string()));
        }

        let mut tx = self.store.begin()?;
        let test = tx.insert_test(&NewTest {
            title: title.to_string(),
            description: new_test.description.trim().to_string(),
        })?;
        tx.commit()?;

        info!(test = test.id.0, "test created");
        Ok(test)
    }

    pub fn list_tests(&self) -> Result<Vec<Test>, EngineError> {
        let tx = self.store.begin()?;
        let mut tests = tx.tests()?;
        tests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tests)
    }

    /// Remove a test outright. The store cascades its assignment rows at
    /// both levels.
    pub fn delete_test(&self, test_id: TestId) -> Result<(), EngineError> {
        let mut tx = self.store.begin()?;
        if !tx.delete_test(test_id)? {
            return Err(EngineError::NotFound(MissingEntity::Test(test_id)));
        }
        tx.commit()?;

        info!(test = test_id.0, "test deleted");
        Ok(())
    }

    /// Students currently holding the test, grouped by institute then name.
    pub fn test_assignees(
        &self,
        test_id: TestId,
    ) -> Result<(Test, Vec<TestAssigneeView>), EngineError> {
        let tx = self.store.begin()?;
        let test = tx
            .test(test_id)?
            .ok_or(EngineError::NotFound(MissingEntity::Test(test_id)))?;

        let mut rows = Vec::new();
        for assignment in tx.active_test_assignments(test_id)? {
            if let Some(student) = tx.student(assignment.student_id)? {
                rows.push(TestAssigneeView {
                    student_id: student.id,
                    full_name: student.full_name,
                    email: student.email,
                    roll_number: student.roll_number,
                    institute_name: student.institute_name,
                    assigned_at: assignment.assigned_at,
                });
            }
        }
        rows.sort_by(|a, b| {
            a.institute_name
                .cmp(&b.institute_name)
                .then_with(|| a.full_name.cmp(&b.full_name))
                .then(a.student_id.cmp(&b.student_id))
        });
        Ok((test, rows))
    }
}
