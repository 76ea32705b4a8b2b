use std::sync::Arc;

use tracing::info;

use super::domain::{Institute, InstituteId, StudentId, TestId};
use super::error::{EngineError, MissingEntity};
use super::store::{EntityStore, EntityTransaction, StoreError};

const DEFAULT_UPSERT_CHUNK: usize = 64;

/// Tunables for assignment fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationConfig {
    /// Upper bound on the number of student-assignment upserts submitted to
    /// the store per statement. A relational store turns each chunk into one
    /// multi-row upsert.
    pub upsert_chunk: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            upsert_chunk: DEFAULT_UPSERT_CHUNK,
        }
    }
}

/// Materializes assignment policy into rows: institute-level fan-out, direct
/// batch assignment, and the institute-scoped unassign cascade. Every
/// operation runs in one transaction and rolls back in full on any failure.
pub struct AssignmentPropagator<S> {
    store: Arc<S>,
    config: PropagationConfig,
}

/// Result of an institute-level assignment.
#[derive(Debug, Clone)]
pub struct InstitutePropagation {
    pub institute: Institute,
    pub test_id: TestId,
    pub students_touched: usize,
}

impl InstitutePropagation {
    /// Caller-visible success message. Zero members is still success: the
    /// policy row is in place and future registrants will be backfilled.
    pub fn summary(&self) -> String {
        if self.students_touched > 0 {
            format!(
                "Test assigned to institute and {} existing student(s). \
                 Future students will automatically receive this test.",
                self.students_touched
            )
        } else {
            "Test assigned to institute. Students who register with this institute \
             will automatically receive this test."
                .to_string()
        }
    }
}

/// Result of an institute-scoped unassign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnassignOutcome {
    pub institute_assignment_removed: bool,
    pub students_removed: usize,
}

impl<S> AssignmentPropagator<S>
where
    S: EntityStore,
{
    pub fn new(store: Arc<S>, config: PropagationConfig) -> Self {
        Self { store, config }
    }

    /// Upsert the institute-level policy row, then fan out a student-level
    /// row to every current member. Atomic: a reader never observes the
    /// policy row without the matching member rows.
    pub fn assign_test_to_institute(
        &self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<InstitutePropagation, EngineError> {
        let mut tx = self.store.begin()?;
        let institute = tx
            .institute(institute_id)?
            .filter(|row| row.is_active)
            .ok_or(EngineError::NotFound(MissingEntity::Institute(
                institute_id,
            )))?;
        if tx.test(test_id)?.is_none() {
            return Err(EngineError::NotFound(MissingEntity::Test(test_id)));
        }

        tx.upsert_institute_assignment(institute_id, test_id)?;

        let members = tx.students_by_institute(&institute.name)?;
        let pairs: Vec<(StudentId, TestId)> =
            members.iter().map(|student| (student.id, test_id)).collect();
        let students_touched = upsert_in_chunks(tx.as_mut(), &pairs, self.config.upsert_chunk)?;
        tx.commit()?;

        info!(
            institute = institute.id.0,
            test = test_id.0,
            students = students_touched,
            "test propagated to institute members"
        );
        Ok(InstitutePropagation {
            institute,
            test_id,
            students_touched,
        })
    }

    /// Direct batch assignment. Each `(test, student)` pair is an
    /// independent idempotent upsert; a repeat call refreshes `assigned_at`
    /// on the same row rather than adding one.
    pub fn assign_test_to_students(
        &self,
        test_id: TestId,
        student_ids: &[StudentId],
    ) -> Result<usize, EngineError> {
        if student_ids.is_empty() {
            return Err(EngineError::Validation(
                "student_ids must not be empty".to_string(),
            ));
        }

        let mut tx = self.store.begin()?;
        if tx.test(test_id)?.is_none() {
            return Err(EngineError::NotFound(MissingEntity::Test(test_id)));
        }
        for &student_id in student_ids {
            if tx.student(student_id)?.is_none() {
                return Err(EngineError::NotFound(MissingEntity::Student(student_id)));
            }
        }

        let pairs: Vec<(StudentId, TestId)> = student_ids
            .iter()
            .map(|&student_id| (student_id, test_id))
            .collect();
        let assigned = upsert_in_chunks(tx.as_mut(), &pairs, self.config.upsert_chunk)?;
        tx.commit()?;

        info!(test = test_id.0, students = assigned, "test assigned to student batch");
        Ok(assigned)
    }

    /// Hard-delete the institute-level row and every member's student-level
    /// row for the test, in one transaction. Non-members keep their rows.
    pub fn unassign_test_from_institute(
        &self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<UnassignOutcome, EngineError> {
        let mut tx = self.store.begin()?;
        let institute = tx
            .institute(institute_id)?
            .filter(|row| row.is_active)
            .ok_or(EngineError::NotFound(MissingEntity::Institute(
                institute_id,
            )))?;

        let institute_assignment_removed = tx.delete_institute_assignment(institute_id, test_id)?;
        let members: Vec<StudentId> = tx
            .students_by_institute(&institute.name)?
            .into_iter()
            .map(|student| student.id)
            .collect();
        let students_removed = tx.delete_student_assignments(test_id, &members)?;
        tx.commit()?;

        info!(
            institute = institute.id.0,
            test = test_id.0,
            removed = students_removed,
            "test unassigned from institute"
        );
        Ok(UnassignOutcome {
            institute_assignment_removed,
            students_removed,
        })
    }
}

/// Submit pair upserts in bounded slices. Pairs target distinct unique keys,
/// so slicing changes statement shape, never outcome.
pub(crate) fn upsert_in_chunks(
    tx: &mut dyn EntityTransaction,
    pairs: &[(StudentId, TestId)],
    chunk: usize,
) -> Result<usize, StoreError> {
    let chunk = chunk.max(1);
    let mut touched = 0;
    for slice in pairs.chunks(chunk) {
        touched += tx.upsert_student_assignments(slice)?;
    }
    Ok(touched)
}
