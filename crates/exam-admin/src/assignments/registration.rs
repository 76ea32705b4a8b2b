use std::sync::Arc;

use tracing::info;

use super::directory::ensure_institute;
use super::domain::{NewStudent, Student, StudentId, StudentRegistration, TestId};
use super::error::{ConflictField, EngineError};
use super::propagator::{upsert_in_chunks, PropagationConfig};
use super::resolver::resolve_in_tx;
use super::store::{EntityStore, StoreError};

/// Registers students and backfills their test assignments in the same
/// transaction, so a freshly registered student is never observable without
/// the tests their institute already carries.
pub struct RegistrationCoordinator<S> {
    store: Arc<S>,
    config: PropagationConfig,
}

/// Result of a registration: the stored row plus the tests backfilled from
/// the institute's current resolution.
#[derive(Debug, Clone)]
pub struct RegisteredStudent {
    pub student: Student,
    pub backfilled_tests: Vec<TestId>,
}

impl<S> RegistrationCoordinator<S>
where
    S: EntityStore,
{
    pub fn new(store: Arc<S>, config: PropagationConfig) -> Self {
        Self { store, config }
    }

    /// Create the student, creating the named institute on first use, and
    /// copy every test the institute currently resolves to onto the new
    /// student. Uniqueness conflicts are reported for the first colliding
    /// field in identity, email, roll-number order.
    pub fn register(
        &self,
        registration: &StudentRegistration,
    ) -> Result<RegisteredStudent, EngineError> {
        let missing = missing_fields(registration);
        if !missing.is_empty() {
            return Err(EngineError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let identity = registration.external_identity.trim();
        let email = registration.email.trim();
        let roll_number = registration.roll_number.trim();

        let mut tx = self.store.begin()?;
        if tx.student_by_identity(identity)?.is_some() {
            return Err(EngineError::Conflict(ConflictField::Identity));
        }
        if tx.student_by_email(email)?.is_some() {
            return Err(EngineError::Conflict(ConflictField::Email));
        }
        if tx.student_by_roll_number(roll_number)?.is_some() {
            return Err(EngineError::Conflict(ConflictField::RollNumber));
        }

        let institute = ensure_institute(tx.as_mut(), &registration.institute_name)?;
        let candidate = NewStudent {
            external_identity: Some(identity.to_string()),
            full_name: registration.full_name.trim().to_string(),
            email: email.to_string(),
            roll_number: Some(roll_number.to_string()),
            institute_name: institute.name.clone(),
        };
        // A violation past the prechecks means a competing writer won the
        // row; report the colliding field the same way.
        let student = match tx.insert_student(&candidate) {
            Ok(student) => student,
            Err(StoreError::UniqueViolation { constraint }) => {
                return Err(EngineError::Conflict(constraint.into()))
            }
            Err(err) => return Err(err.into()),
        };

        let backfilled_tests = resolve_in_tx(&*tx, &institute.name)?;
        let pairs: Vec<(StudentId, TestId)> = backfilled_tests
            .iter()
            .map(|&test_id| (student.id, test_id))
            .collect();
        upsert_in_chunks(tx.as_mut(), &pairs, self.config.upsert_chunk)?;
        tx.commit()?;

        info!(
            student = student.id.0,
            institute = %institute.name,
            backfilled = backfilled_tests.len(),
            "student registered"
        );
        Ok(RegisteredStudent {
            student,
            backfilled_tests,
        })
    }
}

fn missing_fields(registration: &StudentRegistration) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if registration.external_identity.trim().is_empty() {
        missing.push("external_identity");
    }
    if registration.full_name.trim().is_empty() {
        missing.push("full_name");
    }
    if registration.email.trim().is_empty() {
        missing.push("email");
    }
    if registration.roll_number.trim().is_empty() {
        missing.push("roll_number");
    }
    if registration.institute_name.trim().is_empty() {
        missing.push("institute_name");
    }
    missing
}
