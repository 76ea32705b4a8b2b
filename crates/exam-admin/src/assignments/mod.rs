//! Assignment propagation: the two-level graph linking institutes and
//! students to tests, and the services that keep it consistent.
//!
//! Institute-level assignments are policy ("every member receives this
//! test"); student-level assignments are the materialized rows students are
//! actually served from. The propagator fans policy out to current members,
//! registration backfills new members, and the resolver answers what a
//! member of an institute should hold right now.

pub mod directory;
pub mod domain;
pub mod engine;
mod error;
pub mod memory;
pub mod propagator;
pub mod registration;
pub mod resolver;
pub mod router;
pub mod store;
pub mod views;

#[cfg(test)]
mod tests;

pub use directory::{InstituteCreation, InstituteDirectory};
pub use domain::{
    Institute, InstituteId, InstituteName, InstituteTestAssignment, NewStudent, NewTest, Student,
    StudentId, StudentRegistration, StudentTestAssignment, Test, TestId,
};
pub use engine::AssignmentEngine;
pub use error::{ConflictField, EngineError, MissingEntity};
pub use memory::MemoryEntityStore;
pub use propagator::{
    AssignmentPropagator, InstitutePropagation, PropagationConfig, UnassignOutcome,
};
pub use registration::{RegisteredStudent, RegistrationCoordinator};
pub use resolver::AssignmentResolver;
pub use router::{assignment_router, IDENTITY_HEADER};
pub use store::{EntityStore, EntityTransaction, StoreError, UniqueConstraint};
pub use views::{
    AssignedTestView, InstituteOverview, InstituteStudentView, StudentTestView, TestAssigneeView,
};
