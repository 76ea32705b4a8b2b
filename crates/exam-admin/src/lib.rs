//! Exam administration backend.
//!
//! Institutes, students, and tests are linked by a two-level assignment
//! graph: institute-level assignments describe policy ("all members receive
//! this test") and student-level assignments are the materialized,
//! per-student records actually read at exam time. The [`assignments`]
//! module owns the propagation engine that keeps the two levels consistent
//! across creation, registration, and removal.

pub mod assignments;
pub mod config;
pub mod error;
pub mod telemetry;
