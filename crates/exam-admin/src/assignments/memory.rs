use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Institute, InstituteId, InstituteName, InstituteTestAssignment, NewStudent, NewTest, Student,
    StudentId, StudentTestAssignment, Test, TestId,
};
use super::store::{EntityStore, EntityTransaction, StoreError, UniqueConstraint};

/// In-memory reference store backing the demo server and the test suite.
///
/// A transaction clones the table set under the lock, mutates the clone, and
/// swaps it back on commit; dropping without commit discards every change,
/// so rollback is total by construction. Holding the mutex for the life of
/// the transaction makes it the serialization boundary the store contract
/// requires.
#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default, Clone)]
struct Tables {
    institutes: BTreeMap<InstituteId, Institute>,
    students: BTreeMap<StudentId, Student>,
    tests: BTreeMap<TestId, Test>,
    institute_assignments: BTreeMap<(InstituteId, TestId), InstituteTestAssignment>,
    student_assignments: BTreeMap<(TestId, StudentId), StudentTestAssignment>,
    institute_seq: i64,
    student_seq: i64,
    test_seq: i64,
}

impl Tables {
    fn member_ids(&self, name: &InstituteName) -> BTreeSet<StudentId> {
        self.students
            .values()
            .filter(|student| student.institute_name == *name)
            .map(|student| student.id)
            .collect()
    }
}

pub struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, Tables>,
    working: Tables,
}

impl EntityStore for MemoryEntityStore {
    fn begin(&self) -> Result<Box<dyn EntityTransaction + '_>, StoreError> {
        let guard = self
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("table lock poisoned".to_string()))?;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

impl EntityTransaction for MemoryTransaction<'_> {
    fn institute(&self, id: InstituteId) -> Result<Option<Institute>, StoreError> {
        Ok(self.working.institutes.get(&id).cloned())
    }

    fn institute_by_name(&self, name: &InstituteName) -> Result<Option<Institute>, StoreError> {
        Ok(self
            .working
            .institutes
            .values()
            .find(|institute| institute.name == *name)
            .cloned())
    }

    fn institutes(&self) -> Result<Vec<Institute>, StoreError> {
        Ok(self.working.institutes.values().cloned().collect())
    }

    fn insert_institute(
        &mut self,
        name: &InstituteName,
        display_name: &str,
    ) -> Result<Institute, StoreError> {
        if self
            .working
            .institutes
            .values()
            .any(|institute| institute.name == *name)
        {
            return Err(StoreError::UniqueViolation {
                constraint: UniqueConstraint::InstituteName,
            });
        }

        self.working.institute_seq += 1;
        let institute = Institute {
            id: InstituteId(self.working.institute_seq),
            name: name.clone(),
            display_name: display_name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.working.institutes.insert(institute.id, institute.clone());
        Ok(institute)
    }

    fn update_institute(&mut self, institute: Institute) -> Result<Institute, StoreError> {
        self.working
            .institutes
            .insert(institute.id, institute.clone());
        Ok(institute)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.working.students.get(&id).cloned())
    }

    fn student_by_identity(&self, identity: &str) -> Result<Option<Student>, StoreError> {
        Ok(self
            .working
            .students
            .values()
            .find(|student| student.external_identity.as_deref() == Some(identity))
            .cloned())
    }

    fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        Ok(self
            .working
            .students
            .values()
            .find(|student| student.email == email)
            .cloned())
    }

    fn student_by_roll_number(&self, roll_number: &str) -> Result<Option<Student>, StoreError> {
        Ok(self
            .working
            .students
            .values()
            .find(|student| student.roll_number.as_deref() == Some(roll_number))
            .cloned())
    }

    fn insert_student(&mut self, student: &NewStudent) -> Result<Student, StoreError> {
        let unique_hit = self.working.students.values().find_map(|existing| {
            if student.external_identity.is_some()
                && existing.external_identity == student.external_identity
            {
                Some(UniqueConstraint::StudentIdentity)
            } else if existing.email == student.email {
                Some(UniqueConstraint::StudentEmail)
            } else if student.roll_number.is_some() && existing.roll_number == student.roll_number
            {
                Some(UniqueConstraint::StudentRollNumber)
            } else {
                None
            }
        });
        if let Some(constraint) = unique_hit {
            return Err(StoreError::UniqueViolation { constraint });
        }

        self.working.student_seq += 1;
        let row = Student {
            id: StudentId(self.working.student_seq),
            external_identity: student.external_identity.clone(),
            full_name: student.full_name.clone(),
            email: student.email.clone(),
            roll_number: student.roll_number.clone(),
            institute_name: student.institute_name.clone(),
            created_at: Utc::now(),
        };
        self.working.students.insert(row.id, row.clone());
        Ok(row)
    }

    fn students_by_institute(&self, name: &InstituteName) -> Result<Vec<Student>, StoreError> {
        Ok(self
            .working
            .students
            .values()
            .filter(|student| student.institute_name == *name)
            .cloned()
            .collect())
    }

    fn delete_student(&mut self, id: StudentId) -> Result<bool, StoreError> {
        let existed = self.working.students.remove(&id).is_some();
        if existed {
            self.working
                .student_assignments
                .retain(|(_, student_id), _| *student_id != id);
        }
        Ok(existed)
    }

    fn test(&self, id: TestId) -> Result<Option<Test>, StoreError> {
        Ok(self.working.tests.get(&id).cloned())
    }

    fn tests(&self) -> Result<Vec<Test>, StoreError> {
        Ok(self.working.tests.values().cloned().collect())
    }

    fn insert_test(&mut self, test: &NewTest) -> Result<Test, StoreError> {
        self.working.test_seq += 1;
        let row = Test {
            id: TestId(self.working.test_seq),
            title: test.title.clone(),
            description: test.description.clone(),
            created_at: Utc::now(),
        };
        self.working.tests.insert(row.id, row.clone());
        Ok(row)
    }

    fn delete_test(&mut self, id: TestId) -> Result<bool, StoreError> {
        let existed = self.working.tests.remove(&id).is_some();
        if existed {
            self.working
                .institute_assignments
                .retain(|(_, test_id), _| *test_id != id);
            self.working
                .student_assignments
                .retain(|(test_id, _), _| *test_id != id);
        }
        Ok(existed)
    }

    fn active_institute_assignments(
        &self,
        institute_id: InstituteId,
    ) -> Result<Vec<InstituteTestAssignment>, StoreError> {
        Ok(self
            .working
            .institute_assignments
            .values()
            .filter(|row| row.institute_id == institute_id && row.is_active)
            .cloned()
            .collect())
    }

    fn upsert_institute_assignment(
        &mut self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<InstituteTestAssignment, StoreError> {
        let now = Utc::now();
        let row = self
            .working
            .institute_assignments
            .entry((institute_id, test_id))
            .or_insert_with(|| InstituteTestAssignment {
                institute_id,
                test_id,
                is_active: false,
                assigned_at: now,
            });
        row.is_active = true;
        row.assigned_at = now;
        Ok(row.clone())
    }

    fn delete_institute_assignment(
        &mut self,
        institute_id: InstituteId,
        test_id: TestId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .working
            .institute_assignments
            .remove(&(institute_id, test_id))
            .is_some())
    }

    fn active_student_assignments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<StudentTestAssignment>, StoreError> {
        Ok(self
            .working
            .student_assignments
            .values()
            .filter(|row| row.student_id == student_id && row.is_active)
            .cloned()
            .collect())
    }

    fn active_test_assignments(
        &self,
        test_id: TestId,
    ) -> Result<Vec<StudentTestAssignment>, StoreError> {
        Ok(self
            .working
            .student_assignments
            .values()
            .filter(|row| row.test_id == test_id && row.is_active)
            .cloned()
            .collect())
    }

    fn active_member_test_ids(&self, name: &InstituteName) -> Result<Vec<TestId>, StoreError> {
        let members = self.working.member_ids(name);
        let ids: BTreeSet<TestId> = self
            .working
            .student_assignments
            .values()
            .filter(|row| row.is_active && members.contains(&row.student_id))
            .map(|row| row.test_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    fn upsert_student_assignments(
        &mut self,
        pairs: &[(StudentId, TestId)],
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        for &(student_id, test_id) in pairs {
            let row = self
                .working
                .student_assignments
                .entry((test_id, student_id))
                .or_insert_with(|| StudentTestAssignment {
                    student_id,
                    test_id,
                    is_active: false,
                    assigned_at: now,
                });
            row.is_active = true;
            row.assigned_at = now;
        }
        Ok(pairs.len())
    }

    fn delete_student_assignments(
        &mut self,
        test_id: TestId,
        students: &[StudentId],
    ) -> Result<usize, StoreError> {
        let targets: BTreeSet<StudentId> = students.iter().copied().collect();
        let before = self.working.student_assignments.len();
        self.working
            .student_assignments
            .retain(|(row_test, row_student), _| {
                *row_test != test_id || !targets.contains(row_student)
            });
        Ok(before - self.working.student_assignments.len())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
