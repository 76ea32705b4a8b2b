use std::sync::Arc;

use tracing::info;

use super::domain::{Institute, InstituteId, InstituteName};
use super::error::{ConflictField, EngineError, MissingEntity};
use super::store::{EntityStore, EntityTransaction};

/// Institute lifecycle: creation, reactivation, soft deletion, and active
/// lookup. Deactivation never cascades; student rows keep pointing at the
/// name, so membership resumes if the institute is later reactivated.
pub struct InstituteDirectory<S> {
    store: Arc<S>,
}

/// Outcome of [`InstituteDirectory::create`], distinguishing a fresh row
/// from a revived one.
#[derive(Debug, Clone)]
pub enum InstituteCreation {
    Created(Institute),
    Reactivated(Institute),
}

impl InstituteCreation {
    pub fn institute(&self) -> &Institute {
        match self {
            InstituteCreation::Created(institute) => institute,
            InstituteCreation::Reactivated(institute) => institute,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            InstituteCreation::Created(_) => "created",
            InstituteCreation::Reactivated(_) => "reactivated",
        }
    }
}

impl<S> InstituteDirectory<S>
where
    S: EntityStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create an institute from raw input, or revive a soft-deleted row with
    /// the same normalized name. An active duplicate is a conflict.
    pub fn create(&self, raw_name: &str) -> Result<InstituteCreation, EngineError> {
        let name = normalized_name(raw_name)?;
        let display_name = raw_name.trim();

        let mut tx = self.store.begin()?;
        match tx.institute_by_name(&name)? {
            Some(existing) if existing.is_active => {
                Err(EngineError::Conflict(ConflictField::InstituteName))
            }
            Some(mut existing) => {
                existing.is_active = true;
                existing.display_name = display_name.to_string();
                let revived = tx.update_institute(existing)?;
                tx.commit()?;
                info!(institute = %revived.name, id = revived.id.0, "institute reactivated");
                Ok(InstituteCreation::Reactivated(revived))
            }
            None => {
                let created = tx.insert_institute(&name, display_name)?;
                tx.commit()?;
                info!(institute = %created.name, id = created.id.0, "institute created");
                Ok(InstituteCreation::Created(created))
            }
        }
    }

    /// Soft-delete: the row stays, students and assignment rows are not
    /// touched. Deactivating an already-inactive institute is a no-op
    /// success, matching the idempotent delete callers expect.
    pub fn deactivate(&self, id: InstituteId) -> Result<Institute, EngineError> {
        let mut tx = self.store.begin()?;
        let mut institute = tx
            .institute(id)?
            .ok_or(EngineError::NotFound(MissingEntity::Institute(id)))?;
        institute.is_active = false;
        let institute = tx.update_institute(institute)?;
        tx.commit()?;
        info!(institute = %institute.name, id = institute.id.0, "institute deactivated");
        Ok(institute)
    }

    /// Active institute by raw name, or `NotFound`.
    pub fn resolve_by_name(&self, raw_name: &str) -> Result<Institute, EngineError> {
        let name = normalized_name(raw_name)?;
        let tx = self.store.begin()?;
        tx.institute_by_name(&name)?
            .filter(|institute| institute.is_active)
            .ok_or_else(|| {
                EngineError::NotFound(MissingEntity::InstituteNamed(name.as_str().to_string()))
            })
    }
}

pub(crate) fn normalized_name(raw_name: &str) -> Result<InstituteName, EngineError> {
    InstituteName::normalize(raw_name)
        .ok_or_else(|| EngineError::Validation("institute name is required".to_string()))
}

/// Find-or-create inside an existing transaction, used by registration to
/// implicitly create the institute a student names. An existing inactive row
/// is returned as-is: self-service registration must not undo an
/// administrative deactivation.
pub(crate) fn ensure_institute(
    tx: &mut dyn EntityTransaction,
    raw_name: &str,
) -> Result<Institute, EngineError> {
    let name = normalized_name(raw_name)?;
    if let Some(existing) = tx.institute_by_name(&name)? {
        return Ok(existing);
    }
    Ok(tx.insert_institute(&name, raw_name.trim())?)
}
