use std::sync::Arc;

use tracing::debug;

use super::directory::normalized_name;
use super::domain::{InstituteName, TestId};
use super::error::EngineError;
use super::store::{EntityStore, EntityTransaction, StoreError};

/// Computes the test set that members of an institute should hold.
///
/// Two tiers. Tier 1 reads the active institute-level assignments of an
/// active institute row. Tier 2 is a legacy fallback for assignments made
/// before an institute row existed: the distinct tests held directly by
/// current members. Tier 2 fires only when tier 1 yields nothing; the two
/// are never unioned.
pub struct AssignmentResolver<S> {
    store: Arc<S>,
}

impl<S> AssignmentResolver<S>
where
    S: EntityStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ordered, deduplicated test ids for the named institute. An unknown
    /// name is not an error; the result is simply whatever tier 2 finds,
    /// possibly nothing.
    pub fn resolve(&self, raw_name: &str) -> Result<Vec<TestId>, EngineError> {
        let name = normalized_name(raw_name)?;
        let tx = self.store.begin()?;
        Ok(resolve_in_tx(&*tx, &name)?)
    }
}

pub(crate) fn resolve_in_tx(
    tx: &dyn EntityTransaction,
    name: &InstituteName,
) -> Result<Vec<TestId>, StoreError> {
    if let Some(institute) = tx.institute_by_name(name)? {
        if institute.is_active {
            let assigned: Vec<TestId> = tx
                .active_institute_assignments(institute.id)?
                .into_iter()
                .map(|row| row.test_id)
                .collect();
            if !assigned.is_empty() {
                debug!(institute = %name, tier = "institute", count = assigned.len(), "resolved test set");
                return Ok(assigned);
            }
        }
    }

    let fallback = tx.active_member_test_ids(name)?;
    debug!(institute = %name, tier = "member", count = fallback.len(), "resolved test set");
    Ok(fallback)
}
