use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use thiserror::Error;

use maintops_core::BuildingId;

use crate::{BuildingMembership, OperatorId};

/// Explicit per-call context: who is acting, and in which building.
///
/// Every engine operation takes one of these instead of reading an ambient
/// "current user".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperatorScope {
    operator_id: OperatorId,
    building_id: BuildingId,
}

impl OperatorScope {
    pub fn new(operator_id: OperatorId, building_id: BuildingId) -> Self {
        Self {
            operator_id,
            building_id,
        }
    }

    pub fn operator_id(&self) -> OperatorId {
        self.operator_id
    }

    pub fn building_id(&self) -> BuildingId {
        self.building_id
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("operator {operator_id} has no access to building {building_id}")]
    NoBuildingAccess {
        operator_id: OperatorId,
        building_id: BuildingId,
    },
}

/// Collaborator answering "does operator X have access to building Y".
pub trait AccessPolicy: Send + Sync {
    fn has_access(&self, operator_id: OperatorId, building_id: BuildingId) -> bool;
}

impl<P> AccessPolicy for std::sync::Arc<P>
where
    P: AccessPolicy + ?Sized,
{
    fn has_access(&self, operator_id: OperatorId, building_id: BuildingId) -> bool {
        (**self).has_access(operator_id, building_id)
    }
}

/// Check a scope against a policy before any mutation.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize<P>(policy: &P, scope: &OperatorScope) -> Result<(), AuthzError>
where
    P: AccessPolicy + ?Sized,
{
    if policy.has_access(scope.operator_id, scope.building_id) {
        Ok(())
    } else {
        tracing::debug!(
            operator_id = %scope.operator_id,
            building_id = %scope.building_id,
            "building access denied"
        );
        Err(AuthzError::NoBuildingAccess {
            operator_id: scope.operator_id,
            building_id: scope.building_id,
        })
    }
}

/// In-memory membership table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAccessPolicy {
    memberships: RwLock<HashMap<OperatorId, HashSet<BuildingId>>>,
}

impl InMemoryAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    // The table holds plain sets, so a writer that panicked cannot leave it
    // half-updated; a poisoned lock is recovered rather than ignored.
    pub fn grant(&self, membership: BuildingMembership) {
        let mut map = self
            .memberships
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(membership.operator_id)
            .or_default()
            .insert(membership.building_id);
    }

    pub fn revoke(&self, operator_id: OperatorId, building_id: BuildingId) {
        let mut map = self
            .memberships
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(buildings) = map.get_mut(&operator_id) {
            buildings.remove(&building_id);
        }
    }
}

impl AccessPolicy for InMemoryAccessPolicy {
    fn has_access(&self, operator_id: OperatorId, building_id: BuildingId) -> bool {
        self.memberships
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operator_id)
            .is_some_and(|buildings| buildings.contains(&building_id))
    }
}
