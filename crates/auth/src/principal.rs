use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use maintops_core::BuildingId;

/// Identity of an authenticated operator (back-office user, service account).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(Uuid);

impl OperatorId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OperatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<Uuid> for OperatorId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for OperatorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// An operator's membership in a building.
///
/// This is an authorization boundary object: it states *which building* the
/// operator may act within.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingMembership {
    pub operator_id: OperatorId,
    pub building_id: BuildingId,
}
