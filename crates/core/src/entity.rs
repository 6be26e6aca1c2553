//! Entity trait: identity + continuity across state changes.

use crate::id::BuildingId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Building the entity belongs to. Every record is scoped to exactly one.
    fn building_id(&self) -> BuildingId;
}
