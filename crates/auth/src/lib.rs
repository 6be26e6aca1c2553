//! `maintops-auth`: building-scoped access boundary.
//!
//! This crate is intentionally decoupled from HTTP, token issuance and storage:
//! callers resolve the operator up front and pass an [`OperatorScope`]
//! explicitly into every operation.

pub mod authorize;
pub mod principal;

pub use authorize::{AccessPolicy, AuthzError, InMemoryAccessPolicy, OperatorScope, authorize};
pub use principal::{BuildingMembership, OperatorId};
