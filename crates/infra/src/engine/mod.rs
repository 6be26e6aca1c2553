//! Engine services: each inbound operation authorized, then run inside one
//! unit of work.
//!
//! ```text
//! OperatorScope
//!   ↓
//! 1. authorize (AccessPolicy)
//!   ↓
//! 2. Store::begin
//!   ↓
//! 3. load records (building-scoped), decide with domain rules
//!   ↓
//! 4. save every touched record
//!   ↓
//! 5. commit (any earlier `?` drops the unit of work: nothing is written)
//! ```

mod materials;
mod scheduler;
mod stock;
mod work_orders;

use thiserror::Error;

use maintops_auth::{AccessPolicy, AuthzError, OperatorScope, authorize};
use maintops_core::DomainError;

use crate::store::{Store, StoreError};

pub use materials::WorkOrderItemView;
pub use stock::StockLedger;
pub use work_orders::{CreateTask, CreateWorkOrder, WorkOrderChanges};

pub type EngineResult<T> = Result<T, EngineError>;

/// Rejected operation. Prior state is untouched whenever one is returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::InsufficientStock {
                requested,
                available,
            } => EngineError::InsufficientStock {
                requested,
                available,
            },
            DomainError::NotFound(entity) => EngineError::NotFound(entity),
            DomainError::IllegalState(msg) => EngineError::IllegalState(msg),
            DomainError::AlreadyExists(msg) => EngineError::AlreadyExists(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            // Only raised by the one-open-work-order index, when two creates race.
            StoreError::UniqueViolation(msg) => EngineError::Conflict(msg),
            other => EngineError::Store(other),
        }
    }
}

impl From<AuthzError> for EngineError {
    fn from(_: AuthzError) -> Self {
        // Indistinguishable from a building that does not exist.
        EngineError::NotFound("building")
    }
}

/// Work order lifecycle, material consumption and plan scheduling over a store.
///
/// Composes a `Store` and an `AccessPolicy`; holds no state of its own.
#[derive(Debug, Clone)]
pub struct MaintenanceEngine<S, P> {
    store: S,
    policy: P,
}

impl<S, P> MaintenanceEngine<S, P>
where
    S: Store,
    P: AccessPolicy,
{
    pub fn new(store: S, policy: P) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Authorize `scope`, then open its unit of work.
    async fn begin(&self, scope: &OperatorScope) -> EngineResult<S::Tx> {
        authorize(&self.policy, scope)?;
        Ok(self.store.begin().await?)
    }
}
