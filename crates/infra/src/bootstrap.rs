//! Engine wiring: pick the store named by configuration and build the engine
//! over it.
//!
//! | `StoreConfig` | Store | Setup |
//! |---------------|-------|-------|
//! | `InMemory` | `InMemoryStore` | none |
//! | `Postgres` | `PostgresStore` | connect pool, `ensure_schema` |

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use maintops_auth::AccessPolicy;

use crate::config::{ConfigError, StoreConfig};
use crate::engine::MaintenanceEngine;
use crate::store::{InMemoryStore, PostgresStore, StoreError};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The engine over whichever store was configured.
#[derive(Debug)]
pub enum EngineServices<P> {
    InMemory(MaintenanceEngine<Arc<InMemoryStore>, P>),
    Postgres(MaintenanceEngine<Arc<PostgresStore>, P>),
}

impl<P> EngineServices<P> {
    pub fn backend(&self) -> &'static str {
        match self {
            EngineServices::InMemory(_) => "memory",
            EngineServices::Postgres(_) => "postgres",
        }
    }
}

/// Build the engine for `config`. A Postgres store has its schema applied
/// before the engine is returned.
pub async fn build_services<P>(
    config: &StoreConfig,
    policy: P,
) -> Result<EngineServices<P>, BootstrapError>
where
    P: AccessPolicy,
{
    let services = match config {
        StoreConfig::InMemory => EngineServices::InMemory(MaintenanceEngine::new(
            Arc::new(InMemoryStore::new()),
            policy,
        )),
        StoreConfig::Postgres(pg) => {
            let store = PostgresStore::connect(pg).await?;
            store.ensure_schema().await?;
            EngineServices::Postgres(MaintenanceEngine::new(Arc::new(store), policy))
        }
    };

    info!(backend = services.backend(), "maintenance engine ready");
    Ok(services)
}

/// [`build_services`] with configuration read from the process environment.
pub async fn build_services_from_env<P>(policy: P) -> Result<EngineServices<P>, BootstrapError>
where
    P: AccessPolicy,
{
    let config = StoreConfig::from_env()?;
    build_services(&config, policy).await
}
