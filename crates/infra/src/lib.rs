//! Infrastructure layer: persistence, configuration, and the engine services
//! that run each maintenance operation as one unit of work.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod store;

mod integration_tests;

pub use bootstrap::{BootstrapError, EngineServices, build_services, build_services_from_env};
pub use config::{ConfigError, PostgresConfig, StoreConfig};
pub use engine::{
    CreateTask, CreateWorkOrder, EngineError, EngineResult, MaintenanceEngine, StockLedger,
    WorkOrderChanges, WorkOrderItemView,
};
pub use store::{InMemoryStore, PostgresStore, Store, StoreError, StoreResult, StoreTx};
