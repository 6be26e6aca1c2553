//! Apply the maintenance schema to the configured store and exit.
//!
//! Reads `MAINTOPS_STORE`, `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`.

use maintops_auth::InMemoryAccessPolicy;
use maintops_infra::bootstrap::{BootstrapError, build_services_from_env};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BootstrapError> {
    maintops_observability::init();

    let services = build_services_from_env(InMemoryAccessPolicy::new()).await?;
    tracing::info!(backend = services.backend(), "schema up to date");
    Ok(())
}
