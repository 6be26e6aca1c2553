use tracing::{info, warn};

use maintops_core::{BuildingId, InventoryId};
use maintops_maintenance::Inventory;

use super::{EngineError, EngineResult};
use crate::store::StoreTx;

/// Stock movements on a single inventory counter.
///
/// Runs inside the caller's unit of work: the row is locked on read and the
/// new quantity is only visible once the caller commits.
#[derive(Debug, Default, Clone, Copy)]
pub struct StockLedger;

impl StockLedger {
    /// Take `quantity` units out of stock. Returns the updated item.
    pub async fn reserve<T>(
        tx: &mut T,
        building_id: BuildingId,
        inventory_id: InventoryId,
        quantity: u32,
    ) -> EngineResult<Inventory>
    where
        T: StoreTx,
    {
        let mut item = tx
            .inventory_for_update(building_id, inventory_id)
            .await?
            .ok_or(EngineError::NotFound("inventory"))?;

        item.reserve(quantity)?;
        tx.save_inventory(&item).await?;

        info!(
            inventory_id = %inventory_id,
            reserved = quantity,
            remaining = item.quantity,
            "stock reserved"
        );
        if item.is_below_minimum() {
            warn!(
                inventory_id = %inventory_id,
                name = %item.name,
                quantity = item.quantity,
                minimum_stock = item.minimum_stock,
                "inventory at or below minimum stock"
            );
        }
        Ok(item)
    }

    /// Put `quantity` units back into stock. Returns the updated item.
    pub async fn release<T>(
        tx: &mut T,
        building_id: BuildingId,
        inventory_id: InventoryId,
        quantity: u32,
    ) -> EngineResult<Inventory>
    where
        T: StoreTx,
    {
        let mut item = tx
            .inventory_for_update(building_id, inventory_id)
            .await?
            .ok_or(EngineError::NotFound("inventory"))?;

        item.release(quantity)?;
        tx.save_inventory(&item).await?;

        info!(
            inventory_id = %inventory_id,
            released = quantity,
            remaining = item.quantity,
            "stock released"
        );
        Ok(item)
    }
}
