use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use maintops_auth::{AccessPolicy, OperatorScope};
use maintops_core::{Aggregate, Entity, InventoryId, Money, WorkOrderId};
use maintops_maintenance::{
    RecalculateCost, WorkOrder, WorkOrderCommand, WorkOrderInventory, WorkOrderInventoryKey,
    total_cost_of,
};

use super::stock::StockLedger;
use super::work_orders::{load_work_order, lock_work_order};
use super::{EngineError, EngineResult, MaintenanceEngine};
use crate::store::{Store, StoreTx};

/// One material line as shown to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkOrderItemView {
    pub inventory_id: InventoryId,
    pub name: String,
    pub quantity: u32,
    /// Current price of the item, which may differ from the snapshot.
    pub unit_cost: Money,
    pub total_cost: Money,
    pub output_date: DateTime<Utc>,
}

impl<S, P> MaintenanceEngine<S, P>
where
    S: Store,
    P: AccessPolicy,
{
    /// Consume `quantity` units of an item on a work order.
    ///
    /// Additive: an existing line grows by `quantity` and is re-priced; only
    /// the delta is taken from stock.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn add_inventory_to_work_order(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
        inventory_id: InventoryId,
        quantity: u32,
    ) -> EngineResult<WorkOrderInventory> {
        if quantity == 0 {
            return Err(EngineError::Validation("quantity must be positive".to_string()));
        }

        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;
        let mut work_order = lock_work_order(&mut tx, scope, work_order_id).await?;

        let item = StockLedger::reserve(&mut tx, building_id, inventory_id, quantity).await?;

        let now = Utc::now();
        let key = WorkOrderInventoryKey::new(work_order_id, inventory_id);
        let line = match tx.work_order_line(building_id, key).await? {
            Some(mut line) => {
                line.add_quantity(quantity, item.unit_cost, now)?;
                line
            }
            None => WorkOrderInventory::consume(key, building_id, quantity, item.unit_cost, now)?,
        };
        tx.save_work_order_line(&line).await?;

        recompute_total(&mut tx, &mut work_order).await?;
        tx.commit().await?;

        info!(
            work_order_id = %work_order_id,
            inventory_id = %inventory_id,
            added = quantity,
            line_quantity = line.quantity,
            work_order_total = %work_order.total_cost(),
            "material added to work order"
        );
        Ok(line)
    }

    /// Drop a material line and return its whole quantity to stock.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn remove_inventory_from_work_order(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
        inventory_id: InventoryId,
    ) -> EngineResult<()> {
        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;
        let mut work_order = lock_work_order(&mut tx, scope, work_order_id).await?;

        let key = WorkOrderInventoryKey::new(work_order_id, inventory_id);
        let line = tx
            .work_order_line(building_id, key)
            .await?
            .ok_or(EngineError::NotFound("work order inventory line"))?;

        StockLedger::release(&mut tx, building_id, inventory_id, line.quantity).await?;
        tx.delete_work_order_line(building_id, key).await?;

        recompute_total(&mut tx, &mut work_order).await?;
        tx.commit().await?;

        info!(
            work_order_id = %work_order_id,
            inventory_id = %inventory_id,
            restored = line.quantity,
            work_order_total = %work_order.total_cost(),
            "material removed from work order"
        );
        Ok(())
    }

    /// Material lines of a work order. No stock side effects.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn list_work_order_items(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
    ) -> EngineResult<Vec<WorkOrderItemView>> {
        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;
        load_work_order(&mut tx, scope, work_order_id).await?;

        let lines = tx.work_order_lines(building_id, work_order_id).await?;
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = tx
                .inventory(building_id, line.key.inventory_id)
                .await?
                .ok_or(EngineError::NotFound("inventory"))?;
            items.push(WorkOrderItemView {
                inventory_id: item.id,
                name: item.name,
                quantity: line.quantity,
                unit_cost: item.unit_cost,
                total_cost: line.total_cost,
                output_date: line.output_date,
            });
        }

        debug!(work_order_id = %work_order_id, lines = items.len(), "listed work order items");
        Ok(items)
    }
}

/// Set the work order total to the sum of its lines and save it.
async fn recompute_total<T>(tx: &mut T, work_order: &mut WorkOrder) -> EngineResult<()>
where
    T: StoreTx,
{
    let work_order_id = work_order.id_typed();
    let lines = tx
        .work_order_lines(work_order.building_id(), work_order_id)
        .await?;
    let total_cost = total_cost_of(&lines)?;

    let events = work_order.execute(&WorkOrderCommand::RecalculateCost(RecalculateCost {
        work_order_id,
        total_cost,
        occurred_at: Utc::now(),
    }))?;
    if !events.is_empty() {
        tx.save_work_order(work_order).await?;
    }
    Ok(())
}
