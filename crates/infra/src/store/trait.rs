use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use maintops_core::{
    BuildingId, EquipmentId, InventoryId, MaintenancePlanId, TaskId, WorkOrderId,
};
use maintops_maintenance::{
    Equipment, EquipmentPlan, EquipmentPlanKey, Inventory, MaintenancePlan, Task, WorkOrder,
    WorkOrderInventory, WorkOrderInventoryKey,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failure.
///
/// These are infrastructure errors (backend, decoding, constraint) as opposed to
/// domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to decode stored record: {0}")]
    Decode(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store is closed")]
    Closed,
}

/// Factory of units of work.
#[async_trait]
pub trait Store: Send + Sync {
    type Tx: StoreTx;

    /// Open a unit of work.
    async fn begin(&self) -> StoreResult<Self::Tx>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        (**self).begin().await
    }
}

/// One atomic unit of work.
///
/// Every read takes the building the caller is scoped to; a record that exists
/// in another building is reported as absent.
#[async_trait]
pub trait StoreTx: Send {
    async fn equipment(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
    ) -> StoreResult<Option<Equipment>>;

    async fn save_equipment(&mut self, equipment: &Equipment) -> StoreResult<()>;

    async fn work_order(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Option<WorkOrder>>;

    /// Read a work order and hold it locked until the unit of work ends.
    ///
    /// Every path that writes a work order, its tasks or its material lines
    /// loads it through here first, so those writers run one at a time.
    async fn work_order_for_update(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Option<WorkOrder>>;

    async fn save_work_order(&mut self, work_order: &WorkOrder) -> StoreResult<()>;

    /// Whether an OPEN work order exists for the equipment, ignoring `excluding`.
    async fn open_work_order_exists(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
        excluding: Option<WorkOrderId>,
    ) -> StoreResult<bool>;

    async fn task(&mut self, building_id: BuildingId, task_id: TaskId) -> StoreResult<Option<Task>>;

    /// Tasks of a work order, oldest first.
    async fn tasks_of(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Vec<Task>>;

    async fn save_task(&mut self, task: &Task) -> StoreResult<()>;

    async fn inventory(
        &mut self,
        building_id: BuildingId,
        inventory_id: InventoryId,
    ) -> StoreResult<Option<Inventory>>;

    /// Read an inventory row and hold it locked until the unit of work ends.
    async fn inventory_for_update(
        &mut self,
        building_id: BuildingId,
        inventory_id: InventoryId,
    ) -> StoreResult<Option<Inventory>>;

    async fn save_inventory(&mut self, inventory: &Inventory) -> StoreResult<()>;

    async fn work_order_line(
        &mut self,
        building_id: BuildingId,
        key: WorkOrderInventoryKey,
    ) -> StoreResult<Option<WorkOrderInventory>>;

    /// Material lines of a work order, ordered by inventory id.
    async fn work_order_lines(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Vec<WorkOrderInventory>>;

    async fn save_work_order_line(&mut self, line: &WorkOrderInventory) -> StoreResult<()>;

    /// Returns whether a line was deleted.
    async fn delete_work_order_line(
        &mut self,
        building_id: BuildingId,
        key: WorkOrderInventoryKey,
    ) -> StoreResult<bool>;

    async fn maintenance_plan(
        &mut self,
        building_id: BuildingId,
        plan_id: MaintenancePlanId,
    ) -> StoreResult<Option<MaintenancePlan>>;

    async fn save_maintenance_plan(&mut self, plan: &MaintenancePlan) -> StoreResult<()>;

    async fn equipment_plan(
        &mut self,
        building_id: BuildingId,
        key: EquipmentPlanKey,
    ) -> StoreResult<Option<EquipmentPlan>>;

    /// Plan links of an equipment, ordered by next due date.
    async fn equipment_plans(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
    ) -> StoreResult<Vec<EquipmentPlan>>;

    /// Insert a new plan link. Returns `false`, writing nothing, when the
    /// (equipment, plan) pair is already linked.
    async fn insert_equipment_plan(&mut self, link: &EquipmentPlan) -> StoreResult<bool>;

    /// Overwrite an existing plan link.
    async fn save_equipment_plan(&mut self, link: &EquipmentPlan) -> StoreResult<()>;

    /// Returns whether a link was deleted.
    async fn delete_equipment_plan(
        &mut self,
        building_id: BuildingId,
        key: EquipmentPlanKey,
    ) -> StoreResult<bool>;

    /// Make every write of this unit of work visible at once.
    async fn commit(self) -> StoreResult<()>;
}
