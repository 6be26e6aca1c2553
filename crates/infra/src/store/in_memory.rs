use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use maintops_core::{
    BuildingId, EquipmentId, InventoryId, MaintenancePlanId, TaskId, WorkOrderId,
};
use maintops_maintenance::{
    ActivityStatus, Equipment, EquipmentPlan, EquipmentPlanKey, Inventory, MaintenancePlan, Task,
    WorkOrder, WorkOrderInventory, WorkOrderInventoryKey, WorkOrderSnapshot,
};

use super::r#trait::{Store, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    equipment: HashMap<(BuildingId, EquipmentId), Equipment>,
    work_orders: HashMap<(BuildingId, WorkOrderId), WorkOrderSnapshot>,
    tasks: HashMap<(BuildingId, TaskId), Task>,
    inventory: HashMap<(BuildingId, InventoryId), Inventory>,
    work_order_lines: HashMap<(BuildingId, WorkOrderInventoryKey), WorkOrderInventory>,
    plans: HashMap<(BuildingId, MaintenancePlanId), MaintenancePlan>,
    equipment_plans: HashMap<(BuildingId, EquipmentPlanKey), EquipmentPlan>,
}

/// In-memory store for tests/dev.
///
/// A unit of work holds the single table lock for its whole lifetime and edits
/// a private copy, so units of work run strictly one after another. `begin`
/// clones every table, which makes each unit of work O(total stored data);
/// fine for tests and small fixtures, not for large datasets.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx { guard, working })
    }
}

/// Unit of work over [`InMemoryStore`].
pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn equipment(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
    ) -> StoreResult<Option<Equipment>> {
        Ok(self.working.equipment.get(&(building_id, equipment_id)).cloned())
    }

    async fn save_equipment(&mut self, equipment: &Equipment) -> StoreResult<()> {
        self.working
            .equipment
            .insert((equipment.building_id, equipment.id), equipment.clone());
        Ok(())
    }

    async fn work_order(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Option<WorkOrder>> {
        Ok(self
            .working
            .work_orders
            .get(&(building_id, work_order_id))
            .cloned()
            .map(WorkOrder::restore))
    }

    async fn work_order_for_update(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Option<WorkOrder>> {
        self.work_order(building_id, work_order_id).await
    }

    async fn save_work_order(&mut self, work_order: &WorkOrder) -> StoreResult<()> {
        let snapshot = work_order.snapshot();
        self.working
            .work_orders
            .insert((snapshot.building_id, snapshot.id), snapshot);
        Ok(())
    }

    async fn open_work_order_exists(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
        excluding: Option<WorkOrderId>,
    ) -> StoreResult<bool> {
        Ok(self.working.work_orders.values().any(|wo| {
            wo.building_id == building_id
                && wo.equipment_id == equipment_id
                && wo.status == ActivityStatus::Open
                && Some(wo.id) != excluding
        }))
    }

    async fn task(&mut self, building_id: BuildingId, task_id: TaskId) -> StoreResult<Option<Task>> {
        Ok(self.working.tasks.get(&(building_id, task_id)).cloned())
    }

    async fn tasks_of(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .working
            .tasks
            .values()
            .filter(|t| t.building_id == building_id && t.work_order_id == work_order_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }

    async fn save_task(&mut self, task: &Task) -> StoreResult<()> {
        self.working
            .tasks
            .insert((task.building_id, task.id), task.clone());
        Ok(())
    }

    async fn inventory(
        &mut self,
        building_id: BuildingId,
        inventory_id: InventoryId,
    ) -> StoreResult<Option<Inventory>> {
        Ok(self.working.inventory.get(&(building_id, inventory_id)).cloned())
    }

    async fn inventory_for_update(
        &mut self,
        building_id: BuildingId,
        inventory_id: InventoryId,
    ) -> StoreResult<Option<Inventory>> {
        // The whole store is already locked for this unit of work.
        self.inventory(building_id, inventory_id).await
    }

    async fn save_inventory(&mut self, inventory: &Inventory) -> StoreResult<()> {
        self.working
            .inventory
            .insert((inventory.building_id, inventory.id), inventory.clone());
        Ok(())
    }

    async fn work_order_line(
        &mut self,
        building_id: BuildingId,
        key: WorkOrderInventoryKey,
    ) -> StoreResult<Option<WorkOrderInventory>> {
        Ok(self.working.work_order_lines.get(&(building_id, key)).cloned())
    }

    async fn work_order_lines(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Vec<WorkOrderInventory>> {
        let mut lines: Vec<WorkOrderInventory> = self
            .working
            .work_order_lines
            .iter()
            .filter(|((b, key), _)| *b == building_id && key.work_order_id == work_order_id)
            .map(|(_, line)| line.clone())
            .collect();
        lines.sort_by_key(|line| line.key);
        Ok(lines)
    }

    async fn save_work_order_line(&mut self, line: &WorkOrderInventory) -> StoreResult<()> {
        self.working
            .work_order_lines
            .insert((line.building_id, line.key), line.clone());
        Ok(())
    }

    async fn delete_work_order_line(
        &mut self,
        building_id: BuildingId,
        key: WorkOrderInventoryKey,
    ) -> StoreResult<bool> {
        Ok(self
            .working
            .work_order_lines
            .remove(&(building_id, key))
            .is_some())
    }

    async fn maintenance_plan(
        &mut self,
        building_id: BuildingId,
        plan_id: MaintenancePlanId,
    ) -> StoreResult<Option<MaintenancePlan>> {
        Ok(self.working.plans.get(&(building_id, plan_id)).cloned())
    }

    async fn save_maintenance_plan(&mut self, plan: &MaintenancePlan) -> StoreResult<()> {
        self.working
            .plans
            .insert((plan.building_id, plan.id), plan.clone());
        Ok(())
    }

    async fn equipment_plan(
        &mut self,
        building_id: BuildingId,
        key: EquipmentPlanKey,
    ) -> StoreResult<Option<EquipmentPlan>> {
        Ok(self.working.equipment_plans.get(&(building_id, key)).cloned())
    }

    async fn equipment_plans(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
    ) -> StoreResult<Vec<EquipmentPlan>> {
        let mut links: Vec<EquipmentPlan> = self
            .working
            .equipment_plans
            .iter()
            .filter(|((b, key), _)| *b == building_id && key.equipment_id == equipment_id)
            .map(|(_, link)| link.clone())
            .collect();
        links.sort_by_key(|link| (link.next_due_date, link.key));
        Ok(links)
    }

    async fn insert_equipment_plan(&mut self, link: &EquipmentPlan) -> StoreResult<bool> {
        match self.working.equipment_plans.entry((link.building_id, link.key)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(link.clone());
                Ok(true)
            }
        }
    }

    async fn save_equipment_plan(&mut self, link: &EquipmentPlan) -> StoreResult<()> {
        self.working
            .equipment_plans
            .insert((link.building_id, link.key), link.clone());
        Ok(())
    }

    async fn delete_equipment_plan(
        &mut self,
        building_id: BuildingId,
        key: EquipmentPlanKey,
    ) -> StoreResult<bool> {
        Ok(self
            .working
            .equipment_plans
            .remove(&(building_id, key))
            .is_some())
    }

    async fn commit(self) -> StoreResult<()> {
        let InMemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}
