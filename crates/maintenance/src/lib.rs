//! Maintenance domain module.
//!
//! This crate contains the business rules of the maintenance back-office:
//! the work order lifecycle, equipment status sync, spare-parts stock and
//! material consumption, and recurring maintenance plans. Everything here is
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod equipment;
pub mod equipment_sync;
pub mod inventory;
pub mod plan;
pub mod status;
pub mod task;
pub mod work_order;
pub mod work_order_inventory;

pub use equipment::{Criticality, Equipment, EquipmentStatus};
pub use equipment_sync::EquipmentStatusSync;
pub use inventory::Inventory;
pub use plan::{EquipmentPlan, EquipmentPlanKey, MaintenancePlan, MaintenanceType};
pub use status::ActivityStatus;
pub use task::Task;
pub use work_order::{
    ChangeStatus, CostRecalculated, DetailsRevised, OpenWorkOrder, Priority, RecalculateCost,
    ReviseDetails, StatusChanged, WorkOrder, WorkOrderCommand, WorkOrderEvent, WorkOrderOpened,
    WorkOrderSnapshot,
};
pub use work_order_inventory::{WorkOrderInventory, WorkOrderInventoryKey, total_cost_of};
