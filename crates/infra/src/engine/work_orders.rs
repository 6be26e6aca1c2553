use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use maintops_auth::{AccessPolicy, OperatorScope};
use maintops_core::{Aggregate, EmployeeId, Entity, EquipmentId, TaskId, WorkOrderId};
use maintops_maintenance::{
    ActivityStatus, ChangeStatus, EquipmentStatusSync, MaintenanceType, OpenWorkOrder, Priority,
    ReviseDetails, Task, WorkOrder, WorkOrderCommand, WorkOrderEvent, WorkOrderSnapshot,
};

use super::{EngineError, EngineResult, MaintenanceEngine};
use crate::store::{Store, StoreTx};

/// Request to open a work order against one piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkOrder {
    pub equipment_id: EquipmentId,
    pub employee_id: Option<EmployeeId>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub maintenance_type: Option<MaintenanceType>,
    pub requested_status: Option<ActivityStatus>,
    pub opening_date: Option<DateTime<Utc>>,
}

impl CreateWorkOrder {
    pub fn for_equipment(equipment_id: EquipmentId) -> Self {
        Self {
            equipment_id,
            employee_id: None,
            description: None,
            priority: None,
            maintenance_type: None,
            requested_status: None,
            opening_date: None,
        }
    }
}

/// Partial update of a work order. A `status` goes through the lifecycle rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderChanges {
    pub details: ReviseDetails,
    pub status: Option<ActivityStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub employee_id: Option<EmployeeId>,
    pub status: Option<ActivityStatus>,
}

impl CreateTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            employee_id: None,
            status: None,
        }
    }
}

impl<S, P> MaintenanceEngine<S, P>
where
    S: Store,
    P: AccessPolicy,
{
    /// Open a work order and put its equipment under maintenance.
    #[instrument(
        skip(self, scope, request),
        fields(building_id = %scope.building_id(), equipment_id = %request.equipment_id),
        err
    )]
    pub async fn create_work_order(
        &self,
        scope: &OperatorScope,
        request: CreateWorkOrder,
    ) -> EngineResult<WorkOrderSnapshot> {
        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;

        let mut equipment = tx
            .equipment(building_id, request.equipment_id)
            .await?
            .ok_or(EngineError::NotFound("equipment"))?;

        if tx
            .open_work_order_exists(building_id, request.equipment_id, None)
            .await?
        {
            return Err(EngineError::Conflict(format!(
                "equipment {} already has an open work order",
                request.equipment_id
            )));
        }

        let (work_order, opened) = WorkOrder::open(&OpenWorkOrder {
            work_order_id: WorkOrderId::new(),
            building_id,
            equipment_id: request.equipment_id,
            employee_id: request.employee_id,
            description: request.description,
            priority: request.priority,
            maintenance_type: request.maintenance_type,
            requested_status: request.requested_status,
            opening_date: request.opening_date,
            occurred_at: Utc::now(),
        })?;
        EquipmentStatusSync::apply(&mut equipment, std::slice::from_ref(&opened));

        tx.save_work_order(&work_order).await?;
        tx.save_equipment(&equipment).await?;
        tx.commit().await?;

        info!(
            work_order_id = %work_order.id_typed(),
            status = %work_order.status(),
            "work order opened"
        );
        Ok(work_order.snapshot())
    }

    /// Move a work order to `new_status`, syncing its equipment.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn update_work_order_status(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
        new_status: ActivityStatus,
    ) -> EngineResult<WorkOrderSnapshot> {
        let mut tx = self.begin(scope).await?;
        let mut work_order = lock_work_order(&mut tx, scope, work_order_id).await?;

        transition(&mut tx, &mut work_order, new_status).await?;
        tx.commit().await?;

        Ok(work_order.snapshot())
    }

    /// Revise descriptive fields and optionally change status.
    ///
    /// Details alone never touch the equipment.
    #[instrument(
        skip(self, scope, changes),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn update_work_order(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
        changes: WorkOrderChanges,
    ) -> EngineResult<WorkOrderSnapshot> {
        let mut tx = self.begin(scope).await?;
        let mut work_order = lock_work_order(&mut tx, scope, work_order_id).await?;

        let revised = work_order.execute(&WorkOrderCommand::ReviseDetails {
            work_order_id,
            details: changes.details,
            occurred_at: Utc::now(),
        })?;
        if !revised.is_empty() {
            tx.save_work_order(&work_order).await?;
            info!(work_order_id = %work_order_id, "work order details revised");
        }

        if let Some(status) = changes.status {
            transition(&mut tx, &mut work_order, status).await?;
        }
        tx.commit().await?;

        Ok(work_order.snapshot())
    }

    #[instrument(
        skip(self, scope, request),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn create_task(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
        request: CreateTask,
    ) -> EngineResult<Task> {
        let mut tx = self.begin(scope).await?;
        lock_work_order(&mut tx, scope, work_order_id).await?;

        let task = new_task(scope, work_order_id, request, Utc::now())?;
        tx.save_task(&task).await?;
        tx.commit().await?;

        info!(task_id = %task.id, work_order_id = %work_order_id, "task created");
        Ok(task)
    }

    /// Create several tasks on one work order in a single unit of work.
    ///
    /// Either every task is saved or, on the first invalid request, none is.
    #[instrument(
        skip(self, scope, requests),
        fields(building_id = %scope.building_id(), count = requests.len()),
        err
    )]
    pub async fn create_tasks(
        &self,
        scope: &OperatorScope,
        work_order_id: WorkOrderId,
        requests: Vec<CreateTask>,
    ) -> EngineResult<Vec<Task>> {
        let mut tx = self.begin(scope).await?;
        lock_work_order(&mut tx, scope, work_order_id).await?;

        let created_at = Utc::now();
        let mut tasks = Vec::with_capacity(requests.len());
        for request in requests {
            let task = new_task(scope, work_order_id, request, created_at)?;
            tx.save_task(&task).await?;
            tasks.push(task);
        }
        tx.commit().await?;

        info!(work_order_id = %work_order_id, created = tasks.len(), "tasks created");
        Ok(tasks)
    }

    /// Set a task's status. Tasks accept any status at any time.
    #[instrument(
        skip(self, scope, reason),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn update_task_status(
        &self,
        scope: &OperatorScope,
        task_id: TaskId,
        status: ActivityStatus,
        reason: Option<String>,
    ) -> EngineResult<Task> {
        let mut tx = self.begin(scope).await?;
        let mut task = tx
            .task(scope.building_id(), task_id)
            .await?
            .ok_or(EngineError::NotFound("task"))?;
        // Serializes with a completion check reading this task list.
        lock_work_order(&mut tx, scope, task.work_order_id).await?;

        task.update_status(status, reason);
        tx.save_task(&task).await?;
        tx.commit().await?;

        info!(task_id = %task_id, status = %status, "task status updated");
        Ok(task)
    }
}

fn new_task(
    scope: &OperatorScope,
    work_order_id: WorkOrderId,
    request: CreateTask,
    created_at: DateTime<Utc>,
) -> EngineResult<Task> {
    let mut task = Task::new(
        TaskId::new(),
        scope.building_id(),
        work_order_id,
        request.title,
        request.status,
        created_at,
    )?;
    task.description = request.description;
    task.employee_id = request.employee_id;
    Ok(task)
}

/// Load a work order and lock it for the rest of the unit of work.
pub(super) async fn lock_work_order<T>(
    tx: &mut T,
    scope: &OperatorScope,
    work_order_id: WorkOrderId,
) -> EngineResult<WorkOrder>
where
    T: StoreTx,
{
    tx.work_order_for_update(scope.building_id(), work_order_id)
        .await?
        .ok_or(EngineError::NotFound("work order"))
}

pub(super) async fn load_work_order<T>(
    tx: &mut T,
    scope: &OperatorScope,
    work_order_id: WorkOrderId,
) -> EngineResult<WorkOrder>
where
    T: StoreTx,
{
    tx.work_order(scope.building_id(), work_order_id)
        .await?
        .ok_or(EngineError::NotFound("work order"))
}

/// Run one status change and its equipment sync inside `tx`.
async fn transition<T>(
    tx: &mut T,
    work_order: &mut WorkOrder,
    new_status: ActivityStatus,
) -> EngineResult<Vec<WorkOrderEvent>>
where
    T: StoreTx,
{
    let building_id = work_order.building_id();
    let work_order_id = work_order.id_typed();
    let from = work_order.status();

    // Re-opening must respect the one-open-order-per-equipment rule.
    if new_status == ActivityStatus::Open && from != ActivityStatus::Open && !work_order.is_terminal()
    {
        let taken = tx
            .open_work_order_exists(building_id, work_order.equipment_id(), Some(work_order_id))
            .await?;
        if taken {
            return Err(EngineError::Conflict(format!(
                "equipment {} already has an open work order",
                work_order.equipment_id()
            )));
        }
    }

    let tasks = tx.tasks_of(building_id, work_order_id).await?;
    let events = work_order.execute(&WorkOrderCommand::ChangeStatus(ChangeStatus {
        work_order_id,
        new_status,
        task_statuses: tasks.iter().map(|t| t.status).collect(),
        occurred_at: Utc::now(),
    }))?;
    if events.is_empty() {
        return Ok(events);
    }

    let mut equipment = tx
        .equipment(building_id, work_order.equipment_id())
        .await?
        .ok_or(EngineError::NotFound("equipment"))?;
    if EquipmentStatusSync::apply(&mut equipment, &events) {
        tx.save_equipment(&equipment).await?;
    }
    tx.save_work_order(work_order).await?;

    info!(
        work_order_id = %work_order_id,
        from = %from,
        to = %new_status,
        equipment_status = equipment.status().as_str(),
        "work order status changed"
    );
    Ok(events)
}
