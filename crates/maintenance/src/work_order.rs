use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maintops_core::{
    Aggregate, AggregateRoot, BuildingId, DomainError, DomainResult, EmployeeId, Entity,
    EquipmentId, Money, WorkOrderId,
};

use crate::plan::MaintenanceType;
use crate::status::ActivityStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            other => Err(DomainError::validation(format!("unknown priority '{other}'"))),
        }
    }
}

/// Persisted form of a work order (one row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderSnapshot {
    pub id: WorkOrderId,
    pub building_id: BuildingId,
    pub equipment_id: EquipmentId,
    pub employee_id: Option<EmployeeId>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub maintenance_type: Option<MaintenanceType>,
    pub status: ActivityStatus,
    pub opening_date: DateTime<Utc>,
    pub closing_date: Option<DateTime<Utc>>,
    pub total_cost: Money,
    pub version: u64,
}

/// Aggregate root: WorkOrder.
///
/// Lifecycle: OPEN → IN_PROGRESS ⇄ OPEN → COMPLETED | CANCELLED. The two
/// terminal states reject every further command except cost recomputation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrder {
    id: WorkOrderId,
    building_id: BuildingId,
    equipment_id: EquipmentId,
    employee_id: Option<EmployeeId>,
    description: Option<String>,
    priority: Option<Priority>,
    maintenance_type: Option<MaintenanceType>,
    status: ActivityStatus,
    opening_date: DateTime<Utc>,
    closing_date: Option<DateTime<Utc>>,
    /// Sum of the material line totals. Never client-supplied.
    total_cost: Money,
    version: u64,
}

impl WorkOrder {
    /// Decide and build a new work order.
    ///
    /// The single-open-order-per-equipment rule needs a store query and is
    /// checked by the caller before opening.
    pub fn open(cmd: &OpenWorkOrder) -> DomainResult<(WorkOrder, WorkOrderEvent)> {
        let status = cmd.requested_status.unwrap_or(ActivityStatus::Open);
        if status.is_terminal() {
            return Err(DomainError::validation(format!(
                "a work order cannot be opened as {status}"
            )));
        }

        let opened = WorkOrderOpened {
            work_order_id: cmd.work_order_id,
            building_id: cmd.building_id,
            equipment_id: cmd.equipment_id,
            employee_id: cmd.employee_id,
            description: cmd.description.clone(),
            priority: cmd.priority,
            maintenance_type: cmd.maintenance_type,
            status,
            opening_date: cmd.opening_date.unwrap_or(cmd.occurred_at),
            occurred_at: cmd.occurred_at,
        };

        let mut work_order = WorkOrder {
            id: opened.work_order_id,
            building_id: opened.building_id,
            equipment_id: opened.equipment_id,
            employee_id: None,
            description: None,
            priority: None,
            maintenance_type: None,
            status,
            opening_date: opened.opening_date,
            closing_date: None,
            total_cost: Money::ZERO,
            version: 0,
        };
        let event = WorkOrderEvent::WorkOrderOpened(opened);
        work_order.apply(&event);
        Ok((work_order, event))
    }

    /// Rebuild a work order loaded from storage.
    pub fn restore(snapshot: WorkOrderSnapshot) -> Self {
        Self {
            id: snapshot.id,
            building_id: snapshot.building_id,
            equipment_id: snapshot.equipment_id,
            employee_id: snapshot.employee_id,
            description: snapshot.description,
            priority: snapshot.priority,
            maintenance_type: snapshot.maintenance_type,
            status: snapshot.status,
            opening_date: snapshot.opening_date,
            closing_date: snapshot.closing_date,
            total_cost: snapshot.total_cost,
            version: snapshot.version,
        }
    }

    pub fn snapshot(&self) -> WorkOrderSnapshot {
        WorkOrderSnapshot {
            id: self.id,
            building_id: self.building_id,
            equipment_id: self.equipment_id,
            employee_id: self.employee_id,
            description: self.description.clone(),
            priority: self.priority,
            maintenance_type: self.maintenance_type,
            status: self.status,
            opening_date: self.opening_date,
            closing_date: self.closing_date,
            total_cost: self.total_cost,
            version: self.version,
        }
    }

    pub fn id_typed(&self) -> WorkOrderId {
        self.id
    }

    pub fn equipment_id(&self) -> EquipmentId {
        self.equipment_id
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.employee_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }

    pub fn maintenance_type(&self) -> Option<MaintenanceType> {
        self.maintenance_type
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn opening_date(&self) -> DateTime<Utc> {
        self.opening_date
    }

    pub fn closing_date(&self) -> Option<DateTime<Utc>> {
        self.closing_date
    }

    pub fn total_cost(&self) -> Money {
        self.total_cost
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl AggregateRoot for WorkOrder {
    type Id = WorkOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for WorkOrder {
    type Id = WorkOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}

/// Command: OpenWorkOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenWorkOrder {
    pub work_order_id: WorkOrderId,
    pub building_id: BuildingId,
    pub equipment_id: EquipmentId,
    pub employee_id: Option<EmployeeId>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub maintenance_type: Option<MaintenanceType>,
    /// Defaults to OPEN.
    pub requested_status: Option<ActivityStatus>,
    /// Defaults to `occurred_at`.
    pub opening_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
///
/// Carries the statuses of the work order's tasks, which gate completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub work_order_id: WorkOrderId,
    pub new_status: ActivityStatus,
    pub task_statuses: Vec<ActivityStatus>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseDetails. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseDetails {
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub maintenance_type: Option<MaintenanceType>,
    pub employee_id: Option<EmployeeId>,
}

/// Command: RecalculateCost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculateCost {
    pub work_order_id: WorkOrderId,
    pub total_cost: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOrderCommand {
    ChangeStatus(ChangeStatus),
    ReviseDetails {
        work_order_id: WorkOrderId,
        details: ReviseDetails,
        occurred_at: DateTime<Utc>,
    },
    RecalculateCost(RecalculateCost),
}

/// Event: WorkOrderOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderOpened {
    pub work_order_id: WorkOrderId,
    pub building_id: BuildingId,
    pub equipment_id: EquipmentId,
    pub employee_id: Option<EmployeeId>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub maintenance_type: Option<MaintenanceType>,
    pub status: ActivityStatus,
    pub opening_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub work_order_id: WorkOrderId,
    pub from: ActivityStatus,
    pub to: ActivityStatus,
    /// Set when completion stamps the closing date.
    pub closing_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DetailsRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsRevised {
    pub work_order_id: WorkOrderId,
    pub details: ReviseDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CostRecalculated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRecalculated {
    pub work_order_id: WorkOrderId,
    pub total_cost: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOrderEvent {
    WorkOrderOpened(WorkOrderOpened),
    StatusChanged(StatusChanged),
    DetailsRevised(DetailsRevised),
    CostRecalculated(CostRecalculated),
}

impl Aggregate for WorkOrder {
    type Command = WorkOrderCommand;
    type Event = WorkOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WorkOrderEvent::WorkOrderOpened(e) => {
                self.id = e.work_order_id;
                self.building_id = e.building_id;
                self.equipment_id = e.equipment_id;
                self.employee_id = e.employee_id;
                self.description = e.description.clone();
                self.priority = e.priority;
                self.maintenance_type = e.maintenance_type;
                self.status = e.status;
                self.opening_date = e.opening_date;
                self.closing_date = None;
                self.total_cost = Money::ZERO;
            }
            WorkOrderEvent::StatusChanged(e) => {
                self.status = e.to;
                if let Some(closing_date) = e.closing_date {
                    self.closing_date = Some(closing_date);
                }
            }
            WorkOrderEvent::DetailsRevised(e) => {
                if let Some(description) = &e.details.description {
                    self.description = Some(description.clone());
                }
                if let Some(priority) = e.details.priority {
                    self.priority = Some(priority);
                }
                if let Some(maintenance_type) = e.details.maintenance_type {
                    self.maintenance_type = Some(maintenance_type);
                }
                if let Some(employee_id) = e.details.employee_id {
                    self.employee_id = Some(employee_id);
                }
            }
            WorkOrderEvent::CostRecalculated(e) => {
                self.total_cost = e.total_cost;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WorkOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            WorkOrderCommand::ReviseDetails {
                work_order_id,
                details,
                occurred_at,
            } => self.handle_revise(*work_order_id, details, *occurred_at),
            WorkOrderCommand::RecalculateCost(cmd) => self.handle_recalculate(cmd),
        }
    }
}

/// Completion precondition.
///
/// A work order can be completed only if it carries cost or has tasks, and
/// when it has tasks, every one of them is OPEN or COMPLETED.
pub fn ensure_completable(total_cost: Money, task_statuses: &[ActivityStatus]) -> DomainResult<()> {
    if total_cost.is_zero() && task_statuses.is_empty() {
        return Err(DomainError::validation(
            "cannot complete a work order without cost or tasks",
        ));
    }

    let blocking = task_statuses
        .iter()
        .filter(|s| !s.permits_completion())
        .count();
    if blocking > 0 {
        return Err(DomainError::validation(format!(
            "cannot complete a work order while {blocking} task(s) are in progress or cancelled"
        )));
    }

    Ok(())
}

impl WorkOrder {
    fn ensure_work_order_id(&self, work_order_id: WorkOrderId) -> Result<(), DomainError> {
        if self.id != work_order_id {
            return Err(DomainError::validation("work_order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_not_terminal(&self) -> Result<(), DomainError> {
        if self.is_terminal() {
            return Err(DomainError::illegal_state(format!(
                "work order is {} and cannot change",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_work_order_id(cmd.work_order_id)?;
        self.ensure_not_terminal()?;

        if cmd.new_status == self.status {
            return Ok(vec![]);
        }

        let mut closing_date = None;
        if cmd.new_status == ActivityStatus::Completed {
            ensure_completable(self.total_cost, &cmd.task_statuses)?;
            if self.closing_date.is_none() {
                closing_date = Some(cmd.occurred_at);
            }
        }

        Ok(vec![WorkOrderEvent::StatusChanged(StatusChanged {
            work_order_id: cmd.work_order_id,
            from: self.status,
            to: cmd.new_status,
            closing_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(
        &self,
        work_order_id: WorkOrderId,
        details: &ReviseDetails,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_work_order_id(work_order_id)?;
        self.ensure_not_terminal()?;

        let changes = ReviseDetails {
            description: details
                .description
                .clone()
                .filter(|d| self.description.as_ref() != Some(d)),
            priority: details.priority.filter(|p| self.priority != Some(*p)),
            maintenance_type: details
                .maintenance_type
                .filter(|m| self.maintenance_type != Some(*m)),
            employee_id: details.employee_id.filter(|e| self.employee_id != Some(*e)),
        };
        if changes == ReviseDetails::default() {
            return Ok(vec![]);
        }

        Ok(vec![WorkOrderEvent::DetailsRevised(DetailsRevised {
            work_order_id,
            details: changes,
            occurred_at,
        })])
    }

    fn handle_recalculate(&self, cmd: &RecalculateCost) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_work_order_id(cmd.work_order_id)?;

        if cmd.total_cost == self.total_cost {
            return Ok(vec![]);
        }

        Ok(vec![WorkOrderEvent::CostRecalculated(CostRecalculated {
            work_order_id: cmd.work_order_id,
            total_cost: cmd.total_cost,
            occurred_at: cmd.occurred_at,
        })])
    }
}
