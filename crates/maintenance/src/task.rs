use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maintops_core::{BuildingId, DomainError, DomainResult, EmployeeId, Entity, TaskId, WorkOrderId};

use crate::status::ActivityStatus;

/// A unit of work nested inside one work order.
///
/// Task statuses are free-form (any status may follow any other); they only
/// matter as the completion gate of their parent work order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub building_id: BuildingId,
    pub work_order_id: WorkOrderId,
    pub title: String,
    pub description: Option<String>,
    pub employee_id: Option<EmployeeId>,
    pub status: ActivityStatus,
    /// Why the status was last changed (e.g. reason for cancelling).
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: TaskId,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
        title: impl Into<String>,
        status: Option<ActivityStatus>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("task title cannot be empty"));
        }
        Ok(Self {
            id,
            building_id,
            work_order_id,
            title,
            description: None,
            employee_id: None,
            status: status.unwrap_or(ActivityStatus::Open),
            reason: None,
            created_at,
        })
    }

    pub fn update_status(&mut self, status: ActivityStatus, reason: Option<String>) {
        self.status = status;
        self.reason = reason;
    }
}

impl Entity for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}
