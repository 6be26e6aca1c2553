//! Equipment status follows its work order's lifecycle.

use crate::equipment::{Equipment, EquipmentStatus};
use crate::status::ActivityStatus;
use crate::work_order::WorkOrderEvent;

/// Side-effect policy keeping equipment status in lockstep with work orders.
///
/// Stateless: it maps work order events to the status the equipment must take.
/// Callers apply the outcome inside the same unit of work as the work order
/// mutation, so the two records never disagree.
#[derive(Debug, Default, Clone, Copy)]
pub struct EquipmentStatusSync;

impl EquipmentStatusSync {
    /// Status the equipment must move to after `event`, if any.
    ///
    /// - opened, or moved back to OPEN → UNDER_MAINTENANCE
    /// - completed or cancelled → ACTIVE
    /// - anything else (details, cost, IN_PROGRESS) → unchanged
    pub fn target_status(event: &WorkOrderEvent) -> Option<EquipmentStatus> {
        match event {
            WorkOrderEvent::WorkOrderOpened(_) => Some(EquipmentStatus::UnderMaintenance),
            WorkOrderEvent::StatusChanged(e) => match e.to {
                ActivityStatus::Open => Some(EquipmentStatus::UnderMaintenance),
                ActivityStatus::Completed | ActivityStatus::Cancelled => {
                    Some(EquipmentStatus::Active)
                }
                ActivityStatus::InProgress => None,
            },
            WorkOrderEvent::DetailsRevised(_) | WorkOrderEvent::CostRecalculated(_) => None,
        }
    }

    /// Apply every event in order; returns whether the equipment changed.
    pub fn apply(equipment: &mut Equipment, events: &[WorkOrderEvent]) -> bool {
        let mut changed = false;
        for event in events {
            if let Some(target) = Self::target_status(event) {
                if equipment.status() != target {
                    equipment.set_status(target);
                    changed = true;
                }
            }
        }
        changed
    }
}
