use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use maintops_core::{BuildingId, DomainError, DomainResult, Entity, EquipmentId};

/// Operational status of a piece of equipment.
///
/// Once a work order exists against the equipment this is driven exclusively by
/// [`crate::EquipmentStatusSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquipmentStatus {
    Active,
    Inactive,
    UnderMaintenance,
}

impl EquipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentStatus::Active => "ACTIVE",
            EquipmentStatus::Inactive => "INACTIVE",
            EquipmentStatus::UnderMaintenance => "UNDER_MAINTENANCE",
        }
    }
}

impl FromStr for EquipmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(EquipmentStatus::Active),
            "INACTIVE" => Ok(EquipmentStatus::Inactive),
            "UNDER_MAINTENANCE" => Ok(EquipmentStatus::UnderMaintenance),
            other => Err(DomainError::validation(format!(
                "unknown equipment status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "LOW",
            Criticality::Medium => "MEDIUM",
            Criticality::High => "HIGH",
            Criticality::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Criticality {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Criticality::Low),
            "MEDIUM" => Ok(Criticality::Medium),
            "HIGH" => Ok(Criticality::High),
            "CRITICAL" => Ok(Criticality::Critical),
            other => Err(DomainError::validation(format!(
                "unknown criticality '{other}'"
            ))),
        }
    }
}

/// A maintained asset installed in one building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub building_id: BuildingId,
    pub identification: String,
    pub criticality: Criticality,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_end_date: Option<NaiveDate>,
    status: EquipmentStatus,
}

impl Equipment {
    /// Register new equipment; it starts ACTIVE.
    pub fn new(
        id: EquipmentId,
        building_id: BuildingId,
        identification: impl Into<String>,
        criticality: Criticality,
    ) -> Self {
        Self {
            id,
            building_id,
            identification: identification.into(),
            criticality,
            purchase_date: None,
            warranty_end_date: None,
            status: EquipmentStatus::Active,
        }
    }

    /// Rebuild equipment loaded from storage with its persisted status.
    pub fn restore(
        id: EquipmentId,
        building_id: BuildingId,
        identification: String,
        criticality: Criticality,
        purchase_date: Option<NaiveDate>,
        warranty_end_date: Option<NaiveDate>,
        status: EquipmentStatus,
    ) -> Self {
        Self {
            id,
            building_id,
            identification,
            criticality,
            purchase_date,
            warranty_end_date,
            status,
        }
    }

    pub fn status(&self) -> EquipmentStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: EquipmentStatus) {
        self.status = status;
    }

    /// Warranty cannot end before the purchase date.
    pub fn validate(&self) -> DomainResult<()> {
        if let (Some(purchase), Some(warranty_end)) = (self.purchase_date, self.warranty_end_date) {
            if warranty_end < purchase {
                return Err(DomainError::validation(
                    "warranty end date cannot be earlier than purchase date",
                ));
            }
        }
        Ok(())
    }
}

impl Entity for Equipment {
    type Id = EquipmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}
