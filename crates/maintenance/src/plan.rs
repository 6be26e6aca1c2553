use core::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use maintops_core::{
    BuildingId, DomainError, DomainResult, Entity, EquipmentId, MaintenancePlanId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceType {
    Preventive,
    Corrective,
    Predictive,
}

impl MaintenanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaintenanceType::Preventive => "PREVENTIVE",
            MaintenanceType::Corrective => "CORRECTIVE",
            MaintenanceType::Predictive => "PREDICTIVE",
        }
    }
}

impl FromStr for MaintenanceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PREVENTIVE" => Ok(MaintenanceType::Preventive),
            "CORRECTIVE" => Ok(MaintenanceType::Corrective),
            "PREDICTIVE" => Ok(MaintenanceType::Predictive),
            other => Err(DomainError::validation(format!(
                "unknown maintenance type '{other}'"
            ))),
        }
    }
}

/// A recurring maintenance routine, e.g. "replace filters every 90 days".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub id: MaintenancePlanId,
    pub building_id: BuildingId,
    pub description: Option<String>,
    pub frequency_days: u32,
    pub requires_shutdown: bool,
    pub maintenance_type: Option<MaintenanceType>,
}

impl MaintenancePlan {
    pub fn new(
        id: MaintenancePlanId,
        building_id: BuildingId,
        frequency_days: u32,
        requires_shutdown: bool,
        maintenance_type: Option<MaintenanceType>,
    ) -> DomainResult<Self> {
        let plan = Self {
            id,
            building_id,
            description: None,
            frequency_days,
            requires_shutdown,
            maintenance_type,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.frequency_days == 0 {
            return Err(DomainError::validation("frequency_days must be positive"));
        }
        Ok(())
    }

    /// `date + frequency_days`.
    pub fn next_after(&self, date: NaiveDate) -> DomainResult<NaiveDate> {
        self.validate()?;
        date.checked_add_days(Days::new(u64::from(self.frequency_days)))
            .ok_or_else(|| DomainError::validation("due date out of range"))
    }
}

impl Entity for MaintenancePlan {
    type Id = MaintenancePlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}

/// Composite key of an equipment/plan link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EquipmentPlanKey {
    pub equipment_id: EquipmentId,
    pub plan_id: MaintenancePlanId,
}

impl EquipmentPlanKey {
    pub fn new(equipment_id: EquipmentId, plan_id: MaintenancePlanId) -> Self {
        Self {
            equipment_id,
            plan_id,
        }
    }
}

/// A maintenance plan scheduled against one piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentPlan {
    pub key: EquipmentPlanKey,
    pub building_id: BuildingId,
    pub start_date: NaiveDate,
    pub next_due_date: NaiveDate,
    pub realized: bool,
}

impl EquipmentPlan {
    /// Link `plan` to an equipment. The first due date is one period after `start_date`.
    pub fn attach(
        key: EquipmentPlanKey,
        building_id: BuildingId,
        plan: &MaintenancePlan,
        start_date: NaiveDate,
    ) -> DomainResult<Self> {
        if key.plan_id != plan.id {
            return Err(DomainError::validation("plan_id mismatch"));
        }
        Ok(Self {
            key,
            building_id,
            start_date,
            next_due_date: plan.next_after(start_date)?,
            realized: false,
        })
    }

    /// Set the realized flag.
    ///
    /// Only a false → true flip advances `next_due_date` by one period.
    /// Returns whether the due date moved.
    pub fn set_realized(&mut self, realized: bool, plan: &MaintenancePlan) -> DomainResult<bool> {
        if self.key.plan_id != plan.id {
            return Err(DomainError::validation("plan_id mismatch"));
        }

        let advance = realized && !self.realized;
        if advance {
            self.next_due_date = plan.next_after(self.next_due_date)?;
        }
        self.realized = realized;
        Ok(advance)
    }
}

impl Entity for EquipmentPlan {
    type Id = EquipmentPlanKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}
