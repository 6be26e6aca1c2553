use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use maintops_auth::{AccessPolicy, OperatorScope};
use maintops_core::{EquipmentId, MaintenancePlanId};
use maintops_maintenance::{EquipmentPlan, EquipmentPlanKey, MaintenancePlan};

use super::{EngineError, EngineResult, MaintenanceEngine};
use crate::store::{Store, StoreTx};

impl<S, P> MaintenanceEngine<S, P>
where
    S: Store,
    P: AccessPolicy,
{
    /// Schedule `plan_id` against an equipment, first due one period after `start_date`.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn attach_maintenance_plan(
        &self,
        scope: &OperatorScope,
        equipment_id: EquipmentId,
        plan_id: MaintenancePlanId,
        start_date: NaiveDate,
    ) -> EngineResult<EquipmentPlan> {
        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;

        tx.equipment(building_id, equipment_id)
            .await?
            .ok_or(EngineError::NotFound("equipment"))?;
        let plan = load_plan(&mut tx, scope, plan_id).await?;

        let key = EquipmentPlanKey::new(equipment_id, plan_id);
        let link = EquipmentPlan::attach(key, building_id, &plan, start_date)?;
        if !tx.insert_equipment_plan(&link).await? {
            return Err(EngineError::AlreadyExists(format!(
                "plan {plan_id} is already scheduled for equipment {equipment_id}"
            )));
        }
        tx.commit().await?;

        info!(
            equipment_id = %equipment_id,
            plan_id = %plan_id,
            next_due_date = %link.next_due_date,
            "maintenance plan attached"
        );
        Ok(link)
    }

    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn detach_maintenance_plan(
        &self,
        scope: &OperatorScope,
        equipment_id: EquipmentId,
        plan_id: MaintenancePlanId,
    ) -> EngineResult<()> {
        let mut tx = self.begin(scope).await?;

        let key = EquipmentPlanKey::new(equipment_id, plan_id);
        if !tx.delete_equipment_plan(scope.building_id(), key).await? {
            return Err(EngineError::NotFound("equipment plan"));
        }
        tx.commit().await?;

        info!(equipment_id = %equipment_id, plan_id = %plan_id, "maintenance plan detached");
        Ok(())
    }

    /// Set the realized flag; a false → true flip advances the due date one period.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn set_maintenance_plan_realized(
        &self,
        scope: &OperatorScope,
        equipment_id: EquipmentId,
        plan_id: MaintenancePlanId,
        realized: bool,
    ) -> EngineResult<EquipmentPlan> {
        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;

        let key = EquipmentPlanKey::new(equipment_id, plan_id);
        let mut link = tx
            .equipment_plan(building_id, key)
            .await?
            .ok_or(EngineError::NotFound("equipment plan"))?;
        let plan = load_plan(&mut tx, scope, plan_id).await?;

        let advanced = link.set_realized(realized, &plan)?;
        tx.save_equipment_plan(&link).await?;
        tx.commit().await?;

        info!(
            equipment_id = %equipment_id,
            plan_id = %plan_id,
            realized,
            advanced,
            next_due_date = %link.next_due_date,
            "maintenance plan realization updated"
        );
        Ok(link)
    }

    /// Plan links of an equipment, soonest due first.
    #[instrument(
        skip(self, scope),
        fields(building_id = %scope.building_id()),
        err
    )]
    pub async fn list_equipment_plans(
        &self,
        scope: &OperatorScope,
        equipment_id: EquipmentId,
    ) -> EngineResult<Vec<EquipmentPlan>> {
        let building_id = scope.building_id();
        let mut tx = self.begin(scope).await?;

        tx.equipment(building_id, equipment_id)
            .await?
            .ok_or(EngineError::NotFound("equipment"))?;
        let links = tx.equipment_plans(building_id, equipment_id).await?;

        debug!(equipment_id = %equipment_id, plans = links.len(), "listed equipment plans");
        Ok(links)
    }
}

async fn load_plan<T>(
    tx: &mut T,
    scope: &OperatorScope,
    plan_id: MaintenancePlanId,
) -> EngineResult<MaintenancePlan>
where
    T: StoreTx,
{
    tx.maintenance_plan(scope.building_id(), plan_id)
        .await?
        .ok_or(EngineError::NotFound("maintenance plan"))
}
