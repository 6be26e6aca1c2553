//! Integration tests for the engine services over the in-memory store.
//!
//! Tests: OperatorScope → MaintenanceEngine → StoreTx → commit
//!
//! Verifies:
//! - Work order lifecycle keeps equipment status in sync
//! - Material consumption is additive, all-or-nothing, and never oversells
//! - Plan due dates advance once per realization
//! - Building isolation is preserved

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use maintops_auth::{BuildingMembership, InMemoryAccessPolicy, OperatorId, OperatorScope};
    use maintops_core::{BuildingId, EquipmentId, InventoryId, MaintenancePlanId, Money, WorkOrderId};
    use maintops_maintenance::{
        ActivityStatus, Criticality, Equipment, EquipmentStatus, Inventory, MaintenancePlan,
        MaintenanceType, Priority, ReviseDetails,
    };

    use crate::engine::{CreateTask, CreateWorkOrder, EngineError, MaintenanceEngine, WorkOrderChanges};
    use crate::store::{InMemoryStore, Store, StoreTx};

    type TestEngine = MaintenanceEngine<Arc<InMemoryStore>, Arc<InMemoryAccessPolicy>>;

    struct Fixture {
        engine: Arc<TestEngine>,
        store: Arc<InMemoryStore>,
        policy: Arc<InMemoryAccessPolicy>,
        scope: OperatorScope,
    }

    fn setup() -> Fixture {
        maintops_observability::init();

        let store = Arc::new(InMemoryStore::new());
        let policy = Arc::new(InMemoryAccessPolicy::new());
        let operator_id = OperatorId::new();
        let building_id = BuildingId::new();
        policy.grant(BuildingMembership {
            operator_id,
            building_id,
        });

        Fixture {
            engine: Arc::new(MaintenanceEngine::new(store.clone(), policy.clone())),
            store,
            policy,
            scope: OperatorScope::new(operator_id, building_id),
        }
    }

    impl Fixture {
        fn building_id(&self) -> BuildingId {
            self.scope.building_id()
        }

        async fn seed_equipment(&self) -> EquipmentId {
            let equipment = Equipment::new(
                EquipmentId::new(),
                self.building_id(),
                "CHILLER-02",
                Criticality::Critical,
            );
            let mut tx = self.store.begin().await.unwrap();
            tx.save_equipment(&equipment).await.unwrap();
            tx.commit().await.unwrap();
            equipment.id
        }

        async fn seed_inventory(&self, quantity: u32, unit_cost_cents: u64) -> InventoryId {
            let item = Inventory::new(
                InventoryId::new(),
                self.building_id(),
                "V-belt",
                quantity,
                1,
                Money::from_cents(unit_cost_cents),
            )
            .unwrap();
            let mut tx = self.store.begin().await.unwrap();
            tx.save_inventory(&item).await.unwrap();
            tx.commit().await.unwrap();
            item.id
        }

        async fn seed_plan(&self, frequency_days: u32) -> MaintenancePlanId {
            let plan = MaintenancePlan::new(
                MaintenancePlanId::new(),
                self.building_id(),
                frequency_days,
                true,
                Some(MaintenanceType::Preventive),
            )
            .unwrap();
            let mut tx = self.store.begin().await.unwrap();
            tx.save_maintenance_plan(&plan).await.unwrap();
            tx.commit().await.unwrap();
            plan.id
        }

        async fn equipment_status(&self, equipment_id: EquipmentId) -> EquipmentStatus {
            let mut tx = self.store.begin().await.unwrap();
            tx.equipment(self.building_id(), equipment_id)
                .await
                .unwrap()
                .unwrap()
                .status()
        }

        async fn stock(&self, inventory_id: InventoryId) -> u32 {
            let mut tx = self.store.begin().await.unwrap();
            tx.inventory(self.building_id(), inventory_id)
                .await
                .unwrap()
                .unwrap()
                .quantity
        }

        async fn work_order_total(&self, work_order_id: WorkOrderId) -> Money {
            let mut tx = self.store.begin().await.unwrap();
            tx.work_order(self.building_id(), work_order_id)
                .await
                .unwrap()
                .unwrap()
                .total_cost()
        }

        async fn task_count(&self, work_order_id: WorkOrderId) -> usize {
            let mut tx = self.store.begin().await.unwrap();
            tx.tasks_of(self.building_id(), work_order_id)
                .await
                .unwrap()
                .len()
        }

        async fn set_unit_cost(&self, inventory_id: InventoryId, cents: u64) {
            let mut tx = self.store.begin().await.unwrap();
            let mut item = tx
                .inventory(self.building_id(), inventory_id)
                .await
                .unwrap()
                .unwrap();
            item.unit_cost = Money::from_cents(cents);
            tx.save_inventory(&item).await.unwrap();
            tx.commit().await.unwrap();
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn additive_consumption_and_insufficient_stock() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(10, 250).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let line = fx
            .engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 4)
            .await
            .unwrap();
        assert_eq!(line.quantity, 4);
        assert_eq!(fx.stock(inventory_id).await, 6);
        assert_eq!(fx.work_order_total(wo.id).await, Money::from_cents(4 * 250));

        let line = fx
            .engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 3)
            .await
            .unwrap();
        assert_eq!(line.quantity, 7);
        assert_eq!(line.total_cost, Money::from_cents(7 * 250));
        assert_eq!(fx.stock(inventory_id).await, 3);

        let err = fx
            .engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                requested: 5,
                available: 3
            }
        ));
        assert_eq!(fx.stock(inventory_id).await, 3);

        let items = fx.engine.list_work_order_items(&fx.scope, wo.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 7);

        let wo = fx
            .engine
            .update_work_order(&fx.scope, wo.id, WorkOrderChanges::default())
            .await
            .unwrap();
        assert_eq!(wo.total_cost, Money::from_cents(7 * 250));
    }

    #[tokio::test]
    async fn completion_without_cost_or_tasks_is_rejected() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let err = fx
            .engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(
            fx.equipment_status(equipment_id).await,
            EquipmentStatus::UnderMaintenance
        );
    }

    #[tokio::test]
    async fn in_progress_task_blocks_completion_despite_cost() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(5, 100).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        fx.engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 1)
            .await
            .unwrap();
        let task = fx
            .engine
            .create_task(&fx.scope, wo.id, CreateTask::titled("Replace bearing"))
            .await
            .unwrap();
        fx.engine
            .update_task_status(&fx.scope, task.id, ActivityStatus::InProgress, None)
            .await
            .unwrap();

        let err = fx
            .engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        // Once the task is done the order can close.
        fx.engine
            .update_task_status(&fx.scope, task.id, ActivityStatus::Completed, None)
            .await
            .unwrap();
        let wo = fx
            .engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Completed)
            .await
            .unwrap();
        assert_eq!(wo.status, ActivityStatus::Completed);
        assert!(wo.closing_date.is_some());
    }

    #[tokio::test]
    async fn plan_due_date_advances_once_per_realization() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let plan_id = fx.seed_plan(30).await;

        let link = fx
            .engine
            .attach_maintenance_plan(&fx.scope, equipment_id, plan_id, date(2025, 1, 1))
            .await
            .unwrap();
        assert_eq!(link.next_due_date, date(2025, 1, 31));
        assert!(!link.realized);

        let link = fx
            .engine
            .set_maintenance_plan_realized(&fx.scope, equipment_id, plan_id, true)
            .await
            .unwrap();
        assert_eq!(link.next_due_date, date(2025, 3, 2));
        assert!(link.realized);

        let link = fx
            .engine
            .set_maintenance_plan_realized(&fx.scope, equipment_id, plan_id, true)
            .await
            .unwrap();
        assert_eq!(link.next_due_date, date(2025, 3, 2));

        // Clearing the flag leaves the due date where it is.
        let link = fx
            .engine
            .set_maintenance_plan_realized(&fx.scope, equipment_id, plan_id, false)
            .await
            .unwrap();
        assert!(!link.realized);
        assert_eq!(link.next_due_date, date(2025, 3, 2));

        let link = fx
            .engine
            .set_maintenance_plan_realized(&fx.scope, equipment_id, plan_id, true)
            .await
            .unwrap();
        assert_eq!(link.next_due_date, date(2025, 4, 1));

        let links = fx
            .engine
            .list_equipment_plans(&fx.scope, equipment_id)
            .await
            .unwrap();
        assert_eq!(links, vec![link]);
    }

    #[tokio::test]
    async fn equipment_status_follows_work_order_lifecycle() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);

        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        assert_eq!(
            fx.equipment_status(equipment_id).await,
            EquipmentStatus::UnderMaintenance
        );

        fx.engine
            .create_task(&fx.scope, wo.id, CreateTask::titled("Inspect coils"))
            .await
            .unwrap();
        fx.engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Completed)
            .await
            .unwrap();
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);

        let second = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        fx.engine
            .update_work_order_status(&fx.scope, second.id, ActivityStatus::InProgress)
            .await
            .unwrap();
        assert_eq!(
            fx.equipment_status(equipment_id).await,
            EquipmentStatus::UnderMaintenance
        );
        fx.engine
            .update_work_order_status(&fx.scope, second.id, ActivityStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);
    }

    #[tokio::test]
    async fn second_open_work_order_conflicts() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        fx.engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let err = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn reopening_conflicts_with_another_open_order() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let first = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        fx.engine
            .update_work_order_status(&fx.scope, first.id, ActivityStatus::InProgress)
            .await
            .unwrap();

        // The equipment has no OPEN order now, so a new one is accepted.
        fx.engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let err = fx
            .engine
            .update_work_order_status(&fx.scope, first.id, ActivityStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn terminal_work_orders_reject_transitions_and_updates() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        fx.engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Cancelled)
            .await
            .unwrap();

        let err = fx
            .engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState(_)));

        let err = fx
            .engine
            .update_work_order(
                &fx.scope,
                wo.id,
                WorkOrderChanges {
                    details: ReviseDetails {
                        priority: Some(Priority::Low),
                        ..ReviseDetails::default()
                    },
                    status: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::IllegalState(_)));
    }

    #[tokio::test]
    async fn terminal_requested_status_is_rejected_at_creation() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let mut request = CreateWorkOrder::for_equipment(equipment_id);
        request.requested_status = Some(ActivityStatus::Completed);

        let err = fx.engine.create_work_order(&fx.scope, request).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);
    }

    #[tokio::test]
    async fn detail_updates_leave_equipment_alone() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let mut request = CreateWorkOrder::for_equipment(equipment_id);
        request.requested_status = Some(ActivityStatus::InProgress);
        let wo = fx.engine.create_work_order(&fx.scope, request).await.unwrap();
        assert_eq!(wo.status, ActivityStatus::InProgress);

        let wo = fx
            .engine
            .update_work_order(
                &fx.scope,
                wo.id,
                WorkOrderChanges {
                    details: ReviseDetails {
                        description: Some("Noisy fan".to_string()),
                        priority: Some(Priority::Urgent),
                        ..ReviseDetails::default()
                    },
                    status: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(wo.description.as_deref(), Some("Noisy fan"));
        assert_eq!(wo.priority, Some(Priority::Urgent));
        assert_eq!(wo.status, ActivityStatus::InProgress);
        assert_eq!(
            fx.equipment_status(equipment_id).await,
            EquipmentStatus::UnderMaintenance
        );

        let wo = fx
            .engine
            .update_work_order(
                &fx.scope,
                wo.id,
                WorkOrderChanges {
                    details: ReviseDetails::default(),
                    status: Some(ActivityStatus::Cancelled),
                },
            )
            .await
            .unwrap();
        assert_eq!(wo.status, ActivityStatus::Cancelled);
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);
    }

    #[tokio::test]
    async fn add_then_remove_restores_stock() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(8, 1_999).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        fx.engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 5)
            .await
            .unwrap();
        fx.engine
            .remove_inventory_from_work_order(&fx.scope, wo.id, inventory_id)
            .await
            .unwrap();

        assert_eq!(fx.stock(inventory_id).await, 8);
        assert!(fx
            .engine
            .list_work_order_items(&fx.scope, wo.id)
            .await
            .unwrap()
            .is_empty());

        let err = fx
            .engine
            .remove_inventory_from_work_order(&fx.scope, wo.id, inventory_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("work order inventory line")));
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(8, 10).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let err = fx
            .engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(fx.stock(inventory_id).await, 8);
    }

    #[tokio::test]
    async fn failed_cost_recompute_rolls_back_reservation() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let huge = u64::MAX / 2 + 1;
        let first = fx.seed_inventory(3, huge).await;
        let second = fx.seed_inventory(3, huge).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        fx.engine
            .add_inventory_to_work_order(&fx.scope, wo.id, first, 1)
            .await
            .unwrap();

        // Line total fits, but the work order sum overflows after the reservation.
        let err = fx
            .engine
            .add_inventory_to_work_order(&fx.scope, wo.id, second, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        assert_eq!(fx.stock(second).await, 3);
        let items = fx.engine.list_work_order_items(&fx.scope, wo.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].inventory_id, first);
    }

    #[tokio::test]
    async fn listed_items_show_current_price_next_to_snapshot() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(10, 500).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        fx.engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 2)
            .await
            .unwrap();

        fx.set_unit_cost(inventory_id, 700).await;

        let items = fx.engine.list_work_order_items(&fx.scope, wo.id).await.unwrap();
        assert_eq!(items[0].unit_cost, Money::from_cents(700));
        assert_eq!(items[0].total_cost, Money::from_cents(1_000));
        assert_eq!(items[0].name, "V-belt");

        // Topping up re-prices the whole line at the current cost.
        let line = fx
            .engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 1)
            .await
            .unwrap();
        assert_eq!(line.total_cost, Money::from_cents(2_100));
    }

    #[tokio::test]
    async fn materials_can_be_attached_to_closed_work_orders() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(4, 300).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        fx.engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Cancelled)
            .await
            .unwrap();

        fx.engine
            .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, 2)
            .await
            .unwrap();
        assert_eq!(fx.stock(inventory_id).await, 2);
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);
    }

    #[tokio::test]
    async fn plan_links_are_unique_and_detach_requires_a_link() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let plan_id = fx.seed_plan(7).await;

        fx.engine
            .attach_maintenance_plan(&fx.scope, equipment_id, plan_id, date(2025, 5, 1))
            .await
            .unwrap();
        let err = fx
            .engine
            .attach_maintenance_plan(&fx.scope, equipment_id, plan_id, date(2025, 6, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists(_)));

        fx.engine
            .detach_maintenance_plan(&fx.scope, equipment_id, plan_id)
            .await
            .unwrap();
        let err = fx
            .engine
            .detach_maintenance_plan(&fx.scope, equipment_id, plan_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("equipment plan")));

        let err = fx
            .engine
            .set_maintenance_plan_realized(&fx.scope, equipment_id, plan_id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("equipment plan")));
    }

    #[tokio::test]
    async fn operator_without_membership_is_turned_away() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let outsider = OperatorScope::new(OperatorId::new(), fx.building_id());

        let err = fx
            .engine
            .create_work_order(&outsider, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("building")));
        assert_eq!(fx.equipment_status(equipment_id).await, EquipmentStatus::Active);

        fx.policy.revoke(fx.scope.operator_id(), fx.building_id());
        let err = fx
            .engine
            .list_equipment_plans(&fx.scope, equipment_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("building")));
    }

    #[tokio::test]
    async fn records_of_other_buildings_are_not_found() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let other_building = BuildingId::new();
        fx.policy.grant(BuildingMembership {
            operator_id: fx.scope.operator_id(),
            building_id: other_building,
        });
        let other_scope = OperatorScope::new(fx.scope.operator_id(), other_building);

        let err = fx
            .engine
            .update_work_order_status(&other_scope, wo.id, ActivityStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("work order")));

        let err = fx
            .engine
            .create_work_order(&other_scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("equipment")));
    }

    #[tokio::test]
    async fn task_status_accepts_any_transition() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();
        let task = fx
            .engine
            .create_task(&fx.scope, wo.id, CreateTask::titled("Lubricate"))
            .await
            .unwrap();
        assert_eq!(task.status, ActivityStatus::Open);

        let task = fx
            .engine
            .update_task_status(
                &fx.scope,
                task.id,
                ActivityStatus::Cancelled,
                Some("part unavailable".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(task.reason.as_deref(), Some("part unavailable"));

        let task = fx
            .engine
            .update_task_status(&fx.scope, task.id, ActivityStatus::Open, None)
            .await
            .unwrap();
        assert_eq!(task.status, ActivityStatus::Open);
        assert_eq!(task.reason, None);
    }

    #[tokio::test]
    async fn batch_task_creation_is_all_or_nothing() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let err = fx
            .engine
            .create_tasks(
                &fx.scope,
                wo.id,
                vec![CreateTask::titled("Drain tank"), CreateTask::titled("  ")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(fx.task_count(wo.id).await, 0);

        let mut in_progress = CreateTask::titled("Flush lines");
        in_progress.status = Some(ActivityStatus::InProgress);
        let tasks = fx
            .engine
            .create_tasks(
                &fx.scope,
                wo.id,
                vec![CreateTask::titled("Drain tank"), in_progress],
            )
            .await
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.work_order_id == wo.id));
        assert_eq!(fx.task_count(wo.id).await, 2);

        // The batch feeds the completion gate like single creates do.
        let err = fx
            .engine
            .update_work_order_status(&fx.scope, wo.id, ActivityStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn batch_task_creation_requires_the_work_order() {
        let fx = setup();
        let err = fx
            .engine
            .create_tasks(&fx.scope, WorkOrderId::new(), vec![CreateTask::titled("Orphan")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound("work order")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_additions_of_different_items_keep_total_equal_to_lines() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let mut items = Vec::new();
        for i in 1..=8u64 {
            items.push((fx.seed_inventory(10, i * 100).await, i * 100));
        }

        let work_order_id = wo.id;
        let mut handles = Vec::new();
        for (inventory_id, _) in &items {
            let engine = fx.engine.clone();
            let scope = fx.scope;
            let inventory_id = *inventory_id;
            handles.push(tokio::spawn(async move {
                engine
                    .add_inventory_to_work_order(&scope, work_order_id, inventory_id, 3)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let lines = fx
            .engine
            .list_work_order_items(&fx.scope, work_order_id)
            .await
            .unwrap();
        assert_eq!(lines.len(), items.len());
        let line_sum = Money::try_sum(lines.iter().map(|l| l.total_cost)).unwrap();
        let expected: u64 = items.iter().map(|(_, cost)| 3 * cost).sum();

        assert_eq!(line_sum, Money::from_cents(expected));
        assert_eq!(fx.work_order_total(work_order_id).await, line_sum);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_attaches_link_a_plan_once() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let plan_id = fx.seed_plan(30).await;

        let mut handles = Vec::new();
        for day in 1..=8u32 {
            let engine = fx.engine.clone();
            let scope = fx.scope;
            handles.push(tokio::spawn(async move {
                engine
                    .attach_maintenance_plan(&scope, equipment_id, plan_id, date(2025, 3, day))
                    .await
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(link) => winners.push(link),
                Err(EngineError::AlreadyExists(_)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        let links = fx
            .engine
            .list_equipment_plans(&fx.scope, equipment_id)
            .await
            .unwrap();
        assert_eq!(links, winners);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumption_never_oversells() {
        let fx = setup();
        let equipment_id = fx.seed_equipment().await;
        let inventory_id = fx.seed_inventory(50, 40).await;
        let wo = fx
            .engine
            .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
            .await
            .unwrap();

        let work_order_id = wo.id;
        let mut handles = Vec::new();
        for _ in 0..20 {
            let engine = fx.engine.clone();
            let scope = fx.scope;
            handles.push(tokio::spawn(async move {
                engine
                    .add_inventory_to_work_order(&scope, work_order_id, inventory_id, 5)
                    .await
            }));
        }

        let mut granted = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => granted += 1,
                Err(EngineError::InsufficientStock { .. }) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(granted, 10);
        assert_eq!(refused, 10);
        assert_eq!(fx.stock(inventory_id).await, 0);

        let items = fx.engine.list_work_order_items(&fx.scope, wo.id).await.unwrap();
        assert_eq!(items[0].quantity, 50);
        assert_eq!(items[0].total_cost, Money::from_cents(50 * 40));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        /// (line quantity, stock left, work order total) after consuming `steps` in order.
        fn consume(stock: u32, unit_cost: u64, steps: &[u32]) -> (u32, u32, Money) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            runtime.block_on(async {
                let fx = setup();
                let equipment_id = fx.seed_equipment().await;
                let inventory_id = fx.seed_inventory(stock, unit_cost).await;
                let wo = fx
                    .engine
                    .create_work_order(&fx.scope, CreateWorkOrder::for_equipment(equipment_id))
                    .await
                    .unwrap();

                let mut line_quantity = 0;
                for qty in steps {
                    let line = fx
                        .engine
                        .add_inventory_to_work_order(&fx.scope, wo.id, inventory_id, *qty)
                        .await
                        .unwrap();
                    line_quantity = line.quantity;
                }

                let wo = fx
                    .engine
                    .update_work_order(&fx.scope, wo.id, WorkOrderChanges::default())
                    .await
                    .unwrap();
                (line_quantity, fx.stock(inventory_id).await, wo.total_cost)
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 64,
                ..ProptestConfig::default()
            })]

            /// Property: two additions end where one combined addition ends.
            #[test]
            fn split_addition_matches_combined(
                q1 in 1u32..50,
                q2 in 1u32..50,
                spare in 0u32..20,
                unit_cost in 0u64..10_000
            ) {
                let stock = q1 + q2 + spare;
                let split = consume(stock, unit_cost, &[q1, q2]);
                let combined = consume(stock, unit_cost, &[q1 + q2]);

                prop_assert_eq!(split, combined);
                prop_assert_eq!(split.1, spare);
                prop_assert_eq!(split.2, Money::from_cents(u64::from(q1 + q2) * unit_cost));
            }
        }
    }
}
