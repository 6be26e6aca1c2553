//! Postgres-backed store.
//!
//! One `sqlx::Transaction` per unit of work. Work order rows read through
//! `work_order_for_update` and inventory rows read through
//! `inventory_for_update` are locked with `SELECT ... FOR UPDATE`: two units
//! of work touching the same work order or consuming the same item run one
//! after the other, and a work order snapshot is never written back over a
//! newer one.
//!
//! Plan links are created with `ON CONFLICT DO NOTHING`; a racing second
//! attach sees zero rows affected instead of overwriting the first link.
//!
//! ## Column encoding
//!
//! | Domain | Column |
//! |--------|--------|
//! | identifiers | `UUID` |
//! | `Money` | `BIGINT` cents |
//! | quantities | `BIGINT` (non-negative, checked) |
//! | enums | upper-case `TEXT` (`OPEN`, `UNDER_MAINTENANCE`, ...) |
//! | calendar dates | `DATE` |
//! | instants | `TIMESTAMPTZ` |
//!
//! ## Error mapping
//!
//! | SQLx error | Code | `StoreError` |
//! |------------|------|--------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed | n/a | `Closed` |
//! | ColumnDecode / column missing | n/a | `Decode` |
//! | Other | n/a | `Backend` |

use core::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use maintops_core::{
    BuildingId, DomainError, EmployeeId, EquipmentId, InventoryId, MaintenancePlanId, Money,
    TaskId, WorkOrderId,
};
use maintops_maintenance::{
    Equipment, EquipmentPlan, EquipmentPlanKey, Inventory, MaintenancePlan, Task, WorkOrder,
    WorkOrderInventory, WorkOrderInventoryKey, WorkOrderSnapshot,
};

use super::r#trait::{Store, StoreError, StoreResult, StoreTx};
use crate::config::PostgresConfig;

const SCHEMA: &str = include_str!("../../../../migrations/0001_maintenance_core.sql");

/// Postgres-backed store.
///
/// Every query filters on `building_id`; a record of another building is never
/// returned or modified.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a connection pool from configuration.
    #[instrument(skip(config), fields(max_connections = config.max_connections), err)]
    pub async fn connect(config: &PostgresConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> StoreResult<Self::Tx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTx { tx })
    }
}

/// Unit of work over [`PostgresStore`]. Rolled back when dropped uncommitted.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    async fn load_work_order(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
        lock: &'static str,
    ) -> StoreResult<Option<WorkOrder>> {
        let sql = format!(
            r#"
            SELECT id, building_id, equipment_id, employee_id, description, priority,
                   maintenance_type, status, opening_date, closing_date, total_cost, version
            FROM work_orders
            WHERE building_id = $1 AND id = $2{lock}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(*building_id.as_uuid())
            .bind(*work_order_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_work_order", e))?;

        row.as_ref()
            .map(|row| work_order_from_row(row).map(WorkOrder::restore))
            .transpose()
    }
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn equipment(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
    ) -> StoreResult<Option<Equipment>> {
        let row = sqlx::query(
            r#"
            SELECT id, building_id, identification, criticality, purchase_date,
                   warranty_end_date, status
            FROM equipment
            WHERE building_id = $1 AND id = $2
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*equipment_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_equipment", e))?;

        row.as_ref().map(equipment_from_row).transpose()
    }

    async fn save_equipment(&mut self, equipment: &Equipment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment (
                id, building_id, identification, criticality, purchase_date,
                warranty_end_date, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                identification = EXCLUDED.identification,
                criticality = EXCLUDED.criticality,
                purchase_date = EXCLUDED.purchase_date,
                warranty_end_date = EXCLUDED.warranty_end_date,
                status = EXCLUDED.status
            WHERE equipment.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*equipment.id.as_uuid())
        .bind(*equipment.building_id.as_uuid())
        .bind(&equipment.identification)
        .bind(equipment.criticality.as_str())
        .bind(equipment.purchase_date)
        .bind(equipment.warranty_end_date)
        .bind(equipment.status().as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_equipment", e))?;
        Ok(())
    }

    async fn work_order(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Option<WorkOrder>> {
        self.load_work_order(building_id, work_order_id, "").await
    }

    async fn work_order_for_update(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Option<WorkOrder>> {
        self.load_work_order(building_id, work_order_id, " FOR UPDATE")
            .await
    }

    async fn save_work_order(&mut self, work_order: &WorkOrder) -> StoreResult<()> {
        let wo = work_order.snapshot();
        sqlx::query(
            r#"
            INSERT INTO work_orders (
                id, building_id, equipment_id, employee_id, description, priority,
                maintenance_type, status, opening_date, closing_date, total_cost, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                employee_id = EXCLUDED.employee_id,
                description = EXCLUDED.description,
                priority = EXCLUDED.priority,
                maintenance_type = EXCLUDED.maintenance_type,
                status = EXCLUDED.status,
                closing_date = EXCLUDED.closing_date,
                total_cost = EXCLUDED.total_cost,
                version = EXCLUDED.version
            WHERE work_orders.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*wo.id.as_uuid())
        .bind(*wo.building_id.as_uuid())
        .bind(*wo.equipment_id.as_uuid())
        .bind(wo.employee_id.map(|id| *id.as_uuid()))
        .bind(&wo.description)
        .bind(wo.priority.map(|p| p.as_str()))
        .bind(wo.maintenance_type.map(|m| m.as_str()))
        .bind(wo.status.as_str())
        .bind(wo.opening_date)
        .bind(wo.closing_date)
        .bind(to_cents(wo.total_cost)?)
        .bind(to_i64(wo.version)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_work_order", e))?;
        Ok(())
    }

    async fn open_work_order_exists(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
        excluding: Option<WorkOrderId>,
    ) -> StoreResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM work_orders
                WHERE building_id = $1
                  AND equipment_id = $2
                  AND status = 'OPEN'
                  AND ($3::uuid IS NULL OR id <> $3)
            ) AS found
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*equipment_id.as_uuid())
        .bind(excluding.map(|id| *id.as_uuid()))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("open_work_order_exists", e))?;

        column(&row, "found")
    }

    async fn task(&mut self, building_id: BuildingId, task_id: TaskId) -> StoreResult<Option<Task>> {
        let row = sqlx::query(
            r#"
            SELECT id, building_id, work_order_id, title, description, employee_id,
                   status, reason, created_at
            FROM tasks
            WHERE building_id = $1 AND id = $2
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*task_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_task", e))?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn tasks_of(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query(
            r#"
            SELECT id, building_id, work_order_id, title, description, employee_id,
                   status, reason, created_at
            FROM tasks
            WHERE building_id = $1 AND work_order_id = $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*work_order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_tasks", e))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn save_task(&mut self, task: &Task) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, building_id, work_order_id, title, description, employee_id,
                status, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                employee_id = EXCLUDED.employee_id,
                status = EXCLUDED.status,
                reason = EXCLUDED.reason
            WHERE tasks.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*task.id.as_uuid())
        .bind(*task.building_id.as_uuid())
        .bind(*task.work_order_id.as_uuid())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.employee_id.map(|id| *id.as_uuid()))
        .bind(task.status.as_str())
        .bind(&task.reason)
        .bind(task.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_task", e))?;
        Ok(())
    }

    async fn inventory(
        &mut self,
        building_id: BuildingId,
        inventory_id: InventoryId,
    ) -> StoreResult<Option<Inventory>> {
        let row = sqlx::query(
            r#"
            SELECT id, building_id, name, quantity, minimum_stock, unit_cost, employee_id
            FROM inventory
            WHERE building_id = $1 AND id = $2
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*inventory_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_inventory", e))?;

        row.as_ref().map(inventory_from_row).transpose()
    }

    async fn inventory_for_update(
        &mut self,
        building_id: BuildingId,
        inventory_id: InventoryId,
    ) -> StoreResult<Option<Inventory>> {
        let row = sqlx::query(
            r#"
            SELECT id, building_id, name, quantity, minimum_stock, unit_cost, employee_id
            FROM inventory
            WHERE building_id = $1 AND id = $2
            FOR UPDATE
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*inventory_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_inventory", e))?;

        debug!(inventory_id = %inventory_id, found = row.is_some(), "inventory row locked");
        row.as_ref().map(inventory_from_row).transpose()
    }

    async fn save_inventory(&mut self, inventory: &Inventory) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory (
                id, building_id, name, quantity, minimum_stock, unit_cost, employee_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                quantity = EXCLUDED.quantity,
                minimum_stock = EXCLUDED.minimum_stock,
                unit_cost = EXCLUDED.unit_cost,
                employee_id = EXCLUDED.employee_id
            WHERE inventory.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*inventory.id.as_uuid())
        .bind(*inventory.building_id.as_uuid())
        .bind(&inventory.name)
        .bind(i64::from(inventory.quantity))
        .bind(i64::from(inventory.minimum_stock))
        .bind(to_cents(inventory.unit_cost)?)
        .bind(inventory.employee_id.map(|id| *id.as_uuid()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_inventory", e))?;
        Ok(())
    }

    async fn work_order_line(
        &mut self,
        building_id: BuildingId,
        key: WorkOrderInventoryKey,
    ) -> StoreResult<Option<WorkOrderInventory>> {
        let row = sqlx::query(
            r#"
            SELECT work_order_id, inventory_id, building_id, quantity, total_cost, output_date
            FROM work_order_inventory
            WHERE building_id = $1 AND work_order_id = $2 AND inventory_id = $3
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*key.work_order_id.as_uuid())
        .bind(*key.inventory_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_work_order_line", e))?;

        row.as_ref().map(line_from_row).transpose()
    }

    async fn work_order_lines(
        &mut self,
        building_id: BuildingId,
        work_order_id: WorkOrderId,
    ) -> StoreResult<Vec<WorkOrderInventory>> {
        let rows = sqlx::query(
            r#"
            SELECT work_order_id, inventory_id, building_id, quantity, total_cost, output_date
            FROM work_order_inventory
            WHERE building_id = $1 AND work_order_id = $2
            ORDER BY inventory_id ASC
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*work_order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_work_order_lines", e))?;

        rows.iter().map(line_from_row).collect()
    }

    async fn save_work_order_line(&mut self, line: &WorkOrderInventory) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_order_inventory (
                work_order_id, inventory_id, building_id, quantity, total_cost, output_date
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (work_order_id, inventory_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                total_cost = EXCLUDED.total_cost,
                output_date = EXCLUDED.output_date
            WHERE work_order_inventory.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*line.key.work_order_id.as_uuid())
        .bind(*line.key.inventory_id.as_uuid())
        .bind(*line.building_id.as_uuid())
        .bind(i64::from(line.quantity))
        .bind(to_cents(line.total_cost)?)
        .bind(line.output_date)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_work_order_line", e))?;
        Ok(())
    }

    async fn delete_work_order_line(
        &mut self,
        building_id: BuildingId,
        key: WorkOrderInventoryKey,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM work_order_inventory
            WHERE building_id = $1 AND work_order_id = $2 AND inventory_id = $3
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*key.work_order_id.as_uuid())
        .bind(*key.inventory_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("delete_work_order_line", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn maintenance_plan(
        &mut self,
        building_id: BuildingId,
        plan_id: MaintenancePlanId,
    ) -> StoreResult<Option<MaintenancePlan>> {
        let row = sqlx::query(
            r#"
            SELECT id, building_id, description, frequency_days, requires_shutdown,
                   maintenance_type
            FROM maintenance_plans
            WHERE building_id = $1 AND id = $2
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*plan_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_maintenance_plan", e))?;

        row.as_ref().map(plan_from_row).transpose()
    }

    async fn save_maintenance_plan(&mut self, plan: &MaintenancePlan) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO maintenance_plans (
                id, building_id, description, frequency_days, requires_shutdown,
                maintenance_type
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                description = EXCLUDED.description,
                frequency_days = EXCLUDED.frequency_days,
                requires_shutdown = EXCLUDED.requires_shutdown,
                maintenance_type = EXCLUDED.maintenance_type
            WHERE maintenance_plans.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*plan.id.as_uuid())
        .bind(*plan.building_id.as_uuid())
        .bind(&plan.description)
        .bind(i64::from(plan.frequency_days))
        .bind(plan.requires_shutdown)
        .bind(plan.maintenance_type.map(|m| m.as_str()))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_maintenance_plan", e))?;
        Ok(())
    }

    async fn equipment_plan(
        &mut self,
        building_id: BuildingId,
        key: EquipmentPlanKey,
    ) -> StoreResult<Option<EquipmentPlan>> {
        let row = sqlx::query(
            r#"
            SELECT equipment_id, plan_id, building_id, start_date, next_due_date, realized
            FROM equipment_plans
            WHERE building_id = $1 AND equipment_id = $2 AND plan_id = $3
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*key.equipment_id.as_uuid())
        .bind(*key.plan_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_equipment_plan", e))?;

        row.as_ref().map(equipment_plan_from_row).transpose()
    }

    async fn equipment_plans(
        &mut self,
        building_id: BuildingId,
        equipment_id: EquipmentId,
    ) -> StoreResult<Vec<EquipmentPlan>> {
        let rows = sqlx::query(
            r#"
            SELECT equipment_id, plan_id, building_id, start_date, next_due_date, realized
            FROM equipment_plans
            WHERE building_id = $1 AND equipment_id = $2
            ORDER BY next_due_date ASC, plan_id ASC
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*equipment_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_equipment_plans", e))?;

        rows.iter().map(equipment_plan_from_row).collect()
    }

    async fn insert_equipment_plan(&mut self, link: &EquipmentPlan) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO equipment_plans (
                equipment_id, plan_id, building_id, start_date, next_due_date, realized
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (equipment_id, plan_id) DO NOTHING
            "#,
        )
        .bind(*link.key.equipment_id.as_uuid())
        .bind(*link.key.plan_id.as_uuid())
        .bind(*link.building_id.as_uuid())
        .bind(link.start_date)
        .bind(link.next_due_date)
        .bind(link.realized)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_equipment_plan", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn save_equipment_plan(&mut self, link: &EquipmentPlan) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO equipment_plans (
                equipment_id, plan_id, building_id, start_date, next_due_date, realized
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (equipment_id, plan_id) DO UPDATE SET
                start_date = EXCLUDED.start_date,
                next_due_date = EXCLUDED.next_due_date,
                realized = EXCLUDED.realized
            WHERE equipment_plans.building_id = EXCLUDED.building_id
            "#,
        )
        .bind(*link.key.equipment_id.as_uuid())
        .bind(*link.key.plan_id.as_uuid())
        .bind(*link.building_id.as_uuid())
        .bind(link.start_date)
        .bind(link.next_due_date)
        .bind(link.realized)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_equipment_plan", e))?;
        Ok(())
    }

    async fn delete_equipment_plan(
        &mut self,
        building_id: BuildingId,
        key: EquipmentPlanKey,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM equipment_plans
            WHERE building_id = $1 AND equipment_id = $2 AND plan_id = $3
            "#,
        )
        .bind(*building_id.as_uuid())
        .bind(*key.equipment_id.as_uuid())
        .bind(*key.plan_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("delete_equipment_plan", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

// Row decoding

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Decode(format!("column {name}: {e}")))
}

fn parse<T>(value: &str) -> StoreResult<T>
where
    T: FromStr<Err = DomainError>,
{
    value
        .parse()
        .map_err(|e: DomainError| StoreError::Decode(e.to_string()))
}

fn parse_opt<T>(value: Option<String>) -> StoreResult<Option<T>>
where
    T: FromStr<Err = DomainError>,
{
    value.as_deref().map(parse).transpose()
}

fn to_cents(amount: Money) -> StoreResult<i64> {
    i64::try_from(amount.cents())
        .map_err(|_| StoreError::Backend(format!("amount {amount} does not fit BIGINT")))
}

fn to_i64(value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{value} does not fit BIGINT")))
}

fn money(cents: i64) -> StoreResult<Money> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Decode(format!("negative amount {cents}")))
}

fn count(value: i64) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("quantity {value} out of range")))
}

fn equipment_from_row(row: &PgRow) -> StoreResult<Equipment> {
    let criticality: String = column(row, "criticality")?;
    let status: String = column(row, "status")?;
    Ok(Equipment::restore(
        EquipmentId::from_uuid(column(row, "id")?),
        BuildingId::from_uuid(column(row, "building_id")?),
        column(row, "identification")?,
        parse(&criticality)?,
        column(row, "purchase_date")?,
        column(row, "warranty_end_date")?,
        parse(&status)?,
    ))
}

fn work_order_from_row(row: &PgRow) -> StoreResult<WorkOrderSnapshot> {
    let status: String = column(row, "status")?;
    let employee_id: Option<Uuid> = column(row, "employee_id")?;
    let version: i64 = column(row, "version")?;
    Ok(WorkOrderSnapshot {
        id: WorkOrderId::from_uuid(column(row, "id")?),
        building_id: BuildingId::from_uuid(column(row, "building_id")?),
        equipment_id: EquipmentId::from_uuid(column(row, "equipment_id")?),
        employee_id: employee_id.map(EmployeeId::from_uuid),
        description: column(row, "description")?,
        priority: parse_opt(column(row, "priority")?)?,
        maintenance_type: parse_opt(column(row, "maintenance_type")?)?,
        status: parse(&status)?,
        opening_date: column(row, "opening_date")?,
        closing_date: column(row, "closing_date")?,
        total_cost: money(column(row, "total_cost")?)?,
        version: u64::try_from(version)
            .map_err(|_| StoreError::Decode(format!("negative version {version}")))?,
    })
}

fn task_from_row(row: &PgRow) -> StoreResult<Task> {
    let status: String = column(row, "status")?;
    let employee_id: Option<Uuid> = column(row, "employee_id")?;
    Ok(Task {
        id: TaskId::from_uuid(column(row, "id")?),
        building_id: BuildingId::from_uuid(column(row, "building_id")?),
        work_order_id: WorkOrderId::from_uuid(column(row, "work_order_id")?),
        title: column(row, "title")?,
        description: column(row, "description")?,
        employee_id: employee_id.map(EmployeeId::from_uuid),
        status: parse(&status)?,
        reason: column(row, "reason")?,
        created_at: column(row, "created_at")?,
    })
}

fn inventory_from_row(row: &PgRow) -> StoreResult<Inventory> {
    let employee_id: Option<Uuid> = column(row, "employee_id")?;
    Ok(Inventory {
        id: InventoryId::from_uuid(column(row, "id")?),
        building_id: BuildingId::from_uuid(column(row, "building_id")?),
        name: column(row, "name")?,
        quantity: count(column(row, "quantity")?)?,
        minimum_stock: count(column(row, "minimum_stock")?)?,
        unit_cost: money(column(row, "unit_cost")?)?,
        employee_id: employee_id.map(EmployeeId::from_uuid),
    })
}

fn line_from_row(row: &PgRow) -> StoreResult<WorkOrderInventory> {
    Ok(WorkOrderInventory {
        key: WorkOrderInventoryKey::new(
            WorkOrderId::from_uuid(column(row, "work_order_id")?),
            InventoryId::from_uuid(column(row, "inventory_id")?),
        ),
        building_id: BuildingId::from_uuid(column(row, "building_id")?),
        quantity: count(column(row, "quantity")?)?,
        total_cost: money(column(row, "total_cost")?)?,
        output_date: column(row, "output_date")?,
    })
}

fn plan_from_row(row: &PgRow) -> StoreResult<MaintenancePlan> {
    Ok(MaintenancePlan {
        id: MaintenancePlanId::from_uuid(column(row, "id")?),
        building_id: BuildingId::from_uuid(column(row, "building_id")?),
        description: column(row, "description")?,
        frequency_days: count(column(row, "frequency_days")?)?,
        requires_shutdown: column(row, "requires_shutdown")?,
        maintenance_type: parse_opt(column(row, "maintenance_type")?)?,
    })
}

fn equipment_plan_from_row(row: &PgRow) -> StoreResult<EquipmentPlan> {
    Ok(EquipmentPlan {
        key: EquipmentPlanKey::new(
            EquipmentId::from_uuid(column(row, "equipment_id")?),
            MaintenancePlanId::from_uuid(column(row, "plan_id")?),
        ),
        building_id: BuildingId::from_uuid(column(row, "building_id")?),
        start_date: column(row, "start_date")?,
        next_due_date: column(row, "next_due_date")?,
        realized: column(row, "realized")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::UniqueViolation(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Closed,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
