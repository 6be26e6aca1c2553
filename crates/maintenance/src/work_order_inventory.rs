use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maintops_core::{BuildingId, DomainError, DomainResult, Entity, InventoryId, Money, WorkOrderId};

/// Composite key of a material line: at most one line per (work order, item).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkOrderInventoryKey {
    pub work_order_id: WorkOrderId,
    pub inventory_id: InventoryId,
}

impl WorkOrderInventoryKey {
    pub fn new(work_order_id: WorkOrderId, inventory_id: InventoryId) -> Self {
        Self {
            work_order_id,
            inventory_id,
        }
    }
}

/// Material consumed by a work order.
///
/// `total_cost` is a price snapshot taken at the item's unit cost when the line
/// was last topped up; later price changes do not touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderInventory {
    pub key: WorkOrderInventoryKey,
    pub building_id: BuildingId,
    pub quantity: u32,
    pub total_cost: Money,
    pub output_date: DateTime<Utc>,
}

impl WorkOrderInventory {
    /// First consumption of an item on a work order.
    pub fn consume(
        key: WorkOrderInventoryKey,
        building_id: BuildingId,
        quantity: u32,
        unit_cost: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            key,
            building_id,
            quantity,
            total_cost: unit_cost.times(quantity)?,
            output_date: now,
        })
    }

    /// Further consumption of an item already on the work order.
    ///
    /// The whole line is re-priced at the current unit cost.
    pub fn add_quantity(
        &mut self,
        delta: u32,
        unit_cost: Money,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if delta == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let quantity = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("line quantity overflow"))?;
        let total_cost = unit_cost.times(quantity)?;

        self.quantity = quantity;
        self.total_cost = total_cost;
        self.output_date = now;
        Ok(())
    }
}

impl Entity for WorkOrderInventory {
    type Id = WorkOrderInventoryKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}

/// Work order total: the sum of its line totals.
pub fn total_cost_of(lines: &[WorkOrderInventory]) -> DomainResult<Money> {
    Money::try_sum(lines.iter().map(|line| line.total_cost))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> WorkOrderInventoryKey {
        WorkOrderInventoryKey::new(WorkOrderId::new(), InventoryId::new())
    }

    #[test]
    fn consume_snapshots_price() {
        let line = WorkOrderInventory::consume(
            key(),
            BuildingId::new(),
            3,
            Money::from_cents(250),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.total_cost, Money::from_cents(750));
    }

    #[test]
    fn consume_rejects_zero() {
        let err = WorkOrderInventory::consume(
            key(),
            BuildingId::new(),
            0,
            Money::from_cents(250),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn add_quantity_reprices_whole_line_and_restamps_date() {
        let first = Utc::now() - chrono::Duration::hours(1);
        let mut line =
            WorkOrderInventory::consume(key(), BuildingId::new(), 2, Money::from_cents(100), first)
                .unwrap();

        let later = Utc::now();
        line.add_quantity(3, Money::from_cents(120), later).unwrap();

        assert_eq!(line.quantity, 5);
        assert_eq!(line.total_cost, Money::from_cents(600));
        assert_eq!(line.output_date, later);
    }

    #[test]
    fn failed_add_leaves_line_unchanged() {
        let mut line = WorkOrderInventory::consume(
            key(),
            BuildingId::new(),
            1,
            Money::from_cents(u64::MAX),
            Utc::now(),
        )
        .unwrap();
        let before = line.clone();

        assert!(line.add_quantity(1, Money::from_cents(u64::MAX), Utc::now()).is_err());
        assert_eq!(line, before);
    }

    #[test]
    fn total_of_no_lines_is_zero() {
        assert_eq!(total_cost_of(&[]).unwrap(), Money::ZERO);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the work order total is the sum of the line totals, whatever the split.
            #[test]
            fn total_is_sum_of_lines(
                lines in proptest::collection::vec((1u32..1_000, 0u64..100_000), 0..20)
            ) {
                let building_id = BuildingId::new();
                let work_order_id = WorkOrderId::new();
                let now = Utc::now();

                let built: Vec<WorkOrderInventory> = lines
                    .iter()
                    .map(|(qty, cents)| {
                        WorkOrderInventory::consume(
                            WorkOrderInventoryKey::new(work_order_id, InventoryId::new()),
                            building_id,
                            *qty,
                            Money::from_cents(*cents),
                            now,
                        )
                        .unwrap()
                    })
                    .collect();

                let expected: u64 = lines.iter().map(|(qty, cents)| u64::from(*qty) * cents).sum();
                prop_assert_eq!(total_cost_of(&built).unwrap(), Money::from_cents(expected));
            }
        }
    }
}
