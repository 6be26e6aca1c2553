use serde::{Deserialize, Serialize};

use maintops_core::{BuildingId, DomainError, DomainResult, EmployeeId, Entity, InventoryId, Money};

/// A stock-keeping record for one spare part.
///
/// `quantity` is what is on hand. It is only changed through [`Inventory::reserve`]
/// and [`Inventory::release`], which keep it non-negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: InventoryId,
    pub building_id: BuildingId,
    pub name: String,
    pub quantity: u32,
    pub minimum_stock: u32,
    pub unit_cost: Money,
    pub employee_id: Option<EmployeeId>,
}

impl Inventory {
    pub fn new(
        id: InventoryId,
        building_id: BuildingId,
        name: impl Into<String>,
        quantity: u32,
        minimum_stock: u32,
        unit_cost: Money,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("inventory name cannot be empty"));
        }
        Ok(Self {
            id,
            building_id,
            name,
            quantity,
            minimum_stock,
            unit_cost,
            employee_id: None,
        })
    }

    /// Take `quantity` units out of stock.
    ///
    /// Fails without touching the record when the request is zero or larger
    /// than what is on hand.
    pub fn reserve(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if quantity > self.quantity {
            return Err(DomainError::insufficient_stock(quantity, self.quantity));
        }
        self.quantity -= quantity;
        Ok(())
    }

    /// Put `quantity` units back into stock.
    pub fn release(&mut self, quantity: u32) -> DomainResult<()> {
        if quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("stock quantity overflow"))?;
        Ok(())
    }

    /// Low stock: at or under the configured minimum.
    pub fn is_below_minimum(&self) -> bool {
        self.quantity <= self.minimum_stock
    }
}

impl Entity for Inventory {
    type Id = InventoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn building_id(&self) -> BuildingId {
        self.building_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bolts(quantity: u32) -> Inventory {
        Inventory::new(
            InventoryId::new(),
            BuildingId::new(),
            "M8 bolt",
            quantity,
            2,
            Money::from_cents(150),
        )
        .unwrap()
    }

    #[test]
    fn reserve_decrements_stock() {
        let mut item = bolts(10);
        item.reserve(3).unwrap();
        assert_eq!(item.quantity, 7);
    }

    #[test]
    fn reserve_can_drain_to_zero() {
        let mut item = bolts(4);
        item.reserve(4).unwrap();
        assert_eq!(item.quantity, 0);
    }

    #[test]
    fn oversell_is_rejected_and_leaves_stock() {
        let mut item = bolts(5);
        let err = item.reserve(6).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 6,
                available: 5
            }
        );
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn zero_quantities_are_rejected() {
        let mut item = bolts(5);
        assert!(matches!(item.reserve(0), Err(DomainError::Validation(_))));
        assert!(matches!(item.release(0), Err(DomainError::Validation(_))));
        assert_eq!(item.quantity, 5);
    }

    #[test]
    fn release_restores_stock() {
        let mut item = bolts(5);
        item.reserve(5).unwrap();
        item.release(2).unwrap();
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn release_overflow_is_rejected() {
        let mut item = bolts(u32::MAX);
        assert!(item.release(1).is_err());
        assert_eq!(item.quantity, u32::MAX);
    }

    #[test]
    fn low_stock_includes_the_minimum() {
        let mut item = bolts(3);
        assert!(!item.is_below_minimum());
        item.reserve(1).unwrap();
        assert!(item.is_below_minimum());
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = Inventory::new(
            InventoryId::new(),
            BuildingId::new(),
            "  ",
            1,
            0,
            Money::ZERO,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a sequence of reservations never takes more than was on hand.
            #[test]
            fn reservations_never_oversell(
                start in 0u32..1_000,
                requests in proptest::collection::vec(0u32..200, 0..40)
            ) {
                let mut item = bolts(start);
                let mut granted: u64 = 0;

                for qty in requests {
                    let before = item.quantity;
                    match item.reserve(qty) {
                        Ok(()) => {
                            granted += u64::from(qty);
                            prop_assert_eq!(item.quantity, before - qty);
                        }
                        Err(_) => prop_assert_eq!(item.quantity, before),
                    }
                }

                prop_assert_eq!(u64::from(item.quantity) + granted, u64::from(start));
            }

            /// Property: release undoes reserve.
            #[test]
            fn release_undoes_reserve(start in 1u32..10_000, take in 1u32..10_000) {
                prop_assume!(take <= start);
                let mut item = bolts(start);
                item.reserve(take).unwrap();
                item.release(take).unwrap();
                prop_assert_eq!(item.quantity, start);
            }
        }
    }
}
