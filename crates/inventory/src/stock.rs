use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, DomainError, ProductId, TransactionId};
use stockroom_units::Unit;

use crate::ledger::{Direction, StockTransaction, TransactionType};

/// Aggregate root: the stock position of one product.
///
/// Rehydrated from the product's ledger before every command; its only state is
/// the running base-unit total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStock {
    product_id: ProductId,
    on_hand: i64,
    ceiling: i64,
    version: u64,
    last_movement_at: Option<DateTime<Utc>>,
}

impl ProductStock {
    /// Create an empty position for rehydration.
    pub fn empty(product_id: ProductId) -> Self {
        Self {
            product_id,
            on_hand: 0,
            ceiling: i64::MAX,
            version: 0,
            last_movement_at: None,
        }
    }

    /// Cap the base-unit stock a command may produce.
    pub fn with_ceiling(mut self, ceiling: i64) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Current stock in base units.
    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }
}

impl AggregateRoot for ProductStock {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Fields every stock command carries.
///
/// `unit` is the resolved unit at call time; its factor is snapshotted into
/// the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit: Unit,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddStock (quantity > 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStock(pub StockMovement);

/// Command: RemoveStock (quantity > 0, never below zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveStock(pub StockMovement);

/// Command: AdjustStock (quantity >= 0 is the counted target).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock(pub StockMovement);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockCommand {
    Add(AddStock),
    Remove(RemoveStock),
    Adjust(AdjustStock),
}

impl StockCommand {
    pub fn movement(&self) -> &StockMovement {
        match self {
            StockCommand::Add(AddStock(m))
            | StockCommand::Remove(RemoveStock(m))
            | StockCommand::Adjust(AdjustStock(m)) => m,
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            StockCommand::Add(_) => TransactionType::Add,
            StockCommand::Remove(_) => TransactionType::Remove,
            StockCommand::Adjust(_) => TransactionType::Adjust,
        }
    }
}

impl Aggregate for ProductStock {
    type Command = StockCommand;
    type Event = StockTransaction;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.on_hand += event.signed_delta();
        self.last_movement_at = Some(event.timestamp);

        // Deterministic version tracking: +1 per applied entry.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        self.ensure_product_id(command.movement().product_id)?;
        let entry = match command {
            StockCommand::Add(AddStock(m)) => self.handle_add(m)?,
            StockCommand::Remove(RemoveStock(m)) => self.handle_remove(m)?,
            StockCommand::Adjust(AdjustStock(m)) => self.handle_adjust(m)?,
        };
        Ok(vec![entry])
    }
}

impl ProductStock {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.product_id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn ensure_within_ceiling(&self, resulting: i64) -> Result<(), DomainError> {
        if resulting > self.ceiling {
            return Err(DomainError::invalid_quantity(format!(
                "resulting stock {resulting} exceeds maximum {}",
                self.ceiling
            )));
        }
        Ok(())
    }

    fn handle_add(&self, m: &StockMovement) -> Result<StockTransaction, DomainError> {
        if m.quantity <= 0 {
            return Err(DomainError::invalid_quantity(format!(
                "quantity to add must be greater than 0 (got {})",
                m.quantity
            )));
        }
        let base = m.unit.to_base(m.quantity)?;
        let resulting = self
            .on_hand
            .checked_add(base)
            .ok_or_else(|| DomainError::invalid_quantity("stock total overflows"))?;
        self.ensure_within_ceiling(resulting)?;

        Ok(entry(m, TransactionType::Add, Direction::Increase, base))
    }

    fn handle_remove(&self, m: &StockMovement) -> Result<StockTransaction, DomainError> {
        if m.quantity <= 0 {
            return Err(DomainError::invalid_quantity(format!(
                "quantity to remove must be greater than 0 (got {})",
                m.quantity
            )));
        }
        let base = m.unit.to_base(m.quantity)?;
        if base > self.on_hand {
            return Err(DomainError::InsufficientStock {
                requested: base,
                available: self.on_hand,
            });
        }

        Ok(entry(m, TransactionType::Remove, Direction::Decrease, base))
    }

    fn handle_adjust(&self, m: &StockMovement) -> Result<StockTransaction, DomainError> {
        if m.quantity < 0 {
            return Err(DomainError::invalid_quantity(format!(
                "counted quantity cannot be negative (got {})",
                m.quantity
            )));
        }
        let target = m.unit.to_base(m.quantity)?;
        self.ensure_within_ceiling(target)?;

        let delta = target - self.on_hand;
        let direction = if delta < 0 {
            Direction::Decrease
        } else {
            Direction::Increase
        };
        Ok(entry(m, TransactionType::Adjust, direction, delta.abs()))
    }
}

fn entry(
    m: &StockMovement,
    transaction_type: TransactionType,
    direction: Direction,
    quantity_in_base_unit: i64,
) -> StockTransaction {
    StockTransaction {
        id: m.transaction_id,
        product_id: m.product_id,
        transaction_type,
        direction,
        quantity_in_base_unit,
        original_quantity: m.quantity,
        original_conversion_factor: m.unit.conversion_factor().get(),
        unit_id: m.unit.id_typed(),
        timestamp: m.occurred_at,
        notes: m
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::UnitId;
    use stockroom_core::aggregate::{execute, rehydrate};
    use stockroom_units::UnitLimits;

    use crate::ledger::current_stock;

    fn test_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn pcs() -> Unit {
        Unit::base(UnitId::new(), "pcs", &UnitLimits::default(), test_time()).unwrap()
    }

    fn dozen() -> Unit {
        Unit::derived(UnitId::new(), "dozen", "pcs", 12, &UnitLimits::default(), test_time())
            .unwrap()
    }

    fn movement(product_id: ProductId, quantity: i64, unit: &Unit) -> StockMovement {
        StockMovement {
            transaction_id: TransactionId::new(),
            product_id,
            quantity,
            unit: unit.clone(),
            notes: None,
            occurred_at: test_time(),
        }
    }

    fn add(product_id: ProductId, quantity: i64, unit: &Unit) -> StockCommand {
        StockCommand::Add(AddStock(movement(product_id, quantity, unit)))
    }

    fn remove(product_id: ProductId, quantity: i64, unit: &Unit) -> StockCommand {
        StockCommand::Remove(RemoveStock(movement(product_id, quantity, unit)))
    }

    fn adjust(product_id: ProductId, quantity: i64, unit: &Unit) -> StockCommand {
        StockCommand::Adjust(AdjustStock(movement(product_id, quantity, unit)))
    }

    #[test]
    fn add_converts_to_base_and_snapshots_factor() {
        let p = ProductId::new();
        let dozen = dozen();
        let stock = ProductStock::empty(p);

        let events = stock.handle(&add(p, 2, &dozen)).unwrap();
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.transaction_type, TransactionType::Add);
        assert_eq!(e.quantity_in_base_unit, 24);
        assert_eq!(e.original_quantity, 2);
        assert_eq!(e.original_conversion_factor, 12);
        assert_eq!(e.unit_id, dozen.id_typed());
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let p = ProductId::new();
        let stock = ProductStock::empty(p);
        for qty in [0, -3] {
            assert!(matches!(
                stock.handle(&add(p, qty, &pcs())),
                Err(DomainError::InvalidQuantity(_))
            ));
        }
    }

    #[test]
    fn remove_more_than_on_hand_fails_without_mutation() {
        let p = ProductId::new();
        let pcs = pcs();
        let mut stock = ProductStock::empty(p);
        execute(&mut stock, &add(p, 24, &pcs)).unwrap();
        let before = stock.clone();

        let err = stock.handle(&remove(p, 30, &pcs)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 30,
                available: 24
            }
        );
        assert_eq!(stock, before);
    }

    #[test]
    fn remove_in_derived_unit_checks_base_quantity() {
        let p = ProductId::new();
        let mut stock = ProductStock::empty(p);
        execute(&mut stock, &add(p, 20, &pcs())).unwrap();
        assert!(matches!(
            stock.handle(&remove(p, 2, &dozen())),
            Err(DomainError::InsufficientStock { requested: 24, available: 20 })
        ));
        execute(&mut stock, &remove(p, 1, &dozen())).unwrap();
        assert_eq!(stock.on_hand(), 8);
    }

    #[test]
    fn adjust_records_signed_delta_against_current_stock() {
        let p = ProductId::new();
        let pcs = pcs();
        let mut stock = ProductStock::empty(p);
        execute(&mut stock, &add(p, 10, &pcs)).unwrap();

        let down = execute(&mut stock, &adjust(p, 4, &pcs)).unwrap();
        assert_eq!(down[0].direction, Direction::Decrease);
        assert_eq!(down[0].quantity_in_base_unit, 6);
        assert_eq!(down[0].original_quantity, 4);
        assert_eq!(stock.on_hand(), 4);

        let up = execute(&mut stock, &adjust(p, 1, &dozen())).unwrap();
        assert_eq!(up[0].direction, Direction::Increase);
        assert_eq!(up[0].quantity_in_base_unit, 8);
        assert_eq!(stock.on_hand(), 12);

        let same = execute(&mut stock, &adjust(p, 12, &pcs)).unwrap();
        assert_eq!(same[0].quantity_in_base_unit, 0);
        assert_eq!(stock.on_hand(), 12);
    }

    #[test]
    fn adjust_rejects_negative_target() {
        let p = ProductId::new();
        assert!(matches!(
            ProductStock::empty(p).handle(&adjust(p, -1, &pcs())),
            Err(DomainError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn ceiling_bounds_add_and_adjust() {
        let p = ProductId::new();
        let stock = ProductStock::empty(p).with_ceiling(100);
        assert!(stock.handle(&add(p, 100, &pcs())).is_ok());
        assert!(matches!(
            stock.handle(&add(p, 9, &dozen())),
            Err(DomainError::InvalidQuantity(_))
        ));
        assert!(stock.handle(&adjust(p, 101, &pcs())).is_err());
    }

    #[test]
    fn notes_are_trimmed_and_blank_dropped() {
        let p = ProductId::new();
        let mut m = movement(p, 1, &pcs());
        m.notes = Some("  restock  ".to_string());
        let e = &ProductStock::empty(p)
            .handle(&StockCommand::Add(AddStock(m.clone())))
            .unwrap()[0];
        assert_eq!(e.notes.as_deref(), Some("restock"));

        m.notes = Some("   ".to_string());
        let e = &ProductStock::empty(p)
            .handle(&StockCommand::Add(AddStock(m)))
            .unwrap()[0];
        assert_eq!(e.notes, None);
    }

    #[test]
    fn rejects_command_for_other_product() {
        let stock = ProductStock::empty(ProductId::new());
        assert!(matches!(
            stock.handle(&add(ProductId::new(), 1, &pcs())),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn rehydration_matches_ledger_reduction() {
        let p = ProductId::new();
        let pcs = pcs();
        let mut live = ProductStock::empty(p);
        let mut ledger = Vec::new();
        for cmd in [add(p, 5, &pcs), add(p, 1, &dozen()), remove(p, 7, &pcs), adjust(p, 3, &pcs)] {
            ledger.extend(execute(&mut live, &cmd).unwrap());
        }

        let replayed = rehydrate(ProductStock::empty(p), &ledger);
        assert_eq!(replayed.on_hand(), live.on_hand());
        assert_eq!(replayed.version(), 4);
        assert_eq!(current_stock(&ledger), 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Add(i64, bool),
            Remove(i64, bool),
            Adjust(i64, bool),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (-5i64..50, any::<bool>()).prop_map(|(q, d)| Op::Add(q, d)),
                (-5i64..50, any::<bool>()).prop_map(|(q, d)| Op::Remove(q, d)),
                (-5i64..50, any::<bool>()).prop_map(|(q, d)| Op::Adjust(q, d)),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: no sequence of accepted commands drives stock below zero,
            /// and the running total always equals the ledger reduction.
            #[test]
            fn stock_never_goes_negative(ops in proptest::collection::vec(op(), 0..60)) {
                let p = ProductId::new();
                let pcs = pcs();
                let dozen = dozen();
                let mut stock = ProductStock::empty(p);
                let mut ledger = Vec::new();

                for op in ops {
                    let cmd = match op {
                        Op::Add(q, d) => add(p, q, if d { &dozen } else { &pcs }),
                        Op::Remove(q, d) => remove(p, q, if d { &dozen } else { &pcs }),
                        Op::Adjust(q, d) => adjust(p, q, if d { &dozen } else { &pcs }),
                    };
                    if let Ok(events) = execute(&mut stock, &cmd) {
                        ledger.extend(events);
                    }
                    prop_assert!(stock.on_hand() >= 0);
                    prop_assert_eq!(current_stock(&ledger), stock.on_hand());
                    prop_assert!(ledger.iter().all(|e| e.quantity_in_base_unit >= 0));
                }
            }
        }
    }
}
