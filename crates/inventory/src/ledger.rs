//! Ledger entries and the reductions derived from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Entity, ProductId, TransactionId, UnitId};
use stockroom_units::Unit;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Add,
    Remove,
    Adjust,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Add => "ADD",
            TransactionType::Remove => "REMOVE",
            TransactionType::Adjust => "ADJUST",
        }
    }
}

/// Sign of a ledger entry. ADD is always `Increase`, REMOVE always `Decrease`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

/// One immutable ledger entry.
///
/// `quantity_in_base_unit` is a non-negative magnitude; the sign lives in
/// `direction`. An ADJUST stores the delta between the counted target and the
/// stock at write time, so the ledger reduces by plain summation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub transaction_type: TransactionType,
    pub direction: Direction,
    pub quantity_in_base_unit: i64,
    /// Quantity as the operator entered it (the counted target for ADJUST).
    pub original_quantity: i64,
    /// Factor of `unit_id` at write time.
    pub original_conversion_factor: i64,
    pub unit_id: UnitId,
    pub timestamp: DateTime<Utc>,
    pub notes: Option<String>,
}

impl StockTransaction {
    pub fn signed_delta(&self) -> i64 {
        match self.direction {
            Direction::Increase => self.quantity_in_base_unit,
            Direction::Decrease => -self.quantity_in_base_unit,
        }
    }

    /// The entry's effect in the unit the operator used, via the snapshot factor.
    ///
    /// Later edits to the unit's factor never change what this returns.
    pub fn display_quantity(&self) -> i64 {
        self.signed_delta() / self.original_conversion_factor.max(1)
    }
}

impl Entity for StockTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Current stock in base units: the signed sum of every entry.
pub fn current_stock<'a>(entries: impl IntoIterator<Item = &'a StockTransaction>) -> i64 {
    entries.into_iter().map(StockTransaction::signed_delta).sum()
}

/// Net base quantity recorded through one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStockSummary {
    pub unit_id: UnitId,
    pub net_base_quantity: i64,
    pub entries: usize,
}

/// Group a product's entries by the unit the operator used.
pub fn summarize_by_unit<'a>(
    entries: impl IntoIterator<Item = &'a StockTransaction>,
) -> Vec<UnitStockSummary> {
    let mut by_unit: BTreeMap<UnitId, (i64, usize)> = BTreeMap::new();
    for e in entries {
        let slot = by_unit.entry(e.unit_id).or_insert((0, 0));
        slot.0 += e.signed_delta();
        slot.1 += 1;
    }
    by_unit
        .into_iter()
        .map(|(unit_id, (net_base_quantity, entries))| UnitStockSummary {
            unit_id,
            net_base_quantity,
            entries,
        })
        .collect()
}

/// The single ADJUST entry that replaces `purged` during a retention purge.
///
/// Expressed in `base_unit` so no factor can distort it. Returns `None` when
/// nothing was purged.
pub fn carried_balance(
    id: TransactionId,
    product_id: ProductId,
    purged: &[StockTransaction],
    base_unit: &Unit,
    cutoff: DateTime<Utc>,
) -> Option<StockTransaction> {
    if purged.is_empty() {
        return None;
    }
    let net = current_stock(purged);
    let direction = if net < 0 {
        Direction::Decrease
    } else {
        Direction::Increase
    };
    Some(StockTransaction {
        id,
        product_id,
        transaction_type: TransactionType::Adjust,
        direction,
        quantity_in_base_unit: net.abs(),
        original_quantity: net.abs(),
        original_conversion_factor: 1,
        unit_id: base_unit.id_typed(),
        timestamp: cutoff,
        notes: Some(format!("carried balance of {} purged entries", purged.len())),
    })
}
