use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use stockroom_catalog::Product;
use stockroom_core::aggregate::{execute, rehydrate};
use stockroom_core::{DomainError, ProductId, UnitId};
use stockroom_inventory::{
    AddStock, AdjustStock, ProductStock, RemoveStock, StockCommand, StockMovement, StockTransaction,
    TransactionType, UnitStockSummary, carried_balance, current_stock, summarize_by_unit,
};
use stockroom_units::{Unit, UnitRegistry};

use crate::error::ServiceResult;
use crate::services::{ServiceEnv, load_registry, page, query};
use crate::store::{RecordStore, WriteBatch};
use crate::writer::{CommandHandle, WriteQueue};

/// Outcome of a retention purge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub cutoff: Option<DateTime<Utc>>,
    /// Products whose ledger was compacted.
    pub products: usize,
    /// Entries removed, not counting the carried balances written back.
    pub purged_entries: usize,
}

/// Stock movements and ledger queries.
///
/// Every movement is decided by the [`ProductStock`] aggregate rehydrated from
/// the product's full ledger, on the writer thread, so the read-then-append
/// sequence is never interleaved with another write.
pub struct StockService<S> {
    store: Arc<S>,
    env: ServiceEnv,
    writer: WriteQueue<S>,
}

impl<S> Clone for StockService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            env: self.env.clone(),
            writer: self.writer.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MovementKind {
    Add,
    Remove,
    Adjust,
}

impl<S: RecordStore + 'static> StockService<S> {
    pub fn new(store: Arc<S>, env: ServiceEnv, writer: WriteQueue<S>) -> Self {
        Self { store, env, writer }
    }

    /// Receive `quantity` (> 0) of `unit_id` into stock.
    pub fn add_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        unit_id: UnitId,
        notes: Option<String>,
    ) -> CommandHandle<StockTransaction> {
        self.submit_movement("add_stock", MovementKind::Add, product_id, quantity, unit_id, notes)
    }

    /// Take `quantity` (> 0) of `unit_id` out of stock; never below zero.
    pub fn remove_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        unit_id: UnitId,
        notes: Option<String>,
    ) -> CommandHandle<StockTransaction> {
        self.submit_movement("remove_stock", MovementKind::Remove, product_id, quantity, unit_id, notes)
    }

    /// Record a physical count of `quantity` (>= 0) in `unit_id`.
    ///
    /// The entry stores the difference to the current stock at write time.
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        unit_id: UnitId,
        notes: Option<String>,
    ) -> CommandHandle<StockTransaction> {
        self.submit_movement("adjust_stock", MovementKind::Adjust, product_id, quantity, unit_id, notes)
    }

    fn submit_movement(
        &self,
        operation: &'static str,
        kind: MovementKind,
        product_id: ProductId,
        quantity: i64,
        unit_id: UnitId,
        notes: Option<String>,
    ) -> CommandHandle<StockTransaction> {
        let env = self.env.clone();
        self.writer.submit(operation, move |store| {
            let product = require_product(store, product_id)?;
            let registry = load_registry(store)?;
            let unit = movement_unit(&registry, &product, unit_id)?;

            let ledger = store.transactions(product_id)?;
            let mut stock = rehydrate(
                ProductStock::empty(product_id).with_ceiling(env.config.max_stock_quantity),
                &ledger,
            );

            let movement = StockMovement {
                transaction_id: env.transaction_id(),
                product_id,
                quantity,
                unit,
                notes,
                occurred_at: env.now(),
            };
            let command = match kind {
                MovementKind::Add => StockCommand::Add(AddStock(movement)),
                MovementKind::Remove => StockCommand::Remove(RemoveStock(movement)),
                MovementKind::Adjust => StockCommand::Adjust(AdjustStock(movement)),
            };

            let mut entries = execute(&mut stock, &command)?;
            let entry = entries
                .pop()
                .ok_or_else(|| DomainError::invariant("stock command produced no ledger entry"))?;

            let mut batch = WriteBatch::new();
            batch.append_transaction(entry.clone());
            store.commit(batch)?;

            info!(
                operation,
                product_id = %product_id,
                unit_id = %unit_id,
                quantity,
                delta = entry.signed_delta(),
                on_hand = stock.on_hand(),
                "stock movement recorded"
            );
            Ok(entry)
        })
    }

    /// Remove entries older than `cutoff`, leaving one carried-balance ADJUST
    /// per product so current stock is unchanged.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> CommandHandle<PurgeReport> {
        let env = self.env.clone();
        self.writer.submit("purge_transactions", move |store| {
            let old = store.transactions_where(&|e: &StockTransaction| e.timestamp < cutoff)?;
            let mut by_product: BTreeMap<ProductId, Vec<StockTransaction>> = BTreeMap::new();
            for entry in old {
                by_product.entry(entry.product_id).or_default().push(entry);
            }

            let registry = load_registry(store)?;
            let mut batch = WriteBatch::new();
            let mut report = PurgeReport {
                cutoff: Some(cutoff),
                ..PurgeReport::default()
            };

            for (product_id, purged) in by_product {
                let base_unit = product_base_unit(store, &registry, product_id)?;
                let carried = carried_balance(env.transaction_id(), product_id, &purged, &base_unit, cutoff);

                report.products += 1;
                report.purged_entries += purged.len();
                batch.delete_transactions(product_id, purged.iter().map(|e| e.id).collect());
                if let Some(carried) = carried {
                    batch.append_transaction(carried);
                }
            }

            store.commit(batch)?;
            info!(
                cutoff = %cutoff,
                products = report.products,
                purged = report.purged_entries,
                "ledger purged"
            );
            Ok(report)
        })
    }

    /// Current stock in base units.
    pub fn get_stock(&self, product_id: ProductId) -> ServiceResult<i64> {
        query("get_stock", || {
            require_product(&*self.store, product_id)?;
            Ok(current_stock(&self.store.transactions(product_id)?))
        })
    }

    /// Current stock expressed in `unit_id`, truncated toward zero.
    pub fn get_stock_in_unit(&self, product_id: ProductId, unit_id: UnitId) -> ServiceResult<i64> {
        query("get_stock_in_unit", || {
            require_product(&*self.store, product_id)?;
            let registry = load_registry(&*self.store)?;
            let base = current_stock(&self.store.transactions(product_id)?);
            Ok(registry.convert_from_base(base, &unit_id)?)
        })
    }

    /// One page of a product's ledger, newest first.
    pub fn list_transactions(
        &self,
        product_id: ProductId,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Vec<StockTransaction>> {
        query("list_transactions", || {
            page(self.newest_first(product_id)?, limit, offset)
        })
    }

    /// The latest entries across every product.
    pub fn recent_transactions(&self, limit: usize) -> ServiceResult<Vec<StockTransaction>> {
        query("recent_transactions", || {
            let mut all = self.store.transactions_where(&|_: &StockTransaction| true)?;
            all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
            page(all, limit, 0)
        })
    }

    /// Entries across every product with `start <= timestamp <= end`,
    /// newest first.
    pub fn transactions_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ServiceResult<Vec<StockTransaction>> {
        if start > end {
            return Err(
                DomainError::validation(format!("time range starts after it ends ({start} > {end})")).into(),
            );
        }
        query("transactions_between", || {
            let mut entries = self
                .store
                .transactions_where(&|e: &StockTransaction| e.timestamp >= start && e.timestamp <= end)?;
            entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
            Ok(entries)
        })
    }

    pub fn transactions_by_type(
        &self,
        product_id: ProductId,
        transaction_type: TransactionType,
    ) -> ServiceResult<Vec<StockTransaction>> {
        query("transactions_by_type", || {
            let mut entries = self.newest_first(product_id)?;
            entries.retain(|e| e.transaction_type == transaction_type);
            Ok(entries)
        })
    }

    pub fn last_transaction(&self, product_id: ProductId) -> ServiceResult<Option<StockTransaction>> {
        query("last_transaction", || Ok(self.newest_first(product_id)?.into_iter().next()))
    }

    pub fn transaction_count(&self, product_id: ProductId) -> ServiceResult<usize> {
        query("transaction_count", || {
            require_product(&*self.store, product_id)?;
            Ok(self.store.transactions(product_id)?.len())
        })
    }

    /// Net base quantity per unit the operator used.
    pub fn stock_summary_by_unit(&self, product_id: ProductId) -> ServiceResult<Vec<UnitStockSummary>> {
        query("stock_summary_by_unit", || {
            require_product(&*self.store, product_id)?;
            Ok(summarize_by_unit(&self.store.transactions(product_id)?))
        })
    }

    /// Ordered by timestamp, latest first; equal timestamps keep reverse
    /// append order.
    fn newest_first(&self, product_id: ProductId) -> ServiceResult<Vec<StockTransaction>> {
        require_product(&*self.store, product_id)?;
        let mut entries = self.store.transactions(product_id)?;
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        debug!(product_id = %product_id, entries = entries.len(), "ledger loaded");
        Ok(entries)
    }
}

fn require_product<S: RecordStore + ?Sized>(store: &S, product_id: ProductId) -> ServiceResult<Product> {
    Ok(store
        .product(product_id)?
        .ok_or_else(|| DomainError::ProductNotFound(product_id.to_string()))?)
}

/// Resolve the unit of a movement; it must share the product's base unit.
fn movement_unit(registry: &UnitRegistry, product: &Product, unit_id: UnitId) -> ServiceResult<Unit> {
    let unit = registry.resolve(&unit_id)?;
    let product_unit = registry.resolve(&product.unit_id())?;
    if !unit.is_compatible_with(product_unit) {
        return Err(DomainError::IncompatibleUnits(format!(
            "'{}' is counted in {}, not {}",
            product.name(),
            product_unit.base_unit_symbol(),
            unit.base_unit_symbol()
        ))
        .into());
    }
    Ok(unit.clone())
}

fn product_base_unit<S: RecordStore + ?Sized>(
    store: &S,
    registry: &UnitRegistry,
    product_id: ProductId,
) -> ServiceResult<Unit> {
    let product = require_product(store, product_id)?;
    let symbol = registry.resolve(&product.unit_id())?.base_unit_symbol().to_string();
    registry
        .base_unit_for(&symbol)
        .cloned()
        .ok_or_else(|| DomainError::UnitNotFound(format!("no base unit '{symbol}'")).into())
}
