use std::collections::HashMap;
use std::sync::RwLock;

use stockroom_catalog::{Category, Product};
use stockroom_core::{CategoryId, ProductId, UnitId};
use stockroom_inventory::StockTransaction;
use stockroom_units::Unit;

use super::record_store::{Mutation, RecordStore, StoreError, WriteBatch};

#[derive(Debug, Clone, Default)]
struct Tables {
    units: HashMap<UnitId, Unit>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    /// Per-product ledgers in append order.
    ledgers: HashMap<ProductId, Vec<StockTransaction>>,
}

impl Tables {
    fn apply(&mut self, mutation: Mutation) -> Result<(), StoreError> {
        match mutation {
            Mutation::PutUnit(unit) => {
                self.units.insert(unit.id_typed(), unit);
            }
            Mutation::DeleteUnit(id) => {
                self.units
                    .remove(&id)
                    .ok_or_else(|| StoreError::MissingRecord(format!("unit {id}")))?;
            }
            Mutation::PutCategory(category) => {
                self.categories.insert(category.id_typed(), category);
            }
            Mutation::DeleteCategory(id) => {
                self.categories
                    .remove(&id)
                    .ok_or_else(|| StoreError::MissingRecord(format!("category {id}")))?;
            }
            Mutation::PutProduct(product) => {
                self.products.insert(product.id_typed(), product);
            }
            Mutation::AppendTransaction(tx) => {
                let ledger = self.ledgers.entry(tx.product_id).or_default();
                if ledger.iter().any(|e| e.id == tx.id) {
                    return Err(StoreError::DuplicateKey(format!("transaction {}", tx.id)));
                }
                ledger.push(tx);
            }
            Mutation::DeleteTransactions { product_id, ids } => {
                let ledger = self.ledgers.entry(product_id).or_default();
                let before = ledger.len();
                ledger.retain(|e| !ids.contains(&e.id));
                if before - ledger.len() != ids.len() {
                    return Err(StoreError::MissingRecord(format!(
                        "{} of {} transactions for product {product_id}",
                        ids.len() - (before - ledger.len()),
                        ids.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// In-memory record store.
///
/// Intended for tests/dev and embedding. Not optimized for performance: a
/// commit stages the batch on a copy of the tables and swaps it in only when
/// every mutation applied.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&tables))
    }
}

impl RecordStore for InMemoryStore {
    fn unit(&self, id: UnitId) -> Result<Option<Unit>, StoreError> {
        self.read(|t| t.units.get(&id).cloned())
    }

    fn units(&self) -> Result<Vec<Unit>, StoreError> {
        self.read(|t| t.units.values().cloned().collect())
    }

    fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        self.read(|t| t.categories.get(&id).cloned())
    }

    fn categories_where(&self, predicate: &dyn Fn(&Category) -> bool) -> Result<Vec<Category>, StoreError> {
        self.read(|t| t.categories.values().filter(|c| predicate(c)).cloned().collect())
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.read(|t| t.products.get(&id).cloned())
    }

    fn products_where(&self, predicate: &dyn Fn(&Product) -> bool) -> Result<Vec<Product>, StoreError> {
        self.read(|t| t.products.values().filter(|p| predicate(p)).cloned().collect())
    }

    fn transactions(&self, product_id: ProductId) -> Result<Vec<StockTransaction>, StoreError> {
        self.read(|t| t.ledgers.get(&product_id).cloned().unwrap_or_default())
    }

    fn transactions_where(
        &self,
        predicate: &dyn Fn(&StockTransaction) -> bool,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        self.read(|t| {
            t.ledgers
                .values()
                .flatten()
                .filter(|e| predicate(e))
                .cloned()
                .collect()
        })
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut staged = tables.clone();
        for mutation in batch.into_mutations() {
            staged.apply(mutation)?;
        }
        *tables = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use stockroom_core::TransactionId;
    use stockroom_inventory::{Direction, TransactionType};
    use stockroom_units::UnitLimits;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn tx(product_id: ProductId, unit_id: UnitId, qty: i64) -> StockTransaction {
        StockTransaction {
            id: TransactionId::new(),
            product_id,
            transaction_type: TransactionType::Add,
            direction: Direction::Increase,
            quantity_in_base_unit: qty,
            original_quantity: qty,
            original_conversion_factor: 1,
            unit_id,
            timestamp: at(),
            notes: None,
        }
    }

    #[test]
    fn ledger_keeps_append_order() {
        let store = InMemoryStore::new();
        let p = ProductId::new();
        let u = UnitId::new();
        let first = tx(p, u, 1);
        let second = tx(p, u, 2);

        let mut batch = WriteBatch::new();
        batch.append_transaction(first.clone()).append_transaction(second.clone());
        store.commit(batch).unwrap();

        assert_eq!(store.transactions(p).unwrap(), vec![first, second]);
        assert!(store.transactions(ProductId::new()).unwrap().is_empty());
    }

    #[test]
    fn failed_batch_leaves_no_trace() {
        let store = InMemoryStore::new();
        let pcs = Unit::base(UnitId::new(), "pcs", &UnitLimits::default(), at()).unwrap();

        let mut batch = WriteBatch::new();
        batch.put_unit(pcs.clone()).delete_unit(UnitId::new());
        let err = store.commit(batch).unwrap_err();

        assert!(matches!(err, StoreError::MissingRecord(_)));
        assert_eq!(store.unit(pcs.id_typed()).unwrap(), None);
    }

    #[test]
    fn duplicate_transaction_id_is_rejected() {
        let store = InMemoryStore::new();
        let entry = tx(ProductId::new(), UnitId::new(), 5);

        let mut batch = WriteBatch::new();
        batch.append_transaction(entry.clone());
        store.commit(batch).unwrap();

        let mut again = WriteBatch::new();
        again.append_transaction(entry);
        assert!(matches!(store.commit(again), Err(StoreError::DuplicateKey(_))));
    }

    #[test]
    fn delete_transactions_requires_every_id() {
        let store = InMemoryStore::new();
        let p = ProductId::new();
        let entry = tx(p, UnitId::new(), 5);

        let mut batch = WriteBatch::new();
        batch.append_transaction(entry.clone());
        store.commit(batch).unwrap();

        let mut purge = WriteBatch::new();
        purge.delete_transactions(p, vec![entry.id, TransactionId::new()]);
        assert!(store.commit(purge).is_err());
        assert_eq!(store.transactions(p).unwrap().len(), 1);

        let mut purge = WriteBatch::new();
        purge.delete_transactions(p, vec![entry.id]);
        store.commit(purge).unwrap();
        assert!(store.transactions(p).unwrap().is_empty());
    }
}
