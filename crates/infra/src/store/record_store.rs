use std::sync::Arc;

use thiserror::Error;

use stockroom_catalog::{Category, Product};
use stockroom_core::{CategoryId, ProductId, TransactionId, UnitId};
use stockroom_inventory::StockTransaction;
use stockroom_units::Unit;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("record not found: {0}")]
    MissingRecord(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("writer stopped")]
    WriterStopped,
}

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutUnit(Unit),
    DeleteUnit(UnitId),
    PutCategory(Category),
    DeleteCategory(CategoryId),
    PutProduct(Product),
    AppendTransaction(StockTransaction),
    DeleteTransactions {
        product_id: ProductId,
        ids: Vec<TransactionId>,
    },
}

/// Writes that commit together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn put_unit(&mut self, unit: Unit) -> &mut Self {
        self.push(Mutation::PutUnit(unit))
    }

    pub fn delete_unit(&mut self, id: UnitId) -> &mut Self {
        self.push(Mutation::DeleteUnit(id))
    }

    pub fn put_category(&mut self, category: Category) -> &mut Self {
        self.push(Mutation::PutCategory(category))
    }

    pub fn delete_category(&mut self, id: CategoryId) -> &mut Self {
        self.push(Mutation::DeleteCategory(id))
    }

    pub fn put_product(&mut self, product: Product) -> &mut Self {
        self.push(Mutation::PutProduct(product))
    }

    pub fn append_transaction(&mut self, tx: StockTransaction) -> &mut Self {
        self.push(Mutation::AppendTransaction(tx))
    }

    pub fn delete_transactions(&mut self, product_id: ProductId, ids: Vec<TransactionId>) -> &mut Self {
        self.push(Mutation::DeleteTransactions { product_id, ids })
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

/// Durable keyed-record store behind the engine.
///
/// ## Read semantics
///
/// Reads reflect every committed batch. Ledger reads return a product's
/// entries in append order.
///
/// ## Write semantics
///
/// `commit()` applies a whole [`WriteBatch`] atomically: either every mutation
/// is visible afterwards or none is. Deleting a missing record and appending a
/// transaction id that already exists both fail the batch.
///
/// The engine routes every commit through a single writer, so implementations
/// only need to be safe for concurrent readers plus one writer.
pub trait RecordStore: Send + Sync {
    fn unit(&self, id: UnitId) -> Result<Option<Unit>, StoreError>;

    fn units(&self) -> Result<Vec<Unit>, StoreError>;

    fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    fn categories_where(&self, predicate: &dyn Fn(&Category) -> bool) -> Result<Vec<Category>, StoreError>;

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    fn products_where(&self, predicate: &dyn Fn(&Product) -> bool) -> Result<Vec<Product>, StoreError>;

    /// The ledger of one product, oldest first.
    fn transactions(&self, product_id: ProductId) -> Result<Vec<StockTransaction>, StoreError>;

    /// Matching entries across every ledger, in no particular order.
    fn transactions_where(
        &self,
        predicate: &dyn Fn(&StockTransaction) -> bool,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    fn unit(&self, id: UnitId) -> Result<Option<Unit>, StoreError> {
        (**self).unit(id)
    }

    fn units(&self) -> Result<Vec<Unit>, StoreError> {
        (**self).units()
    }

    fn category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        (**self).category(id)
    }

    fn categories_where(&self, predicate: &dyn Fn(&Category) -> bool) -> Result<Vec<Category>, StoreError> {
        (**self).categories_where(predicate)
    }

    fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id)
    }

    fn products_where(&self, predicate: &dyn Fn(&Product) -> bool) -> Result<Vec<Product>, StoreError> {
        (**self).products_where(predicate)
    }

    fn transactions(&self, product_id: ProductId) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).transactions(product_id)
    }

    fn transactions_where(
        &self,
        predicate: &dyn Fn(&StockTransaction) -> bool,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).transactions_where(predicate)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).commit(batch)
    }
}
