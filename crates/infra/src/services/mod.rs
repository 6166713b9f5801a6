//! Command and query layer.
//!
//! Each service validates input, loads what it needs from the store, asks the
//! pure domain crates to decide, and commits the outcome as one batch. Every
//! mutating call goes through the shared [`WriteQueue`]; queries read the
//! store directly.

pub mod categories;
pub mod products;
pub mod stock;
pub mod units;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use stockroom_core::{CategoryId, Clock, DomainError, IdGenerator, ProductId, TransactionId, UnitId};
use stockroom_units::UnitRegistry;

use crate::config::EngineConfig;
use crate::error::ServiceResult;
use crate::store::RecordStore;

pub use categories::{CategoryHit, CategoryService};
pub use products::ProductService;
pub use stock::{PurgeReport, StockService};
pub use units::UnitService;

/// Clock, id source and limits shared by every service.
#[derive(Clone)]
pub struct ServiceEnv {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub config: Arc<EngineConfig>,
}

impl std::fmt::Debug for ServiceEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceEnv").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ServiceEnv {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn unit_id(&self) -> UnitId {
        UnitId::from_uuid(self.ids.new_id())
    }

    pub fn category_id(&self) -> CategoryId {
        CategoryId::from_uuid(self.ids.new_id())
    }

    pub fn product_id(&self) -> ProductId {
        ProductId::from_uuid(self.ids.new_id())
    }

    pub fn transaction_id(&self) -> TransactionId {
        TransactionId::from_uuid(self.ids.new_id())
    }
}

/// Snapshot every unit into a registry.
pub(crate) fn load_registry<S: RecordStore + ?Sized>(store: &S) -> ServiceResult<UnitRegistry> {
    Ok(UnitRegistry::new(store.units()?))
}

/// Run a read and name it in any store failure.
pub(crate) fn query<T>(operation: &'static str, read: impl FnOnce() -> ServiceResult<T>) -> ServiceResult<T> {
    read().map_err(|e| e.during(operation))
}

/// Slice one page out of an already ordered list.
pub(crate) fn page<T>(items: Vec<T>, limit: usize, offset: usize) -> ServiceResult<Vec<T>> {
    if limit == 0 {
        return Err(DomainError::validation("limit must be greater than 0").into());
    }
    Ok(items.into_iter().skip(offset).take(limit).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_skips_then_takes() {
        let items: Vec<i32> = (0..10).collect();
        assert_eq!(page(items.clone(), 3, 4).unwrap(), vec![4, 5, 6]);
        assert!(page(items.clone(), 3, 20).unwrap().is_empty());
        assert!(page(items, 0, 0).is_err());
    }
}
