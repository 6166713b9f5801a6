//! Composition root.

use std::sync::Arc;

use tracing::info;

use stockroom_core::{Clock, DomainError, IdGenerator, SystemClock, UuidV7Generator};

use crate::config::EngineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::services::{CategoryService, ProductService, ServiceEnv, StockService, UnitService};
use crate::store::{InMemoryStore, RecordStore};
use crate::writer::WriteQueue;

/// One store, one writer thread, and the services over them.
///
/// Dropping the engine (and every service clone taken from it) stops the
/// writer thread once its queue drains.
pub struct Engine<S> {
    store: Arc<S>,
    config: Arc<EngineConfig>,
    units: UnitService<S>,
    stock: StockService<S>,
    categories: CategoryService<S>,
    products: ProductService<S>,
}

impl<S: RecordStore + 'static> Engine<S> {
    /// Build with the system clock and UUIDv7 ids.
    pub fn new(store: Arc<S>, config: EngineConfig) -> ServiceResult<Self> {
        Self::with_runtime(store, config, Arc::new(SystemClock), Arc::new(UuidV7Generator))
    }

    pub fn with_runtime(
        store: Arc<S>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> ServiceResult<Self> {
        config
            .validate()
            .map_err(|e| DomainError::validation(format!("engine config: {e}")))?;

        let config = Arc::new(config);
        let writer = WriteQueue::spawn(store.clone(), config.writer_thread_name.clone())
            .map_err(|e| ServiceError::store("start_engine", e))?;
        let env = ServiceEnv {
            clock,
            ids,
            config: config.clone(),
        };

        info!(
            writer = %writer.name(),
            max_category_depth = config.max_category_depth,
            "engine started"
        );

        Ok(Self {
            units: UnitService::new(store.clone(), env.clone(), writer.clone()),
            stock: StockService::new(store.clone(), env.clone(), writer.clone()),
            categories: CategoryService::new(store.clone(), env.clone(), writer.clone()),
            products: ProductService::new(store.clone(), env, writer),
            store,
            config,
        })
    }

    pub fn units(&self) -> &UnitService<S> {
        &self.units
    }

    pub fn stock(&self) -> &StockService<S> {
        &self.stock
    }

    pub fn categories(&self) -> &CategoryService<S> {
        &self.categories
    }

    pub fn products(&self) -> &ProductService<S> {
        &self.products
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl Engine<InMemoryStore> {
    /// An engine over a fresh [`InMemoryStore`].
    pub fn in_memory(config: EngineConfig) -> ServiceResult<Self> {
        Self::new(Arc::new(InMemoryStore::new()), config)
    }
}
