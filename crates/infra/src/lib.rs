//! Infrastructure layer: record store, single-writer queue, configuration,
//! and the command/query services the UI layer calls.

pub mod config;
pub mod engine;
pub mod error;
pub mod services;
pub mod store;
pub mod writer;


pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ServiceError, ServiceResult};
pub use services::{
    CategoryHit, CategoryService, ProductService, PurgeReport, ServiceEnv, StockService, UnitService,
};
pub use store::{InMemoryStore, Mutation, RecordStore, StoreError, WriteBatch};
pub use writer::{CommandHandle, WriteQueue};
