//! `stockroom-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod validation;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use clock::{Clock, IdGenerator, ManualClock, SystemClock, UuidV7Generator};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{CategoryId, ProductId, TransactionId, UnitId};
pub use value_object::ValueObject;
