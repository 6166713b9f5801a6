//! Inventory domain module (ledger-backed).
//!
//! This crate contains the stock ledger rules, implemented purely as
//! deterministic domain logic (no IO, no storage). Stock is always kept in
//! base units; see `stockroom-units` for conversion.

pub mod ledger;
pub mod stock;

pub use ledger::{
    Direction, StockTransaction, TransactionType, UnitStockSummary, carried_balance,
    current_stock, summarize_by_unit,
};
pub use stock::{AddStock, AdjustStock, ProductStock, RemoveStock, StockCommand, StockMovement};
