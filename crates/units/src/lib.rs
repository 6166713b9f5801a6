//! Measurement units and conversion to base units.
//!
//! All stock is stored in base units. A unit either *is* a base unit (factor 1)
//! or scales into one by a positive integer factor. This crate is pure domain
//! logic (no IO, no storage).

pub mod registry;
pub mod unit;

pub use registry::{UnitRegistry, seed_default_units};
pub use unit::{ConversionFactor, Unit, UnitLimits};
