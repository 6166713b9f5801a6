//! Read-only view over a snapshot of units.
//!
//! The registry performs no IO. The command layer loads the current units from
//! the store, builds a registry, and asks it to resolve and convert.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use stockroom_core::{DomainError, DomainResult, UnitId};

use crate::unit::{Unit, UnitLimits};

#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: HashMap<UnitId, Unit>,
}

impl UnitRegistry {
    pub fn new(units: impl IntoIterator<Item = Unit>) -> Self {
        Self {
            units: units.into_iter().map(|u| (u.id_typed(), u)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn resolve(&self, id: &UnitId) -> DomainResult<&Unit> {
        self.units
            .get(id)
            .ok_or_else(|| DomainError::UnitNotFound(id.to_string()))
    }

    pub fn convert_to_base(&self, qty: i64, id: &UnitId) -> DomainResult<i64> {
        self.resolve(id)?.to_base(qty)
    }

    /// Integer division, truncating toward zero.
    pub fn convert_from_base(&self, base_qty: i64, id: &UnitId) -> DomainResult<i64> {
        Ok(self.resolve(id)?.from_base(base_qty))
    }

    /// False when either id is unknown.
    pub fn are_compatible(&self, a: &UnitId, b: &UnitId) -> bool {
        match (self.units.get(a), self.units.get(b)) {
            (Some(a), Some(b)) => a.is_compatible_with(b),
            _ => false,
        }
    }

    /// Convert between two compatible units through the base unit.
    pub fn convert_between(&self, qty: i64, from: &UnitId, to: &UnitId) -> DomainResult<i64> {
        let from_unit = self.resolve(from)?;
        let to_unit = self.resolve(to)?;
        if !from_unit.is_compatible_with(to_unit) {
            return Err(DomainError::IncompatibleUnits(format!(
                "'{}' is measured in {}, '{}' in {}",
                from_unit.name(),
                from_unit.base_unit_symbol(),
                to_unit.name(),
                to_unit.base_unit_symbol()
            )));
        }
        Ok(to_unit.from_base(from_unit.to_base(qty)?))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Unit> {
        self.units.values().find(|u| u.name() == name)
    }

    /// The base unit for `symbol`, if one is registered.
    pub fn base_unit_for(&self, symbol: &str) -> Option<&Unit> {
        self.units
            .values()
            .find(|u| u.is_base_unit() && u.base_unit_symbol() == symbol)
    }

    pub fn find_by_base_and_factor(&self, symbol: &str, factor: i64) -> Option<&Unit> {
        self.units
            .values()
            .find(|u| u.base_unit_symbol() == symbol && u.conversion_factor().get() == factor)
    }

    /// All units, base units first, then by name.
    pub fn list(&self) -> Vec<Unit> {
        let mut units: Vec<Unit> = self.units.values().cloned().collect();
        sort_for_display(&mut units);
        units
    }

    pub fn base_units(&self) -> Vec<Unit> {
        let mut units: Vec<Unit> = self
            .units
            .values()
            .filter(|u| u.is_base_unit())
            .cloned()
            .collect();
        sort_for_display(&mut units);
        units
    }

    /// Every unit measured in `symbol`, including the base unit itself.
    pub fn units_for_base(&self, symbol: &str) -> Vec<Unit> {
        let mut units: Vec<Unit> = self
            .units
            .values()
            .filter(|u| u.base_unit_symbol() == symbol)
            .cloned()
            .collect();
        sort_for_display(&mut units);
        units
    }

    /// Case-insensitive substring match on the name.
    pub fn search(&self, query: &str) -> Vec<Unit> {
        let needle = query.trim().to_lowercase();
        let mut units: Vec<Unit> = self
            .units
            .values()
            .filter(|u| u.name().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        sort_for_display(&mut units);
        units
    }
}

fn sort_for_display(units: &mut [Unit]) {
    units.sort_by(|a, b| {
        b.is_base_unit()
            .cmp(&a.is_base_unit())
            .then_with(|| a.name().cmp(b.name()))
    });
}

/// Units to insert when seeding default base units.
///
/// Returns nothing unless the registry is empty, so running it against an
/// already-populated store is a no-op.
pub fn seed_default_units(
    registry: &UnitRegistry,
    symbols: &[String],
    limits: &UnitLimits,
    mut next_id: impl FnMut() -> UnitId,
    at: DateTime<Utc>,
) -> DomainResult<Vec<Unit>> {
    if !registry.is_empty() {
        return Ok(vec![]);
    }
    let mut seeded: Vec<Unit> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let unit = Unit::base(next_id(), symbol, limits, at)?;
        if seeded.iter().any(|u| u.name() == unit.name()) {
            continue;
        }
        seeded.push(unit);
    }
    Ok(seeded)
}
