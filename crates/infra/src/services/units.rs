use std::sync::Arc;

use tracing::info;

use stockroom_catalog::Product;
use stockroom_core::validation::normalize_name;
use stockroom_core::{DomainError, UnitId};
use stockroom_units::{Unit, seed_default_units};

use crate::error::ServiceResult;
use crate::services::{ServiceEnv, load_registry, query};
use crate::store::{RecordStore, WriteBatch};
use crate::writer::{CommandHandle, WriteQueue};

/// Unit commands and conversions.
pub struct UnitService<S> {
    store: Arc<S>,
    env: ServiceEnv,
    writer: WriteQueue<S>,
}

impl<S> Clone for UnitService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            env: self.env.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<S: RecordStore + 'static> UnitService<S> {
    pub fn new(store: Arc<S>, env: ServiceEnv, writer: WriteQueue<S>) -> Self {
        Self { store, env, writer }
    }

    /// Insert the configured base units, but only into an empty registry.
    pub fn seed_defaults(&self) -> CommandHandle<Vec<Unit>> {
        let env = self.env.clone();
        self.writer.submit("seed_default_units", move |store| {
            let registry = load_registry(store)?;
            let seeded = seed_default_units(
                &registry,
                &env.config.default_base_units,
                &env.config.unit_limits(),
                || env.unit_id(),
                env.now(),
            )?;
            if seeded.is_empty() {
                return Ok(seeded);
            }

            let mut batch = WriteBatch::new();
            for unit in &seeded {
                batch.put_unit(unit.clone());
            }
            store.commit(batch)?;

            info!(count = seeded.len(), "seeded default base units");
            Ok(seeded)
        })
    }

    pub fn create_base_unit(&self, symbol: impl Into<String>) -> CommandHandle<UnitId> {
        let env = self.env.clone();
        let symbol = symbol.into();
        self.writer.submit("create_base_unit", move |store| {
            let unit = Unit::base(env.unit_id(), &symbol, &env.config.unit_limits(), env.now())?;
            let registry = load_registry(store)?;
            if registry.find_by_name(unit.name()).is_some() || registry.base_unit_for(unit.name()).is_some() {
                return Err(DomainError::duplicate_name(unit.name()).into());
            }

            let id = unit.id_typed();
            let mut batch = WriteBatch::new();
            batch.put_unit(unit);
            store.commit(batch)?;

            info!(unit_id = %id, symbol = %normalize_name(&symbol), "base unit created");
            Ok(id)
        })
    }

    /// A unit scaling into the existing base unit `base_symbol` by `factor`.
    pub fn create_unit(
        &self,
        name: impl Into<String>,
        base_symbol: impl Into<String>,
        factor: i64,
    ) -> CommandHandle<UnitId> {
        let env = self.env.clone();
        let name = name.into();
        let base_symbol = base_symbol.into();
        self.writer.submit("create_unit", move |store| {
            let unit = Unit::derived(
                env.unit_id(),
                &name,
                &base_symbol,
                factor,
                &env.config.unit_limits(),
                env.now(),
            )?;
            let registry = load_registry(store)?;
            if registry.base_unit_for(unit.base_unit_symbol()).is_none() {
                return Err(DomainError::UnitNotFound(format!(
                    "no base unit '{}'",
                    unit.base_unit_symbol()
                ))
                .into());
            }
            if registry.find_by_name(unit.name()).is_some() {
                return Err(DomainError::duplicate_name(unit.name()).into());
            }
            if let Some(existing) =
                registry.find_by_base_and_factor(unit.base_unit_symbol(), unit.conversion_factor().get())
            {
                return Err(DomainError::DuplicateName(format!(
                    "'{}' already measures {} x{}",
                    existing.name(),
                    unit.base_unit_symbol(),
                    unit.conversion_factor()
                ))
                .into());
            }

            let id = unit.id_typed();
            let mut batch = WriteBatch::new();
            batch.put_unit(unit.clone());
            store.commit(batch)?;

            info!(
                unit_id = %id,
                name = %unit.name(),
                base = %unit.base_unit_symbol(),
                factor = unit.conversion_factor().get(),
                "unit created"
            );
            Ok(id)
        })
    }

    /// Rename and/or rescale a unit.
    ///
    /// Existing ledger entries keep their snapshot factor, so history is not
    /// re-interpreted.
    pub fn update_unit(&self, id: UnitId, name: impl Into<String>, factor: i64) -> CommandHandle<Unit> {
        let env = self.env.clone();
        let name = name.into();
        self.writer.submit("update_unit", move |store| {
            let registry = load_registry(store)?;
            let current = registry.resolve(&id)?;
            let updated = current.edited(&name, factor, &env.config.unit_limits(), env.now())?;

            if let Some(other) = registry.find_by_name(updated.name()) {
                if other.id_typed() != id {
                    return Err(DomainError::duplicate_name(updated.name()).into());
                }
            }
            if let Some(other) = registry
                .find_by_base_and_factor(updated.base_unit_symbol(), updated.conversion_factor().get())
            {
                if other.id_typed() != id {
                    return Err(DomainError::DuplicateName(format!(
                        "'{}' already measures {} x{}",
                        other.name(),
                        updated.base_unit_symbol(),
                        updated.conversion_factor()
                    ))
                    .into());
                }
            }

            let mut batch = WriteBatch::new();
            batch.put_unit(updated.clone());
            store.commit(batch)?;

            info!(unit_id = %id, name = %updated.name(), factor = updated.conversion_factor().get(), "unit updated");
            Ok(updated)
        })
    }

    /// Delete a derived unit no product uses.
    pub fn delete_unit(&self, id: UnitId) -> CommandHandle<()> {
        self.writer.submit("delete_unit", move |store| {
            let unit = store
                .unit(id)?
                .ok_or_else(|| DomainError::UnitNotFound(id.to_string()))?;
            if unit.is_base_unit() {
                return Err(DomainError::BaseUnitImmutable(format!(
                    "base unit '{}' cannot be deleted",
                    unit.name()
                ))
                .into());
            }
            let users = store.products_where(&|p: &Product| p.unit_id() == id)?;
            if !users.is_empty() {
                return Err(DomainError::UnitInUse(format!(
                    "'{}' is the unit of {} product(s)",
                    unit.name(),
                    users.len()
                ))
                .into());
            }

            let mut batch = WriteBatch::new();
            batch.delete_unit(id);
            store.commit(batch)?;

            info!(unit_id = %id, name = %unit.name(), "unit deleted");
            Ok(())
        })
    }

    pub fn get_unit(&self, id: UnitId) -> ServiceResult<Unit> {
        query("get_unit", || {
            Ok(self
                .store
                .unit(id)?
                .ok_or_else(|| DomainError::UnitNotFound(id.to_string()))?)
        })
    }

    /// Base units first, then by name.
    pub fn list_units(&self) -> ServiceResult<Vec<Unit>> {
        query("list_units", || Ok(load_registry(&*self.store)?.list()))
    }

    pub fn base_units(&self) -> ServiceResult<Vec<Unit>> {
        query("base_units", || Ok(load_registry(&*self.store)?.base_units()))
    }

    pub fn units_for_base(&self, symbol: &str) -> ServiceResult<Vec<Unit>> {
        let symbol = normalize_name(symbol);
        query("units_for_base", || Ok(load_registry(&*self.store)?.units_for_base(&symbol)))
    }

    pub fn search_units(&self, query_text: &str) -> ServiceResult<Vec<Unit>> {
        query("search_units", || Ok(load_registry(&*self.store)?.search(query_text)))
    }

    pub fn convert_to_base(&self, qty: i64, unit_id: UnitId) -> ServiceResult<i64> {
        query("convert_to_base", || Ok(load_registry(&*self.store)?.convert_to_base(qty, &unit_id)?))
    }

    pub fn convert_from_base(&self, base_qty: i64, unit_id: UnitId) -> ServiceResult<i64> {
        query("convert_from_base", || {
            Ok(load_registry(&*self.store)?.convert_from_base(base_qty, &unit_id)?)
        })
    }

    pub fn convert_between(&self, qty: i64, from: UnitId, to: UnitId) -> ServiceResult<i64> {
        query("convert_between", || Ok(load_registry(&*self.store)?.convert_between(qty, &from, &to)?))
    }

    pub fn are_compatible(&self, a: UnitId, b: UnitId) -> ServiceResult<bool> {
        query("are_compatible", || Ok(load_registry(&*self.store)?.are_compatible(&a, &b)))
    }
}
