use std::sync::Arc;

use tracing::info;

use stockroom_catalog::{Category, Product};
use stockroom_core::{CategoryId, DomainError, ProductId, UnitId};

use crate::error::ServiceResult;
use crate::services::{ServiceEnv, query};
use crate::store::{RecordStore, WriteBatch};
use crate::writer::{CommandHandle, WriteQueue};

/// Product classification: the unit a product is counted in and the leaf
/// category it is filed under.
pub struct ProductService<S> {
    store: Arc<S>,
    env: ServiceEnv,
    writer: WriteQueue<S>,
}

impl<S> Clone for ProductService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            env: self.env.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<S: RecordStore + 'static> ProductService<S> {
    pub fn new(store: Arc<S>, env: ServiceEnv, writer: WriteQueue<S>) -> Self {
        Self { store, env, writer }
    }

    pub fn register_product(
        &self,
        name: impl Into<String>,
        unit_id: UnitId,
        category_id: Option<CategoryId>,
    ) -> CommandHandle<ProductId> {
        let env = self.env.clone();
        let name = name.into();
        self.writer.submit("register_product", move |store| {
            if store.unit(unit_id)?.is_none() {
                return Err(DomainError::UnitNotFound(unit_id.to_string()).into());
            }
            let category = load_category(store, category_id)?;
            let product = Product::new(env.product_id(), &name, unit_id, category.as_ref(), env.now())?;

            let id = product.id_typed();
            let name = product.name().to_string();
            let mut batch = WriteBatch::new();
            batch.put_product(product);
            store.commit(batch)?;

            info!(product_id = %id, name = %name, category_id = ?category_id, "product registered");
            Ok(id)
        })
    }

    /// File the product under a leaf category, or clear it with `None`.
    pub fn assign_category(&self, product_id: ProductId, category_id: Option<CategoryId>) -> CommandHandle<Product> {
        let env = self.env.clone();
        self.writer.submit("assign_category", move |store| {
            let product = store
                .product(product_id)?
                .ok_or_else(|| DomainError::ProductNotFound(product_id.to_string()))?;
            let category = load_category(store, category_id)?;
            let updated = product.classified_as(category.as_ref(), env.now())?;

            let mut batch = WriteBatch::new();
            batch.put_product(updated.clone());
            store.commit(batch)?;

            info!(product_id = %product_id, category_id = ?category_id, "product category assigned");
            Ok(updated)
        })
    }

    pub fn get_product(&self, id: ProductId) -> ServiceResult<Product> {
        query("get_product", || {
            Ok(self
                .store
                .product(id)?
                .ok_or_else(|| DomainError::ProductNotFound(id.to_string()))?)
        })
    }

    /// Products filed directly under `category_id`, by name.
    pub fn products_in_category(&self, category_id: CategoryId) -> ServiceResult<Vec<Product>> {
        query("products_in_category", || {
            let mut products = self
                .store
                .products_where(&|p: &Product| p.category_id() == Some(category_id))?;
            products.sort_by(|a, b| a.name().cmp(b.name()));
            Ok(products)
        })
    }

    pub fn count_products(&self, category_id: CategoryId) -> ServiceResult<usize> {
        Ok(self.products_in_category(category_id)?.len())
    }
}

fn load_category<S: RecordStore + ?Sized>(
    store: &S,
    category_id: Option<CategoryId>,
) -> ServiceResult<Option<Category>> {
    category_id
        .map(|id| -> ServiceResult<Category> {
            Ok(store
                .category(id)?
                .ok_or_else(|| DomainError::CategoryNotFound(id.to_string()))?)
        })
        .transpose()
}
