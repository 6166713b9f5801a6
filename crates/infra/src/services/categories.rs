use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use stockroom_catalog::{
    Category, Product, breadcrumb, ensure_unique_among_siblings, is_max_depth_reached, matches_query,
    path_to_root, sort_for_display, verify_classification, verify_tree,
};
use stockroom_core::{CategoryId, DomainError};

use crate::error::{ServiceError, ServiceResult};
use crate::services::{ServiceEnv, page, query};
use crate::store::{RecordStore, WriteBatch};
use crate::writer::{CommandHandle, WriteQueue};

/// One search result: the match and its path, node first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryHit {
    pub category: Category,
    pub path: Vec<Category>,
}

impl CategoryHit {
    pub fn breadcrumb(&self) -> String {
        breadcrumb(&self.path)
    }
}

/// Category tree commands and queries.
pub struct CategoryService<S> {
    store: Arc<S>,
    env: ServiceEnv,
    writer: WriteQueue<S>,
}

impl<S> Clone for CategoryService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            env: self.env.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<S: RecordStore + 'static> CategoryService<S> {
    pub fn new(store: Arc<S>, env: ServiceEnv, writer: WriteQueue<S>) -> Self {
        Self { store, env, writer }
    }

    /// Create a root (`parent_id = None`) or a child category.
    ///
    /// A parent that already classifies products must stay a leaf.
    pub fn create_category(
        &self,
        name: impl Into<String>,
        parent_id: Option<CategoryId>,
    ) -> CommandHandle<CategoryId> {
        let env = self.env.clone();
        let name = name.into();
        self.writer.submit("create_category", move |store| {
            let rules = env.config.category_rules();
            let parent = parent_id.map(|id| require_category(store, id)).transpose()?;
            let node = match &parent {
                None => Category::root(env.category_id(), &name, &rules, env.now())?,
                Some(p) => Category::child_of(p, env.category_id(), &name, &rules, env.now())?,
            };
            let siblings = siblings_of(store, parent_id)?;
            ensure_unique_among_siblings(&siblings, node.name(), None)?;
            if let Some(p) = &parent {
                let filed = store.products_where(&|pr: &Product| pr.category_id() == Some(p.id_typed()))?;
                if !filed.is_empty() {
                    return Err(DomainError::HasProducts(format!(
                        "'{}' classifies {} products and must stay a leaf",
                        p.name(),
                        filed.len()
                    ))
                    .into());
                }
            }

            let id = node.id_typed();
            let level = node.level();
            let mut batch = WriteBatch::new();
            batch.put_category(node.clone());
            if let Some(p) = parent.filter(|p| !p.has_children()) {
                batch.put_category(p.with_has_children(true, env.now()));
            }
            store.commit(batch)?;

            info!(
                category_id = %id,
                parent_id = ?parent_id,
                level,
                name = %node.name(),
                "category created"
            );
            Ok(id)
        })
    }

    pub fn rename_category(&self, id: CategoryId, new_name: impl Into<String>) -> CommandHandle<Category> {
        let env = self.env.clone();
        let new_name = new_name.into();
        self.writer.submit("rename_category", move |store| {
            let current = require_category(store, id)?;
            let renamed = current.renamed(&new_name, &env.config.category_rules(), env.now())?;
            let siblings = siblings_of(store, current.parent_id())?;
            ensure_unique_among_siblings(&siblings, renamed.name(), Some(id))?;

            let mut batch = WriteBatch::new();
            batch.put_category(renamed.clone());
            store.commit(batch)?;

            info!(category_id = %id, from = %current.name(), to = %renamed.name(), "category renamed");
            Ok(renamed)
        })
    }

    /// Delete a leaf category.
    ///
    /// Products filed under it become unclassified, and the parent loses its
    /// `has_children` flag when this was its last child. Returns how many
    /// products were unclassified.
    pub fn delete_category(&self, id: CategoryId) -> CommandHandle<usize> {
        let env = self.env.clone();
        self.writer.submit("delete_category", move |store| {
            let node = require_category(store, id)?;
            let children = store.categories_where(&|c: &Category| c.parent_id() == Some(id))?;
            if !children.is_empty() {
                return Err(DomainError::HasChildren(format!(
                    "'{}' has {} child categories",
                    node.name(),
                    children.len()
                ))
                .into());
            }

            let now = env.now();
            let mut batch = WriteBatch::new();

            let filed = store.products_where(&|p: &Product| p.category_id() == Some(id))?;
            for product in &filed {
                batch.put_product(product.unclassified(now));
            }
            batch.delete_category(id);

            if let Some(parent_id) = node.parent_id() {
                let remaining =
                    store.categories_where(&|c: &Category| c.parent_id() == Some(parent_id) && c.id_typed() != id)?;
                if remaining.is_empty() {
                    let parent = require_category(store, parent_id)?;
                    batch.put_category(parent.with_has_children(false, now));
                }
            }

            store.commit(batch)?;
            info!(
                category_id = %id,
                name = %node.name(),
                unclassified_products = filed.len(),
                "category deleted"
            );
            Ok(filed.len())
        })
    }

    /// Set or clear (`None`) the icon URL.
    pub fn set_category_icon(&self, id: CategoryId, icon_url: Option<String>) -> CommandHandle<Category> {
        let env = self.env.clone();
        self.writer.submit("set_category_icon", move |store| {
            let current = require_category(store, id)?;
            let updated = current.with_icon(icon_url.as_deref(), &env.config.category_rules(), env.now())?;

            let mut batch = WriteBatch::new();
            batch.put_category(updated.clone());
            store.commit(batch)?;

            info!(category_id = %id, has_icon = updated.icon_url().is_some(), "category icon set");
            Ok(updated)
        })
    }

    pub fn get_category(&self, id: CategoryId) -> ServiceResult<Category> {
        query("get_category", || require_category(&*self.store, id))
    }

    /// Ancestor chain, the node itself first and its root last.
    pub fn path_to_root(&self, id: CategoryId) -> ServiceResult<Vec<Category>> {
        query("path_to_root", || {
            path_to_root(id, self.env.config.max_category_depth, |cid| {
                self.store.category(cid).map_err(ServiceError::from)
            })
        })
    }

    /// `"Root > ... > Node"`.
    pub fn breadcrumb(&self, id: CategoryId) -> ServiceResult<String> {
        Ok(breadcrumb(&self.path_to_root(id)?))
    }

    /// Case-insensitive name search, shallow levels first.
    ///
    /// `limit` falls back to the configured search limit.
    pub fn search(&self, text: &str, limit: Option<usize>) -> ServiceResult<Vec<CategoryHit>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::validation("search query cannot be empty").into());
        }
        let limit = limit.unwrap_or(self.env.config.category_search_limit);
        query("search_categories", || {
            let mut hits = self.store.categories_where(&|c: &Category| matches_query(c, text))?;
            sort_for_display(&mut hits);
            page(hits, limit, 0)?
                .into_iter()
                .map(|category| -> ServiceResult<CategoryHit> {
                    let path = self.path_to_root(category.id_typed())?;
                    Ok(CategoryHit { category, path })
                })
                .collect()
        })
    }

    /// Whether a child created under `parent_id` would sit on the last level.
    pub fn is_max_depth_reached(&self, parent_id: Option<CategoryId>) -> ServiceResult<bool> {
        query("is_max_depth_reached", || {
            let parent = parent_id.map(|id| require_category(&*self.store, id)).transpose()?;
            Ok(is_max_depth_reached(parent.as_ref(), self.env.config.max_category_depth))
        })
    }

    /// Root categories by name.
    pub fn root_categories(&self) -> ServiceResult<Vec<Category>> {
        query("root_categories", || sorted_by_name(self.store.categories_where(&|c: &Category| c.is_root())?))
    }

    /// Direct children of `parent_id` by name.
    pub fn children(&self, parent_id: CategoryId) -> ServiceResult<Vec<Category>> {
        query("children", || {
            require_category(&*self.store, parent_id)?;
            sorted_by_name(siblings_of(&*self.store, Some(parent_id))?)
        })
    }

    pub fn children_page(&self, parent_id: CategoryId, limit: usize, offset: usize) -> ServiceResult<Vec<Category>> {
        page(self.children(parent_id)?, limit, offset)
    }

    pub fn categories_at_level(&self, level: u8) -> ServiceResult<Vec<Category>> {
        query("categories_at_level", || {
            sorted_by_name(self.store.categories_where(&|c: &Category| c.level() == level)?)
        })
    }

    /// Deepest level in use, `None` for an empty tree.
    pub fn max_level(&self) -> ServiceResult<Option<u8>> {
        query("max_level", || {
            Ok(self
                .store
                .categories_where(&|_: &Category| true)?
                .iter()
                .map(Category::level)
                .max())
        })
    }

    /// Check every structural rule over the whole stored tree, and that
    /// every classified product points at an existing leaf.
    pub fn verify_tree(&self) -> ServiceResult<()> {
        query("verify_tree", || {
            let nodes = self.store.categories_where(&|_: &Category| true)?;
            verify_tree(&nodes, self.env.config.max_category_depth)?;
            let classified = self.store.products_where(&|p: &Product| p.category_id().is_some())?;
            Ok(verify_classification(&nodes, &classified)?)
        })
    }
}

fn require_category<S: RecordStore + ?Sized>(store: &S, id: CategoryId) -> ServiceResult<Category> {
    Ok(store
        .category(id)?
        .ok_or_else(|| DomainError::CategoryNotFound(id.to_string()))?)
}

fn siblings_of<S: RecordStore + ?Sized>(store: &S, parent_id: Option<CategoryId>) -> ServiceResult<Vec<Category>> {
    Ok(store.categories_where(&|c: &Category| c.parent_id() == parent_id)?)
}

fn sorted_by_name(mut categories: Vec<Category>) -> ServiceResult<Vec<Category>> {
    categories.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(categories)
}
