use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::validation::display_name;
use stockroom_core::{CategoryId, DomainResult, Entity, ProductId, UnitId};

use crate::category::Category;
use crate::tree::ensure_selectable;

pub const MAX_PRODUCT_NAME_LEN: usize = 200;

/// The classification record of a product.
///
/// Only what the consistency rules need is kept here: the default unit and
/// the (leaf) category the product is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    category_id: Option<CategoryId>,
    unit_id: UnitId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: &str,
        unit_id: UnitId,
        category: Option<&Category>,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = display_name(name, "product name", MAX_PRODUCT_NAME_LEN)?;
        if let Some(c) = category {
            ensure_selectable(c)?;
        }
        Ok(Self {
            id,
            name,
            category_id: category.map(Category::id_typed),
            unit_id,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// File the product under `category`, or clear it with `None`.
    pub fn classified_as(&self, category: Option<&Category>, at: DateTime<Utc>) -> DomainResult<Self> {
        if let Some(c) = category {
            ensure_selectable(c)?;
        }
        Ok(Self {
            category_id: category.map(Category::id_typed),
            updated_at: at,
            ..self.clone()
        })
    }

    /// Drop the classification. Used when the category is deleted.
    pub fn unclassified(&self, at: DateTime<Utc>) -> Self {
        Self {
            category_id: None,
            updated_at: at,
            ..self.clone()
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
