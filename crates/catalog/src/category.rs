use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::validation::{display_name, is_http_url};
use stockroom_core::{CategoryId, DomainError, DomainResult, Entity};

/// Level of every root category.
pub const ROOT_LEVEL: u8 = 0;

/// Limits for the category tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CategoryRules {
    /// Deepest allowed level (roots are level 0).
    pub max_depth: u8,
    pub max_name_len: usize,
    pub max_icon_url_len: usize,
}

impl Default for CategoryRules {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_name_len: 100,
            max_icon_url_len: 500,
        }
    }
}

impl CategoryRules {
    /// Normalize and validate a category name.
    ///
    /// Letters, digits, whitespace, `-` and `_` only.
    pub fn validate_name(&self, raw: &str) -> DomainResult<String> {
        let name = display_name(raw, "category name", self.max_name_len)?;
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_'))
        {
            return Err(DomainError::validation(format!(
                "category name may only contain letters, digits, spaces, '-' and '_' (found '{bad}')"
            )));
        }
        Ok(name)
    }

    pub fn validate_icon_url(&self, raw: &str) -> DomainResult<String> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(DomainError::validation("icon url cannot be empty when set"));
        }
        if url.chars().count() > self.max_icon_url_len {
            return Err(DomainError::validation(format!(
                "icon url is too long (maximum {} characters)",
                self.max_icon_url_len
            )));
        }
        if !is_http_url(url) {
            return Err(DomainError::validation("icon url must start with http:// or https://"));
        }
        Ok(url.to_string())
    }
}

/// A node in the category tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    parent_id: Option<CategoryId>,
    level: u8,
    name: String,
    icon_url: Option<String>,
    /// Kept in step with the child count by every write that changes it.
    has_children: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Category {
    pub fn root(
        id: CategoryId,
        name: &str,
        rules: &CategoryRules,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Ok(Self {
            id,
            parent_id: None,
            level: ROOT_LEVEL,
            name: rules.validate_name(name)?,
            icon_url: None,
            has_children: false,
            created_at: at,
            updated_at: at,
        })
    }

    /// A new child one level below `parent`.
    pub fn child_of(
        parent: &Category,
        id: CategoryId,
        name: &str,
        rules: &CategoryRules,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = rules.validate_name(name)?;
        let Some(level) = parent.level.checked_add(1).filter(|l| *l <= rules.max_depth) else {
            return Err(DomainError::MaxDepthReached {
                level: parent.level.saturating_add(1),
                max: rules.max_depth,
            });
        };
        Ok(Self {
            id,
            parent_id: Some(parent.id),
            level,
            name,
            icon_url: None,
            has_children: false,
            created_at: at,
            updated_at: at,
        })
    }

    pub fn id_typed(&self) -> CategoryId {
        self.id
    }

    pub fn parent_id(&self) -> Option<CategoryId> {
        self.parent_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.icon_url.as_deref()
    }

    pub fn has_children(&self) -> bool {
        self.has_children
    }

    /// Only leaves may classify products.
    pub fn is_selectable(&self) -> bool {
        !self.has_children
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn renamed(&self, name: &str, rules: &CategoryRules, at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            name: rules.validate_name(name)?,
            updated_at: at,
            ..self.clone()
        })
    }

    pub fn with_icon(
        &self,
        icon_url: Option<&str>,
        rules: &CategoryRules,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let icon_url = icon_url.map(|u| rules.validate_icon_url(u)).transpose()?;
        Ok(Self {
            icon_url,
            updated_at: at,
            ..self.clone()
        })
    }

    pub fn with_has_children(&self, has_children: bool, at: DateTime<Utc>) -> Self {
        Self {
            has_children,
            updated_at: at,
            ..self.clone()
        }
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn root_is_level_zero_without_parent() {
        let drinks = Category::root(CategoryId::new(), "Drinks", &CategoryRules::default(), at()).unwrap();
        assert!(drinks.is_root());
        assert_eq!(drinks.level(), 0);
        assert!(drinks.is_selectable());
    }

    #[test]
    fn child_is_one_level_below_parent() {
        let rules = CategoryRules::default();
        let drinks = Category::root(CategoryId::new(), "Drinks", &rules, at()).unwrap();
        let soda = Category::child_of(&drinks, CategoryId::new(), "Soda", &rules, at()).unwrap();
        assert_eq!(soda.level(), 1);
        assert_eq!(soda.parent_id(), Some(drinks.id_typed()));
    }

    #[test]
    fn child_below_max_depth_is_rejected() {
        let rules = CategoryRules::default();
        let mut node = Category::root(CategoryId::new(), "L0", &rules, at()).unwrap();
        for level in 1..=4 {
            node = Category::child_of(&node, CategoryId::new(), &format!("L{level}"), &rules, at())
                .unwrap();
        }
        assert_eq!(node.level(), 4);
        let err = Category::child_of(&node, CategoryId::new(), "L5", &rules, at()).unwrap_err();
        assert_eq!(err, DomainError::MaxDepthReached { level: 5, max: 4 });
    }

    #[test]
    fn level_never_wraps_at_the_type_limit() {
        let rules = CategoryRules {
            max_depth: u8::MAX,
            ..CategoryRules::default()
        };
        let mut node = Category::root(CategoryId::new(), "L0", &rules, at()).unwrap();
        for level in 1..=u8::MAX {
            node = Category::child_of(&node, CategoryId::new(), &format!("L{level}"), &rules, at())
                .unwrap();
            assert_eq!(node.level(), level);
        }
        let err = Category::child_of(&node, CategoryId::new(), "deeper", &rules, at()).unwrap_err();
        assert!(matches!(err, DomainError::MaxDepthReached { max: u8::MAX, .. }));
    }

    #[test]
    fn names_are_normalized_and_restricted() {
        let rules = CategoryRules::default();
        assert_eq!(rules.validate_name("  Hot   Drinks ").unwrap(), "Hot Drinks");
        assert_eq!(rules.validate_name("Anak-anak_2").unwrap(), "Anak-anak_2");
        assert!(rules.validate_name("").is_err());
        assert!(rules.validate_name("Drinks & Snacks").is_err());
        assert!(rules.validate_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn icon_url_must_be_http() {
        let rules = CategoryRules::default();
        let c = Category::root(CategoryId::new(), "Drinks", &rules, at()).unwrap();
        let with_icon = c.with_icon(Some("https://cdn.example.com/d.png"), &rules, at()).unwrap();
        assert_eq!(with_icon.icon_url(), Some("https://cdn.example.com/d.png"));
        assert!(c.with_icon(Some("file:///d.png"), &rules, at()).is_err());
        assert_eq!(with_icon.with_icon(None, &rules, at()).unwrap().icon_url(), None);
    }

    #[test]
    fn parent_flag_controls_selectability() {
        let rules = CategoryRules::default();
        let c = Category::root(CategoryId::new(), "Drinks", &rules, at()).unwrap();
        assert!(!c.with_has_children(true, at()).is_selectable());
    }
}
