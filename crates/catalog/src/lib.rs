//! Category tree and product classification.
//!
//! Pure domain logic: nodes, their validation, and the rules that span the
//! tree (depth, sibling names, selectability, paths). Storage lives in
//! `stockroom-infra`.

pub mod category;
pub mod product;
pub mod tree;

pub use category::{Category, CategoryRules, ROOT_LEVEL};
pub use product::{MAX_PRODUCT_NAME_LEN, Product};
pub use tree::{
    BREADCRUMB_SEPARATOR, breadcrumb, ensure_selectable, ensure_unique_among_siblings,
    is_max_depth_reached, matches_query, path_to_root, sort_for_display, verify_classification,
    verify_tree,
};
