//! Rules that span more than one category node.
//!
//! Every function takes the nodes it needs as plain data; callers load them
//! from whatever store they use.

use std::collections::{HashMap, HashSet};

use stockroom_core::validation::normalize_name;
use stockroom_core::{CategoryId, DomainError, DomainResult};

use crate::category::{Category, ROOT_LEVEL};
use crate::product::Product;

/// Separator used by [`breadcrumb`].
pub const BREADCRUMB_SEPARATOR: &str = " > ";

/// Reject `name` if a sibling other than `exclude` already carries it.
///
/// Names compare after trimming and whitespace collapsing; case matters.
pub fn ensure_unique_among_siblings<'a>(
    siblings: impl IntoIterator<Item = &'a Category>,
    name: &str,
    exclude: Option<CategoryId>,
) -> DomainResult<()> {
    let wanted = normalize_name(name);
    let clash = siblings
        .into_iter()
        .filter(|c| Some(c.id_typed()) != exclude)
        .any(|c| c.name() == wanted);
    if clash {
        return Err(DomainError::duplicate_name(wanted));
    }
    Ok(())
}

/// True when a child created under `parent` would land on the last allowed
/// level, so it could not have children of its own.
///
/// A root (`None`) never reaches the limit.
pub fn is_max_depth_reached(parent: Option<&Category>, max_depth: u8) -> bool {
    match parent {
        None => false,
        Some(p) => p.level() >= max_depth.saturating_sub(1),
    }
}

/// Walk from `start` up to its root. The result is ordered node first, root last.
///
/// `lookup` may fail with the caller's own error type. The walk is bounded by
/// `max_depth + 1` steps so a corrupted parent chain cannot loop forever.
pub fn path_to_root<E, F>(start: CategoryId, max_depth: u8, mut lookup: F) -> Result<Vec<Category>, E>
where
    E: From<DomainError>,
    F: FnMut(CategoryId) -> Result<Option<Category>, E>,
{
    let mut path = Vec::new();
    let mut cursor = Some(start);
    let bound = usize::from(max_depth) + 1;

    while let Some(id) = cursor {
        if path.len() >= bound {
            return Err(DomainError::invariant(format!(
                "parent chain of category {start} exceeds {bound} nodes"
            ))
            .into());
        }
        let node = lookup(id)?.ok_or_else(|| DomainError::CategoryNotFound(id.to_string()))?;
        cursor = node.parent_id();
        path.push(node);
    }

    Ok(path)
}

/// Render a node-to-root path as `"Root > ... > Node"`.
pub fn breadcrumb(path: &[Category]) -> String {
    path.iter()
        .rev()
        .map(Category::name)
        .collect::<Vec<_>>()
        .join(BREADCRUMB_SEPARATOR)
}

pub fn ensure_selectable(category: &Category) -> DomainResult<()> {
    if !category.is_selectable() {
        return Err(DomainError::NotALeaf(category.id_typed().to_string()));
    }
    Ok(())
}

/// Case-insensitive substring match on the category name.
pub fn matches_query(category: &Category, query: &str) -> bool {
    category
        .name()
        .to_lowercase()
        .contains(&query.trim().to_lowercase())
}

/// Shallow levels first, then by name.
pub fn sort_for_display(categories: &mut [Category]) {
    categories.sort_by(|a, b| {
        a.level()
            .cmp(&b.level())
            .then_with(|| a.name().cmp(b.name()))
    });
}

/// Check every structural rule over a full snapshot of the tree.
///
/// Used by consistency checks and tests; the write paths enforce the same
/// rules one node at a time.
pub fn verify_tree(nodes: &[Category], max_depth: u8) -> DomainResult<()> {
    let by_id: HashMap<CategoryId, &Category> = nodes.iter().map(|c| (c.id_typed(), c)).collect();
    let mut parents_with_children: HashSet<CategoryId> = HashSet::new();
    let mut sibling_names: HashSet<(Option<CategoryId>, &str)> = HashSet::new();

    for node in nodes {
        if node.level() > max_depth {
            return Err(DomainError::invariant(format!(
                "category {} sits at level {} beyond {max_depth}",
                node.id_typed(),
                node.level()
            )));
        }
        match node.parent_id() {
            None if node.level() != ROOT_LEVEL => {
                return Err(DomainError::invariant(format!(
                    "root category {} has level {}",
                    node.id_typed(),
                    node.level()
                )));
            }
            None => {}
            Some(parent_id) => {
                let parent = by_id.get(&parent_id).ok_or_else(|| {
                    DomainError::invariant(format!(
                        "category {} points at missing parent {parent_id}",
                        node.id_typed()
                    ))
                })?;
                if parent.level().checked_add(1) != Some(node.level()) {
                    return Err(DomainError::invariant(format!(
                        "category {} level {} does not follow parent level {}",
                        node.id_typed(),
                        node.level(),
                        parent.level()
                    )));
                }
                parents_with_children.insert(parent_id);
            }
        }
        if !sibling_names.insert((node.parent_id(), node.name())) {
            return Err(DomainError::invariant(format!(
                "duplicate sibling name '{}'",
                node.name()
            )));
        }
    }

    for node in nodes {
        if node.has_children() != parents_with_children.contains(&node.id_typed()) {
            return Err(DomainError::invariant(format!(
                "category {} has_children flag is stale",
                node.id_typed()
            )));
        }
    }

    Ok(())
}

/// Check that every classified product points at an existing leaf.
pub fn verify_classification(nodes: &[Category], products: &[Product]) -> DomainResult<()> {
    let by_id: HashMap<CategoryId, &Category> = nodes.iter().map(|c| (c.id_typed(), c)).collect();
    for product in products {
        let Some(category_id) = product.category_id() else {
            continue;
        };
        match by_id.get(&category_id) {
            None => {
                return Err(DomainError::invariant(format!(
                    "product {} points at missing category {category_id}",
                    product.id_typed()
                )));
            }
            Some(c) if !c.is_selectable() => {
                return Err(DomainError::invariant(format!(
                    "product {} is filed under '{}', which has children",
                    product.id_typed(),
                    c.name()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryRules;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn chain(names: &[&str]) -> Vec<Category> {
        let rules = CategoryRules::default();
        let mut out: Vec<Category> = Vec::new();
        for name in names {
            let node = match out.last() {
                None => Category::root(CategoryId::new(), name, &rules, at()).unwrap(),
                Some(parent) => Category::child_of(parent, CategoryId::new(), name, &rules, at()).unwrap(),
            };
            if let Some(parent) = out.last_mut() {
                *parent = parent.with_has_children(true, at());
            }
            out.push(node);
        }
        out
    }

    fn lookup_in(nodes: &[Category]) -> impl FnMut(CategoryId) -> DomainResult<Option<Category>> + '_ {
        move |id| Ok(nodes.iter().find(|c| c.id_typed() == id).cloned())
    }

    #[test]
    fn path_runs_from_node_to_root() {
        let nodes = chain(&["Drinks", "Soda", "Cola"]);
        let path = path_to_root(nodes[2].id_typed(), 4, lookup_in(&nodes)).unwrap();
        let names: Vec<_> = path.iter().map(Category::name).collect();
        assert_eq!(names, vec!["Cola", "Soda", "Drinks"]);
        assert_eq!(breadcrumb(&path), "Drinks > Soda > Cola");
    }

    #[test]
    fn path_of_unknown_category_is_not_found() {
        let nodes = chain(&["Drinks"]);
        let err = path_to_root(CategoryId::new(), 4, lookup_in(&nodes)).unwrap_err();
        assert!(matches!(err, DomainError::CategoryNotFound(_)));
    }

    #[test]
    fn path_walk_stops_on_a_cycle() {
        let rules = CategoryRules::default();
        let a = Category::root(CategoryId::new(), "A", &rules, at()).unwrap();
        let b = Category::child_of(&a, CategoryId::new(), "B", &rules, at()).unwrap();
        // Corrupt: make A's parent B.
        let a_looped = Category::child_of(&b, a.id_typed(), "A", &rules, at()).unwrap();
        let nodes = vec![a_looped, b.clone()];
        let err = path_to_root(b.id_typed(), 4, lookup_in(&nodes)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn duplicate_sibling_names_are_rejected_except_self() {
        let rules = CategoryRules::default();
        let soda = Category::root(CategoryId::new(), "Soda", &rules, at()).unwrap();
        let juice = Category::root(CategoryId::new(), "Juice", &rules, at()).unwrap();
        let siblings = vec![soda.clone(), juice];

        let err = ensure_unique_among_siblings(&siblings, "  Soda ", None).unwrap_err();
        assert_eq!(err, DomainError::DuplicateName("Soda".into()));
        ensure_unique_among_siblings(&siblings, "Soda", Some(soda.id_typed())).unwrap();
        ensure_unique_among_siblings(&siblings, "soda", None).unwrap();
    }

    #[test]
    fn max_depth_check_looks_at_the_parent_level() {
        let nodes = chain(&["L0", "L1", "L2", "L3", "L4"]);
        assert!(!is_max_depth_reached(None, 4));
        assert!(!is_max_depth_reached(Some(&nodes[2]), 4));
        assert!(is_max_depth_reached(Some(&nodes[3]), 4));
        assert!(is_max_depth_reached(Some(&nodes[4]), 4));
    }

    #[test]
    fn parents_are_not_selectable() {
        let nodes = chain(&["Drinks", "Soda"]);
        let err = ensure_selectable(&nodes[0]).unwrap_err();
        assert!(matches!(err, DomainError::NotALeaf(_)));
        ensure_selectable(&nodes[1]).unwrap();
    }

    #[test]
    fn search_is_case_insensitive_and_ordered() {
        let mut nodes = chain(&["Drinks", "Soft Drinks", "Diet Drinks"]);
        nodes.retain(|c| matches_query(c, "DRINK"));
        nodes.reverse();
        sort_for_display(&mut nodes);
        let names: Vec<_> = nodes.iter().map(Category::name).collect();
        assert_eq!(names, vec!["Drinks", "Soft Drinks", "Diet Drinks"]);
    }

    #[test]
    fn verify_tree_flags_stale_parent_flag() {
        let mut nodes = chain(&["Drinks", "Soda"]);
        verify_tree(&nodes, 4).unwrap();
        nodes[0] = nodes[0].with_has_children(false, at());
        assert!(matches!(
            verify_tree(&nodes, 4),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn verify_tree_catches_a_level_that_repeats_its_parent() {
        let rules = CategoryRules {
            max_depth: u8::MAX,
            ..CategoryRules::default()
        };
        let mut nodes = vec![Category::root(CategoryId::new(), "L0", &rules, at()).unwrap()];
        for level in 1..=u8::MAX {
            let last = nodes.len() - 1;
            let child = Category::child_of(&nodes[last], CategoryId::new(), &format!("L{level}"), &rules, at())
                .unwrap();
            nodes[last] = nodes[last].with_has_children(true, at());
            nodes.push(child);
        }
        verify_tree(&nodes, u8::MAX).unwrap();

        // A level-255 node re-pointed at the level-255 leaf, so its level
        // no longer follows its parent's.
        let top = nodes.len() - 1;
        let sibling = Category::child_of(&nodes[top - 1], CategoryId::new(), "stuck", &rules, at()).unwrap();
        let mut raw = serde_json::to_value(&sibling).unwrap();
        raw["parent_id"] = serde_json::to_value(nodes[top].id_typed()).unwrap();
        let stuck: Category = serde_json::from_value(raw).unwrap();
        assert_eq!(stuck.level(), nodes[top].level());
        nodes[top] = nodes[top].with_has_children(true, at());
        nodes.push(stuck);

        let err = verify_tree(&nodes, u8::MAX).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(ref msg) if msg.contains("does not follow")));
    }

    #[test]
    fn products_must_sit_on_existing_leaves() {
        let nodes = chain(&["Drinks", "Soda"]);
        let unit = stockroom_core::UnitId::new();
        let cola = Product::new(stockroom_core::ProductId::new(), "Cola", unit, Some(&nodes[1]), at()).unwrap();
        verify_classification(&nodes, std::slice::from_ref(&cola)).unwrap();

        // Soda gained a child after Cola was filed under it.
        let mut grown = nodes.clone();
        let diet = Category::child_of(&grown[1], CategoryId::new(), "Diet", &CategoryRules::default(), at()).unwrap();
        grown[1] = grown[1].with_has_children(true, at());
        grown.push(diet);
        assert!(matches!(
            verify_classification(&grown, std::slice::from_ref(&cola)),
            Err(DomainError::InvariantViolation(_))
        ));

        assert!(matches!(
            verify_classification(&nodes[..1], std::slice::from_ref(&cola)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        // Build random trees through the same rules the write path uses; the
        // snapshot must always verify.
        #[test]
        fn random_trees_keep_level_invariants(picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..40)) {
            let rules = CategoryRules::default();
            let mut nodes: Vec<Category> = Vec::new();

            for (i, pick) in picks.iter().enumerate() {
                let name = format!("n{i}");
                let parent = if nodes.is_empty() || i % 5 == 0 {
                    None
                } else {
                    Some(pick.index(nodes.len()))
                };
                match parent {
                    None => nodes.push(Category::root(CategoryId::new(), &name, &rules, at()).unwrap()),
                    Some(idx) => {
                        let blocked = nodes[idx].level() >= rules.max_depth;
                        match Category::child_of(&nodes[idx], CategoryId::new(), &name, &rules, at()) {
                            Ok(child) => {
                                prop_assert!(!blocked);
                                nodes[idx] = nodes[idx].with_has_children(true, at());
                                nodes.push(child);
                            }
                            Err(DomainError::MaxDepthReached { .. }) => prop_assert!(blocked),
                            Err(other) => prop_assert!(false, "unexpected error {other}"),
                        }
                    }
                }
            }

            prop_assert!(verify_tree(&nodes, rules.max_depth).is_ok());
            for node in &nodes {
                let path = path_to_root(node.id_typed(), rules.max_depth, lookup_in(&nodes)).unwrap();
                prop_assert_eq!(path.len(), usize::from(node.level()) + 1);
            }
        }
    }
}
