//! Category models and the parent/child tree

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::validation::{validate_hex_color, FieldError};

/// Name of the bucket that receives products of deactivated categories
pub const UNCATEGORIZED: &str = "Uncategorized";

pub const DEFAULT_CATEGORY_ICON: &str = "📦";
pub const DEFAULT_CATEGORY_COLOR: &str = "#7C3AED";

/// A product category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
    pub parent_id: Option<i64>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category with figures derived from products, inventory and sales
#[derive(Debug, Clone, Serialize)]
pub struct CategoryWithStats {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
    pub total_stock: i64,
    pub low_stock_items: i64,
    pub total_revenue: Decimal,
}

/// Input for creating a category
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    #[validate(custom = "validate_hex_color")]
    pub color: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: Option<i32>,
}

impl CreateCategoryInput {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        crate::validation::collect(self, Vec::new())
    }
}

/// Partial category update. `parent_id: Some(None)` detaches from the parent.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
    #[validate(custom = "validate_hex_color")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "crate::types::double_option")]
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateCategoryInput {
    pub fn check(&self) -> Result<(), Vec<FieldError>> {
        crate::validation::collect(self, Vec::new())
    }
}

/// Parent links of every category, for traversal without recursion in SQL
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    parents: BTreeMap<i64, Option<i64>>,
    children: BTreeMap<i64, Vec<i64>>,
}

impl CategoryTree {
    pub fn from_links(links: impl IntoIterator<Item = (i64, Option<i64>)>) -> Self {
        let mut tree = CategoryTree::default();
        for (id, parent) in links {
            tree.parents.insert(id, parent);
            if let Some(parent) = parent {
                tree.children.entry(parent).or_default().push(id);
            }
        }
        for kids in tree.children.values_mut() {
            kids.sort_unstable();
        }
        tree
    }

    pub fn contains(&self, id: i64) -> bool {
        self.parents.contains_key(&id)
    }

    pub fn parent(&self, id: i64) -> Option<i64> {
        self.parents.get(&id).copied().flatten()
    }

    /// Strict descendants of `id`, breadth first
    pub fn descendants(&self, id: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut queue = std::collections::VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children.get(&current).into_iter().flatten() {
                // a corrupt cycle in stored data must not loop forever
                if seen.insert(*child) {
                    out.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        out
    }

    /// `id` followed by all of its descendants
    pub fn subtree(&self, id: i64) -> Vec<i64> {
        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        ids
    }

    /// Whether re-parenting `id` under `new_parent` would create a cycle
    pub fn would_create_cycle(&self, id: i64, new_parent: i64) -> bool {
        new_parent == id || self.descendants(id).contains(&new_parent)
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == id || out.contains(&p) {
                break;
            }
            out.push(p);
            current = self.parent(p);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1 ── 2 ── 4
    // │    └─ 5 ── 6
    // └─ 3
    // 7 (root)
    fn tree() -> CategoryTree {
        CategoryTree::from_links([
            (1, None),
            (2, Some(1)),
            (3, Some(1)),
            (4, Some(2)),
            (5, Some(2)),
            (6, Some(5)),
            (7, None),
        ])
    }

    #[test]
    fn test_descendants() {
        let t = tree();
        assert_eq!(t.descendants(1), vec![2, 3, 4, 5, 6]);
        assert_eq!(t.descendants(5), vec![6]);
        assert!(t.descendants(7).is_empty());
    }

    #[test]
    fn test_subtree_includes_self() {
        assert_eq!(tree().subtree(2), vec![2, 4, 5, 6]);
    }

    #[test]
    fn test_cycle_detection() {
        let t = tree();
        assert!(t.would_create_cycle(2, 2));
        assert!(t.would_create_cycle(2, 6));
        assert!(t.would_create_cycle(1, 4));
        assert!(!t.would_create_cycle(2, 3));
        assert!(!t.would_create_cycle(6, 7));
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(tree().ancestors(6), vec![5, 2, 1]);
        assert!(tree().ancestors(1).is_empty());
    }

    #[test]
    fn test_corrupt_cycle_terminates() {
        let t = CategoryTree::from_links([(1, Some(2)), (2, Some(1))]);
        assert_eq!(t.descendants(1), vec![2]);
        assert_eq!(t.ancestors(1), vec![2]);
    }

    #[test]
    fn test_update_parent_null_vs_absent() {
        let absent: UpdateCategoryInput = serde_json::from_str(r#"{"name":"A"}"#).unwrap();
        assert_eq!(absent.parent_id, None);
        let cleared: UpdateCategoryInput = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(cleared.parent_id, Some(None));
        let set: UpdateCategoryInput = serde_json::from_str(r#"{"parent_id":4}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some(4)));
    }

    #[test]
    fn test_create_category_validation() {
        let input = CreateCategoryInput {
            name: "".into(),
            description: None,
            icon: None,
            color: Some("purple".into()),
            parent_id: None,
            sort_order: None,
        };
        let errors = input.check().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["color", "name"]);
    }
}
