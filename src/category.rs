// Category tree handling: flattening the backend's nested tree into a
// flat, parent-referencing list, and lookups over that list.

use std::collections::HashSet;

use crate::models::{Category, CategoryNode};

/// Flattens a nested category tree into a flat list, depth-first with
/// each parent emitted immediately before its children, children in the
/// order the backend sent them.
///
/// The source is not guaranteed to be tree-shaped: a duplicate id keeps
/// its first occurrence only, and later ones are dropped silently. A
/// node with no id is dropped too, but its children are still visited
/// and attach to the nearest ancestor that did have an id.
pub fn flatten(nodes: &[CategoryNode]) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();

    // Explicit stack instead of recursion; entries carry the parent id
    // the node should be linked to.
    let mut stack: Vec<(&CategoryNode, Option<i64>)> = Vec::new();
    for node in nodes.iter().rev() {
        stack.push((node, None));
    }

    while let Some((node, parent_id)) = stack.pop() {
        // The parent the children link to: this node if it has an id,
        // otherwise the skipped node's own parent.
        let child_parent = match node.id {
            Some(id) => {
                if seen.insert(id) {
                    out.push(Category {
                        id,
                        name: node.name.clone(),
                        parent_id,
                    });
                } else {
                    tracing::debug!(id, "Duplicate category id in tree, keeping first occurrence");
                }
                Some(id)
            }
            None => {
                tracing::warn!(name = %node.name, "Skipping category node without id");
                parent_id
            }
        };

        if let Some(children) = node.sub_categories.as_deref() {
            for child in children.iter().rev() {
                stack.push((child, child_parent));
            }
        }
    }

    out
}

/// Flat category collection with the lookups the browse flow needs.
/// Rebuilt wholesale on every fetch; never patched incrementally.
#[derive(Debug, Clone, Default)]
pub struct CategoryStore {
    records: Vec<Category>,
}

impl CategoryStore {
    pub fn from_tree(nodes: &[CategoryNode]) -> Self {
        Self {
            records: flatten(nodes),
        }
    }

    pub fn from_records(records: Vec<Category>) -> Self {
        Self { records }
    }

    pub fn all(&self) -> &[Category] {
        &self.records
    }

    pub fn get(&self, id: i64) -> Option<&Category> {
        self.records.iter().find(|c| c.id == id)
    }

    /// Top-level categories, in traversal order.
    pub fn roots(&self) -> Vec<&Category> {
        self.records.iter().filter(|c| c.parent_id.is_none()).collect()
    }

    /// Direct children of `id`, in traversal order.
    pub fn children_of(&self, id: i64) -> Vec<&Category> {
        self.records
            .iter()
            .filter(|c| c.parent_id == Some(id))
            .collect()
    }

    pub fn has_children(&self, id: i64) -> bool {
        self.records.iter().any(|c| c.parent_id == Some(id))
    }

    /// The root ancestor of `id` (itself if it is a root).
    pub fn root_of(&self, id: i64) -> Option<&Category> {
        let mut current = self.get(id)?;
        while let Some(parent_id) = current.parent_id {
            match self.get(parent_id) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Some(current)
    }

    /// `id` plus every descendant, pre-order. A listing is tagged to one
    /// leaf-ish category, so a search scoped to a parent wants this
    /// whole set.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            // Reverse keeps pre-order when popping off the stack
            for child in self.children_of(current).iter().rev() {
                stack.push(child.id);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(id: i64, name: &str) -> CategoryNode {
        CategoryNode {
            id: Some(id),
            name: name.to_string(),
            sub_categories: None,
        }
    }

    fn branch(id: i64, name: &str, children: Vec<CategoryNode>) -> CategoryNode {
        CategoryNode {
            id: Some(id),
            name: name.to_string(),
            sub_categories: Some(children),
        }
    }

    fn sample_tree() -> Vec<CategoryNode> {
        vec![
            branch(
                1,
                "Electronics",
                vec![leaf(11, "Phones"), leaf(12, "Computers")],
            ),
            branch(
                2,
                "Vehicles",
                vec![
                    leaf(21, "Cars"),
                    branch(22, "Motorcycles", vec![leaf(221, "Scooters")]),
                ],
            ),
            leaf(3, "Books"),
        ]
    }

    #[test]
    fn flatten_is_preorder_with_parent_links() {
        let flat = flatten(&sample_tree());
        let ids: Vec<i64> = flat.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 11, 12, 2, 21, 22, 221, 3]);
        assert_eq!(flat[0].parent_id, None);
        assert_eq!(flat[1].parent_id, Some(1));
        assert_eq!(flat[6].parent_id, Some(22));
        assert_eq!(flat[7].parent_id, None);
    }

    #[test]
    fn flatten_already_flat_list_is_identity() {
        let nodes = vec![leaf(1, "A"), leaf(2, "B"), leaf(3, "C")];
        let once = flatten(&nodes);
        assert_eq!(
            once,
            vec![
                Category { id: 1, name: "A".into(), parent_id: None },
                Category { id: 2, name: "B".into(), parent_id: None },
                Category { id: 3, name: "C".into(), parent_id: None },
            ]
        );
    }

    #[test]
    fn duplicate_id_keeps_first_preorder_occurrence() {
        // Shared subcategory: id 9 appears under both roots
        let nodes = vec![
            branch(1, "A", vec![leaf(9, "Shared under A")]),
            branch(2, "B", vec![leaf(9, "Shared under B")]),
        ];
        let flat = flatten(&nodes);
        let nines: Vec<&Category> = flat.iter().filter(|c| c.id == 9).collect();
        assert_eq!(nines.len(), 1);
        assert_eq!(nines[0].name, "Shared under A");
        assert_eq!(nines[0].parent_id, Some(1));
    }

    #[test]
    fn node_without_id_is_skipped_but_children_survive() {
        let nodes = vec![branch(
            1,
            "Root",
            vec![CategoryNode {
                id: None,
                name: "Broken".to_string(),
                sub_categories: Some(vec![leaf(5, "Orphan")]),
            }],
        )];
        let flat = flatten(&nodes);
        let ids: Vec<i64> = flat.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 5]);
        // The orphan links to the nearest ancestor that had an id
        assert_eq!(flat[1].parent_id, Some(1));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(flatten(&[]).is_empty());
    }

    #[test]
    fn children_of_preserves_store_order() {
        let store = CategoryStore::from_tree(&sample_tree());
        let names: Vec<&str> = store.children_of(2).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Cars", "Motorcycles"]);
        assert!(store.has_children(22));
        assert!(!store.has_children(21));
    }

    #[test]
    fn subtree_ids_covers_all_descendants_once() {
        let store = CategoryStore::from_tree(&sample_tree());
        assert_eq!(store.subtree_ids(2), vec![2, 21, 22, 221]);
        assert_eq!(store.subtree_ids(3), vec![3]);
    }

    #[test]
    fn root_of_walks_to_top() {
        let store = CategoryStore::from_tree(&sample_tree());
        assert_eq!(store.root_of(221).map(|c| c.id), Some(2));
        assert_eq!(store.root_of(3).map(|c| c.id), Some(3));
    }
}
