// Filter state for the browse flow: the category drill-down path, the
// scalar filter set, and the pure composition of both into one backend
// query. The criteria object is an immutable value: every transition
// returns a new one, so there is no "which flags are currently
// relevant" bookkeeping anywhere else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::CategoryStore;
use crate::error::AppError;
use crate::models::ListingQuery;
use crate::validation::FieldError;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FilterError {
    #[error("unknown category id {0}")]
    UnknownCategory(i64),
    #[error("category {0} is not selectable at the current level")]
    NotSelectableHere(i64),
    #[error("minimum price exceeds maximum price")]
    InvalidPriceRange,
}

impl From<FilterError> for AppError {
    fn from(error: FilterError) -> Self {
        let field = match error {
            FilterError::InvalidPriceRange => "priceRange",
            _ => "category",
        };
        AppError::Validation(vec![FieldError::new(field, error.to_string())])
    }
}

// --- Attribute schemas ---

/// How one filterable attribute is entered and sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Numeric min/max pair, sent as `<key>Min` / `<key>Max`.
    Range,
    /// One value out of a fixed list, sent as `<key>=<value>`.
    SingleSelect(&'static [&'static str]),
    /// Any subset of a fixed list, sent as repeated `<key>=<value>` pairs.
    MultiSelect(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: AttributeKind,
}

/// Extra filterable fields for listings under the vehicles root. New
/// domains add a schema here instead of new branches in `build_query`.
pub static VEHICLE_FIELDS: &[AttributeField] = &[
    AttributeField { key: "year", label: "Model year", kind: AttributeKind::Range },
    AttributeField { key: "odometer", label: "Kilometres", kind: AttributeKind::Range },
    AttributeField {
        key: "transmission",
        label: "Transmission",
        kind: AttributeKind::SingleSelect(&["Manual", "Automatic", "Semi-automatic"]),
    },
    AttributeField {
        key: "fuelType",
        label: "Fuel type",
        kind: AttributeKind::SingleSelect(&["Petrol", "Diesel", "Hybrid", "Electric", "LPG"]),
    },
    AttributeField {
        key: "bodyType",
        label: "Body type",
        kind: AttributeKind::MultiSelect(&[
            "Sedan", "Hatchback", "SUV", "Coupe", "Pickup", "Van",
        ]),
    },
];

/// Per-root-category attribute schemas, looked up by root category id.
/// Roots without an entry simply have no extra fields.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    by_root: BTreeMap<i64, &'static [AttributeField]>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock registry: just the vehicles domain, at the root id the
    /// backend uses for it.
    pub fn with_vehicles_at(root_id: i64) -> Self {
        let mut registry = Self::new();
        registry.register(root_id, VEHICLE_FIELDS);
        registry
    }

    pub fn register(&mut self, root_id: i64, fields: &'static [AttributeField]) {
        self.by_root.insert(root_id, fields);
    }

    pub fn fields_for(&self, root_id: i64) -> &[AttributeField] {
        self.by_root.get(&root_id).copied().unwrap_or(&[])
    }

    fn field(&self, root_id: i64, key: &str) -> Option<&AttributeField> {
        self.fields_for(root_id).iter().find(|f| f.key == key)
    }
}

/// A value the user picked for one schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", untagged)]
pub enum AttributeValue {
    Range { min: Option<f64>, max: Option<f64> },
    Single(String),
    Multi(Vec<String>),
}

// --- Filter criteria ---

/// The complete filter state behind the browse surface. `path` is the
/// drill-down chain (index 0 = top level, each entry a child of the one
/// before it); everything else is the scalar filter set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    #[serde(default)]
    path: Vec<i64>,
    #[serde(default)]
    price_min: Option<f64>,
    #[serde(default)]
    price_max: Option<f64>,
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    attributes: BTreeMap<String, AttributeValue>,
}

impl FilterCriteria {
    pub fn path(&self) -> &[i64] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn selected_leaf(&self) -> Option<i64> {
        self.path.last().copied()
    }

    /// Selecting `candidate` extends or replaces the path at the level
    /// the candidate belongs to: a child of the current leaf descends
    /// one level, a root restarts the path, and a child of any ancestor
    /// already on the path replaces everything below that ancestor
    /// (sibling switches at the current level). Anything else is
    /// unreachable from the drill-down UI and rejected.
    pub fn select_category(
        &self,
        store: &CategoryStore,
        candidate: i64,
    ) -> Result<Self, FilterError> {
        let record = store
            .get(candidate)
            .ok_or(FilterError::UnknownCategory(candidate))?;
        let path = match record.parent_id {
            None => vec![candidate],
            Some(parent) => {
                let position = self
                    .path
                    .iter()
                    .position(|&id| id == parent)
                    .ok_or(FilterError::NotSelectableHere(candidate))?;
                let mut path = self.path[..=position].to_vec();
                path.push(candidate);
                path
            }
        };
        let mut next = self.clone();
        next.path = path;
        Ok(next)
    }

    /// Truncates the path by one level. A no-op at the root; never errors.
    pub fn go_back(&self) -> Self {
        let mut next = self.clone();
        next.path.pop();
        next
    }

    /// Drill-down is complete when the selected leaf has nothing below it.
    pub fn selection_complete(&self, store: &CategoryStore) -> bool {
        match self.selected_leaf() {
            Some(leaf) => !store.has_children(leaf),
            None => false,
        }
    }

    pub fn set_keyword(&self, keyword: &str) -> Self {
        let mut next = self.clone();
        next.keyword = keyword.to_string();
        next
    }

    pub fn set_price_range(
        &self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Self, FilterError> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(FilterError::InvalidPriceRange);
            }
        }
        let mut next = self.clone();
        next.price_min = min;
        next.price_max = max;
        Ok(next)
    }

    pub fn set_attribute(&self, key: &str, value: AttributeValue) -> Self {
        let mut next = self.clone();
        next.attributes.insert(key.to_string(), value);
        next
    }

    pub fn clear_attribute(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.attributes.remove(key);
        next
    }

    /// Adopts another criteria's scalar set (price and attributes),
    /// re-checking the price bounds. Used when criteria arrive over the
    /// wire and cannot be trusted to have gone through `set_price_range`.
    pub fn merge_scalars(&self, other: &FilterCriteria) -> Result<Self, FilterError> {
        let mut next = self.set_price_range(other.price_min, other.price_max)?;
        next.attributes = other.attributes.clone();
        Ok(next)
    }

    /// Clears the scalar filter set (price, keyword, attributes). The
    /// drill-down path is navigation state and survives a reset.
    pub fn reset(&self) -> Self {
        Self {
            path: self.path.clone(),
            ..Self::default()
        }
    }
}

/// Pure composition of the current criteria into one backend query.
/// The category scope is the union of the selected leaf and all its
/// descendants: a listing is tagged to exactly one leaf-ish category,
/// and a user selecting a parent expects everything beneath it.
pub fn build_query(
    criteria: &FilterCriteria,
    store: &CategoryStore,
    schemas: &SchemaRegistry,
) -> ListingQuery {
    let category_ids = match criteria.selected_leaf() {
        Some(leaf) => store.subtree_ids(leaf),
        None => Vec::new(),
    };

    let keyword = {
        let trimmed = criteria.keyword.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    };

    // Attribute filters only apply when the drill-down sits under a root
    // with a registered schema; anything else is dropped here.
    let mut attributes = Vec::new();
    if let Some(root) = criteria
        .path
        .first()
        .and_then(|first| store.root_of(*first))
    {
        for (key, value) in &criteria.attributes {
            let Some(field) = schemas.field(root.id, key) else {
                tracing::debug!(%key, root = root.id, "Dropping attribute with no schema field");
                continue;
            };
            match (field.kind, value) {
                (AttributeKind::Range, AttributeValue::Range { min, max }) => {
                    if let Some(lo) = min {
                        attributes.push((format!("{}Min", field.key), lo.to_string()));
                    }
                    if let Some(hi) = max {
                        attributes.push((format!("{}Max", field.key), hi.to_string()));
                    }
                }
                (AttributeKind::SingleSelect(_), AttributeValue::Single(choice)) => {
                    attributes.push((field.key.to_string(), choice.clone()));
                }
                (AttributeKind::MultiSelect(_), AttributeValue::Multi(choices)) => {
                    for choice in choices {
                        attributes.push((field.key.to_string(), choice.clone()));
                    }
                }
                _ => {
                    tracing::debug!(%key, "Attribute value does not match its schema kind, dropping");
                }
            }
        }
    }

    ListingQuery {
        category_ids,
        price_min: criteria.price_min,
        price_max: criteria.price_max,
        keyword,
        attributes,
    }
}
