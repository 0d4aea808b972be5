// Data structures shared across the app: wire models for the marketplace
// backend plus the query shape the search pipeline composes.

use serde::{Deserialize, Serialize};

/// The backend serializes collections as `{ "$values": [...] }`. This
/// wrapper keeps that quirk out of every call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueList<T> {
    #[serde(rename = "$values", default = "Vec::new")]
    pub values: Vec<T>,
}

impl<T> Default for ValueList<T> {
    fn default() -> Self {
        Self { values: Vec::new() }
    }
}

impl<T> From<Vec<T>> for ValueList<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

// --- Categories ---

/// One node of the nested category tree as the backend sends it.
/// `id` stays optional: malformed nodes are skipped during flattening
/// rather than failing the whole payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryNode {
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sub_categories: Option<Vec<CategoryNode>>,
}

/// Flattened category record used for all client-side lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

// --- Listings ---

/// A listing as it appears in search results and favorites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdListing {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub seller_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub distance: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub image_urls: ValueList<String>,
}

/// Vehicle-domain attribute block, present on detail responses for
/// listings under the vehicles root category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDetails {
    pub kilometres: Option<u32>,
    pub model_year: Option<u32>,
    pub engine_power: Option<String>,
    pub engine_size: Option<String>,
    pub body_type: Option<String>,
    pub transmission: Option<String>,
    pub fuel_type: Option<String>,
}

/// Full detail payload for a single listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: AdListing,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub vehicle: Option<VehicleDetails>,
}

/// Composed backend query for a listing search. Built exclusively by
/// `filter::build_query`; `category_ids` is already the descendant union.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub category_ids: Vec<i64>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub keyword: Option<String>,
    /// Flattened attribute filters, e.g. ("yearMin", "2015"),
    /// ("transmission", "Automatic"). Keys come from the schema registry.
    pub attributes: Vec<(String, String)>,
}

impl ListingQuery {
    /// Query-string pairs for one backend call scoped to `category_id`.
    /// The category union is fanned out by the caller, one call per id.
    pub fn to_query_pairs(&self, category_id: Option<i64>) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(id) = category_id {
            pairs.push(("categoryId".to_string(), id.to_string()));
        }
        if let Some(min) = self.price_min {
            pairs.push(("priceMin".to_string(), min.to_string()));
        }
        if let Some(max) = self.price_max {
            pairs.push(("priceMax".to_string(), max.to_string()));
        }
        if let Some(ref keyword) = self.keyword {
            pairs.push(("q".to_string(), keyword.clone()));
        }
        for (key, value) in &self.attributes {
            pairs.push((key.clone(), value.clone()));
        }
        pairs
    }
}

/// A new listing as submitted from the add-advert flow. Validated by
/// `validation::validate_new_listing` before it touches the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub category_id: Option<i64>,
    pub sub_category_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub price: Option<f64>,
    pub address: String,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

// --- Users & auth ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Profile payload from GET /api/users/me; `myAds` carries the caller's
/// own listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub my_ads: ValueList<AdListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}
