// Handlers for the JSON API the device UI talks to

use axum::{
    extract::{Json as JsonExtract, Path, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth_middleware::BearerSession,
    category::CategoryStore,
    error::AppError,
    filter::{AttributeKind, FilterCriteria, build_query},
    models::{AdListing, NewListing, StatusUpdate},
    search::fetch_matching,
    validation,
};

// --- Response wrappers ---

#[derive(Serialize)]
struct GenericResponse {
    success: bool,
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    count: usize,
    listings: Vec<AdListing>,
}

// --- Request structs ---

#[derive(Deserialize)]
pub struct EmailUpdate {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneUpdate {
    phone_number: String,
}

// --- Categories ---

/// Flat category list from the in-memory store. The tree itself was
/// fetched at startup; this never touches the backend.
pub async fn get_categories(State(app_state): State<AppState>) -> impl IntoResponse {
    let store = app_state.categories.read().await;
    Json(store.all().to_vec())
}

/// Manual refresh: re-fetch the tree and replace the store wholesale.
pub async fn refresh_categories(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let tree = app_state.backend.fetch_category_tree().await?;
    let fresh = CategoryStore::from_tree(&tree);
    let flat = fresh.all().to_vec();
    *app_state.categories.write().await = fresh;
    tracing::info!(count = flat.len(), "Category store refreshed");
    Ok(Json(flat))
}

/// The extra filterable fields for the domain `category_id` belongs to,
/// so the filter sheet can render them without hardcoding any domain.
pub async fn get_filter_fields(
    State(app_state): State<AppState>,
    Path(category_id): Path<i64>,
) -> impl IntoResponse {
    let store = app_state.categories.read().await;
    let fields = store
        .root_of(category_id)
        .map(|root| app_state.schemas.fields_for(root.id))
        .unwrap_or(&[]);
    let payload: Vec<serde_json::Value> = fields
        .iter()
        .map(|field| {
            let (kind, options) = match field.kind {
                AttributeKind::Range => ("range", None),
                AttributeKind::SingleSelect(options) => ("singleSelect", Some(options)),
                AttributeKind::MultiSelect(options) => ("multiSelect", Some(options)),
            };
            serde_json::json!({
                "key": field.key,
                "label": field.label,
                "kind": kind,
                "options": options,
            })
        })
        .collect();
    Json(payload)
}

// --- Listings ---

/// Composed search over the current filter criteria. The path is
/// re-validated against the store before anything is fetched: clients
/// can only narrow along real parent/child edges.
pub async fn search_listings(
    State(app_state): State<AppState>,
    JsonExtract(criteria): JsonExtract<FilterCriteria>,
) -> Result<impl IntoResponse, AppError> {
    let store = app_state.categories.read().await;

    let mut checked = FilterCriteria::default();
    for id in criteria.path() {
        checked = checked.select_category(&store, *id)?;
    }
    let criteria = checked
        .set_keyword(criteria.keyword())
        .merge_scalars(&criteria)?;

    let query = build_query(&criteria, &store, &app_state.schemas);
    tracing::info!(
        categories = query.category_ids.len(),
        keyword = ?query.keyword,
        "Search request"
    );
    let listings = fetch_matching(&app_state.backend, &query).await?;
    Ok(Json(SearchResponse {
        count: listings.len(),
        listings,
    }))
}

pub async fn get_listing(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.backend.fetch_listing_detail(id).await?;
    Ok(Json(detail))
}

/// New listing submission. Validation runs first; the backend is only
/// called with input that already passed the posting rules.
pub async fn create_listing(
    State(app_state): State<AppState>,
    session: BearerSession,
    JsonExtract(listing): JsonExtract<NewListing>,
) -> Result<impl IntoResponse, AppError> {
    {
        let store = app_state.categories.read().await;
        validation::validate_new_listing(&listing, &store)?;
    }
    let created = app_state
        .backend
        .create_listing(&session.token, &listing)
        .await?;
    tracing::info!(id = created.listing.id, "Listing created");
    Ok(Json(created))
}

// --- Favorites ---

pub async fn get_favorites(
    State(app_state): State<AppState>,
    session: BearerSession,
) -> Result<impl IntoResponse, AppError> {
    let favorites = app_state.backend.fetch_favorites(&session.token).await?;
    Ok(Json(favorites))
}

pub async fn add_favorite(
    State(app_state): State<AppState>,
    session: BearerSession,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.backend.add_favorite(&session.token, id).await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Added to favorites".to_string()),
    }))
}

pub async fn remove_favorite(
    State(app_state): State<AppState>,
    session: BearerSession,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.backend.remove_favorite(&session.token, id).await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Removed from favorites".to_string()),
    }))
}

// --- Own ads ---

pub async fn get_my_ads(
    State(app_state): State<AppState>,
    session: BearerSession,
) -> Result<impl IntoResponse, AppError> {
    let profile = app_state.backend.fetch_profile(&session.token).await?;
    Ok(Json(profile.my_ads.values))
}

pub async fn update_ad_status(
    State(app_state): State<AppState>,
    session: BearerSession,
    Path(id): Path<i64>,
    JsonExtract(update): JsonExtract<StatusUpdate>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .backend
        .update_listing_status(&session.token, id, &update.status)
        .await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Status updated".to_string()),
    }))
}

pub async fn delete_ad(
    State(app_state): State<AppState>,
    session: BearerSession,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.backend.delete_listing(&session.token, id).await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Listing deleted".to_string()),
    }))
}

// --- Profile ---

pub async fn update_email(
    State(app_state): State<AppState>,
    session: BearerSession,
    JsonExtract(update): JsonExtract<EmailUpdate>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .backend
        .update_email(&session.token, &update.email)
        .await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Email updated".to_string()),
    }))
}

pub async fn update_phone(
    State(app_state): State<AppState>,
    session: BearerSession,
    JsonExtract(update): JsonExtract<PhoneUpdate>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .backend
        .update_phone(&session.token, &update.phone_number)
        .await?;
    Ok(Json(GenericResponse {
        success: true,
        message: Some("Phone number updated".to_string()),
    }))
}
