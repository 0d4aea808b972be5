// Route definitions

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::AppState;

// Declare submodules for different route groups
mod api;
mod auth;
mod browse;
mod static_pages;

pub use browse::BrowseRegistry;

pub fn create_router(app_state: AppState) -> Router {
    // JSON API the device UI drives. Favorites, own ads and profile
    // edits require a bearer token; the rest works for guests.
    let api_router = Router::new()
        .route("/categories", get(api::get_categories))
        .route("/categories/refresh", post(api::refresh_categories))
        .route("/filters/:id", get(api::get_filter_fields))
        .route("/search", post(api::search_listings))
        // Stateful browse surface: one session per mounted screen
        .route("/browse", post(browse::open_session))
        .route(
            "/browse/:id",
            get(browse::get_session).delete(browse::close_session),
        )
        .route("/browse/:id/select", post(browse::select_category))
        .route("/browse/:id/back", post(browse::go_back))
        .route("/browse/:id/keyword", post(browse::set_keyword))
        .route("/browse/:id/price", post(browse::set_price))
        .route("/browse/:id/attribute", post(browse::set_attribute))
        .route("/browse/:id/apply", post(browse::apply_filters))
        .route("/browse/:id/reset", post(browse::reset_filters))
        .route("/listings", post(api::create_listing))
        .route("/listings/:id", get(api::get_listing))
        .route("/favorites", get(api::get_favorites))
        .route("/favorites/:id", post(api::add_favorite))
        .route("/favorites/:id", delete(api::remove_favorite))
        .route("/my-ads", get(api::get_my_ads))
        .route("/my-ads/:id/status", put(api::update_ad_status))
        .route("/my-ads/:id", delete(api::delete_ad))
        .route("/profile/email", post(api::update_email))
        .route("/profile/phone", post(api::update_phone))
        .with_state(app_state.clone());

    Router::new()
        // Static page routes
        .route("/", get(static_pages::landing_page))
        .route("/login", get(static_pages::login_page))
        .route("/app", get(static_pages::app_page))
        // Auth routes
        .route("/login", post(auth::handle_login))
        .route("/logout", post(auth::handle_logout))
        .route("/register", post(auth::handle_register))
        .route("/register/resend", post(auth::handle_resend_code))
        // Nest the API router which already has state
        .nest("/api", api_router)
        .with_state(app_state)
}
