use anyhow::{Context, Result};
use axum::{Router, extract::FromRef};
use reqwest::Client;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::category::CategoryStore;
use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::filter::SchemaRegistry;
use crate::marketplace_api::BackendClient;
use crate::routes::BrowseRegistry;

// Declare modules
mod auth_middleware;
mod category;
mod config;
mod credentials;
mod error;
mod filter;
mod marketplace_api;
mod models;
mod routes;
mod search;
mod validation;

// Shared application state handed to every handler
#[derive(Clone, FromRef)]
struct AppState {
    settings: Arc<Settings>,
    backend: BackendClient,
    categories: Arc<RwLock<CategoryStore>>,
    schemas: Arc<SchemaRegistry>,
    credentials: CredentialStore,
    browse: BrowseRegistry,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admarket_rust=info,tower_http=info".into()),
        )
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing AdMarket Rust server...");

    // Load configuration
    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let shared_settings = Arc::new(settings);

    // Shared HTTP client for all backend calls
    let http_client = Arc::new(
        Client::builder()
            .user_agent(concat!("admarket-rust/", env!("CARGO_PKG_VERSION")))
            .timeout(shared_settings.request_timeout())
            .build()
            .context("Failed to build shared reqwest client")?,
    );
    tracing::info!("Shared HTTP client created.");

    let backend = BackendClient::new(Arc::clone(&http_client), shared_settings.backend_url.clone());

    // Populate the category store once at startup (the screen-mount
    // fetch). A failure here is transient like any other: start with an
    // empty store and let the manual refresh route repopulate it.
    let categories = match backend.fetch_category_tree().await {
        Ok(tree) => CategoryStore::from_tree(&tree),
        Err(e) => {
            tracing::warn!("Could not fetch categories at startup: {}", e);
            CategoryStore::default()
        }
    };

    let app_state = AppState {
        schemas: Arc::new(SchemaRegistry::with_vehicles_at(
            shared_settings.vehicles_category_id,
        )),
        credentials: CredentialStore::new(&shared_settings.credentials_file),
        settings: Arc::clone(&shared_settings),
        backend,
        categories: Arc::new(RwLock::new(categories)),
        browse: BrowseRegistry::default(),
    };

    let router: Router = routes::create_router(app_state.clone());

    // Combine the router with static file serving
    let app = router
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Parse the server address from settings
    let addr: SocketAddr = match app_state.settings.server_address.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(
                "Invalid server address format in configuration ('{}'): {}",
                app_state.settings.server_address,
                e
            );
            return Err(anyhow::anyhow!(
                "Invalid server address format: {}",
                shared_settings.server_address
            ));
        }
    };

    // Create a TCP listener
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    // Run the server
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
