use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::AppState;
use crate::error::AppError;

// Define the template struct pointing to our landing page file
#[derive(Template)]
#[template(path = "landing.html")]
struct LandingTemplate;

// Define the template struct for the login page
#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate;

// Define the template struct for the main app page
#[derive(Template)]
#[template(path = "index.html")]
struct AppTemplate {
    signed_in: bool,
}

// Handler function to render the landing page
pub async fn landing_page() -> Result<impl IntoResponse, AppError> {
    let template = LandingTemplate {};
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render landing template: {}", e);
            Err(AppError::Internal(anyhow::Error::new(e)))
        }
    }
}

// Handler function to render the login page
pub async fn login_page() -> Result<impl IntoResponse, AppError> {
    let template = LoginTemplate {};
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render login template: {}", e);
            Err(AppError::Internal(anyhow::Error::new(e)))
        }
    }
}

// Handler function to render the main application page. Guests get the
// browse surface too; only authenticated actions redirect to sign-in.
pub async fn app_page(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let signed_in = matches!(app_state.credentials.load_token(), Ok(Some(_)));

    let template = AppTemplate { signed_in };
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render app template: {}", e);
            Err(AppError::Internal(anyhow::Error::new(e)))
        }
    }
}
