use axum::{
    extract::{Form, Json as JsonExtract, State},
    response::{IntoResponse, Json, Redirect},
};
use serde::Deserialize;

use crate::{
    AppState,
    error::AppError,
    models::{LoginRequest, RegisterRequest},
    validation,
};

#[derive(Deserialize)]
pub struct ResendCodeRequest {
    email: String,
}

// Handler for POST /login
// Exchanges the form credentials for a backend token and persists it, so
// later authenticated calls can run without re-entering credentials.
pub async fn handle_login(
    State(app_state): State<AppState>,
    Form(form): Form<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("Login attempt for {}", form.email);

    let auth = app_state.backend.login(&form).await?;
    let token = auth.token.ok_or_else(|| {
        AppError::Unauthorized(
            auth.message
                .unwrap_or_else(|| "Login failed, check your credentials".to_string()),
        )
    })?;

    if let Err(e) = app_state.credentials.save_token(&token) {
        // The session still works for this process; only persistence failed
        tracing::warn!("Failed to persist token: {:?}", e);
    }

    Ok(Redirect::to("/app"))
}

// Handler for POST /logout: back to guest mode
pub async fn handle_logout(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(e) = app_state.credentials.clear() {
        tracing::warn!("Failed to clear stored credentials: {:?}", e);
    }
    Ok(Redirect::to("/"))
}

// Handler for POST /register: validate locally first, then forward
pub async fn handle_register(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_registration(&request)?;
    let auth = app_state.backend.register(&request).await?;
    tracing::info!("Registration submitted for {}", request.email);
    Ok(Json(auth))
}

// Handler for POST /register/resend: verification code re-delivery
pub async fn handle_resend_code(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<ResendCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_state.backend.resend_code(&request.email).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
