// Extractor for actions that need an identity. The token is opaque to
// this app: the backend issued it and the backend judges it. All we do
// is find one (request header first, then the on-device credential
// store) and forward it; a guest with neither gets routed to sign-in.

use axum::{
    RequestPartsExt, async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::AppState;
use crate::error::AppError;

/// A bearer token to forward to the backend. Presence only; validity is
/// the backend's call.
#[derive(Clone)]
pub struct BearerSession {
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerSession
where
    S: Send + Sync,
    AppState: FromRef<S>, // Require that AppState can be extracted from S
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // An explicit Authorization header wins
        if let Ok(TypedHeader(Authorization(bearer))) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
        {
            return Ok(BearerSession {
                token: bearer.token().to_string(),
            });
        }

        // Otherwise fall back to the persisted token from a prior login
        let app_state = AppState::from_ref(state);
        match app_state.credentials.load_token() {
            Ok(Some(token)) => Ok(BearerSession { token }),
            Ok(None) => Err(AppError::Unauthorized(
                "Sign in to use this feature".to_string(),
            )),
            Err(e) => {
                // A broken credential file is guest mode, not a crash
                tracing::warn!("Failed to read stored credentials: {:?}", e);
                Err(AppError::Unauthorized(
                    "Sign in to use this feature".to_string(),
                ))
            }
        }
    }
}
