// Typed client for the marketplace backend REST API. Every function maps
// to one backend endpoint; auth-requiring calls take the bearer token the
// caller read from the credential store.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tokio::time::{Duration, sleep};

use crate::error::{AppError, AppResult};
use crate::models::{
    AdListing, AuthResponse, CategoryNode, ListingDetail, ListingQuery, LoginRequest, NewListing,
    RegisterRequest, StatusUpdate, UserProfile, ValueList,
};
use crate::search::ListingSource;

const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 500;

#[derive(Clone)]
pub struct BackendClient {
    http: Arc<Client>,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: Arc<Client>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(request: RequestBuilder, token: &str) -> RequestBuilder {
        request.bearer_auth(token)
    }

    // --- Categories ---

    /// Fetches the full nested category tree. Called at startup and on
    /// manual refresh; the result supersedes the previous tree wholesale.
    pub async fn fetch_category_tree(&self) -> AppResult<Vec<CategoryNode>> {
        let response = self
            .http
            .get(self.url("/api/categories"))
            .send()
            .await?
            .error_for_status()?;
        let tree: ValueList<CategoryNode> = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("category payload did not parse: {}", e))
        })?;
        tracing::info!("Fetched category tree with {} top-level nodes", tree.values.len());
        Ok(tree.values)
    }

    // --- Listings ---

    /// One search call, scoped to a single category id (unscoped when
    /// None). Retries transient failures with exponential backoff; gives
    /// up after MAX_RETRIES so a flaky backend degrades to the stale view
    /// instead of hanging the caller.
    pub async fn search_listings(
        &self,
        query: &ListingQuery,
        category_id: Option<i64>,
    ) -> AppResult<Vec<AdListing>> {
        let pairs = query.to_query_pairs(category_id);
        let mut retry_delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            let outcome = self
                .http
                .get(self.url("/api/ad-listings"))
                .query(&pairs)
                .send()
                .await;
            match outcome {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => {
                        let listings: ValueList<AdListing> = response.json().await.map_err(|e| {
                            AppError::BackendUnavailable(format!(
                                "listing payload did not parse: {}",
                                e
                            ))
                        })?;
                        tracing::debug!(
                            category_id,
                            count = listings.values.len(),
                            "Listing search call complete"
                        );
                        return Ok(listings.values);
                    }
                    Err(e) if e.status().map(|s| s.is_server_error()).unwrap_or(false) => {
                        tracing::warn!(attempt, error = %e, "Server error from listing search. Retrying...");
                        last_error = Some(AppError::from(e));
                    }
                    Err(e) => return Err(e.into()),
                },
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Network error during listing search. Retrying...");
                    last_error = Some(AppError::from(e));
                }
            }
            sleep(retry_delay).await;
            retry_delay *= 2;
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::BackendUnavailable("listing search failed with no response".to_string())
        }))
    }

    pub async fn fetch_listing_detail(&self, id: i64) -> AppResult<ListingDetail> {
        let response = self
            .http
            .get(self.url(&format!("/api/ad-listings/{}", id)))
            .send()
            .await?
            .error_for_status()?;
        let detail = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("listing detail did not parse: {}", e))
        })?;
        Ok(detail)
    }

    pub async fn create_listing(&self, token: &str, listing: &NewListing) -> AppResult<ListingDetail> {
        let request = self.http.post(self.url("/api/ad-listings")).json(listing);
        let response = Self::bearer(request, token).send().await?.error_for_status()?;
        let created = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("create response did not parse: {}", e))
        })?;
        Ok(created)
    }

    pub async fn delete_listing(&self, token: &str, id: i64) -> AppResult<()> {
        let request = self.http.delete(self.url(&format!("/api/ad-listings/{}", id)));
        Self::bearer(request, token).send().await?.error_for_status()?;
        Ok(())
    }

    /// Own-ad status toggle. Note the different path stem: this is what
    /// the backend actually exposes.
    pub async fn update_listing_status(&self, token: &str, id: i64, status: &str) -> AppResult<()> {
        let request = self
            .http
            .put(self.url(&format!("/api/adverts/{}/status", id)))
            .json(&StatusUpdate { status: status.to_string() });
        Self::bearer(request, token).send().await?.error_for_status()?;
        Ok(())
    }

    // --- Users & favorites ---

    pub async fn fetch_profile(&self, token: &str) -> AppResult<UserProfile> {
        let request = self.http.get(self.url("/api/users/me"));
        let response = Self::bearer(request, token).send().await?.error_for_status()?;
        let profile = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("profile payload did not parse: {}", e))
        })?;
        Ok(profile)
    }

    pub async fn fetch_favorites(&self, token: &str) -> AppResult<Vec<AdListing>> {
        let request = self.http.get(self.url("/api/users/me/favorites"));
        let response = Self::bearer(request, token).send().await?.error_for_status()?;
        let favorites: ValueList<AdListing> = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("favorites payload did not parse: {}", e))
        })?;
        Ok(favorites.values)
    }

    pub async fn add_favorite(&self, token: &str, listing_id: i64) -> AppResult<()> {
        let request = self
            .http
            .post(self.url(&format!("/api/favorites/add/{}", listing_id)));
        Self::bearer(request, token).send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn remove_favorite(&self, token: &str, listing_id: i64) -> AppResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/api/favorites/remove/{}", listing_id)));
        Self::bearer(request, token).send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn update_email(&self, token: &str, email: &str) -> AppResult<()> {
        let request = self
            .http
            .post(self.url("/api/users/update-email"))
            .json(&serde_json::json!({ "email": email }));
        Self::bearer(request, token).send().await?.error_for_status()?;
        Ok(())
    }

    pub async fn update_phone(&self, token: &str, phone_number: &str) -> AppResult<()> {
        let request = self
            .http
            .post(self.url("/api/users/update-phone"))
            .json(&serde_json::json!({ "phoneNumber": phone_number }));
        Self::bearer(request, token).send().await?.error_for_status()?;
        Ok(())
    }

    // --- Auth ---

    /// Exchanges credentials for a bearer token. A 401 here means wrong
    /// credentials, which callers surface as a sign-in problem rather
    /// than a backend outage.
    pub async fn login(&self, request: &LoginRequest) -> AppResult<AuthResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(request)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let body: AuthResponse = response.json().await.unwrap_or(AuthResponse {
                token: None,
                message: None,
            });
            let message = body
                .message
                .unwrap_or_else(|| "invalid email or password".to_string());
            return Err(AppError::Unauthorized(message));
        }
        let response = response.error_for_status()?;
        let auth = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("login response did not parse: {}", e))
        })?;
        Ok(auth)
    }

    pub async fn register(&self, request: &RegisterRequest) -> AppResult<AuthResponse> {
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        let auth = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("register response did not parse: {}", e))
        })?;
        Ok(auth)
    }

    pub async fn resend_code(&self, email: &str) -> AppResult<()> {
        self.http
            .post(self.url("/api/auth/resend-code"))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// The browse orchestrator talks to the backend through this seam.
#[async_trait]
impl ListingSource for BackendClient {
    async fn fetch_scoped(
        &self,
        query: &ListingQuery,
        category_id: Option<i64>,
    ) -> AppResult<Vec<AdListing>> {
        self.search_listings(query, category_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = BackendClient::new(Arc::new(Client::new()), "http://localhost:5140/");
        assert_eq!(client.url("/api/categories"), "http://localhost:5140/api/categories");
    }
}
