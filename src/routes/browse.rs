// Stateful browse surface: one BrowseSession per mounted screen. The
// session owns the drill-down state, the keyword debounce, and the
// request sequencing; these handlers only map HTTP calls onto its
// transitions and return a render snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json as JsonExtract, Path, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::AppError,
    filter::AttributeValue,
    marketplace_api::BackendClient,
    models::{AdListing, Category},
    search::{BrowseSession, FetchPhase},
};

/// Live browse sessions keyed by an opaque id the shell holds on to.
/// A session that is never closed just sits here idle; the map is only
/// as big as the number of open screens.
#[derive(Clone, Default)]
pub struct BrowseRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, BrowseSession<BackendClient>>>,
}

impl BrowseRegistry {
    fn insert(&self, session: BrowseSession<BackendClient>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.sessions.lock().unwrap().insert(id, session);
        id
    }

    /// Runs `f` against the session, or 404s for ids that were closed or
    /// never existed. The lock is only held for the synchronous
    /// transition; fetches run on their own tasks.
    fn with<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut BrowseSession<BackendClient>) -> T,
    ) -> Result<T, AppError> {
        let mut sessions = self.inner.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("browse session {}", id)))?;
        Ok(f(session))
    }

    fn remove(&self, id: u64) -> Option<BrowseSession<BackendClient>> {
        self.inner.sessions.lock().unwrap().remove(&id)
    }
}

// --- Request / response shapes ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrowseView {
    phase: &'static str,
    error: Option<String>,
    no_results: bool,
    listings: Vec<AdListing>,
    path: Vec<i64>,
    keyword: String,
    candidates: Vec<Category>,
    selection_complete: bool,
}

fn view(session: &BrowseSession<BackendClient>) -> BrowseView {
    let snapshot = session.snapshot();
    let (phase, error) = match &snapshot.phase {
        FetchPhase::Idle => ("idle", None),
        FetchPhase::Loading => ("loading", None),
        FetchPhase::Loaded => ("loaded", None),
        FetchPhase::Failed(message) => ("failed", Some(message.clone())),
    };
    BrowseView {
        phase,
        error,
        no_results: snapshot.no_results(),
        listings: snapshot.listings,
        path: snapshot.criteria.path().to_vec(),
        keyword: snapshot.criteria.keyword().to_string(),
        candidates: session.candidates(),
        selection_complete: session.selection_complete(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    category_id: i64,
}

#[derive(Deserialize)]
pub struct KeywordRequest {
    keyword: String,
}

#[derive(Deserialize)]
pub struct PriceRequest {
    min: Option<f64>,
    max: Option<f64>,
}

/// A null/absent value clears the attribute.
#[derive(Deserialize)]
pub struct AttributeRequest {
    key: String,
    value: Option<AttributeValue>,
}

// --- Handlers ---

/// Screen mount: snapshot the current category store into a new session
/// and kick off the initial listing load.
pub async fn open_session(State(app_state): State<AppState>) -> impl IntoResponse {
    let store = Arc::new(app_state.categories.read().await.clone());
    let mut session = BrowseSession::new(
        Arc::new(app_state.backend.clone()),
        store,
        Arc::clone(&app_state.schemas),
        app_state.settings.search_debounce(),
    );
    session.refresh();
    let id = app_state.browse.insert(session);
    tracing::info!(id, "Browse session opened");
    Json(serde_json::json!({ "sessionId": id }))
}

pub async fn get_session(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| Json(view(session)))
}

pub async fn select_category(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
    JsonExtract(request): JsonExtract<SelectRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        session.select_category(request.category_id)?;
        Ok::<_, AppError>(Json(view(session)))
    })?
}

pub async fn go_back(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        session.go_back();
        Json(view(session))
    })
}

/// Keystroke path: the returned snapshot already shows the client-side
/// narrowed set; the debounced backend fetch lands later and is picked
/// up by the next poll.
pub async fn set_keyword(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
    JsonExtract(request): JsonExtract<KeywordRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        session.set_keyword(&request.keyword);
        Json(view(session))
    })
}

pub async fn set_price(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
    JsonExtract(request): JsonExtract<PriceRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        session.set_price_range(request.min, request.max)?;
        Ok::<_, AppError>(Json(view(session)))
    })?
}

pub async fn set_attribute(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
    JsonExtract(request): JsonExtract<AttributeRequest>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        match request.value {
            Some(value) => session.set_attribute(&request.key, value),
            None => session.clear_attribute(&request.key),
        }
        Json(view(session))
    })
}

pub async fn apply_filters(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        session.apply();
        Json(view(session))
    })
}

pub async fn reset_filters(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.browse.with(id, |session| {
        session.reset();
        Json(view(session))
    })
}

/// Screen unmount. Closing drops late completions; closing twice (or an
/// id that never existed) is a harmless no-op.
pub async fn close_session(
    State(app_state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    if let Some(mut session) = app_state.browse.remove(id) {
        session.close();
        tracing::info!(id, "Browse session closed");
    }
    Json(serde_json::json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;
    use tokio::time::Duration;

    use crate::category::CategoryStore;
    use crate::filter::SchemaRegistry;

    fn idle_session() -> BrowseSession<BackendClient> {
        let backend = BackendClient::new(Arc::new(Client::new()), "http://localhost:5140");
        BrowseSession::new(
            Arc::new(backend),
            Arc::new(CategoryStore::default()),
            Arc::new(SchemaRegistry::new()),
            Duration::from_millis(400),
        )
    }

    #[tokio::test]
    async fn registry_hands_out_distinct_ids() {
        let registry = BrowseRegistry::default();
        let first = registry.insert(idle_session());
        let second = registry.insert(idle_session());
        assert_ne!(first, second);
        assert!(registry.with(first, |_| ()).is_ok());
    }

    #[tokio::test]
    async fn closed_or_unknown_ids_are_not_found() {
        let registry = BrowseRegistry::default();
        let id = registry.insert(idle_session());
        assert!(registry.remove(id).is_some());
        assert!(matches!(
            registry.with(id, |_| ()),
            Err(AppError::NotFound(_))
        ));
        assert!(registry.remove(id).is_none());
    }
}
