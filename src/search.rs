// Listing fetch orchestration for the browse surface. Owns the union
// fan-out over descendant categories, the merge-by-id reconciliation,
// the keyword debounce, and the request sequencing that keeps a slow
// stale response from clobbering a fast newer one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::category::CategoryStore;
use crate::error::AppResult;
use crate::filter::{AttributeValue, FilterCriteria, FilterError, SchemaRegistry, build_query};
use crate::models::{AdListing, Category, ListingQuery};

/// Network seam for listing searches. The real implementation lives on
/// `marketplace_api::BackendClient`; tests substitute stubs.
#[async_trait]
pub trait ListingSource: Send + Sync + 'static {
    /// One backend search call, scoped to a single category id, or
    /// unscoped when `category_id` is None.
    async fn fetch_scoped(
        &self,
        query: &ListingQuery,
        category_id: Option<i64>,
    ) -> AppResult<Vec<AdListing>>;
}

/// Runs the composed query against the source: one concurrent call per
/// category id in the union (a listing tagged to a subcategory must show
/// up under its parent), then merge by listing id keeping the first-seen
/// record, since overlapping category fetches can return the same ad.
pub async fn fetch_matching<S: ListingSource + ?Sized>(
    source: &S,
    query: &ListingQuery,
) -> AppResult<Vec<AdListing>> {
    let mut all_results = if query.category_ids.is_empty() {
        source.fetch_scoped(query, None).await?
    } else {
        let calls: Vec<_> = query
            .category_ids
            .iter()
            .map(|id| source.fetch_scoped(query, Some(*id)))
            .collect();
        let mut merged = Vec::new();
        for outcome in join_all(calls).await {
            merged.extend(outcome?);
        }
        merged
    };

    let mut seen_ids = HashSet::new();
    all_results.retain(|item| seen_ids.insert(item.id));
    tracing::debug!(count = all_results.len(), "Merged listing fetch results");
    Ok(all_results)
}

/// Case-insensitive free-text match across the fields a user would
/// recognize a listing by.
pub fn matches_keyword(listing: &AdListing, keyword: &str) -> bool {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let price_text = listing.price.to_string();
    let haystacks = [
        Some(listing.title.as_str()),
        Some(listing.description.as_str()),
        listing.location.as_deref(),
        listing.address.as_deref(),
        Some(listing.seller_name.as_str()),
        Some(price_text.as_str()),
        listing.category_name.as_deref(),
    ];
    haystacks
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

pub fn filter_by_keyword(listings: &[AdListing], keyword: &str) -> Vec<AdListing> {
    listings
        .iter()
        .filter(|l| matches_keyword(l, keyword))
        .cloned()
        .collect()
}

/// Where the browse surface currently stands. `Loaded` with an empty
/// listing set is the "no results" presentation; it is never the same
/// state as `Loading` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Point-in-time view for rendering. `listings` survives a failed fetch
/// untouched (stale-but-valid).
#[derive(Debug, Clone)]
pub struct BrowseSnapshot {
    pub listings: Vec<AdListing>,
    pub phase: FetchPhase,
    pub criteria: FilterCriteria,
}

impl BrowseSnapshot {
    /// A successful fetch that matched nothing.
    pub fn no_results(&self) -> bool {
        self.phase == FetchPhase::Loaded && self.listings.is_empty()
    }
}

struct BrowseState {
    criteria: FilterCriteria,
    /// Last successfully fetched set, before any client-side narrowing.
    base: Vec<AdListing>,
    /// What the UI shows right now.
    listings: Vec<AdListing>,
    phase: FetchPhase,
    /// Sequence number of the newest fetch issued for this slot. A
    /// completion carrying an older number is discarded.
    newest_seq: u64,
    closed: bool,
}

/// One browse screen's worth of state orchestration. Transitions are
/// synchronous from the caller's point of view; fetches run on spawned
/// tasks and land through the sequence guard.
pub struct BrowseSession<S: ListingSource> {
    source: Arc<S>,
    store: Arc<CategoryStore>,
    schemas: Arc<SchemaRegistry>,
    state: Arc<Mutex<BrowseState>>,
    seq: Arc<AtomicU64>,
    debounce: Duration,
    pending_keyword: Option<JoinHandle<()>>,
}

impl<S: ListingSource> BrowseSession<S> {
    pub fn new(
        source: Arc<S>,
        store: Arc<CategoryStore>,
        schemas: Arc<SchemaRegistry>,
        debounce: Duration,
    ) -> Self {
        Self {
            source,
            store,
            schemas,
            state: Arc::new(Mutex::new(BrowseState {
                criteria: FilterCriteria::default(),
                base: Vec::new(),
                listings: Vec::new(),
                phase: FetchPhase::Idle,
                newest_seq: 0,
                closed: false,
            })),
            seq: Arc::new(AtomicU64::new(0)),
            debounce,
            pending_keyword: None,
        }
    }

    pub fn snapshot(&self) -> BrowseSnapshot {
        let st = self.state.lock().unwrap();
        BrowseSnapshot {
            listings: st.listings.clone(),
            phase: st.phase.clone(),
            criteria: st.criteria.clone(),
        }
    }

    /// The categories selectable at the current drill-down level.
    pub fn candidates(&self) -> Vec<Category> {
        let st = self.state.lock().unwrap();
        let records = match st.criteria.selected_leaf() {
            Some(leaf) => self.store.children_of(leaf),
            None => self.store.roots(),
        };
        records.into_iter().cloned().collect()
    }

    pub fn selection_complete(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.criteria.selection_complete(&self.store)
    }

    /// Initial load and the retry affordance after a failure.
    pub fn refresh(&mut self) {
        self.cancel_pending_keyword();
        self.issue_fetch();
    }

    /// Category selection fetches immediately, no debounce.
    pub fn select_category(&mut self, id: i64) -> Result<(), FilterError> {
        {
            let mut st = self.state.lock().unwrap();
            st.criteria = st.criteria.select_category(&self.store, id)?;
        }
        self.cancel_pending_keyword();
        self.issue_fetch();
        Ok(())
    }

    pub fn go_back(&mut self) {
        {
            let mut st = self.state.lock().unwrap();
            st.criteria = st.criteria.go_back();
        }
        self.cancel_pending_keyword();
        self.issue_fetch();
    }

    /// Each keystroke narrows the displayed set instantly from the last
    /// fetched base and restarts the debounce timer; only the settled
    /// value reaches the backend, in exactly one fetch.
    pub fn set_keyword(&mut self, keyword: &str) {
        {
            let mut st = self.state.lock().unwrap();
            st.criteria = st.criteria.set_keyword(keyword);
            st.listings = filter_by_keyword(&st.base, keyword);
        }
        self.cancel_pending_keyword();

        let source = Arc::clone(&self.source);
        let store = Arc::clone(&self.store);
        let schemas = Arc::clone(&self.schemas);
        let state = Arc::clone(&self.state);
        let seq_counter = Arc::clone(&self.seq);
        let debounce = self.debounce;
        self.pending_keyword = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            run_fetch(source, store, schemas, state, seq_counter).await;
        }));
    }

    /// Scalar filter edits; nothing is fetched until `apply`.
    pub fn set_price_range(
        &mut self,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<(), FilterError> {
        let mut st = self.state.lock().unwrap();
        st.criteria = st.criteria.set_price_range(min, max)?;
        Ok(())
    }

    pub fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        let mut st = self.state.lock().unwrap();
        st.criteria = st.criteria.set_attribute(key, value);
    }

    pub fn clear_attribute(&mut self, key: &str) {
        let mut st = self.state.lock().unwrap();
        st.criteria = st.criteria.clear_attribute(key);
    }

    /// The explicit "Apply" action: compose everything into one fetch.
    pub fn apply(&mut self) {
        self.cancel_pending_keyword();
        self.issue_fetch();
    }

    /// The explicit "Reset" action: clear the scalar set and re-fetch.
    pub fn reset(&mut self) {
        {
            let mut st = self.state.lock().unwrap();
            st.criteria = st.criteria.reset();
        }
        self.cancel_pending_keyword();
        self.issue_fetch();
    }

    /// Unmount: late completions are dropped, nothing updates afterwards.
    pub fn close(&mut self) {
        self.cancel_pending_keyword();
        if let Ok(mut st) = self.state.lock() {
            st.closed = true;
        }
    }

    fn cancel_pending_keyword(&mut self) {
        if let Some(handle) = self.pending_keyword.take() {
            handle.abort();
        }
    }

    /// The sequence number is claimed synchronously, before the task is
    /// spawned: issue order and sequence order must agree or the guard
    /// cannot tell stale completions apart.
    fn issue_fetch(&self) {
        let (query, seq) = {
            let mut st = self.state.lock().unwrap();
            if st.closed {
                return;
            }
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            st.newest_seq = seq;
            st.phase = FetchPhase::Loading;
            (build_query(&st.criteria, &self.store, &self.schemas), seq)
        };
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = fetch_matching(source.as_ref(), &query).await;
            apply_completion(&state, seq, result);
        });
    }
}

impl<S: ListingSource> Drop for BrowseSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The debounced-keyword path: claims its sequence number at settle
/// time (that is when this fetch is issued) and runs the same pipeline.
async fn run_fetch<S: ListingSource>(
    source: Arc<S>,
    store: Arc<CategoryStore>,
    schemas: Arc<SchemaRegistry>,
    state: Arc<Mutex<BrowseState>>,
    seq_counter: Arc<AtomicU64>,
) {
    let (query, seq) = {
        let mut st = state.lock().unwrap();
        if st.closed {
            return;
        }
        let seq = seq_counter.fetch_add(1, Ordering::SeqCst) + 1;
        st.newest_seq = seq;
        st.phase = FetchPhase::Loading;
        (build_query(&st.criteria, &store, &schemas), seq)
    };

    let result = fetch_matching(source.as_ref(), &query).await;
    apply_completion(&state, seq, result);
}

/// Applies a fetch completion through the sequence guard: superseded or
/// post-close results are discarded, failures keep the previous
/// listings on screen.
fn apply_completion(state: &Mutex<BrowseState>, seq: u64, result: AppResult<Vec<AdListing>>) {
    let mut st = state.lock().unwrap();
    if st.closed {
        return;
    }
    if seq < st.newest_seq {
        tracing::debug!(seq, newest = st.newest_seq, "Discarding superseded fetch result");
        return;
    }
    match result {
        Ok(listings) => {
            tracing::info!(seq, count = listings.len(), "Listing fetch applied");
            st.base = listings.clone();
            st.listings = listings;
            st.phase = FetchPhase::Loaded;
        }
        Err(e) => {
            // Previous listings stay on screen; the failure is only a notice
            tracing::warn!(seq, error = %e, "Listing fetch failed, keeping previous results");
            st.phase = FetchPhase::Failed(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{CategoryNode, ValueList};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;

    fn listing(id: i64, title: &str) -> AdListing {
        AdListing {
            id,
            title: title.to_string(),
            description: String::new(),
            price: 100.0,
            seller_name: "Seller".to_string(),
            location: Some("Istanbul".to_string()),
            address: None,
            distance: None,
            date: None,
            status: None,
            category_id: None,
            category_name: None,
            image_urls: ValueList::default(),
        }
    }

    fn node(id: i64, name: &str, children: Vec<CategoryNode>) -> CategoryNode {
        CategoryNode {
            id: Some(id),
            name: name.to_string(),
            sub_categories: if children.is_empty() { None } else { Some(children) },
        }
    }

    fn test_store() -> Arc<CategoryStore> {
        Arc::new(CategoryStore::from_tree(&[
            node(1, "Electronics", vec![]),
            node(
                2,
                "Vehicles",
                vec![node(21, "Cars", vec![]), node(22, "Motorcycles", vec![])],
            ),
        ]))
    }

    #[derive(Default)]
    struct StubSource {
        calls: AtomicU64,
        queries: Mutex<Vec<(Option<i64>, ListingQuery)>>,
        by_category: HashMap<i64, Vec<AdListing>>,
        delays: HashMap<i64, Duration>,
        unscoped: Vec<AdListing>,
        fail: AtomicBool,
    }

    impl StubSource {
        fn call_count(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }

        fn recorded_queries(&self) -> Vec<(Option<i64>, ListingQuery)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingSource for StubSource {
        async fn fetch_scoped(
            &self,
            query: &ListingQuery,
            category_id: Option<i64>,
        ) -> AppResult<Vec<AdListing>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries
                .lock()
                .unwrap()
                .push((category_id, query.clone()));
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::BackendUnavailable("stub outage".to_string()));
            }
            if let Some(delay) = category_id.and_then(|id| self.delays.get(&id)) {
                tokio::time::sleep(*delay).await;
            }
            Ok(match category_id {
                Some(id) => self.by_category.get(&id).cloned().unwrap_or_default(),
                None => self.unscoped.clone(),
            })
        }
    }

    fn session(stub: Arc<StubSource>) -> BrowseSession<StubSource> {
        BrowseSession::new(
            stub,
            test_store(),
            Arc::new(SchemaRegistry::with_vehicles_at(2)),
            Duration::from_millis(400),
        )
    }

    async fn settle() {
        // Paused-clock tests: jump far past every timer in flight
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn typing_within_the_debounce_window_fetches_once() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([(1, vec![listing(5, "iPhone 13 Pro")])]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));

        session.set_keyword("a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.set_keyword("ab");
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.set_keyword("abc");
        settle().await;

        assert_eq!(stub.call_count(), 1);
        let queries = stub.recorded_queries();
        assert_eq!(queries[0].1.keyword.as_deref(), Some("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stale_response_does_not_clobber_the_newer_one() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([
                (1, vec![listing(10, "Old TV")]),
                (2, vec![listing(20, "Clean Corolla")]),
                (21, vec![]),
                (22, vec![]),
            ]),
            delays: HashMap::from([(1, Duration::from_millis(500)), (2, Duration::from_millis(10))]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));

        session.select_category(1).unwrap(); // slow fetch F1
        session.select_category(2).unwrap(); // fast fetch F2
        settle().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.phase, FetchPhase::Loaded);
        let ids: Vec<i64> = snapshot.listings.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![20], "stale category-1 results must stay discarded");
    }

    #[tokio::test(start_paused = true)]
    async fn parent_selection_unions_descendants_without_duplicates() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([
                (2, vec![listing(100, "Tagged to root")]),
                (21, vec![listing(100, "Same ad via Cars"), listing(101, "Civic")]),
                (22, vec![listing(102, "Vespa")]),
            ]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));

        session.select_category(2).unwrap();
        let next_level: Vec<String> =
            session.candidates().into_iter().map(|c| c.name).collect();
        assert_eq!(next_level, vec!["Cars", "Motorcycles"]);
        assert!(!session.selection_complete());
        settle().await;

        // One scoped call per id in the union
        let scoped: Vec<Option<i64>> =
            stub.recorded_queries().iter().map(|(id, _)| *id).collect();
        assert_eq!(scoped, vec![Some(2), Some(21), Some(22)]);

        let snapshot = session.snapshot();
        let ids: Vec<i64> = snapshot.listings.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);
        // First-seen record wins the merge
        assert_eq!(snapshot.listings[0].title, "Tagged to root");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_previous_listings_visible() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([(1, vec![listing(5, "iPhone 13 Pro")])]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));

        session.select_category(1).unwrap();
        settle().await;
        assert_eq!(session.snapshot().phase, FetchPhase::Loaded);

        stub.fail.store(true, Ordering::SeqCst);
        session.refresh();
        settle().await;

        let snapshot = session.snapshot();
        assert!(matches!(snapshot.phase, FetchPhase::Failed(_)));
        let ids: Vec<i64> = snapshot.listings.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![5], "stale-but-valid listings must survive the failure");
        assert!(!snapshot.no_results());
    }

    #[tokio::test(start_paused = true)]
    async fn loading_empty_and_failed_are_distinct_states() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([(1, Vec::new())]),
            delays: HashMap::from([(1, Duration::from_millis(200))]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));
        assert_eq!(session.snapshot().phase, FetchPhase::Idle);

        session.select_category(1).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.snapshot().phase, FetchPhase::Loading);
        assert!(!session.snapshot().no_results());

        settle().await;
        let loaded = session.snapshot();
        assert_eq!(loaded.phase, FetchPhase::Loaded);
        assert!(loaded.no_results());

        stub.fail.store(true, Ordering::SeqCst);
        session.refresh();
        settle().await;
        let failed = session.snapshot();
        assert!(matches!(failed.phase, FetchPhase::Failed(_)));
        assert!(!failed.no_results());
    }

    #[tokio::test(start_paused = true)]
    async fn keystrokes_narrow_the_displayed_set_before_any_fetch() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([(
                1,
                vec![listing(5, "iPhone 13 Pro"), listing(6, "MacBook Pro M1")],
            )]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));

        session.select_category(1).unwrap();
        settle().await;
        assert_eq!(stub.call_count(), 1);

        session.set_keyword("iphone");
        // No time has passed: the narrowing is purely client-side
        let snapshot = session.snapshot();
        let titles: Vec<&str> = snapshot.listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["iPhone 13 Pro"]);
        assert_eq!(stub.call_count(), 1);

        settle().await;
        assert_eq!(stub.call_count(), 2, "settled keyword issues the real fetch");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_ignores_late_completions() {
        let stub = Arc::new(StubSource {
            by_category: HashMap::from([(1, vec![listing(5, "iPhone 13 Pro")])]),
            delays: HashMap::from([(1, Duration::from_millis(300))]),
            ..StubSource::default()
        });
        let mut session = session(Arc::clone(&stub));

        session.select_category(1).unwrap();
        session.close();
        settle().await;

        let snapshot = session.snapshot();
        assert!(snapshot.listings.is_empty());
        assert_ne!(snapshot.phase, FetchPhase::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_selection_issues_no_fetch() {
        let stub = Arc::new(StubSource::default());
        let mut session = session(Arc::clone(&stub));
        assert!(session.select_category(999).is_err());
        settle().await;
        assert_eq!(stub.call_count(), 0);
    }

    #[test]
    fn keyword_matches_across_display_fields() {
        let mut ad = listing(1, "iPhone 13 Pro");
        ad.description = "Boxed, battery at 95%".to_string();
        ad.category_name = Some("Phones".to_string());

        assert!(matches_keyword(&ad, "IPHONE"));
        assert!(matches_keyword(&ad, "battery"));
        assert!(matches_keyword(&ad, "istanbul"));
        assert!(matches_keyword(&ad, "seller"));
        assert!(matches_keyword(&ad, "100"));
        assert!(matches_keyword(&ad, "phones"));
        assert!(matches_keyword(&ad, "  "));
        assert!(!matches_keyword(&ad, "bicycle"));
    }
}
