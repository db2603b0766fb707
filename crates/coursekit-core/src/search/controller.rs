//! Paged Search Controller
//!
//! Keeps the single source of truth for "what the user is currently
//! viewing" in a paged, faceted search: the query, the filters, the page,
//! the total and the accumulated results.
//!
//! Every operation returns immediately with the [`JoinHandle`] of the
//! request it issued; outcomes are delivered as [`SearchEvent`]s on the
//! channel handed out by [`PagedSearchController::take_event_receiver`].
//!
//! # Ordering
//!
//! Each issued request carries a generation number. A response is applied
//! only if no newer request was issued in the meantime; older responses
//! are dropped without an event. Issuing a request also aborts the
//! previous in-flight task.
//!
//! # Empty results with filters
//!
//! When a filtered search matches nothing, the controller re-runs the same
//! query without filters so there is something to browse, but still
//! reports the filtered total (zero) in the `Search` event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::{
    SearchEvent, SearchFetcher, SearchFilters, SearchPage, SearchParams, SearchSnapshot,
    SearchStatus, DEFAULT_PAGE_SIZE,
};
use crate::error::CoreResult;

// =============================================================================
// Search State
// =============================================================================

/// Mutable controller state; owned by one controller.
///
/// `query`, `filters`, `page` and the results describe what was last loaded
/// successfully. Requests carry their own [`SearchParams`] and only write
/// back into the state when they succeed.
#[derive(Debug)]
struct SearchState<R> {
    query: String,
    filters: SearchFilters,
    page: usize,
    page_size: usize,
    total_results: usize,
    access_denied_count: usize,
    latest_count: usize,
    results: Vec<R>,
    last_search_was_empty: bool,
    status: SearchStatus,
    generation: u64,
    /// First-page request issued but not yet settled
    pending: Option<SearchParams>,
}

/// What to do after a first-page response
#[derive(Debug)]
enum SearchOutcome {
    /// Emit this event
    Done(SearchEvent),
    /// Re-run without filters, then report the filtered zero total
    Fallback(SearchParams),
    /// A newer request superseded this one
    Stale,
}

impl<R: Clone> SearchState<R> {
    fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            filters: SearchFilters::new(),
            page: 1,
            page_size,
            total_results: 0,
            access_denied_count: 0,
            latest_count: 0,
            results: Vec::new(),
            last_search_was_empty: false,
            status: SearchStatus::Idle,
            generation: 0,
            pending: None,
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.status = SearchStatus::Searching;
        self.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Starts a first-page request; nothing visible changes until it succeeds
    fn begin_search(&mut self, query: &str, filters: SearchFilters) -> (u64, SearchParams) {
        let params = SearchParams::new(query, filters, 1, self.page_size);
        self.pending = Some(params.clone());
        (self.next_generation(), params)
    }

    /// Starts a refinement of the most recently requested search
    fn begin_refine(&mut self, filters: &SearchFilters) -> (u64, SearchParams) {
        let (query, mut merged) = match &self.pending {
            Some(pending) => (pending.query.clone(), pending.filters.clone()),
            None => (self.query.clone(), self.filters.clone()),
        };
        merged.merge(filters);
        self.begin_search(&query, merged)
    }

    /// Starts a request for the page after the last loaded one
    fn begin_next_page(&mut self) -> (u64, SearchParams) {
        self.pending = None;
        let params = SearchParams::new(
            &self.query,
            self.filters.clone(),
            self.page + 1,
            self.page_size,
        );
        (self.next_generation(), params)
    }

    fn store_page(&mut self, page: SearchPage<R>, append: bool) {
        self.total_results = page.reported_total();
        self.access_denied_count = page.access_denied_count;
        self.latest_count = page.results.len();
        if append {
            self.results.extend(page.results);
        } else {
            self.results = page.results;
        }
    }

    /// Makes a successful first-page request the visible search
    fn commit_search(&mut self, params: &SearchParams, page: SearchPage<R>) {
        self.query = params.query.clone();
        self.filters = params.filters.clone();
        self.page = params.page;
        self.store_page(page, false);
    }

    fn settle(&mut self) {
        self.pending = None;
        self.status = SearchStatus::Idle;
    }

    fn finish_search(
        &mut self,
        generation: u64,
        params: &SearchParams,
        result: CoreResult<SearchPage<R>>,
    ) -> SearchOutcome {
        if !self.is_current(generation) {
            return SearchOutcome::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                self.settle();
                return SearchOutcome::Done(SearchEvent::Error(e));
            }
        };

        let total = page.reported_total();
        if total == 0 && !params.filters.is_empty() {
            return SearchOutcome::Fallback(SearchParams::new(
                &params.query,
                SearchFilters::new(),
                1,
                params.page_size,
            ));
        }

        self.commit_search(params, page);
        self.last_search_was_empty = false;
        self.settle();
        SearchOutcome::Done(SearchEvent::Search {
            query: params.query.clone(),
            total,
        })
    }

    fn finish_fallback(
        &mut self,
        generation: u64,
        unfiltered: &SearchParams,
        result: CoreResult<SearchPage<R>>,
    ) -> Option<SearchEvent> {
        if !self.is_current(generation) {
            return None;
        }

        self.settle();
        match result {
            Ok(page) => {
                self.commit_search(unfiltered, page);
                // The filtered search matched nothing; that is what gets reported.
                self.total_results = 0;
                self.last_search_was_empty = true;
                Some(SearchEvent::Search {
                    query: unfiltered.query.clone(),
                    total: 0,
                })
            }
            Err(e) => Some(SearchEvent::Error(e)),
        }
    }

    fn finish_next_page(
        &mut self,
        generation: u64,
        params: &SearchParams,
        result: CoreResult<SearchPage<R>>,
    ) -> Option<SearchEvent> {
        if !self.is_current(generation) {
            return None;
        }

        self.settle();
        match result {
            Ok(page) => {
                self.page = params.page;
                self.store_page(page, true);
                Some(SearchEvent::Next)
            }
            Err(e) => Some(SearchEvent::Error(e)),
        }
    }

    /// Clears everything and invalidates any in-flight request
    fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::new(self.page_size);
        self.generation = generation;
    }

    fn snapshot(&self) -> SearchSnapshot<R> {
        SearchSnapshot {
            query: self.query.clone(),
            filters: self.filters.clone(),
            page: self.page,
            page_size: self.page_size,
            total_results: self.total_results,
            access_denied_count: self.access_denied_count,
            latest_count: self.latest_count,
            results: self.results.clone(),
            last_search_was_empty: self.last_search_was_empty,
            status: self.status,
        }
    }
}

fn lock<R>(state: &Mutex<SearchState<R>>) -> MutexGuard<'_, SearchState<R>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Paged Search Controller
// =============================================================================

/// Drives a [`SearchFetcher`] and tracks the visible search state.
///
/// Operations spawn tokio tasks and must be called from within a runtime.
pub struct PagedSearchController<F: SearchFetcher> {
    fetcher: Arc<F>,
    state: Arc<Mutex<SearchState<F::Record>>>,
    in_flight: Mutex<Option<AbortHandle>>,
    event_tx: mpsc::UnboundedSender<SearchEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SearchEvent>>,
}

impl<F: SearchFetcher> PagedSearchController<F> {
    /// Creates a controller requesting `page_size` results per page
    pub fn new(fetcher: Arc<F>, page_size: usize) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            fetcher,
            state: Arc::new(Mutex::new(SearchState::new(page_size.max(1)))),
            in_flight: Mutex::new(None),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Creates a controller with the default page size
    pub fn with_defaults(fetcher: Arc<F>) -> Self {
        Self::new(fetcher, DEFAULT_PAGE_SIZE)
    }

    /// Takes the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SearchEvent>> {
        self.event_rx.take()
    }

    /// Starts a new search at page 1 with the given filters
    pub fn perform_search(&self, query: &str, filters: SearchFilters) -> JoinHandle<()> {
        let (generation, params) = lock(&self.state).begin_search(query, filters);
        self.spawn_search(generation, params)
    }

    /// Merges `filters` into those of the latest search and searches again at page 1
    pub fn refine_search(&self, filters: SearchFilters) -> JoinHandle<()> {
        let (generation, params) = lock(&self.state).begin_refine(&filters);
        self.spawn_search(generation, params)
    }

    /// Requests the page after the last loaded one and appends its results
    pub fn load_next_page(&self) -> JoinHandle<()> {
        let (generation, params) = lock(&self.state).begin_next_page();
        debug!(generation, page = params.page, query = %params.query, "Loading next page");

        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let events = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let result = fetcher.fetch(params.clone()).await;
            if let Err(e) = &result {
                warn!("Next page request failed: {}", e);
            }

            let event = lock(&state).finish_next_page(generation, &params, result);
            match event {
                Some(event) => {
                    let _ = events.send(event);
                }
                None => debug!(generation, "Discarded stale next-page response"),
            }
        });

        self.track(&handle);
        handle
    }

    /// Abandons any in-flight request and resets the state
    pub fn cancel_search(&self) {
        if let Some(previous) = self.take_in_flight() {
            previous.abort();
        }
        lock(&self.state).reset();
        debug!("Search cancelled");
    }

    /// Returns true if more results exist beyond the loaded pages
    pub fn has_next_page(&self) -> bool {
        let state = lock(&self.state);
        state.total_results > state.page * state.page_size
    }

    /// Returns a copy of the current state
    pub fn snapshot(&self) -> SearchSnapshot<F::Record> {
        lock(&self.state).snapshot()
    }

    pub fn status(&self) -> SearchStatus {
        lock(&self.state).status
    }

    pub fn page(&self) -> usize {
        lock(&self.state).page
    }

    pub fn total_results(&self) -> usize {
        lock(&self.state).total_results
    }

    fn spawn_search(&self, generation: u64, params: SearchParams) -> JoinHandle<()> {
        debug!(generation, query = %params.query, filters = params.filters.len(), "Issuing search");

        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let events = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let result = fetcher.fetch(params.clone()).await;
            if let Err(e) = &result {
                warn!("Search request failed: {}", e);
            }

            let outcome = lock(&state).finish_search(generation, &params, result);
            let event = match outcome {
                SearchOutcome::Done(event) => Some(event),
                SearchOutcome::Stale => None,
                SearchOutcome::Fallback(unfiltered) => {
                    info!(
                        query = %params.query,
                        "Filtered search returned no results, showing unfiltered results"
                    );
                    let result = fetcher.fetch(unfiltered.clone()).await;
                    if let Err(e) = &result {
                        warn!("Unfiltered fallback search failed: {}", e);
                    }
                    lock(&state).finish_fallback(generation, &unfiltered, result)
                }
            };

            match event {
                Some(event) => {
                    let _ = events.send(event);
                }
                None => debug!(generation, "Discarded stale search response"),
            }
        });

        self.track(&handle);
        handle
    }

    /// Records `handle` as the in-flight request, aborting the previous one
    fn track(&self, handle: &JoinHandle<()>) {
        let previous = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn take_in_flight(&self) -> Option<AbortHandle> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<F: SearchFetcher> Drop for PagedSearchController<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.take_in_flight() {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
