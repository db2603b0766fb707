//! Paged Search Scenario Tests
//!
//! Exercises the controller through its public API against an in-memory
//! fetcher that serves a fixed catalogue and can hold responses back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coursekit_core::search::{
    PagedSearchController, SearchEvent, SearchFetcher, SearchFilters, SearchPage, SearchParams,
    SearchRecord, SearchStatus,
};
use coursekit_core::{CoreError, CoreResult};
use tokio::sync::{mpsc, oneshot};

type Response = CoreResult<SearchPage<SearchRecord>>;

/// Serves `total` generated records per query; `mode=honor` matches nothing.
struct CatalogueFetcher {
    total: usize,
    fail_pages: Vec<usize>,
    fail_queries: Vec<String>,
    requests: Mutex<Vec<SearchParams>>,
    held: Mutex<HashMap<String, oneshot::Receiver<Response>>>,
}

impl CatalogueFetcher {
    fn new(total: usize) -> Self {
        Self {
            total,
            fail_pages: Vec::new(),
            fail_queries: Vec::new(),
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(HashMap::new()),
        }
    }

    fn failing_on(mut self, page: usize) -> Self {
        self.fail_pages.push(page);
        self
    }

    fn failing_for(mut self, query: &str) -> Self {
        self.fail_queries.push(query.to_string());
        self
    }

    fn hold(&self, query: &str) -> oneshot::Sender<Response> {
        let (tx, rx) = oneshot::channel();
        self.held.lock().unwrap().insert(query.to_string(), rx);
        tx
    }

    fn requests(&self) -> Vec<SearchParams> {
        self.requests.lock().unwrap().clone()
    }

    fn serve(&self, params: &SearchParams) -> Response {
        if self.fail_pages.contains(&params.page) || self.fail_queries.contains(&params.query) {
            return Err(CoreError::Transport("connection reset".to_string()));
        }
        if params.filters.get("modes") == Some("honor") {
            return Ok(SearchPage::new(0, Vec::new()));
        }

        let first = params.page_index() * params.page_size;
        let last = (first + params.page_size).min(self.total);
        let results = (first..last).map(|i| record(&params.query, i)).collect();
        Ok(SearchPage::new(self.total, results))
    }
}

fn record(query: &str, i: usize) -> SearchRecord {
    SearchRecord {
        location: vec!["Week 1".to_string(), format!("Unit {}", i)],
        content_type: "Text".to_string(),
        url: format!("/courses/demo/jump_to/{}", i),
        excerpt: format!("{} match {}", query, i),
        course_name: None,
    }
}

#[async_trait]
impl SearchFetcher for CatalogueFetcher {
    type Record = SearchRecord;

    async fn fetch(&self, params: SearchParams) -> Response {
        self.requests.lock().unwrap().push(params.clone());
        let held = self.held.lock().unwrap().remove(&params.query);
        match held {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(CoreError::Transport("dropped".to_string()))),
            None => self.serve(&params),
        }
    }
}

fn setup(
    fetcher: CatalogueFetcher,
) -> (
    Arc<CatalogueFetcher>,
    PagedSearchController<CatalogueFetcher>,
    mpsc::UnboundedReceiver<SearchEvent>,
) {
    let fetcher = Arc::new(fetcher);
    let mut controller = PagedSearchController::new(Arc::clone(&fetcher), 20);
    let events = controller.take_event_receiver().unwrap();
    (fetcher, controller, events)
}

// -----------------------------------------------------------------------------
// Empty With Filters
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_filtered_search_falls_back_to_unfiltered_results() {
    let (fetcher, controller, mut events) = setup(CatalogueFetcher::new(12));

    controller
        .perform_search("dummy", SearchFilters::new().with("modes", "honor"))
        .await
        .unwrap();

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].filters.get("modes"), Some("honor"));
    assert!(requests[1].filters.is_empty());
    assert_eq!(requests[1].query, "dummy");

    // The event reports the filtered total even though results were found.
    match events.recv().await.unwrap() {
        SearchEvent::Search { query, total } => {
            assert_eq!(query, "dummy");
            assert_eq!(total, 0);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let snapshot = controller.snapshot();
    assert!(snapshot.last_search_was_empty);
    assert_eq!(snapshot.results.len(), 12);
    assert_eq!(snapshot.results[0].excerpt, "dummy match 0");
}

// -----------------------------------------------------------------------------
// Paging
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_next_page_success() {
    let (fetcher, controller, mut events) = setup(CatalogueFetcher::new(365));

    controller.perform_search("x", SearchFilters::new()).await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        SearchEvent::Search { total: 365, .. }
    ));
    assert!(controller.has_next_page());

    controller.load_next_page().await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), SearchEvent::Next));

    let requests = fetcher.requests();
    assert_eq!(requests[1].page, 2);
    assert_eq!(requests[1].page_index(), 1);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.page, 2);
    assert_eq!(snapshot.results.len(), 40);
    assert_eq!(snapshot.results[20].url, "/courses/demo/jump_to/20");
}

#[tokio::test]
async fn test_next_page_failure_keeps_page() {
    let (_, controller, mut events) = setup(CatalogueFetcher::new(365).failing_on(2));

    controller.perform_search("x", SearchFilters::new()).await.unwrap();
    let _ = events.recv().await;

    controller.load_next_page().await.unwrap();
    match events.recv().await.unwrap() {
        SearchEvent::Error(e) => assert!(e.is_transport()),
        other => panic!("unexpected event: {:?}", other),
    }

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.page, 1);
    assert_eq!(snapshot.results.len(), 20);
    assert_eq!(snapshot.status, SearchStatus::Idle);
}

#[tokio::test]
async fn test_paging_to_the_end() {
    let (_, controller, _events) = setup(CatalogueFetcher::new(45));

    controller.perform_search("x", SearchFilters::new()).await.unwrap();
    let mut pages = 1;
    while controller.has_next_page() {
        controller.load_next_page().await.unwrap();
        pages += 1;
    }

    assert_eq!(pages, 3);
    assert_eq!(controller.snapshot().results.len(), 45);
    assert_eq!(controller.snapshot().latest_count, 5);
}

#[tokio::test]
async fn test_back_to_back_next_pages_load_every_page() {
    let (fetcher, controller, mut events) = setup(CatalogueFetcher::new(100));

    controller.perform_search("x", SearchFilters::new()).await.unwrap();
    let _ = events.recv().await;

    let first = controller.load_next_page();
    let second = controller.load_next_page();
    second.await.unwrap();
    let _ = first.await;
    controller.load_next_page().await.unwrap();

    let pages: Vec<usize> = fetcher.requests().iter().map(|p| p.page).collect();
    assert!(!pages.contains(&4));
    assert_eq!(pages.last(), Some(&3));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.page, 3);
    let urls: Vec<String> = snapshot.results.iter().map(|r| r.url.clone()).collect();
    let expected: Vec<String> = (0..60).map(|i| format!("/courses/demo/jump_to/{}", i)).collect();
    assert_eq!(urls, expected);
}

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_search_leaves_visible_state_unchanged() {
    let (_, controller, mut events) = setup(CatalogueFetcher::new(45).failing_for("boom"));

    controller.perform_search("ok", SearchFilters::new()).await.unwrap();
    controller.load_next_page().await.unwrap();
    let _ = events.recv().await;
    let _ = events.recv().await;
    let before = controller.snapshot();

    controller
        .perform_search("boom", SearchFilters::new().with("org", "edX"))
        .await
        .unwrap();
    assert!(matches!(events.recv().await.unwrap(), SearchEvent::Error(_)));

    let after = controller.snapshot();
    assert_eq!(after, before);
    assert_eq!(after.query, "ok");
    assert_eq!(after.page, 2);
    assert!(after.filters.is_empty());
    assert_eq!(after.results.len(), 40);
    assert!(after.results.iter().all(|r| r.excerpt.starts_with("ok ")));

    // Paging continues from what is on screen.
    controller.load_next_page().await.unwrap();
    assert!(matches!(events.recv().await.unwrap(), SearchEvent::Next));
    assert_eq!(controller.snapshot().results.len(), 45);
}

// -----------------------------------------------------------------------------
// Ordering
// -----------------------------------------------------------------------------

#[tokio::test]
async fn test_late_response_for_superseded_query_is_ignored() {
    let fetcher = CatalogueFetcher::new(3);
    let release_a = fetcher.hold("a");
    let (_, controller, mut events) = setup(fetcher);

    let a = controller.perform_search("a", SearchFilters::new());
    let b = controller.perform_search("b", SearchFilters::new());
    b.await.unwrap();

    let _ = release_a.send(Ok(SearchPage::new(1, vec![record("a", 0)])));
    let _ = a.await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.query, "b");
    assert_eq!(snapshot.results.len(), 3);
    assert!(snapshot.results.iter().all(|r| r.excerpt.starts_with("b ")));

    match events.recv().await.unwrap() {
        SearchEvent::Search { query, total } => {
            assert_eq!(query, "b");
            assert_eq!(total, 3);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_cancel_then_search_again() {
    let fetcher = CatalogueFetcher::new(5);
    let _release = fetcher.hold("slow");
    let (_, controller, mut events) = setup(fetcher);

    let slow = controller.perform_search("slow", SearchFilters::new());
    controller.cancel_search();
    let _ = slow.await;
    assert!(events.try_recv().is_err());
    assert_eq!(controller.status(), SearchStatus::Idle);

    controller.perform_search("fast", SearchFilters::new()).await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        SearchEvent::Search { total: 5, .. }
    ));
}
