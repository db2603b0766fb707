//! Course Search Module
//!
//! Paged, faceted search over course content:
//! - Request/response/event models
//! - The fetcher abstraction over the search endpoint
//! - The paged search controller (query, filters, paging, stale-response handling)
//! - An HTTP fetcher for the course search REST endpoint (`http` feature)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Course Search                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - SearchParams, SearchPage, SearchEvent, ...     │
//! │  fetcher.rs    - SearchFetcher trait                            │
//! │  controller.rs - PagedSearchController                          │
//! │  http.rs       - HttpSearchFetcher (reqwest)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod controller;
mod fetcher;
#[cfg(feature = "http")]
mod http;
mod models;

pub use controller::PagedSearchController;

pub use fetcher::SearchFetcher;

#[cfg(feature = "http")]
pub use http::{endpoint_url, form_fields, parse_search_response, HttpSearchFetcher};

pub use models::{
    SearchEvent, SearchFilters, SearchPage, SearchParams, SearchRecord, SearchSnapshot,
    SearchStatus, DEFAULT_PAGE_SIZE,
};
