//! Search Fetcher Trait
//!
//! Abstracts the remote paged search endpoint so the controller can be
//! driven by an HTTP client in production and by scripted fetchers in tests.

use async_trait::async_trait;

use super::{SearchPage, SearchParams};
use crate::error::CoreResult;

// =============================================================================
// Search Fetcher Trait
// =============================================================================

/// Fetches one page of search results
#[async_trait]
pub trait SearchFetcher: Send + Sync + 'static {
    /// Result record type; opaque to the controller
    type Record: Clone + Send + Sync + 'static;

    /// Performs the request described by `params`.
    ///
    /// Network failures and non-success responses should be reported as
    /// transport errors (see [`CoreError::is_transport`](crate::CoreError::is_transport)).
    async fn fetch(&self, params: SearchParams) -> CoreResult<SearchPage<Self::Record>>;
}
