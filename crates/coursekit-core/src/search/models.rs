//! Search Data Models
//!
//! Request, response and event types shared by the paged search
//! controller and its fetchers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default number of results per page
pub const DEFAULT_PAGE_SIZE: usize = 20;

// =============================================================================
// Search Filters
// =============================================================================

/// Facet filters applied alongside the free-text query (e.g. `modes=honor`).
///
/// Ordered so that requests are encoded deterministically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchFilters(BTreeMap<String, String>);

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Merges `other` into this set; values in `other` win
    pub fn merge(&mut self, other: &SearchFilters) {
        for (name, value) in &other.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SearchFilters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Search Params / Page
// =============================================================================

/// Parameters for one fetch against the search endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free-text query (possibly empty)
    pub query: String,
    /// Facet filters
    pub filters: SearchFilters,
    /// 1-based page number
    pub page: usize,
    /// Results per page
    pub page_size: usize,
}

impl SearchParams {
    pub fn new(query: &str, filters: SearchFilters, page: usize, page_size: usize) -> Self {
        Self {
            query: query.to_string(),
            filters,
            page,
            page_size,
        }
    }

    /// 0-based page index, as the REST endpoint expects it
    pub fn page_index(&self) -> usize {
        self.page.saturating_sub(1)
    }
}

/// One page of results returned by a fetcher
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage<R> {
    /// Total hits across all pages, including withheld ones
    pub total: usize,
    /// Hits the server withheld from this user
    #[serde(default)]
    pub access_denied_count: usize,
    /// Records on this page
    pub results: Vec<R>,
}

impl<R> SearchPage<R> {
    pub fn new(total: usize, results: Vec<R>) -> Self {
        Self {
            total,
            access_denied_count: 0,
            results,
        }
    }

    pub fn with_access_denied(mut self, count: usize) -> Self {
        self.access_denied_count = count;
        self
    }

    /// Total the user is told about: hits minus withheld hits
    pub fn reported_total(&self) -> usize {
        self.total.saturating_sub(self.access_denied_count)
    }
}

// =============================================================================
// Search Record
// =============================================================================

/// A course content hit as returned by the course search endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Breadcrumb path (section, subsection, unit)
    #[serde(default)]
    pub location: Vec<String>,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
}

impl SearchRecord {
    /// Breadcrumb for display, e.g. "section ▸ subsection ▸ unit"
    pub fn location_path(&self) -> String {
        self.location.join(" ▸ ")
    }
}

// =============================================================================
// Controller State / Events
// =============================================================================

/// Controller lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching,
}

/// Events emitted by the paged search controller
#[derive(Debug)]
pub enum SearchEvent {
    /// A new search (or refinement) completed
    Search { query: String, total: usize },
    /// A further page was appended
    Next,
    /// The latest request failed
    Error(CoreError),
}

/// Point-in-time copy of the controller state
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnapshot<R> {
    pub query: String,
    pub filters: SearchFilters,
    pub page: usize,
    pub page_size: usize,
    pub total_results: usize,
    pub access_denied_count: usize,
    pub latest_count: usize,
    pub results: Vec<R>,
    pub last_search_was_empty: bool,
    pub status: SearchStatus,
}

// =============================================================================
// Tests
// =============================================================================
