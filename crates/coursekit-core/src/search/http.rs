//! HTTP Search Fetcher
//!
//! Implements [`SearchFetcher`] against the course search REST endpoint:
//! `POST {base_url}{search_path}[{course_id}]` with a form body of
//! `search_string`, `page_size`, `page_index` (0-based) and one field per
//! facet filter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{SearchFetcher, SearchPage, SearchParams, SearchRecord};
use crate::error::{CoreError, CoreResult};
use crate::settings::SearchSettings;

// =============================================================================
// Endpoint Response Types
// =============================================================================

#[derive(Deserialize)]
struct SearchResponseBody {
    total: usize,
    #[serde(default)]
    access_denied_count: usize,
    #[serde(default)]
    results: Vec<SearchResultEnvelope>,
}

#[derive(Deserialize)]
struct SearchResultEnvelope {
    data: SearchRecord,
}

impl From<SearchResponseBody> for SearchPage<SearchRecord> {
    fn from(body: SearchResponseBody) -> Self {
        SearchPage {
            total: body.total,
            access_denied_count: body.access_denied_count,
            results: body.results.into_iter().map(|r| r.data).collect(),
        }
    }
}

/// Decodes a search endpoint response body
pub fn parse_search_response(body: &str) -> CoreResult<SearchPage<SearchRecord>> {
    serde_json::from_str::<SearchResponseBody>(body)
        .map(SearchPage::from)
        .map_err(|e| CoreError::InvalidResponse(format!("Failed to parse search response: {}", e)))
}

// =============================================================================
// HTTP Search Fetcher
// =============================================================================

/// Search fetcher backed by `reqwest`
pub struct HttpSearchFetcher {
    url: String,
    client: reqwest::Client,
}

impl HttpSearchFetcher {
    /// Creates a fetcher for the endpoint described by `settings`
    pub fn new(settings: &SearchSettings) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: endpoint_url(settings),
            client,
        })
    }

    /// The URL requests are sent to
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SearchFetcher for HttpSearchFetcher {
    type Record = SearchRecord;

    async fn fetch(&self, params: SearchParams) -> CoreResult<SearchPage<SearchRecord>> {
        debug!(url = %self.url, page = params.page, "Sending search request");

        let response = self
            .client
            .post(&self.url)
            .form(&form_fields(&params))
            .send()
            .await
            .map_err(|e| CoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(CoreError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        parse_search_response(&body)
    }
}

/// Builds the endpoint URL, scoped to a course when one is configured
pub fn endpoint_url(settings: &SearchSettings) -> String {
    let base = settings.base_url.trim_end_matches('/');
    match settings.course_id.as_deref() {
        Some(course_id) if !course_id.is_empty() => {
            format!("{}{}{}", base, settings.search_path, course_id)
        }
        _ => format!("{}{}", base, settings.search_path),
    }
}

/// Encodes `params` as the endpoint's form fields
pub fn form_fields(params: &SearchParams) -> Vec<(String, String)> {
    let mut fields = vec![
        ("search_string".to_string(), params.query.clone()),
        ("page_size".to_string(), params.page_size.to_string()),
        ("page_index".to_string(), params.page_index().to_string()),
    ];
    fields.extend(
        params
            .filters
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string())),
    );
    fields
}

// =============================================================================
// Tests
// =============================================================================
