//! Page-numbered listing driven by the `x-total-pages` header.

use serde_json::Value;

use super::client::{GitLabClient, query_string};
use super::error::{GitLabError, is_retryable};
use crate::collect::progress::{CollectProgress, ProgressCallback, emit};
use crate::http::{HttpHeaders, header_get};
use crate::retry::{RetryConfig, with_retry};

/// Read the total page count from response headers.
///
/// A missing or unparsable header yields `None`.
pub fn total_pages(headers: &HttpHeaders) -> Option<u32> {
    header_get(headers, "x-total-pages")?.trim().parse().ok()
}

impl GitLabClient {
    fn page_url(&self, resource: &str, params: &[(&str, &str)], page: u32) -> String {
        let page = page.to_string();
        let per_page = self.page_size().to_string();
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("page", page.as_str()));
        query.push(("per_page", per_page.as_str()));
        format!("{}?{}", self.api_url(resource), query_string(&query))
    }

    /// Fetch every page of a listing endpoint.
    ///
    /// The first page is requested optimistically; the page count it reports
    /// bounds the loop, and later values of the header are ignored. A failed
    /// page is retried according to `retry` before the whole call fails, so
    /// pages are never skipped.
    pub async fn fetch_all(
        &self,
        resource: &str,
        params: &[(&str, &str)],
        retry: &RetryConfig,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Value>, GitLabError> {
        let mut items: Vec<Value> = Vec::new();
        let mut page = 1u32;
        let mut total: Option<u32> = None;

        loop {
            let url = self.page_url(resource, params, page);
            let (batch, reported_total) = with_retry(
                || self.fetch_page(&url),
                is_retryable,
                retry,
                resource,
                on_progress,
            )
            .await?;

            let total_pages = *total.get_or_insert(reported_total.unwrap_or(page));

            tracing::debug!(resource, page, total_pages, count = batch.len(), "Fetched page");
            emit(
                on_progress,
                CollectProgress::FetchedPage {
                    resource: resource.to_string(),
                    page,
                    total_pages,
                    count: batch.len(),
                },
            );

            items.extend(batch);
            page += 1;
            if page > total_pages {
                break;
            }
        }

        Ok(items)
    }

    async fn fetch_page(&self, url: &str) -> Result<(Vec<Value>, Option<u32>), GitLabError> {
        let response = self.get(url).await?;
        let batch: Vec<Value> = serde_json::from_slice(&response.body)?;
        Ok((batch, total_pages(&response.headers)))
    }
}
