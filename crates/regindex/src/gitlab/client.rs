//! GitLab API client creation and request plumbing.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::error::GitLabError;
use super::types::GitLabTag;
use crate::collect::progress::ProgressCallback;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::RetryConfig;

/// Path appended to the instance URL for every API call.
pub const API_PATH: &str = "/api/v4";

/// Items requested per page. GitLab caps `per_page` at 100.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Query flags that make the registry endpoints include tag data.
const REGISTRY_FLAGS: [(&str, &str); 3] = [("tags", "true"), ("tags_count", "true"), ("size", "true")];

/// GitLab API client.
///
/// Every request carries the `PRIVATE-TOKEN` header. The project listing is
/// retried according to the configured [`RetryConfig`]; per-project and
/// per-tag requests are attempted once.
#[derive(Clone)]
pub struct GitLabClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: String,
    page_size: u32,
    retry: RetryConfig,
}

impl GitLabClient {
    /// Create a new GitLab client backed by reqwest.
    ///
    /// # Arguments
    ///
    /// * `url` - Instance URL (e.g., "https://gitlab.example.com")
    /// * `token` - Personal or project access token
    /// * `verify_tls` - Set to false for instances with self-signed certificates
    /// * `timeout` - Per-request timeout
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GitLabClient::new("https://gitlab.example.com", "token", true, DEFAULT_TIMEOUT)?;
    /// ```
    pub fn new(
        url: &str,
        token: &str,
        verify_tls: bool,
        timeout: Duration,
    ) -> Result<Self, GitLabError> {
        if url.trim().is_empty() {
            return Err(GitLabError::Config("GitLab URL is empty".to_string()));
        }
        let transport = ReqwestTransport::with_options(timeout, verify_tls)
            .map_err(|e| GitLabError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(url, token, Arc::new(transport)))
    }

    pub fn new_with_transport(url: &str, token: &str, transport: Arc<dyn HttpTransport>) -> Self {
        let url = url.trim().trim_end_matches('/');
        let base_url = url.strip_suffix(API_PATH).unwrap_or(url).to_string();
        Self {
            transport,
            base_url,
            token: token.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            retry: RetryConfig::default(),
        }
    }

    /// Set the number of items requested per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    /// Set the retry policy for the project listing.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Instance URL without the API path.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Full URL for an API path such as `/projects`.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PATH, path)
    }

    /// Make an authenticated GET request and classify the status.
    pub(crate) async fn get(&self, url: &str) -> Result<HttpResponse, GitLabError> {
        let request = HttpRequest::new(
            HttpMethod::Get,
            url,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("PRIVATE-TOKEN".to_string(), self.token.clone()),
            ],
        );

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| GitLabError::Http(e.to_string()))?;

        if response.status >= 400 {
            return Err(GitLabError::from_status(response.status, &response.text()));
        }

        Ok(response)
    }

    /// List every project visible to the token.
    ///
    /// Items are returned as raw JSON so a single malformed project can be
    /// reported without failing the whole listing.
    pub async fn list_projects(
        &self,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Value>, GitLabError> {
        self.fetch_all("/projects", &[], &self.retry, on_progress)
            .await
    }

    /// List the registry repositories of a project, including tag summaries.
    pub async fn list_repositories(
        &self,
        project_id: u64,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Value>, GitLabError> {
        let resource = format!("/projects/{project_id}/registry/repositories");
        self.fetch_all(
            &resource,
            &REGISTRY_FLAGS,
            &RetryConfig::single_attempt(),
            on_progress,
        )
        .await
    }

    /// Fetch the detail of a single tag.
    pub async fn get_tag(
        &self,
        project_id: u64,
        repository_id: u64,
        tag_name: &str,
    ) -> Result<GitLabTag, GitLabError> {
        let url = format!(
            "{}?{}",
            self.api_url(&format!(
                "/projects/{}/registry/repositories/{}/tags/{}",
                project_id,
                repository_id,
                urlencoding::encode(tag_name)
            )),
            query_string(&REGISTRY_FLAGS)
        );
        let response = self.get(&url).await?;
        serde_json::from_slice(&response.body).map_err(GitLabError::Json)
    }

    /// Fetch a repository file's raw content at `git_ref`.
    pub async fn get_raw_file(
        &self,
        project_id: u64,
        file_path: &str,
        git_ref: &str,
    ) -> Result<String, GitLabError> {
        let url = format!(
            "{}?ref={}",
            self.api_url(&format!(
                "/projects/{}/repository/files/{}/raw",
                project_id,
                urlencoding::encode(file_path)
            )),
            urlencoding::encode(git_ref)
        );
        let response = self.get(&url).await?;
        Ok(response.text())
    }
}

/// Render query pairs as `k=v&k=v`, values percent-encoded.
pub(crate) fn query_string(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
