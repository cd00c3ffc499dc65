//! GitLab API v4 client for container registry metadata.
//!
//! # Module Structure
//!
//! - [`error`] - Error types and retry classification
//! - [`types`] - Payload types for projects, repositories and tags
//! - [`client`] - Authenticated requests over an [`HttpTransport`](crate::http::HttpTransport)
//! - [`pagination`] - `x-total-pages` driven page loop

mod client;
mod error;
mod pagination;
mod types;

pub use client::{API_PATH, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT, GitLabClient};
pub use error::{GitLabError, is_retryable};
pub use pagination::total_pages;
pub use types::{GitLabProject, GitLabRepository, GitLabTag, GitLabTagSummary};

/// Result type for GitLab operations.
pub type Result<T> = std::result::Result<T, GitLabError>;
