//! GitLab API payload types.
//!
//! Only the fields the collector reads are declared; everything else in the
//! upstream JSON is ignored.

use serde::{Deserialize, Serialize};

/// A project as returned by `GET /projects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabProject {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub readme_url: Option<String>,
    /// Missing on instances with the registry disabled globally.
    #[serde(default)]
    pub container_registry_enabled: Option<bool>,
}

impl GitLabProject {
    #[must_use]
    pub fn registry_enabled(&self) -> bool {
        self.container_registry_enabled.unwrap_or(false)
    }
}

/// A registry repository as returned by
/// `GET /projects/{id}/registry/repositories?tags=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabRepository {
    pub id: u64,
    pub project_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub location: String,
    #[serde(default)]
    pub tags: Vec<GitLabTagSummary>,
    #[serde(default)]
    pub tags_count: Option<u64>,
}

/// A tag entry inside a repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabTagSummary {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Tag detail as returned by
/// `GET /projects/{id}/registry/repositories/{repo_id}/tags/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabTag {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub short_revision: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
    /// Raw upstream timestamp; parsed during enrichment.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub total_size: Option<u64>,
}
