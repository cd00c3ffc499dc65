//! Container image records and the enrichment pipeline that derives them.
//!
//! # Module Structure
//!
//! - [`age`] - Calendar-aware age and its one-unit description
//! - [`size`] - Binary-unit byte formatting
//! - [`time`] - Timestamp parsing and canonical forms
//! - [`revision`] - Colour grouping of tags sharing a revision
//! - [`readme`] - README Markdown rendering
//! - [`enrich`] - Derived-field computation for a whole image

pub mod age;
pub mod enrich;
pub mod readme;
pub mod revision;
pub mod size;
pub mod time;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::gitlab::{GitLabProject, GitLabRepository, GitLabTag};

pub use age::CalendarDelta;
pub use enrich::{enrich, summarize};

/// Project snapshot embedded in every image record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_with_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// Empty when upstream has no description.
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_url: Option<String>,
    #[serde(default)]
    pub container_registry_enabled: bool,
}

impl From<GitLabProject> for Project {
    fn from(project: GitLabProject) -> Self {
        Self {
            container_registry_enabled: project.registry_enabled(),
            id: project.id,
            name: project.name,
            path_with_namespace: project.path_with_namespace,
            web_url: project.web_url,
            description: project.description.unwrap_or_default(),
            readme_url: project.readme_url.filter(|url| !url.is_empty()),
        }
    }
}

/// One tag of an image, as fetched from the tag-detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(
        default,
        with = "time::canonical_format::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_size: u64,
    #[serde(default)]
    pub total_size_human_readable: String,
    #[serde(default)]
    pub created_at_human_readable: String,
    #[serde(default)]
    pub tag_revision_background_color: String,
}

impl Tag {
    /// A tag with only a name; everything else empty.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: None,
            location: None,
            revision: None,
            short_revision: None,
            digest: None,
            created_at: None,
            total_size: 0,
            total_size_human_readable: String::new(),
            created_at_human_readable: String::new(),
            tag_revision_background_color: String::new(),
        }
    }

    /// Convert a tag-detail payload. An unparsable `created_at` is dropped
    /// with a warning.
    pub fn from_detail(detail: GitLabTag) -> Self {
        let created_at = detail.created_at.as_deref().and_then(|raw| {
            let parsed = time::parse_timestamp(raw);
            if parsed.is_none() {
                tracing::warn!(tag = %detail.name, created_at = raw, "Unparsable tag timestamp");
            }
            parsed
        });

        Self {
            path: detail.path,
            location: detail.location,
            revision: detail.revision,
            short_revision: detail.short_revision,
            digest: detail.digest,
            created_at,
            total_size: detail.total_size.unwrap_or(0),
            ..Self::named(&detail.name)
        }
    }
}

/// A registry repository with its tags and derived summary fields.
///
/// `location` is the identity; `hash` is its SHA-256 and doubles as the
/// indexed lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImage {
    /// Upstream repository id.
    pub id: u64,
    /// Same as `location`.
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub path: String,
    pub hash: String,
    pub registry: String,
    pub project_id: u64,
    pub project: Project,
    pub tags: BTreeMap<String, Tag>,

    #[serde(
        default,
        with = "time::canonical_format::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_tag: Option<String>,
    /// Alias of `last_update_tag` kept for the UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub size_human_readable: String,
    #[serde(default)]
    pub age_human_readable: String,
    /// Recomputed every cycle and never stored.
    #[serde(skip)]
    pub age: Option<CalendarDelta>,
    #[serde(
        default,
        with = "time::canonical_format::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_md: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_html: Option<String>,
}

impl ContainerImage {
    /// Build a record from a repository listing entry and its fetched tags.
    /// Derived fields start empty; see [`enrich`].
    pub fn new(repository: &GitLabRepository, project: &Project, tags: BTreeMap<String, Tag>) -> Self {
        let location = repository.location.clone();
        Self {
            id: repository.id,
            name: location.clone(),
            path: repository.path.clone(),
            hash: image_hash(&location),
            registry: registry_of(&location).to_string(),
            project_id: project.id,
            project: project.clone(),
            tags,
            location,
            last_update: None,
            last_update_tag: None,
            tag: None,
            size: 0,
            size_human_readable: String::new(),
            age_human_readable: String::new(),
            age: None,
            created: None,
            readme_md: None,
            readme_html: None,
        }
    }

    /// Store key for this image.
    pub fn key(&self) -> &str {
        &self.location
    }
}

/// SHA-256 hex digest of an image location.
pub fn image_hash(location: &str) -> String {
    format!("{:x}", Sha256::digest(location.as_bytes()))
}

/// Leading path segment of an image location, e.g. the host of
/// `registry.example.com/group/app`.
pub fn registry_of(location: &str) -> &str {
    location.split('/').next().unwrap_or_default()
}
