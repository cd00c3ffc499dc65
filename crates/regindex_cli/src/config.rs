//! Configuration file support for regindex.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. Environment variables (prefixed with `REGINDEX_`, nesting with `__`,
//!    e.g. `REGINDEX_GITLAB__TOKEN`)
//! 2. File given with `--config`
//! 3. Local config file (./regindex.toml)
//! 4. XDG config file (~/.config/regindex/config.toml)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [gitlab]
//! url = "https://gitlab.example.com"
//! token = "glpat-..."  # or use REGINDEX_GITLAB__TOKEN
//! verify_tls = true
//! timeout_secs = 60
//! registry = "registry.example.com"  # optional, sweep only this registry
//!
//! [collector]
//! update_interval_secs = 1800
//! retry_delay_secs = 20
//! # max_retries = 5  # unset retries the project listing forever
//! page_size = 100
//!
//! [store]
//! url = "http://localhost:5984"  # or "memory://" for a dry run
//! user = "admin"
//! password = "..."
//! database = "container_images"
//! ignored_fields = ["_id", "_rev"]  # `_id` and `_rev` are ignored even if omitted
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Store URL that selects the in-process store.
pub const MEMORY_STORE_URL: &str = "memory://";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gitlab: GitLabConfig,
    pub collector: CollectorConfig,
    pub store: StoreConfig,
}

/// GitLab configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// Instance URL, e.g. "https://gitlab.example.com".
    pub url: Option<String>,
    /// Personal or project access token with `read_api` and `read_registry`.
    pub token: Option<String>,
    /// Set to false for instances with self-signed certificates.
    pub verify_tls: bool,
    pub timeout_secs: u64,
    /// Registry to sweep. When unset, every registry seen in a cycle is swept.
    pub registry: Option<String>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            verify_tls: true,
            timeout_secs: 60,
            registry: None,
        }
    }
}

/// Collector loop options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub update_interval_secs: u64,
    pub retry_delay_secs: u64,
    /// Retries of a failed project listing page. Unset retries forever.
    pub max_retries: Option<usize>,
    pub page_size: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 1800,
            retry_delay_secs: 20,
            max_retries: None,
            page_size: 100,
        }
    }
}

/// Document store configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// CouchDB server URL, or `memory://`.
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
    /// Top-level fields that never count as a change. `_id` and `_rev` are
    /// always ignored, whether listed or not.
    pub ignored_fields: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5984".to_string(),
            user: None,
            password: None,
            database: "container_images".to_string(),
            ignored_fields: vec!["_id".to_string(), "_rev".to_string()],
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// An explicit `--config` file must exist; the XDG and local files are
    /// optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(File::from(xdg_config).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("regindex.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./regindex.toml");
            builder = builder.add_source(File::from(local_config).format(FileFormat::Toml).required(false));
        }

        if let Some(path) = explicit {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        // REGINDEX_STORE__IGNORED_FIELDS=_id,_rev,readme_html -> store.ignored_fields
        builder = builder.add_source(
            Environment::with_prefix("REGINDEX")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("store.ignored_fields"),
        );

        builder.build()?.try_deserialize()
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "regindex").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.collector.update_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.collector.retry_delay_secs)
    }

    pub fn gitlab_timeout(&self) -> Duration {
        Duration::from_secs(self.gitlab.timeout_secs)
    }

    /// Whether records go to the in-process store instead of CouchDB.
    pub fn uses_memory_store(&self) -> bool {
        self.store.url == MEMORY_STORE_URL
    }

    /// Basic auth credentials, when a user is configured.
    pub fn store_credentials(&self) -> Option<(&str, &str)> {
        self.store
            .user
            .as_deref()
            .map(|user| (user, self.store.password.as_deref().unwrap_or_default()))
    }
}
