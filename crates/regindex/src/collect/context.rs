//! Everything a cycle needs, built once at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::gitlab::GitLabClient;
use crate::store::catalog::ensure_indexes;
use crate::store::{DiffPolicy, DocumentStore, StoreError};

/// Pause between the end of one cycle and the start of the next.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(1800);

/// Tunables of the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorOptions {
    pub update_interval: Duration,
    /// Registry to sweep. When unset, every registry seen during the cycle
    /// is swept.
    pub registry: Option<String>,
    /// Fields that never count as a change when diffing records.
    pub diff_policy: DiffPolicy,
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            registry: None,
            diff_policy: DiffPolicy::default(),
        }
    }
}

/// Upstream client, store handle and options shared by all cycles.
#[derive(Clone)]
pub struct CollectorContext {
    client: GitLabClient,
    store: Arc<dyn DocumentStore>,
    options: CollectorOptions,
}

impl CollectorContext {
    pub fn new(client: GitLabClient, store: Arc<dyn DocumentStore>, options: CollectorOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    pub fn client(&self) -> &GitLabClient {
        &self.client
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn options(&self) -> &CollectorOptions {
        &self.options
    }

    /// Create the lookup indexes the catalog relies on.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        ensure_indexes(self.store()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockTransport;
    use crate::store::MemoryStore;

    #[test]
    fn test_default_options() {
        let options = CollectorOptions::default();
        assert_eq!(options.update_interval, Duration::from_secs(1800));
        assert_eq!(options.registry, None);
        assert!(options.diff_policy.is_ignored("_rev"));
    }

    #[tokio::test]
    async fn test_prepare_on_memory_store() {
        let client = GitLabClient::new_with_transport(
            "https://gitlab.test",
            "token",
            Arc::new(MockTransport::new()),
        );
        let context = CollectorContext::new(client, Arc::new(MemoryStore::new()), CollectorOptions::default());
        context.prepare().await.expect("prepare");
        assert_eq!(context.client().base_url(), "https://gitlab.test");
    }
}
