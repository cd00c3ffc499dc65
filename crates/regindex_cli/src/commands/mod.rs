pub(crate) mod once;
pub(crate) mod run;

use std::sync::Arc;

use regindex::collect::{CollectorContext, CollectorOptions};
use regindex::gitlab::GitLabClient;
use regindex::retry::RetryConfig;
use regindex::store::{CouchStore, DiffPolicy, DocumentStore, MemoryStore};

use crate::config::Config;

/// Options shared by `run` and `once`.
#[derive(Debug, Clone, Default, clap::Args)]
pub(crate) struct CollectArgs {
    /// Registry to sweep (overrides `gitlab.registry`)
    #[arg(short = 'r', long)]
    pub(crate) registry: Option<String>,

    /// Dry run - keep records in memory instead of writing to the store
    #[arg(short = 'n', long)]
    pub(crate) dry_run: bool,
}

/// Build the client, store and options every cycle shares.
pub(crate) async fn build_context(
    config: &Config,
    args: &CollectArgs,
) -> Result<CollectorContext, Box<dyn std::error::Error>> {
    let url = config
        .gitlab
        .url
        .as_deref()
        .ok_or("gitlab.url must be set (REGINDEX_GITLAB__URL or config file)")?;
    let token = config
        .gitlab
        .token
        .as_deref()
        .ok_or("gitlab.token must be set (REGINDEX_GITLAB__TOKEN, .env or config file)")?;

    let retry = RetryConfig::new(config.retry_delay(), config.collector.max_retries);
    let client = GitLabClient::new(url, token, config.gitlab.verify_tls, config.gitlab_timeout())?
        .with_page_size(config.collector.page_size)
        .with_retry(retry);
    if !config.gitlab.verify_tls {
        tracing::warn!(url, "TLS certificate verification is disabled");
    }

    let store: Arc<dyn DocumentStore> = if args.dry_run || config.uses_memory_store() {
        tracing::info!("Using in-memory store, records are discarded on exit");
        Arc::new(MemoryStore::new())
    } else {
        let couch = CouchStore::new(
            &config.store.url,
            &config.store.database,
            config.store_credentials(),
            config.gitlab_timeout(),
        )?;
        couch.ensure_database().await?;
        tracing::info!(url = %config.store.url, database = couch.database(), "Connected to store");
        Arc::new(couch)
    };

    let options = CollectorOptions {
        update_interval: config.update_interval(),
        registry: args.registry.clone().or_else(|| config.gitlab.registry.clone()),
        diff_policy: DiffPolicy::ignoring(config.store.ignored_fields.iter().cloned()),
    };

    let context = CollectorContext::new(client, store, options);
    context.prepare().await?;
    Ok(context)
}
