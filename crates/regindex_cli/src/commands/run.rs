use regindex::collect::Scheduler;

use crate::commands::{CollectArgs, build_context};
use crate::config::Config;
use crate::progress::LoggingReporter;
use crate::shutdown::setup_shutdown_handler;

pub(crate) async fn handle_run(
    args: CollectArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = build_context(config, &args).await?;
    let shutdown = setup_shutdown_handler();

    tracing::info!(
        gitlab = context.client().base_url(),
        interval_secs = context.options().update_interval.as_secs(),
        registry = context.options().registry.as_deref().unwrap_or("<all seen>"),
        "Starting collector"
    );

    let callback = LoggingReporter::new().into_callback();
    let mut scheduler = Scheduler::new(context, shutdown);
    let cycles = scheduler.run(Some(&callback)).await?;

    tracing::info!(cycles, "Collector stopped");
    Ok(())
}
