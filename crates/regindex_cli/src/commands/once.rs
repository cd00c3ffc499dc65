use console::Term;
use regindex::collect::run_cycle;

use crate::commands::{CollectArgs, build_context};
use crate::config::Config;
use crate::progress::LoggingReporter;

pub(crate) async fn handle_once(
    args: CollectArgs,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = build_context(config, &args).await?;
    let callback = LoggingReporter::new().into_callback();

    let report = run_cycle(&context, 1, Some(&callback)).await?;

    if Term::stdout().is_term() {
        if args.dry_run {
            println!("DRY RUN - nothing was written to the store\n");
        }
        println!(
            "Projects: {} ({} with a registry), images seen: {}",
            report.projects, report.registry_projects, report.images_seen
        );
        println!(
            "Inserted: {}, updated: {}, unchanged: {}, skipped (no tags): {}, deleted: {}",
            report.inserted, report.updated, report.unchanged, report.skipped_untagged, report.deleted
        );
        if report.has_errors() {
            println!("\n{} item(s) failed:", report.failed_count());
            for error in &report.errors {
                println!("  - {error}");
            }
        }
    }

    Ok(())
}
