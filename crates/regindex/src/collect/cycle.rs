//! One full collection pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;

use super::context::CollectorContext;
use super::progress::{CollectProgress, ProgressCallback, emit};
use super::report::{CycleReport, ItemError};
use super::CollectError;
use crate::gitlab::{GitLabError, GitLabProject, GitLabRepository};
use crate::image::enrich::{attach_readme, enrich};
use crate::image::readme::{README_REF, readme_file_name};
use crate::image::{ContainerImage, Project, Tag, registry_of};
use crate::reconcile::reconcile;
use crate::store::catalog::stored_registries;
use crate::store::store;

/// Run one cycle: list, collect, enrich, store, sweep.
///
/// Item failures are logged and collected in the report. Only a rejected
/// token (or an exhausted, bounded retry of the project listing) ends the
/// cycle with an error.
pub async fn run_cycle(
    ctx: &CollectorContext,
    cycle: u64,
    on_progress: Option<&ProgressCallback>,
) -> Result<CycleReport, CollectError> {
    let started = Instant::now();
    let now = Utc::now();
    let mut report = CycleReport::new(cycle);

    tracing::info!(cycle, "Starting collection cycle");
    emit(on_progress, CollectProgress::CycleStarted { cycle });

    let raw_projects = ctx.client().list_projects(on_progress).await?;
    report.projects = raw_projects.len();

    // ids come from the raw payloads so a project that fails to decode still
    // protects its images from the sweep
    let current_ids: HashSet<u64> = raw_projects
        .iter()
        .filter_map(|p| p.get("id").and_then(Value::as_u64))
        .collect();

    let projects = decode_projects(raw_projects, &mut report, on_progress);
    let enabled: Vec<&Project> = projects
        .iter()
        .filter(|p| p.container_registry_enabled)
        .collect();
    report.registry_projects = enabled.len();

    tracing::info!(
        total = report.projects,
        registry_enabled = report.registry_projects,
        "Listed projects"
    );
    emit(
        on_progress,
        CollectProgress::ProjectsListed {
            total: report.projects,
            registry_enabled: report.registry_projects,
        },
    );

    let mut registries_seen = BTreeSet::new();
    for project in enabled {
        collect_project(ctx, project, now, &mut report, &mut registries_seen, on_progress).await?;
    }

    sweep(ctx, &current_ids, registries_seen, &mut report, on_progress).await;

    report.elapsed = started.elapsed();
    tracing::info!(
        cycle,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        skipped = report.skipped_untagged,
        deleted = report.deleted,
        errors = report.failed_count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Collection cycle complete"
    );
    emit(
        on_progress,
        CollectProgress::CycleComplete {
            cycle,
            inserted: report.inserted,
            updated: report.updated,
            unchanged: report.unchanged,
            deleted: report.deleted,
            errors: report.failed_count(),
            elapsed: report.elapsed,
        },
    );

    Ok(report)
}

fn record_error(report: &mut CycleReport, error: ItemError, on_progress: Option<&ProgressCallback>) {
    tracing::warn!(error = %error, payload = error.payload().unwrap_or_default(), "Item failed");
    emit(
        on_progress,
        CollectProgress::ItemFailed {
            error: error.to_string(),
        },
    );
    report.errors.push(error);
}

fn decode_projects(
    raw_projects: Vec<Value>,
    report: &mut CycleReport,
    on_progress: Option<&ProgressCallback>,
) -> Vec<Project> {
    let mut projects = Vec::with_capacity(raw_projects.len());
    for raw in raw_projects {
        match serde_json::from_value::<GitLabProject>(raw.clone()) {
            Ok(project) => projects.push(Project::from(project)),
            Err(e) => record_error(
                report,
                ItemError::MalformedProject {
                    payload: raw.to_string(),
                    error: e.to_string(),
                },
                on_progress,
            ),
        }
    }
    projects
}

/// Split a per-item upstream failure into "stop everything" and "record it".
fn triage(err: GitLabError) -> Result<String, CollectError> {
    if err.is_fatal() {
        Err(err.into())
    } else {
        Ok(err.to_string())
    }
}

async fn collect_project(
    ctx: &CollectorContext,
    project: &Project,
    now: DateTime<Utc>,
    report: &mut CycleReport,
    registries_seen: &mut BTreeSet<String>,
    on_progress: Option<&ProgressCallback>,
) -> Result<(), CollectError> {
    let raw_repositories = match ctx.client().list_repositories(project.id, on_progress).await {
        Ok(repositories) => repositories,
        Err(e) => {
            let error = triage(e)?;
            record_error(
                report,
                ItemError::RepositoryListing {
                    project_id: project.id,
                    payload: serde_json::to_string(project).unwrap_or_default(),
                    error,
                },
                on_progress,
            );
            return Ok(());
        }
    };

    // fetched lazily, at most once per project
    let mut readme: Option<Option<String>> = None;

    for raw in raw_repositories {
        let repository = match serde_json::from_value::<GitLabRepository>(raw.clone()) {
            Ok(repository) => repository,
            Err(e) => {
                record_error(
                    report,
                    ItemError::MalformedRepository {
                        project_id: project.id,
                        payload: raw.to_string(),
                        error: e.to_string(),
                    },
                    on_progress,
                );
                continue;
            }
        };
        report.images_seen += 1;
        registries_seen.insert(registry_of(&repository.location).to_string());

        let Some(tags) = fetch_tags(ctx, project, &repository, report, on_progress).await? else {
            continue;
        };
        if tags.is_empty() {
            report.skipped_untagged += 1;
            tracing::debug!(location = %repository.location, "Skipping image without tags");
            emit(
                on_progress,
                CollectProgress::ImageSkipped {
                    location: repository.location.clone(),
                    reason: "no tags".to_string(),
                },
            );
            continue;
        }

        let mut image = ContainerImage::new(&repository, project, tags);
        enrich(&mut image, now);

        if readme.is_none() {
            readme = Some(fetch_readme(ctx, project, report, on_progress).await?);
        }
        if let Some(Some(markdown)) = &readme {
            attach_readme(&mut image, markdown.clone());
        }

        match store(ctx.store(), image.key(), &image, &ctx.options().diff_policy).await {
            Ok(stored) => {
                report.record_outcome(&stored.outcome);
                tracing::debug!(
                    location = %image.location,
                    outcome = stored.outcome.kind().as_str(),
                    "Stored image"
                );
                emit(
                    on_progress,
                    CollectProgress::ImageStored {
                        location: image.location.clone(),
                        tags: image.tags.len(),
                        outcome: stored.outcome.kind(),
                    },
                );
            }
            Err(e) => record_error(
                report,
                ItemError::Store {
                    location: image.location.clone(),
                    error: e.to_string(),
                },
                on_progress,
            ),
        }
    }

    Ok(())
}

/// Fetch the detail of every tag. `None` means a tag failed and the image
/// must be skipped so no partial record is written.
async fn fetch_tags(
    ctx: &CollectorContext,
    project: &Project,
    repository: &GitLabRepository,
    report: &mut CycleReport,
    on_progress: Option<&ProgressCallback>,
) -> Result<Option<BTreeMap<String, Tag>>, CollectError> {
    let mut tags = BTreeMap::new();
    for summary in &repository.tags {
        match ctx
            .client()
            .get_tag(project.id, repository.id, &summary.name)
            .await
        {
            Ok(detail) => {
                tags.insert(summary.name.clone(), Tag::from_detail(detail));
            }
            Err(e) => {
                let error = triage(e)?;
                record_error(
                    report,
                    ItemError::TagDetail {
                        location: repository.location.clone(),
                        tag: summary.name.clone(),
                        payload: serde_json::to_string(repository).unwrap_or_default(),
                        error,
                    },
                    on_progress,
                );
                emit(
                    on_progress,
                    CollectProgress::ImageSkipped {
                        location: repository.location.clone(),
                        reason: format!("tag {} unavailable", summary.name),
                    },
                );
                return Ok(None);
            }
        }
    }
    Ok(Some(tags))
}

async fn fetch_readme(
    ctx: &CollectorContext,
    project: &Project,
    report: &mut CycleReport,
    on_progress: Option<&ProgressCallback>,
) -> Result<Option<String>, CollectError> {
    let Some(file) = project.readme_url.as_deref().and_then(readme_file_name) else {
        return Ok(None);
    };
    match ctx.client().get_raw_file(project.id, file, README_REF).await {
        Ok(markdown) => Ok(Some(markdown)),
        Err(e) => {
            let error = triage(e)?;
            record_error(
                report,
                ItemError::Readme {
                    project_id: project.id,
                    error,
                },
                on_progress,
            );
            Ok(None)
        }
    }
}

async fn sweep(
    ctx: &CollectorContext,
    current_ids: &HashSet<u64>,
    registries_seen: BTreeSet<String>,
    report: &mut CycleReport,
    on_progress: Option<&ProgressCallback>,
) {
    if report.projects == 0 {
        report.sweep_skipped = true;
        let reason = "project listing returned no projects".to_string();
        tracing::warn!(reason = %reason, "Skipping sweep");
        emit(on_progress, CollectProgress::SweepSkipped { reason });
        return;
    }

    let registries: Vec<String> = match &ctx.options().registry {
        Some(registry) => vec![registry.clone()],
        None => {
            // Registries whose last project vanished are only known to the store.
            let mut registries = registries_seen;
            match stored_registries(ctx.store()).await {
                Ok(stored) => registries.extend(stored),
                Err(e) => record_error(
                    report,
                    ItemError::Sweep {
                        registry: "*".to_string(),
                        error: e.to_string(),
                    },
                    on_progress,
                ),
            }
            registries.into_iter().collect()
        }
    };

    for registry in registries {
        match reconcile(ctx.store(), &registry, current_ids, on_progress).await {
            Ok(sweep) => {
                report.deleted += sweep.deleted.len();
                for (id, error) in sweep.failures {
                    report.errors.push(ItemError::Delete { id, error });
                }
                report.swept_registries.push(registry);
            }
            Err(e) => record_error(
                report,
                ItemError::Sweep {
                    registry,
                    error: e.to_string(),
                },
                on_progress,
            ),
        }
    }
}
