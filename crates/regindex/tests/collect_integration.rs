//! Integration tests for full collection cycles.
//!
//! Every upstream exchange is scripted through the HTTP transport seam and
//! records land in the in-process store, so these tests cover the whole
//! list / collect / enrich / store / sweep path without sockets.
//!
//! Key scenarios tested:
//! - A cycle stores enriched images and skips untagged ones
//! - A second identical cycle performs no writes
//! - The sweep only touches the registry being swept
//! - Without a configured registry, registries known only to the store are swept
//! - Repository listing and README failures are recorded, other work continues
//! - A rejected token stops the cycle immediately

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regindex::collect::{CollectError, CollectorContext, CollectorOptions, ItemError, run_cycle};
use regindex::gitlab::GitLabClient;
use regindex::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use regindex::store::catalog::get_image;
use regindex::store::{DocumentStore, MemoryStore};
use serde_json::{Map, Value, json};

/// If a cycle takes longer than this, something is stuck.
const CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

const API: &str = "https://gitlab.test/api/v4";
const REGISTRY_QUERY: &str = "tags=true&tags_count=true&size=true";

/// Transport answering every GET with a fixed, replaceable response.
#[derive(Clone, Default)]
struct ScriptedGitLab {
    routes: Arc<Mutex<HashMap<String, (u16, Vec<(String, String)>, String)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedGitLab {
    fn route(&self, url: impl Into<String>, status: u16, body: Value) {
        self.route_raw(url, status, vec![("x-total-pages".to_string(), "1".to_string())], body.to_string());
    }

    fn route_raw(&self, url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: String) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.into(), (status, headers, body));
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedGitLab {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        assert_eq!(request.method, HttpMethod::Get);
        self.requests.lock().unwrap().push(request.url.clone());
        match self.routes.lock().unwrap().get(&request.url) {
            Some((status, headers, body)) => Ok(HttpResponse {
                status: *status,
                headers: headers.clone(),
                body: body.clone().into_bytes(),
            }),
            None => Err(HttpError::NoMockResponse {
                method: request.method.as_str().to_string(),
                url: request.url,
            }),
        }
    }
}

fn projects_url() -> String {
    format!("{API}/projects?page=1&per_page=100")
}

fn repositories_url(project_id: u64) -> String {
    format!("{API}/projects/{project_id}/registry/repositories?{REGISTRY_QUERY}&page=1&per_page=100")
}

fn tag_url(project_id: u64, repository_id: u64, tag: &str) -> String {
    format!("{API}/projects/{project_id}/registry/repositories/{repository_id}/tags/{tag}?{REGISTRY_QUERY}")
}

/// One registry-enabled project with a tagged and an untagged image, one
/// project without a registry and one malformed project payload.
fn script_instance() -> ScriptedGitLab {
    let gitlab = ScriptedGitLab::default();
    gitlab.route(
        projects_url(),
        200,
        json!([
            {
                "id": 1,
                "name": "app",
                "path_with_namespace": "group/app",
                "container_registry_enabled": true,
                "readme_url": "https://gitlab.test/group/app/-/blob/main/README.md"
            },
            {"id": 2, "name": "docs", "container_registry_enabled": false},
            {"id": "not-a-number", "name": "broken"}
        ]),
    );
    gitlab.route(
        repositories_url(1),
        200,
        json!([
            {
                "id": 10,
                "project_id": 1,
                "path": "group/app",
                "location": "registry.test/group/app",
                "tags": [{"name": "v1"}, {"name": "latest"}]
            },
            {
                "id": 11,
                "project_id": 1,
                "path": "group/app/empty",
                "location": "registry.test/group/app/empty",
                "tags": []
            }
        ]),
    );
    gitlab.route(
        tag_url(1, 10, "v1"),
        200,
        json!({
            "name": "v1",
            "revision": "abcdef0123456789",
            "created_at": "2024-03-15T10:00:00.000+00:00",
            "total_size": 1024
        }),
    );
    gitlab.route(
        tag_url(1, 10, "latest"),
        200,
        json!({
            "name": "latest",
            "revision": "abcdef0123456789",
            "created_at": "2024-04-15T10:00:00.000+00:00",
            "total_size": 2048
        }),
    );
    gitlab.route_raw(
        format!("{API}/projects/1/repository/files/README.md/raw?ref=HEAD"),
        200,
        Vec::new(),
        "# App\n\nServes things.\n".to_string(),
    );
    gitlab
}

fn context(gitlab: &ScriptedGitLab, store: Arc<MemoryStore>, options: CollectorOptions) -> CollectorContext {
    let client = GitLabClient::new_with_transport("https://gitlab.test", "token", Arc::new(gitlab.clone()));
    CollectorContext::new(client, store, options)
}

fn stored_body(registry: &str, project_id: u64) -> Map<String, Value> {
    json!({
        "name": format!("{registry}/old/image"),
        "location": format!("{registry}/old/image"),
        "registry": registry,
        "project_id": project_id,
        "project": {"id": project_id}
    })
    .as_object()
    .cloned()
    .unwrap()
}

#[tokio::test]
async fn test_cycle_stores_enriched_images() {
    let gitlab = script_instance();
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let report = tokio::time::timeout(CYCLE_TIMEOUT, run_cycle(&ctx, 1, None))
        .await
        .expect("cycle timed out")
        .expect("cycle failed");

    assert_eq!(report.projects, 3);
    assert_eq!(report.registry_projects, 1);
    assert_eq!(report.images_seen, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped_untagged, 1);
    assert_eq!(report.failed_count(), 1);
    assert!(matches!(report.errors[0], ItemError::MalformedProject { .. }));

    assert_eq!(store.len(), 1);
    let image = get_image(store.as_ref(), "registry.test/group/app")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(image.registry, "registry.test");
    assert_eq!(image.project_id, 1);
    assert_eq!(image.size, 3072);
    assert_eq!(image.size_human_readable, "3.00 KiB");
    assert_eq!(image.last_update_tag.as_deref(), Some("latest"));
    assert_eq!(image.tag.as_deref(), Some("latest"));
    assert_eq!(image.tags["v1"].tag_revision_background_color, "abcdef");
    assert_eq!(image.tags["latest"].total_size_human_readable, "2.00 KiB");
    assert_eq!(image.readme_md.as_deref(), Some("# App\n\nServes things.\n"));
    assert!(image.readme_html.as_deref().unwrap_or_default().contains("<h3>App</h3>"));

    assert!(
        get_image(store.as_ref(), "registry.test/group/app/empty")
            .await
            .expect("get")
            .is_none()
    );
}

#[tokio::test]
async fn test_second_identical_cycle_writes_nothing() {
    let gitlab = script_instance();
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let first = run_cycle(&ctx, 1, None).await.expect("first cycle");
    let writes = store.write_count();
    let second = run_cycle(&ctx, 2, None).await.expect("second cycle");

    assert_eq!(first.inserted, 1);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 1);
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn test_changed_tag_updates_record() {
    let gitlab = script_instance();
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());
    let _ = run_cycle(&ctx, 1, None).await.expect("first cycle");

    gitlab.route(
        tag_url(1, 10, "latest"),
        200,
        json!({
            "name": "latest",
            "revision": "fedcba9876543210",
            "created_at": "2024-05-15T10:00:00.000+00:00",
            "total_size": 4096
        }),
    );
    let report = run_cycle(&ctx, 2, None).await.expect("second cycle");

    assert_eq!(report.updated, 1);
    let image = get_image(store.as_ref(), "registry.test/group/app")
        .await
        .expect("get")
        .expect("stored");
    assert_eq!(image.size, 5120);
    // revisions no longer shared
    assert_eq!(image.tags["v1"].tag_revision_background_color, "");
}

#[tokio::test]
async fn test_sweep_only_touches_swept_registry() {
    let gitlab = script_instance();
    let store = Arc::new(MemoryStore::new());
    store
        .put("registry.test%2Fold%2Fimage", None, stored_body("registry.test", 99))
        .await
        .expect("seed");
    store
        .put("other.test%2Fold%2Fimage", None, stored_body("other.test", 99))
        .await
        .expect("seed");
    store
        .put("registry.test%2Fdocs", None, stored_body("registry.test", 2))
        .await
        .expect("seed");
    let options = CollectorOptions {
        registry: Some("registry.test".to_string()),
        ..CollectorOptions::default()
    };
    let ctx = context(&gitlab, store.clone(), options);

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert_eq!(report.deleted, 1);
    assert_eq!(report.swept_registries, vec!["registry.test".to_string()]);
    let ids = store.ids();
    assert!(!ids.contains(&"registry.test%2Fold%2Fimage".to_string()));
    assert!(ids.contains(&"other.test%2Fold%2Fimage".to_string()));
    assert!(ids.contains(&"registry.test%2Fdocs".to_string()));
    assert!(ids.contains(&"registry.test%2Fgroup%2Fapp".to_string()));
}

#[tokio::test]
async fn test_configured_registry_is_swept_even_without_images() {
    let gitlab = ScriptedGitLab::default();
    gitlab.route(projects_url(), 200, json!([{"id": 5, "container_registry_enabled": false}]));
    let store = Arc::new(MemoryStore::new());
    store
        .put("r1.test%2Fgone", None, stored_body("r1.test", 99))
        .await
        .expect("seed");
    store
        .put("r2.test%2Fgone", None, stored_body("r2.test", 99))
        .await
        .expect("seed");
    let options = CollectorOptions {
        registry: Some("r1.test".to_string()),
        ..CollectorOptions::default()
    };
    let ctx = context(&gitlab, store.clone(), options);

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert_eq!(report.deleted, 1);
    assert_eq!(store.ids(), vec!["r2.test%2Fgone".to_string()]);
}

#[tokio::test]
async fn test_unconfigured_sweep_covers_registries_only_in_store() {
    let gitlab = ScriptedGitLab::default();
    gitlab.route(projects_url(), 200, json!([{"id": 5, "container_registry_enabled": true}]));
    gitlab.route(repositories_url(5), 200, json!([]));
    let store = Arc::new(MemoryStore::new());
    store
        .put("r1.test%2Fgone", None, stored_body("r1.test", 99))
        .await
        .expect("seed");
    store
        .put("r1.test%2Fkept", None, stored_body("r1.test", 5))
        .await
        .expect("seed");
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert_eq!(report.images_seen, 0);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.swept_registries, vec!["r1.test".to_string()]);
    assert!(!report.has_errors());
    assert_eq!(store.ids(), vec!["r1.test%2Fkept".to_string()]);
}

#[tokio::test]
async fn test_empty_project_listing_skips_sweep() {
    let gitlab = ScriptedGitLab::default();
    gitlab.route(projects_url(), 200, json!([]));
    let store = Arc::new(MemoryStore::new());
    store
        .put("r1.test%2Fkept", None, stored_body("r1.test", 99))
        .await
        .expect("seed");
    let options = CollectorOptions {
        registry: Some("r1.test".to_string()),
        ..CollectorOptions::default()
    };
    let ctx = context(&gitlab, store.clone(), options);

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert!(report.sweep_skipped);
    assert_eq!(report.deleted, 0);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_failed_tag_skips_image() {
    let gitlab = script_instance();
    gitlab.route(tag_url(1, 10, "v1"), 500, json!({"message": "500 Internal Server Error"}));
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert_eq!(report.inserted, 0);
    assert!(
        report
            .errors
            .iter()
            .any(|e| matches!(e, ItemError::TagDetail { tag, .. } if tag == "v1"))
    );
    let tag_error = report
        .errors
        .iter()
        .find(|e| matches!(e, ItemError::TagDetail { .. }))
        .expect("tag error");
    assert!(
        tag_error
            .payload()
            .is_some_and(|p| p.contains("registry.test/group/app"))
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_rejected_token_stops_cycle() {
    let gitlab = ScriptedGitLab::default();
    gitlab.route(projects_url(), 401, json!({"message": "401 Unauthorized"}));
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let err = tokio::time::timeout(CYCLE_TIMEOUT, run_cycle(&ctx, 1, None))
        .await
        .expect("cycle timed out")
        .expect_err("unauthorized");

    assert!(matches!(err, CollectError::Unauthorized(_)));
    assert!(err.is_fatal());
    assert_eq!(gitlab.requests(), vec![projects_url()]);
}

#[tokio::test]
async fn test_failed_repository_listing_keeps_other_projects() {
    let gitlab = script_instance();
    gitlab.route(
        projects_url(),
        200,
        json!([
            {"id": 1, "name": "app", "container_registry_enabled": true},
            {"id": 3, "name": "api", "container_registry_enabled": true}
        ]),
    );
    gitlab.route(repositories_url(1), 500, json!({"message": "500 Internal Server Error"}));
    gitlab.route(
        repositories_url(3),
        200,
        json!([{
            "id": 30,
            "project_id": 3,
            "path": "group/api",
            "location": "registry.test/group/api",
            "tags": [{"name": "v2"}]
        }]),
    );
    gitlab.route(
        tag_url(3, 30, "v2"),
        200,
        json!({
            "name": "v2",
            "revision": "0123456789abcdef",
            "created_at": "2024-04-01T08:00:00.000+00:00",
            "total_size": 512
        }),
    );
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert_eq!(report.registry_projects, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.failed_count(), 1);
    let err = &report.errors[0];
    assert!(matches!(err, ItemError::RepositoryListing { project_id: 1, .. }));
    assert!(err.payload().is_some_and(|p| p.contains("\"id\":1")));
    assert_eq!(store.ids(), vec!["registry.test%2Fgroup%2Fapi".to_string()]);
}

#[tokio::test]
async fn test_failed_readme_still_stores_image() {
    let gitlab = script_instance();
    gitlab.route_raw(
        format!("{API}/projects/1/repository/files/README.md/raw?ref=HEAD"),
        500,
        Vec::new(),
        "500 Internal Server Error".to_string(),
    );
    let store = Arc::new(MemoryStore::new());
    let ctx = context(&gitlab, store.clone(), CollectorOptions::default());

    let report = run_cycle(&ctx, 1, None).await.expect("cycle");

    assert_eq!(report.inserted, 1);
    assert!(
        report
            .errors
            .iter()
            .any(|e| matches!(e, ItemError::Readme { project_id: 1, .. }))
    );
    let image = get_image(store.as_ref(), "registry.test/group/app")
        .await
        .expect("get")
        .expect("stored");
    assert!(image.readme_md.is_none());
    assert!(image.readme_html.is_none());
    assert_eq!(image.size, 3072);
}
