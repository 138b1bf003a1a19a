//! Integration tests for the harvester
//!
//! These tests use wiremock to create a mock catalog server and test
//! the full harvest cycle end-to-end.

use catalog_harvest::config::{
    Config, CrawlerConfig, IdentityConfig, IdentityStrategy, OutputConfig, OutputFormat,
};
use catalog_harvest::crawler::{build_coordinator, harvest, Record};
use catalog_harvest::output::{load_records, SqliteSink};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "HarvestTest/1.0";

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(server: &MockServer, output: &Path, format: OutputFormat) -> Config {
    Config {
        crawler: CrawlerConfig {
            base_url: format!("{}/dataset", server.uri()),
            max_concurrent_requests: 4,
            cooldown_ms: 50, // Very short for testing
            max_cooldown_ms: 200,
            jitter_min_ms: 0,
            jitter_max_ms: 5,
            transport_retry_delay_ms: 10,
            transport_retry_max_ms: 50,
            escalate_after: 3,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            max_pages: 100,
            nominal_page_size: 20,
            progress_every: 1,
        },
        identity: IdentityConfig {
            strategy: IdentityStrategy::Fixed,
            user_agent: USER_AGENT.to_string(),
        },
        output: OutputConfig {
            format,
            path: output.to_string_lossy().into_owned(),
        },
    }
}

/// A dataset item as rendered by the catalog
fn dataset_item(title: &str, organization: Option<&str>) -> String {
    let organization = organization
        .map(|org| {
            format!(
                r#"<div class="organization-type-wrap"><span class="organization-type" data-organization-type="{org}"><span>{org}</span></span></div>"#,
                org = org
            )
        })
        .unwrap_or_default();

    format!(
        r#"<li class="dataset-item has-organization">
        <div class="dataset-content">
            {organization}
            <h3 class="dataset-heading"><a href="/dataset/{slug}">{title}</a></h3>
            <div class="notes"><div>Description of {title}</div></div>
            <ul class="dataset-resources unstyled">
                <li><a href="https://files.test/{slug}.csv" class="badge" data-format="csv">CSV</a></li>
                <li><a href="https://files.test/{slug}.json" class="badge" data-format="json">JSON</a></li>
            </ul>
        </div>
        </li>"#,
        organization = organization,
        title = title,
        slug = title.to_lowercase().replace(' ', "-")
    )
}

/// A listing page with `count` federal datasets
fn catalog_page(prefix: &str, count: usize, total_pages: u32) -> String {
    let items: Vec<String> = (0..count)
        .map(|i| dataset_item(&format!("{} {}", prefix, i), Some("federal")))
        .collect();
    render_page(&items, total_pages)
}

fn render_page(items: &[String], total_pages: u32) -> String {
    let mut pagination = String::from(r#"<li class="page-item"><a class="page-link">«</a></li>"#);
    for n in 1..=total_pages {
        pagination.push_str(&format!(
            r#"<li class="page-item"><a class="page-link" href="?page={n}">{n}</a></li>"#,
            n = n
        ));
    }
    pagination.push_str(r#"<li class="page-item"><a class="page-link">»</a></li>"#);

    format!(
        r#"<html><head><title>Datasets</title></head><body>
        <div class="new-results">{count} datasets found</div>
        <ul class="dataset-list unstyled">{items}</ul>
        <section class="pagination-wrapper"><ul class="pagination justify-content-center">{pagination}</ul></section>
        </body></html>"#,
        count = items.len(),
        items = items.join("\n"),
        pagination = pagination
    )
}

async fn mount_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/dataset"))
        .and(query_param("page", page.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn titles(records: &[Record]) -> HashSet<String> {
    records.iter().map(|r| r.title.clone()).collect()
}

#[tokio::test]
async fn test_full_harvest_three_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.json");

    mount_page(&server, 1, catalog_page("First", 7, 3)).await;
    mount_page(&server, 2, catalog_page("Second", 5, 3)).await;
    mount_page(&server, 3, catalog_page("Third", 6, 3)).await;

    let config = create_test_config(&server, &output, OutputFormat::Json);
    let records = harvest(config).await.unwrap();

    assert_eq!(records.len(), 18);
    assert_eq!(titles(&records).len(), 18);
    assert!(records.iter().all(|r| r.organization == "federal"));
    assert!(records.iter().all(|r| r.resources.len() == 2));

    let saved = load_records(&output).unwrap();
    assert_eq!(saved.len(), 18);
    assert_eq!(titles(&saved), titles(&records));
}

#[tokio::test]
async fn test_rate_limited_page_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.json");

    mount_page(&server, 1, catalog_page("First", 3, 3)).await;

    // First request for page 2 is rejected; mounted before the page so it wins
    Mock::given(method("GET"))
        .and(path("/dataset"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 2, catalog_page("Second", 4, 3)).await;
    mount_page(&server, 3, catalog_page("Third", 2, 3)).await;

    let config = create_test_config(&server, &output, OutputFormat::Json);
    let coordinator = build_coordinator(&config).unwrap();
    let records = coordinator.run().await.unwrap();

    assert_eq!(records.len(), 9);
    assert_eq!(
        records
            .iter()
            .filter(|r| r.title.starts_with("Second"))
            .count(),
        4
    );

    let stats = coordinator.statistics(&records);
    assert_eq!(stats.blocked, 1);
    assert_eq!(stats.cooldowns, 1);
    assert!(coordinator.context().gate().is_open());
}

#[tokio::test]
async fn test_forbidden_with_retry_after_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.json");

    Mock::given(method("GET"))
        .and(path("/dataset"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(403).insert_header("retry-after", "0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, 1, catalog_page("Only", 5, 1)).await;

    let config = create_test_config(&server, &output, OutputFormat::Json);
    let records = harvest(config).await.unwrap();

    assert_eq!(records.len(), 5);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.json");

    mount_page(&server, 1, catalog_page("First", 2, 2)).await;
    Mock::given(method("GET"))
        .and(path("/dataset"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, 2, catalog_page("Second", 3, 2)).await;

    let config = create_test_config(&server, &output, OutputFormat::Json);
    let coordinator = build_coordinator(&config).unwrap();
    let records = coordinator.run().await.unwrap();

    assert_eq!(records.len(), 5);
    let stats = coordinator.statistics(&records);
    assert_eq!(stats.transient_failures, 2);
    assert_eq!(stats.cooldowns, 0);
}

#[tokio::test]
async fn test_missing_organization_becomes_unknown() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.json");

    let items = vec![
        dataset_item("Crime Data", Some("state")),
        dataset_item("Orphan Data", None),
    ];
    mount_page(&server, 1, render_page(&items, 1)).await;

    let config = create_test_config(&server, &output, OutputFormat::Json);
    let records = harvest(config).await.unwrap();

    assert_eq!(records.len(), 2);
    let orphan = records.iter().find(|r| r.title == "Orphan Data").unwrap();
    assert_eq!(orphan.organization, "Unknown");
    let crime = records.iter().find(|r| r.title == "Crime Data").unwrap();
    assert_eq!(crime.organization, "state");
    assert_eq!(crime.description, "Description of Crime Data");
}

#[tokio::test]
async fn test_requests_carry_configured_user_agent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.json");

    Mock::given(method("GET"))
        .and(path("/dataset"))
        .and(query_param("page", "1"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page("Agent", 1, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &output, OutputFormat::Json);
    let records = harvest(config).await.unwrap();

    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_sqlite_output() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("datasets.db");

    mount_page(&server, 1, catalog_page("First", 2, 2)).await;
    mount_page(&server, 2, catalog_page("Second", 2, 2)).await;

    let config = create_test_config(&server, &output, OutputFormat::Sqlite);
    let records = harvest(config).await.unwrap();

    let stored = SqliteSink::new(&output).unwrap().load_records().unwrap();
    assert_eq!(stored.len(), 4);
    assert_eq!(titles(&stored), titles(&records));
    assert_eq!(stored[0].resources.len(), 2);
}
