//! Common test utilities for api-harvest integration tests

use api_harvest::config::{Config, RetryConfig};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mock collection is served under
pub const COLLECTION_PATH: &str = "/api/characters";

/// Config pointed at `server`, writing into `dir`
pub fn config_for(server: &MockServer, dir: &Path, page_size: u32) -> Config {
    let mut config = Config::default();
    config.source.base_url = format!("{}{}", server.uri(), COLLECTION_PATH);
    config.source.page_size = page_size;
    config.source.request_timeout = Duration::from_secs(5);
    config.source.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config.output.table_dir = dir.join("characters");
    config.output.csv_path = dir.join("characters_csv").join("characters.csv");
    config
}

/// Serve `pages` as pages 1..=n and an empty array for page n+1
pub async fn mount_pages(server: &MockServer, page_size: u32, pages: &[Value]) {
    for (index, body) in pages.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("page", (index + 1).to_string()))
            .and(query_param("pageSize", page_size.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(COLLECTION_PATH))
        .and(query_param("page", (pages.len() + 1).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(server)
        .await;
}

/// Parse a CSV file into header and rows
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open csv");
    let header = reader
        .headers()
        .expect("csv header")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("csv row").iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
