use super::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> SourceConfig {
    SourceConfig {
        base_url: format!("{}/api/characters", server.uri()),
        user_agent: "harvest-test/1.0".to_string(),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

#[tokio::test]
async fn fetch_sends_page_query_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/characters"))
        .and(query_param("page", "2"))
        .and(query_param("pageSize", "3"))
        .and(header("user-agent", "harvest-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Jon Snow", "titles": ["Lord Commander"]},
            {"name": "Arya Stark"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let source = HttpPageSource::new(&config_for(&server)).unwrap();
    let records = source.fetch(2, 3).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["name"], "Jon Snow");
    assert!(records[1].get("titles").is_none());
}

#[tokio::test]
async fn empty_array_means_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let source = HttpPageSource::new(&config_for(&server)).unwrap();
    assert!(source.fetch(9, 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn non_success_status_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = HttpPageSource::new(&config_for(&server)).unwrap();
    let err = source.fetch(1, 50).await.unwrap_err();

    match err {
        SourceError::Status { page, status, url } => {
            assert_eq!(page, 1);
            assert_eq!(status, 404);
            assert!(url.contains("pageSize=50"), "url was {url}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_array_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
        .mount(&server)
        .await;

    let source = HttpPageSource::new(&config_for(&server)).unwrap();
    assert!(matches!(
        source.fetch(1, 50).await,
        Err(SourceError::Decode { page: 1, .. })
    ));
}

#[tokio::test]
async fn unreachable_source_is_a_transport_error() {
    let config = SourceConfig {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        base_url: "http://127.0.0.1:9/api".to_string(),
        request_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let source = HttpPageSource::new(&config).unwrap();

    assert!(matches!(
        source.fetch(1, 10).await,
        Err(SourceError::Transport { page: 1, .. })
    ));
}

#[test]
fn decode_rejects_scalar_elements() {
    let err = decode_page(4, br#"[{"name": "a"}, 42]"#).unwrap_err();
    match err {
        SourceError::Decode { page, reason } => {
            assert_eq!(page, 4);
            assert!(reason.contains("element 1"), "reason was {reason}");
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn decode_rejects_invalid_json() {
    assert!(matches!(
        decode_page(1, b"<html>"),
        Err(SourceError::Decode { .. })
    ));
}
