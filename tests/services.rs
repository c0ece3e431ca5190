//! HTTP clients for the query source and the analysis sink against mock
//! services.

use std::time::Duration;

use onion_harvest::{
    AnalysisSink, BatchSubmission, HarvestError, HttpAnalysisSink, HttpQuerySource,
    PageSubmission, QuerySource,
};
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_source_pulls_query_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": ["acme leak", "acme dump"],
            "remaining": 4,
            "exhausted": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = assert_ok!(HttpQuerySource::new(&server.uri(), TIMEOUT));
    let batch = assert_ok!(source.next_batch().await);
    assert_eq!(batch.queries, vec!["acme leak", "acme dump"]);
    assert_eq!(batch.remaining, Some(4));
    assert!(!batch.exhausted);
}

#[tokio::test]
async fn test_source_reports_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/queries"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"queries": [], "exhausted": true})),
        )
        .mount(&server)
        .await;

    let source = HttpQuerySource::new(&server.uri(), TIMEOUT).unwrap();
    let batch = source.next_batch().await.unwrap();
    assert!(batch.exhausted);
    assert!(batch.search_queries().is_empty());
}

#[tokio::test]
async fn test_source_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/queries"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = HttpQuerySource::new(&server.uri(), TIMEOUT).unwrap();
    let err = assert_err!(source.next_batch().await);
    assert_eq!(err, HarvestError::QuerySource);
}

#[tokio::test]
async fn test_source_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let source = HttpQuerySource::new(&server.uri(), TIMEOUT).unwrap();
    assert_eq!(
        source.next_batch().await.unwrap_err(),
        HarvestError::MalformedResponse
    );
}

#[tokio::test]
async fn test_source_search_strings_and_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search-strings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"search_strings": ["acme.com", "@acme.com"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "configured": true,
            "total_queries": 10,
            "served_queries": 3,
            "exhausted": false
        })))
        .mount(&server)
        .await;

    let source = HttpQuerySource::new(&format!("{}/", server.uri()), TIMEOUT).unwrap();
    assert_eq!(
        source.search_strings().await.unwrap(),
        vec!["acme.com", "@acme.com"]
    );

    let health = source.health().await.expect("health");
    assert_eq!(health.status, "healthy");
    assert_eq!(health.served_queries, 3);
}

#[tokio::test]
async fn test_source_health_unreachable_is_none() {
    let server = MockServer::start().await;
    let source = HttpQuerySource::new(&server.uri(), TIMEOUT).unwrap();
    assert!(source.health().await.is_none());
}

fn submission() -> BatchSubmission {
    BatchSubmission {
        pages: vec![PageSubmission {
            url: "http://a.onion".to_string(),
            raw_content: "<p>acme credentials</p>".to_string(),
            source_engine: "Ahmia".to_string(),
        }],
        search_strings: Some(vec!["acme.com".to_string()]),
    }
}

#[tokio::test]
async fn test_sink_posts_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .and(body_json(json!({
            "pages": [{
                "url": "http://a.onion",
                "raw_content": "<p>acme credentials</p>",
                "source_engine": "Ahmia"
            }],
            "search_strings": ["acme.com"]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"total": 1, "relevant_count": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = HttpAnalysisSink::new(&server.uri(), TIMEOUT).unwrap();
    let ack = assert_ok!(sink.submit(&submission()).await);
    assert_eq!(ack.total, 1);
    assert_eq!(ack.relevant_count, 1);
}

#[tokio::test]
async fn test_sink_accepts_empty_ack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let sink = HttpAnalysisSink::new(&server.uri(), TIMEOUT).unwrap();
    let ack = sink.submit(&submission()).await.unwrap();
    assert_eq!(ack.total, 0);
}

#[tokio::test]
async fn test_sink_rejection_is_dispatch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = HttpAnalysisSink::new(&server.uri(), TIMEOUT).unwrap();
    assert_eq!(
        sink.submit(&submission()).await.unwrap_err(),
        HarvestError::DispatchFailed
    );
}
