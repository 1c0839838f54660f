//! InfluxDB client against a mock HTTP server.

use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;
use tagstats::export::{
    BatchConfig, BatchPoints, FieldValue, InfluxClient, InfluxConfig, Point, PointSink, Precision,
};
use tagstats::TagSet;
use wiremock::matchers::{body_string, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn batch() -> BatchPoints {
    let mut batch = BatchPoints::new(BatchConfig {
        database: "caddy".to_string(),
        precision: Precision::Seconds,
    })
    .unwrap();
    let time = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    batch.add_point(
        Point::new(
            "requests",
            TagSet::from([("path", "/a"), ("server", "web-1")]),
            BTreeMap::from([("value".to_string(), FieldValue::Integer(42))]),
            time,
        )
        .unwrap(),
    );
    batch
}

#[tokio::test]
async fn test_write_posts_line_protocol() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/write"))
        .and(query_param("db", "caddy"))
        .and(query_param("precision", "s"))
        .and(body_string("requests,path=/a,server=web-1 value=42i 1700000000\n"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = InfluxClient::new(InfluxConfig::new(server.uri())).unwrap();
    client.write(batch()).await.unwrap();
}

#[tokio::test]
async fn test_error_response_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/write"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database not found"))
        .mount(&server)
        .await;

    let client = InfluxClient::new(InfluxConfig::new(server.uri())).unwrap();
    let err = client.write(batch()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("500"), "{}", msg);
    assert!(msg.contains("database not found"), "{}", msg);
}

#[tokio::test]
async fn test_other_success_codes_are_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/write"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = InfluxClient::new(InfluxConfig::new(server.uri())).unwrap();
    assert!(client.write(batch()).await.is_err());
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/write"))
        .and(header_exists("authorization"))
        .and(header("content-type", "text/plain; charset=utf-8"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = InfluxConfig::new(server.uri());
    config.username = Some("admin".to_string());
    config.password = Some("secret".to_string());

    let client = InfluxClient::new(config).unwrap();
    client.write(batch()).await.unwrap();
}

#[tokio::test]
async fn test_empty_batch_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let client = InfluxClient::new(InfluxConfig::new(server.uri())).unwrap();
    let empty = BatchPoints::new(BatchConfig {
        database: "caddy".to_string(),
        precision: Precision::Seconds,
    })
    .unwrap();
    client.write(empty).await.unwrap();
}

#[tokio::test]
async fn test_ping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = InfluxClient::new(InfluxConfig::new(server.uri())).unwrap();
    assert!(client.ping().await.is_ok());
}

#[tokio::test]
async fn test_unreachable_server_fails_write_not_construction() {
    // Port 9 (discard) is closed on test machines.
    let client = InfluxClient::new(InfluxConfig::new("http://127.0.0.1:9")).unwrap();
    assert!(client.write(batch()).await.is_err());
}

#[test]
fn test_invalid_address_fails_construction() {
    assert!(InfluxClient::new(InfluxConfig::new("not a url")).is_err());
    assert!(InfluxClient::new(InfluxConfig::new("ftp://localhost")).is_err());

    let mut config = InfluxConfig::new("http://localhost:8086");
    config.username = Some("admin".to_string());
    assert!(InfluxClient::new(config).is_err());
}
