mod common;

use common::config_for;
use common::failures_body;
use common::summary_body;
use nftel_client::ClientConfig;
use nftel_client::GatewayError;
use nftel_client::MetricsGateway;
use nftel_client::MetricsSource;
use nftel_client::request;
use nftel_protocol::Endpoint;
use nftel_protocol::FilterKey;
use nftel_protocol::FilterValue;
use nftel_protocol::MetricsPayload;
use pretty_assertions::assert_eq;
use std::num::NonZeroU32;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::matchers::query_param_is_missing;

#[tokio::test]
async fn decodes_a_successful_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics/processes/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_body(None)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = MetricsGateway::new(&config_for(&server)).unwrap();
    let payload = gateway
        .fetch(&request::build(Endpoint::Summary, &FilterValue::default()))
        .await
        .unwrap();

    let MetricsPayload::Summary(summary) = payload else {
        panic!("expected a summary payload");
    };
    assert_eq!(summary.window_days, None);
    assert_eq!(summary.cards.failure_pct, Some(12.5));
    assert_eq!(summary.top_failure_exit_codes[0].exit_code, "137");
    assert!(summary.violations().is_empty());
}

#[tokio::test]
async fn forwards_filters_as_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics/processes/failures"))
        .and(query_param("window_days", "30"))
        .and(query_param("min_samples", "5"))
        .and(query_param_is_missing("limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(failures_body(Some(30))))
        .expect(1)
        .mount(&server)
        .await;

    let filters = FilterValue::default()
        .with(FilterKey::WindowDays, NonZeroU32::new(30))
        .with(FilterKey::MinSamples, NonZeroU32::new(5));
    let gateway = MetricsGateway::new(&config_for(&server)).unwrap();
    let payload = gateway
        .fetch(&request::build(Endpoint::Failures, &filters))
        .await
        .unwrap();
    assert_eq!(payload.window_days(), Some(30));
    assert_eq!(payload.endpoint(), Endpoint::Failures);
}

#[tokio::test]
async fn persistent_server_errors_are_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics/processes/retries"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let gateway = MetricsGateway::new(&config_for(&server)).unwrap();
    let err = gateway
        .fetch(&request::build(Endpoint::Retries, &FilterValue::default()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        GatewayError::Http {
            status: 500,
            status_text: "Internal Server Error".to_string(),
        }
    );
    assert_eq!(err.to_string(), "API error 500: Internal Server Error");
}

#[tokio::test]
async fn server_reason_phrase_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request).await;
            let _ = stream
                .write_all(
                    b"HTTP/1.1 503 Database Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                )
                .await;
        }
    });

    let config = ClientConfig {
        base_url: format!("http://{addr}"),
        retry_attempts: 0,
        ..ClientConfig::default()
    };
    let gateway = MetricsGateway::new(&config).unwrap();
    let err = gateway
        .fetch(&request::build(Endpoint::Summary, &FilterValue::default()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "API error 503: Database Unavailable");
}

#[tokio::test]
async fn transient_failure_recovers_on_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics/processes/summary"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metrics/processes/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_body(Some(7))))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = MetricsGateway::new(&config_for(&server)).unwrap();
    let payload = gateway
        .fetch(&request::build(Endpoint::Summary, &FilterValue::default()))
        .await
        .unwrap();
    assert_eq!(payload.window_days(), Some(7));
}

#[tokio::test]
async fn no_retries_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        retry_attempts: 0,
        ..config_for(&server)
    };
    let gateway = MetricsGateway::new(&config).unwrap();
    let err = gateway
        .fetch(&request::build(Endpoint::FailureSignatures, &FilterValue::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Http { status: 502, .. }));
}

#[tokio::test]
async fn malformed_bodies_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metrics/processes/resources-by-attempt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"rows\": \"nope\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = MetricsGateway::new(&config_for(&server)).unwrap();
    let err = gateway
        .fetch(&request::build(Endpoint::ResourcesByAttempt, &FilterValue::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ClientConfig {
        base_url: format!("http://127.0.0.1:{port}"),
        retry_delay_ms: 0,
        ..ClientConfig::default()
    };
    let gateway = MetricsGateway::new(&config).unwrap();
    let err = gateway
        .fetch(&request::build(Endpoint::Summary, &FilterValue::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)), "{err:?}");
}

#[test]
fn rejects_non_http_base_urls() {
    let config = ClientConfig {
        base_url: "file:///tmp/metrics".to_string(),
        ..ClientConfig::default()
    };
    assert!(MetricsGateway::new(&config).is_err());
}
