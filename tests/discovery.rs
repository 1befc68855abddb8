use std::path::PathBuf;
use std::time::Duration;

use http::{StatusCode, Uri};
use http_body_util::BodyExt;
use http_sd::config::{CancelPolicy, Config, MetricsConfig};
use http_sd::coordinator::{Consumer, Coordinator};
use http_sd::http::HttpClient;
use http_sd::server;
use http_sd::writer::FileSdWriter;
use metrics::Registry;
use testify::http::MockServer;
use testify::wait::{wait_for, wait_for_within};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const FIRST: &str = r#"[
    {"targets": ["10.0.0.1:9100", "10.0.0.2:9100"], "labels": {"job": "node", "env": "prod"}},
    {"targets": ["10.0.1.1:9100"], "labels": {"job": "node", "env": "dev"}}
]"#;

const SECOND: &str = r#"[
    {"targets": ["10.0.0.3:9100"], "labels": {"job": "node", "env": "prod"}}
]"#;

fn read_json(path: &PathBuf) -> Option<serde_json::Value> {
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

#[tokio::test]
async fn end_to_end() {
    let a = MockServer::start(vec![(200, FIRST), (200, "broken"), (200, SECOND)]).await;
    let b = MockServer::start(vec![(500, "[]")]).await;

    let dir = testify::temp::temp_dir();
    let a_output = dir.join("a.json");
    let b_output = dir.join("b.json");
    let metrics_addr = testify::next_addr();

    let config = Config {
        api_urls: vec![a.url(), b.url()],
        output_files: vec![a_output.clone(), b_output.clone()],
        refresh_interval: 1,
        request_timeout: None,
        cancel_policy: CancelPolicy::Independent,
        metrics: MetricsConfig {
            address: metrics_addr,
            path: "/metrics".to_string(),
        },
    };

    let registry = Registry::new();
    let coordinator = Coordinator::new(&config, &registry).unwrap();
    let root = CancellationToken::new();

    let listener = TcpListener::bind(metrics_addr).await.unwrap();
    let server = tokio::spawn(server::serve(
        listener,
        config.metrics.path.clone(),
        registry,
        root.clone(),
    ));

    let running = coordinator.spawn(root.clone(), |source| -> Box<dyn Consumer> {
        Box::new(FileSdWriter::new(&source.output_file))
    });

    // the first poll happens right away
    wait_for(async || {
        read_json(&a_output)
            == Some(serde_json::json!([
                {"targets": ["10.0.0.1:9100", "10.0.0.2:9100"], "labels": {"env": "prod", "job": "node"}},
                {"targets": ["10.0.1.1:9100"], "labels": {"env": "dev", "job": "node"}}
            ]))
    })
    .await;

    // a non 2xx response with a valid body is still used
    wait_for(async || read_json(&b_output) == Some(serde_json::json!([]))).await;

    // the broken response is skipped, the file keeps the previous content
    // until the next good one
    wait_for_within(Duration::from_secs(10), async || {
        read_json(&a_output)
            == Some(serde_json::json!([
                {"targets": ["10.0.0.3:9100"], "labels": {"env": "prod", "job": "node"}}
            ]))
    })
    .await;
    assert!(a.hits() >= 3);

    // the listener is bound already
    let uri = format!("http://{metrics_addr}/metrics").parse::<Uri>().unwrap();
    let resp = HttpClient::new().get(&uri).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("# TYPE prometheus_sd_http_http_requests_total counter"));
    assert!(text.contains(&format!(
        "prometheus_sd_http_http_requests_total{{api_url=\"{}\",code=\"500\"}}",
        b.url()
    )));

    running.shutdown_all();
    tokio::time::timeout(Duration::from_secs(5), running.wait())
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn invalid_config_starts_nothing() {
    let server = MockServer::start(vec![(200, FIRST)]).await;

    let config = Config {
        api_urls: vec![server.url(), server.url()],
        output_files: vec![PathBuf::from("only-one.json")],
        ..Default::default()
    };

    assert!(Coordinator::new(&config, &Registry::new()).is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.hits(), 0);
}
