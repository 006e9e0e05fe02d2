use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

use traffic_tap::{
    config::{watcher::ConfigWatcher, AppConfig},
    create_app,
    logger::MemorySink,
    AppState,
};

async fn spawn_server(config: AppConfig) -> (SocketAddr, MemorySink) {
    let sink = MemorySink::new();
    let state = AppState::new(
        Arc::new(ConfigWatcher::detached(config)),
        Arc::new(sink.clone()),
    );
    let app = create_app(state).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, sink)
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, sink) = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "traffic-tap");

    let messages = sink.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with(&format!(
        "REQUEST METHOD:[GET] REQUEST URL:[http://{}/health]",
        addr
    )));
    assert!(messages[1].contains("\"status\":\"healthy\""));
}

#[tokio::test]
async fn test_status_endpoint_logs_exact_body() {
    let (addr, sink) = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{}/api/v1/status", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), r#"{"ok":true}"#);

    let messages = sink.messages();
    assert!(messages[0].ends_with("REQUEST BODY:[null]"));
    assert!(messages[1].contains("content-type:application/json"));
    assert!(messages[1].ends_with("RESPONSE:\r\n{\"ok\":true}"));
}

#[tokio::test]
async fn test_echo_round_trips_request_body() {
    let (addr, sink) = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let payload = r#"{"name":"Jane","tags":["a","b"]}"#;

    let resp = client
        .post(format!("http://{}/api/v1/echo", addr))
        .header("content-type", "application/json")
        .header("x-trace", "abc")
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), payload);

    let messages = sink.messages();
    assert!(messages[0].contains("x-trace:abc"));
    assert!(messages[0].ends_with(&format!("REQUEST BODY:[{}]", payload)));
    assert!(messages[1].ends_with(&format!("RESPONSE:\r\n{}", payload)));
}

#[tokio::test]
async fn test_empty_response_uses_configured_marker() {
    let mut config = AppConfig::default();
    config.traffic_log.include_headers = false;
    config.traffic_log.empty_body_marker = "NULL".to_string();
    let (addr, sink) = spawn_server(config).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/api/v1/empty", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 204);
    assert!(resp.bytes().await.unwrap().is_empty());

    assert_eq!(
        sink.messages(),
        vec![
            format!(
                "REQUEST METHOD:[GET] REQUEST URL:[http://{}/api/v1/empty] REQUEST BODY:NULL",
                addr
            ),
            "RESPONSE:NULL".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_detailed_health_reports_traffic_log_settings() {
    let (addr, _) = spawn_server(AppConfig::default()).await;

    let body: Value = reqwest::Client::new()
        .get(format!("http://{}/api/v1/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["traffic_log"]["enabled"], true);
    assert_eq!(body["traffic_log"]["empty_body_marker"], "[null]");
    assert_eq!(body["server_config"]["timeout_seconds"], 30);
}
