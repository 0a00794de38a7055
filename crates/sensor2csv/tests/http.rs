// HTTP integration tests
//
// Drive the router in-process and check responses, metrics, history and the
// CSV files the writer task produces.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use sensor2csv::queue::JobReceiver;
use sensor2csv::{build_router, worker, IngestionService};
use sensor2csv_config::RuntimeConfig;
use sensor2csv_writer::{CsvSink, RetryPolicy};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_service(dir: &Path, maxsize: usize) -> (Arc<IngestionService>, JobReceiver) {
    let mut config = RuntimeConfig::default();
    config.storage.data_dir = dir.to_string_lossy().to_string();
    config.queue.maxsize = maxsize;
    config.history.max = 50;
    config.request.max_payload_bytes = 1024;
    IngestionService::new(config)
}

fn start_writer(
    service: &Arc<IngestionService>,
    receiver: JobReceiver,
) -> tokio::task::JoinHandle<()> {
    let policy = RetryPolicy::new(3, Duration::from_millis(1)).unwrap();
    worker::spawn(Arc::clone(service), receiver, Arc::new(CsvSink::new()), policy)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: &Router, path: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(path).body(Body::empty()).unwrap();
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn data_reading_is_persisted_as_csv_row() {
    let dir = tempfile::tempdir().unwrap();
    let (service, receiver) = test_service(dir.path(), 100);
    let writer = start_writer(&service, receiver);
    let app = build_router(Arc::clone(&service));

    let (status, body) = post_json(
        &app,
        "/data",
        json!({"pressure": "1013hPa", "temperature": "25.1C"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "enqueued"}));

    service.shutdown();
    writer.await.unwrap();

    let csv = std::fs::read_to_string(dir.path().join("pressure_temperature.csv")).unwrap();
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "current_time,pressure,temperature");
    assert_eq!(lines.len(), 2);
    let (ts, rest) = lines[1].split_once(',').unwrap();
    assert_eq!(rest, "1013.0,25.1");
    assert!(chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").is_ok());

    let (_, metrics) = get_json(&app, "/metrics").await;
    assert_eq!(metrics["write_success_total"]["data"], 1);
    assert_eq!(metrics["write_error_total"]["data"], 0);
    assert!(metrics["last_received"]["data"].is_string());
    assert!(metrics["inactivity_seconds"]["data"].as_f64().unwrap() >= 0.0);
    assert!(metrics["last_received"]["data2"].is_null());
    assert_eq!(metrics["queue_length"], 0);
}

#[tokio::test]
async fn out_of_range_reading_returns_field_details() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _receiver) = test_service(dir.path(), 100);
    let app = build_router(Arc::clone(&service));

    let (status, body) = post_json(
        &app,
        "/data",
        json!({"pressure": "1500hPa", "temperature": "25C"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation failed");
    assert!(body["details"]["pressure"]
        .as_str()
        .unwrap()
        .contains("outside the allowed range"));
    assert!(body["details"].get("temperature").is_none());

    let (_, metrics) = get_json(&app, "/metrics").await;
    assert_eq!(metrics["validation_error_total"]["data"], 1);
    assert_eq!(metrics["queue_length"], 0);
}

#[tokio::test]
async fn nested_reading_reports_dotted_paths() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _receiver) = test_service(dir.path(), 100);
    let app = build_router(service);

    let (status, body) = post_json(
        &app,
        "/data4",
        json!({"mh_z19": {"co2": 600}, "ds18b20": {"temperature": 19}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["mq_2.analog_value", "mq_2.voltage", "dht11.temperature", "dht11.humidity"] {
        assert_eq!(body["details"][field], "field is required");
    }
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _receiver) = test_service(dir.path(), 100);
    let app = build_router(service);

    let req = Request::builder()
        .method("POST")
        .uri("/data2")
        .header("content-type", "application/json")
        .body(Body::from("{\"co2\": 4"))
        .unwrap();
    let (status, bytes) = send(&app, req).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["payload"].is_string());
}

#[tokio::test]
async fn full_queue_returns_503() {
    let dir = tempfile::tempdir().unwrap();
    // Receiver is held but no writer runs, so nothing drains.
    let (service, _receiver) = test_service(dir.path(), 2);
    let app = build_router(Arc::clone(&service));
    let reading = json!({
        "temperature": 12.5,
        "humidity": "60%",
        "pressure": 1001,
        "gas_res": 30000
    });

    for _ in 0..2 {
        let (status, _) = post_json(&app, "/data3", reading.clone()).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = post_json(&app, "/data3", reading).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"status": "queued_failed"}));

    let (_, metrics) = get_json(&app, "/metrics").await;
    assert_eq!(metrics["queue_length"], 2);
    assert_eq!(metrics["queue_maxsize"], 2);
    assert_eq!(metrics["queue_rejected_total"]["data3"], 1);
    assert!(!dir.path().join("outdoor.csv").exists());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _receiver) = test_service(dir.path(), 10);
    let app = build_router(Arc::clone(&service));

    let padding = "x".repeat(2048);
    let (status, body) = post_json(
        &app,
        "/data",
        json!({"pressure": 1000, "temperature": 20, "note": padding}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["limit_bytes"], 1024);
    assert_eq!(service.queue().length(), 0);
}

#[tokio::test]
async fn gzip_bodies_are_decompressed() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _receiver) = test_service(dir.path(), 10);
    let app = build_router(Arc::clone(&service));

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(br#"{"pressure": 990, "temperature": "18C"}"#)
        .unwrap();
    let compressed = encoder.finish().unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/data")
        .header("content-type", "application/json")
        .header("content-encoding", "gzip")
        .body(Body::from(compressed))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(service.queue().length(), 1);
}

#[tokio::test]
async fn health_and_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let (service, receiver) = test_service(dir.path(), 10);
    let app = build_router(Arc::clone(&service));

    let (status, body) = get_json(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = get_json(&app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let writer = start_writer(&service, receiver);
    let (status, body) = get_json(&app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    service.shutdown();
    writer.await.unwrap();
    let (status, _) = get_json(&app, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn metrics_start_with_null_inactivity() {
    let dir = tempfile::tempdir().unwrap();
    let (service, _receiver) = test_service(dir.path(), 10);
    let app = build_router(service);

    let (status, metrics) = get_json(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["queue_warn_threshold"], 8);
    assert_eq!(metrics["inactivity_warn_threshold_sec"], 120);
    for id in ["data", "data2", "data3", "data4"] {
        assert!(metrics["last_received"][id].is_null());
        assert!(metrics["inactivity_seconds"][id].is_null());
        assert_eq!(metrics["write_success_total"][id], 0);
    }
}

#[tokio::test]
async fn history_lists_outcomes_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (service, receiver) = test_service(dir.path(), 10);
    let app = build_router(Arc::clone(&service));

    post_json(&app, "/data", json!({"pressure": 100, "temperature": 20})).await;
    post_json(&app, "/data", json!({"pressure": 1000, "temperature": 20})).await;
    let writer = start_writer(&service, receiver);
    service.shutdown();
    writer.await.unwrap();

    let (status, entries) = get_json(&app, "/history/json").await;
    assert_eq!(status, StatusCode::OK);
    let outcomes: Vec<_> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["outcome"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(outcomes, vec!["rejected_validation", "enqueued", "persisted"]);
    assert_eq!(entries[0]["payload"]["pressure"], 100);
    assert_eq!(entries[2]["payload"]["pressure"], 1000.0);

    let (_, limited) = get_json(&app, "/history/json?limit=1").await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
    assert_eq!(limited[0]["outcome"], "persisted");

    let req = Request::builder().uri("/history").body(Body::empty()).unwrap();
    let (status, bytes) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(bytes).unwrap();
    assert!(html.contains("<table"));
    assert!(html.contains("rejected_validation"));
}

#[tokio::test]
async fn each_endpoint_writes_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let (service, receiver) = test_service(dir.path(), 10);
    let writer = start_writer(&service, receiver);
    let app = build_router(Arc::clone(&service));

    let readings = [
        ("/data", json!({"pressure": 1000, "temperature": 20})),
        (
            "/data2",
            json!({
                "co2": "415ppm",
                "temperature": 21,
                "humidity": 40,
                "pressure": 1002,
                "gas_res": 120000
            }),
        ),
        (
            "/data3",
            json!({"temperature": -3.5, "humidity": 88, "pressure": 990.1, "gas_res": 45000}),
        ),
        (
            "/data4",
            json!({
                "mh_z19": {"co2": 600},
                "mq_2": {"analog_value": 312, "voltage": "1.02V"},
                "ds18b20": {"temperature": "19.75C"},
                "dht11": {"temperature": 20, "humidity": "55%"}
            }),
        ),
    ];
    for (path, body) in readings {
        let (status, _) = post_json(&app, path, body).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
    }

    service.shutdown();
    writer.await.unwrap();

    let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
    assert!(read("bme_co2.csv")
        .starts_with("current_time,co2,temperature,humidity,pressure,gas_resistance\n"));
    assert!(read("bme_co2.csv").trim_end().ends_with(",415,21.0,40.0,1002.0,120000.0"));
    assert!(read("outdoor.csv").trim_end().ends_with(",-3.5,88.0,990.1,45000.0"));
    assert!(read("composite.csv").trim_end().ends_with(",600,312,1.02,19.75,20.0,55.0"));
    assert_eq!(read("pressure_temperature.csv").lines().count(), 2);
}
