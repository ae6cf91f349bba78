// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP API against a mock-backed server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use gpu_watch::api::{build_router, SharedState};
use gpu_watch::app_state::AppState;
use gpu_watch::benchmark::HostBenchmarks;
use gpu_watch::common::config::MonitorConfig;
use gpu_watch::device::mock::MockDeviceReader;
use serde_json::{json, Value};

async fn start(devices: usize) -> (String, SharedState) {
    let state: SharedState = Arc::new(
        AppState::new(
            MonitorConfig::default(),
            Box::new(MockDeviceReader::new(devices)),
            Arc::new(HostBenchmarks),
            "apitest".to_string(),
        )
        .unwrap(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn test_overview_and_catalog() {
    let (base, _state) = start(2).await;
    let client = reqwest::Client::new();

    let overview: Value = client
        .get(format!("{base}/overview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["host_name"], "apitest");
    assert_eq!(overview["device_count"], 2);
    assert_eq!(overview["devices"][1]["name"], "Mock GPU 1");

    let catalog: Vec<Value> = client
        .get(format!("{base}/metrics/catalog"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(catalog.iter().any(|m| m["key"] == "Temperature"));
}

#[tokio::test]
async fn test_frame_selection_and_visibility() {
    let (base, state) = start(3).await;
    let client = reqwest::Client::new();

    let mut sampler = state.sampler(Box::new(gpu_watch::device::cpu_generic::SysinfoCpuReader::new()));
    sampler.sample_once();
    sampler.sample_once();

    let response: Value = client
        .put(format!("{base}/selection"))
        .json(&json!({ "devices": "0,2" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["selection"], json!([0, 2]));

    let frame: Value = client
        .get(format!("{base}/frame"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(frame["tick"], 1);
    let series = frame["subplots"][0]["series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[1]["device"], 2);

    let response: Value = client
        .put(format!("{base}/selection"))
        .json(&json!({ "devices": "2-0" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(response["selection"], "Invalid");

    let hidden = client
        .put(format!("{base}/metrics/Power/visibility"))
        .json(&json!({ "visible": false }))
        .send()
        .await
        .unwrap();
    assert!(hidden.status().is_success());

    let unknown = client
        .put(format!("{base}/metrics/Fanspeed/visibility"))
        .json(&json!({ "visible": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

    let frame = state.refresh().await;
    assert!(frame.subplots.iter().all(|s| s.key != "Power"));
}

#[tokio::test]
async fn test_log_session_endpoints() {
    let (base, _state) = start(1).await;
    let client = reqwest::Client::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.hwout");

    let status: Value = client
        .post(format!("{base}/log/start"))
        .json(&json!({ "path": path }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["open"], true);

    let status: Value = client
        .get(format!("{base}/log"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["open"], true);

    let status: Value = client
        .post(format!("{base}/log/stop"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["open"], false);
    assert!(std::fs::read_to_string(&path)
        .unwrap()
        .contains("Finished recording"));
}

#[tokio::test]
async fn test_benchmark_endpoints() {
    let (base, _state) = start(1).await;
    let client = reqwest::Client::new();

    let unknown = client
        .post(format!("{base}/benchmarks/linpack"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), reqwest::StatusCode::NOT_FOUND);

    let idle: Value = client
        .get(format!("{base}/benchmarks/dgemm"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let max_size = idle["max_size"].as_u64().unwrap();
    assert!(max_size >= 64);

    for size in [0, max_size * 2] {
        let rejected = client
            .post(format!("{base}/benchmarks/dgemm"))
            .json(&json!({ "size": size }))
            .send()
            .await
            .unwrap();
        assert_eq!(rejected.status(), reqwest::StatusCode::BAD_REQUEST);
    }
    let idle: Value = client
        .get(format!("{base}/benchmarks/dgemm"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(idle["state"], "Idle");

    let started = client
        .post(format!("{base}/benchmarks/dgemm"))
        .json(&json!({ "size": 64, "repeats": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(started.status(), reqwest::StatusCode::ACCEPTED);

    let mut job = Value::Null;
    for _ in 0..200 {
        job = client
            .get(format!("{base}/benchmarks/dgemm"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if job["state"] == "Done" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert_eq!(job["state"], "Done");
    assert!(job["result"]
        .as_str()
        .unwrap()
        .starts_with("DGEMM result for N = 64"));
}

#[tokio::test]
async fn test_reset_clears_frame() {
    let (base, state) = start(1).await;
    let client = reqwest::Client::new();
    let mut sampler = state.sampler(Box::new(gpu_watch::device::cpu_generic::SysinfoCpuReader::new()));
    sampler.sample_once();
    state.refresh().await;

    let response = client.post(format!("{base}/reset")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(state.store.current_tick(), 0);

    let frame: Value = client
        .get(format!("{base}/frame"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(frame["tick"], Value::Null);
}
