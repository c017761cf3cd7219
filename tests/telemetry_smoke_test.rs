//! Smoke tests for OTLP export.
//!
//! These tests require an OTLP collector on localhost:4317 that forwards
//! metrics to Prometheus (localhost:9090) and logs to Loki (localhost:3100).
//!
//! Run with:
//! ```sh
//! cargo test --test telemetry_smoke_test -- --ignored --nocapture
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use callscope::catalog::catalog;
use callscope::label::{Label, TAG_ADDRESS};
use callscope::registry::Namespace;
use callscope::site::Bound;
use callscope::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use callscope::{Interrupted, StatusError};

static TELEMETRY: OnceLock<TelemetryGuard> = OnceLock::new();

fn ensure_telemetry() -> &'static TelemetryGuard {
    TELEMETRY.get_or_init(|| {
        init_telemetry(TelemetryConfig {
            endpoint: Some("http://localhost:4317".to_string()),
            service_name: "callscope-smoke-test".to_string(),
            service_version: "smoke".to_string(),
            log_level: "info".to_string(),
        })
        .expect("failed to init telemetry")
    })
}

/// Force-flush all providers and give backends time to ingest.
async fn flush_and_wait(guard: &TelemetryGuard) {
    guard.force_flush();
    tokio::time::sleep(Duration::from_secs(8)).await;
}

#[test]
#[ignore]
fn smoke_metrics() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let guard = ensure_telemetry();
        let ns = Namespace::new(Arc::new(guard.registry())).namespace("smoke");
        let bound = Bound::bind(&ns, &catalog());

        let address = [Label::new(TAG_ADDRESS, "localhost:2135")];
        let dial = bound.get("driver.net.dial").expect("dial bound");
        dial.start(&address).sync(None, &address);
        dial.start(&address)
            .sync(Some(&StatusError::transport("UNAVAILABLE", 14)), &address);
        dial.start(&address)
            .sync(Some(&Interrupted::DeadlineExceeded), &address);

        flush_and_wait(guard).await;

        let client = reqwest::Client::new();
        let resp = client
            .get("http://localhost:9090/api/v1/query")
            .query(&[("query", "smoke_driver_net_dial_calls_total")])
            .send()
            .await
            .expect("failed to query Prometheus");

        assert!(
            resp.status().is_success(),
            "Prometheus query failed: {}",
            resp.status()
        );

        let body: serde_json::Value = resp
            .json()
            .await
            .expect("failed to parse Prometheus response");
        let results = body["data"]["result"].as_array();
        assert!(
            results.is_some_and(|r| !r.is_empty()),
            "expected metric results in Prometheus, got: {body}"
        );
        println!(
            "Prometheus: found {} series for smoke_driver_net_dial_calls_total",
            results.unwrap().len()
        );
    });
}

#[test]
#[ignore]
fn smoke_logs() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let guard = ensure_telemetry();

        tracing::info!(component = "smoke-test", "smoke test info log");
        tracing::warn!(component = "smoke-test", "smoke test warning log");

        flush_and_wait(guard).await;

        let client = reqwest::Client::new();
        let resp = client
            .get("http://localhost:3100/loki/api/v1/query_range")
            .query(&[
                ("query", r#"{service_name="callscope-smoke-test"}"#),
                ("limit", "10"),
            ])
            .send()
            .await
            .expect("failed to query Loki");

        assert!(
            resp.status().is_success(),
            "Loki query failed: {}",
            resp.status()
        );

        let body: serde_json::Value = resp.json().await.expect("failed to parse Loki response");
        let streams = body["data"]["result"].as_array();
        assert!(
            streams.is_some_and(|s| !s.is_empty()),
            "expected log streams in Loki, got: {body}"
        );
        println!("Loki: found {} stream(s)", streams.unwrap().len());
    });
}
