//! Hot-path benchmarks: message framing, tab sync, envelope decoding.
//!
//! Run with: cargo bench --bench wire
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use tokio::runtime::Runtime;

use chart_cdp::chart::{ChartPattern, DEFAULT_CHART_PATTERN, decode_envelope, select_charts};
use chart_cdp::protocol::{Command, Event, Request, Response, RuntimeCommand, TargetInfo};
use chart_cdp::transport::EventHandler;
use chart_cdp::{ChartId, ChartManager, Error, HandlerId, ProtocolClient, RequestId, Result, SessionId};

// ============================================================================
// Fixtures
// ============================================================================

fn target_list(count: usize) -> Vec<TargetInfo> {
    let raw: Vec<Value> = (0..count)
        .map(|i| {
            let url = if i % 3 == 0 {
                format!("https://charts.example.com/markets/{i}")
            } else {
                format!("https://charts.example.com/chart/c{}/?interval=1D", i % 40)
            };
            json!({ "id": format!("T{i}"), "type": "page", "title": "t", "url": url })
        })
        .collect();
    serde_json::from_value(Value::Array(raw)).unwrap()
}

/// Serves a fixed target list; every command fails.
struct StaticTargets(Vec<TargetInfo>);

#[async_trait]
impl ProtocolClient for StaticTargets {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    async fn list_targets(&self) -> Result<Vec<TargetInfo>> {
        Ok(self.0.clone())
    }

    async fn send(&self, _command: Command, _timeout: Duration) -> Result<Value> {
        Err(Error::NotConnected)
    }

    async fn send_on_session(
        &self,
        _session_id: &SessionId,
        _command: Command,
        _timeout: Duration,
    ) -> Result<Value> {
        Err(Error::NotConnected)
    }

    fn register_event_handler(&self, _method: &str, _handler: EventHandler) -> HandlerId {
        HandlerId::next()
    }

    fn unregister_event_handler(&self, _id: HandlerId) -> bool {
        false
    }
}

// ============================================================================
// Benchmark: Message Framing
// ============================================================================

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");

    let request = Request::on_session(
        RequestId::new(42),
        SessionId::from("8F2C6A"),
        Command::Runtime(RuntimeCommand::Evaluate {
            expression: "chartApi.state()".to_string(),
            return_by_value: true,
            await_promise: true,
            user_gesture: true,
        }),
    );
    group.bench_function("serialize_request", |b| {
        b.iter(|| serde_json::to_string(&request).unwrap());
    });

    let response = r#"{"id":42,"sessionId":"8F2C6A","result":{"result":{"type":"object","value":{"ok":true,"data":{"v":1}}}}}"#;
    group.bench_function("parse_response", |b| {
        b.iter(|| serde_json::from_str::<Response>(response).unwrap());
    });

    let frame = json!({
        "method": "Page.screencastFrame",
        "sessionId": "8F2C6A",
        "params": { "data": "A".repeat(64 * 1024), "metadata": {}, "sessionId": 7 }
    })
    .to_string();
    group.bench_function("classify_frame_event", |b| {
        b.iter(|| {
            // The receive loop tries a reply first.
            assert!(serde_json::from_str::<Response>(&frame).is_err());
            serde_json::from_str::<Event>(&frame).unwrap()
        });
    });

    group.finish();
}

// ============================================================================
// Benchmark: Tab Sync
// ============================================================================

fn bench_select_charts(c: &mut Criterion) {
    let pattern = ChartPattern::new(DEFAULT_CHART_PATTERN).unwrap();
    let mut group = c.benchmark_group("select_charts");

    for &count in &[10usize, 100, 1000] {
        let targets = target_list(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &targets, |b, targets| {
            b.iter(|| select_charts(targets, "charts.example.com", &pattern));
        });
    }

    group.finish();
}

fn bench_list_charts(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = ChartManager::builder()
        .url_filter("charts.example.com")
        .client(Arc::new(StaticTargets(target_list(200))))
        .build()
        .unwrap();

    c.bench_function("list_charts_200", |b| {
        b.to_async(&rt)
            .iter(|| async { manager.list_charts().await.unwrap() });
    });
}

// ============================================================================
// Benchmark: Envelope
// ============================================================================

fn bench_envelope(c: &mut Criterion) {
    let chart = ChartId::from("abc123");
    let as_object = json!({ "ok": true, "data": { "drawings": (0..50).collect::<Vec<_>>() } });
    let as_string = Value::String(as_object.to_string());

    let mut group = c.benchmark_group("envelope");
    group.bench_function("object", |b| {
        b.iter(|| decode_envelope(&chart, as_object.clone()).unwrap());
    });
    group.bench_function("json_string", |b| {
        b.iter(|| decode_envelope(&chart, as_string.clone()).unwrap());
    });
    group.finish();
}

// ============================================================================
// Main
// ============================================================================

criterion_group!(
    benches,
    bench_framing,
    bench_select_charts,
    bench_list_charts,
    bench_envelope
);
criterion_main!(benches);
