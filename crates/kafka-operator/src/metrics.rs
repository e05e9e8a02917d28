use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::LazyLock;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, info};

static PASSES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "kafka_operator_reconciliations_total",
            "Reconciliation passes by outcome",
        ),
        &["result"],
    )
    .expect("metric can be created");
    prometheus::register(Box::new(counter.clone())).expect("metric can be registered");
    counter
});

static PASS_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let hist = Histogram::with_opts(HistogramOpts::new(
        "kafka_operator_reconciliation_duration_seconds",
        "Duration of a reconciliation pass, retries included",
    ))
    .expect("metric can be created");
    prometheus::register(Box::new(hist.clone())).expect("metric can be registered");
    hist
});

static OPERATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "kafka_operator_resource_operations_total",
            "Create, update and delete calls issued against the platform",
        ),
        &["kind", "verb"],
    )
    .expect("metric can be created");
    prometheus::register(Box::new(counter.clone())).expect("metric can be registered");
    counter
});

static COALESCED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "kafka_operator_coalesced_triggers_total",
        "Triggers that replaced a pending one for a busy cluster",
    )
    .expect("metric can be created");
    prometheus::register(Box::new(counter.clone())).expect("metric can be registered");
    counter
});

static MANAGED_CLUSTERS: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "kafka_operator_managed_clusters",
        "Desired-state records currently known",
    )
    .expect("metric can be created");
    prometheus::register(Box::new(gauge.clone())).expect("metric can be registered");
    gauge
});

static READY: AtomicBool = AtomicBool::new(false);

pub fn record_pass(result: &str, duration_secs: f64) {
    PASSES.with_label_values(&[result]).inc();
    PASS_DURATION.observe(duration_secs);
}

pub fn record_operation(kind: &str, verb: &str) {
    OPERATIONS.with_label_values(&[kind, verb]).inc();
}

pub fn record_coalesced() {
    COALESCED.inc();
}

pub fn set_managed_clusters(count: usize) {
    MANAGED_CLUSTERS.set(count as i64);
}

/// Flip `/readyz` to 200 once the initial listing of records is done.
pub fn set_ready(ready: bool) {
    READY.store(ready, Ordering::Relaxed);
}

fn encode_metrics() -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {e}"))?;
    Ok(buffer)
}

fn route(path: &str, ready: bool) -> (&'static str, &'static str, Vec<u8>) {
    match path {
        "/metrics" => match encode_metrics() {
            Ok(data) => ("200 OK", "text/plain; version=0.0.4; charset=utf-8", data),
            Err(e) => ("500 Internal Server Error", "text/plain", e.into_bytes()),
        },
        "/healthz" => ("200 OK", "text/plain", b"ok".to_vec()),
        "/readyz" if ready => ("200 OK", "text/plain", b"ok".to_vec()),
        "/readyz" => (
            "503 Service Unavailable",
            "text/plain",
            b"not ready".to_vec(),
        ),
        _ => ("404 Not Found", "text/plain", b"not found".to_vec()),
    }
}

/// Serve `/metrics`, `/healthz` and `/readyz` on `addr`.
pub async fn serve(addr: String) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Metrics server listening on {addr}");

    loop {
        let (mut stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept metrics connection: {e}");
                continue;
            }
        };
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(_) => return,
            };
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/");

            let (status, content_type, body) = route(path, READY.load(Ordering::Relaxed));
            let header = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(&body).await;
        });
    }
}
