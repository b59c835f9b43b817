use prometheus::{Encoder, TextEncoder, Registry, IntCounterVec, Histogram, HistogramOpts};
use lazy_static::lazy_static;
use std::sync::OnceLock;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

static REQ_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();
static SECONDARY_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();
static INFERENCE_DURATION: OnceLock<Histogram> = OnceLock::new();

/// Register every collector once; later calls are no-ops
pub fn init_metrics() {
    if let Ok(counter) = IntCounterVec::new(
        prometheus::opts!("requests_total", "Total requests per route"),
        &["route", "status"],
    ) {
        if REQ_COUNTER.set(counter.clone()).is_ok() {
            REGISTRY.register(Box::new(counter)).ok();
        }
    }

    if let Ok(counter) = IntCounterVec::new(
        prometheus::opts!(
            "secondary_failures_total",
            "Best-effort steps that failed without failing the request"
        ),
        &["step"],
    ) {
        if SECONDARY_FAILURES.set(counter.clone()).is_ok() {
            REGISTRY.register(Box::new(counter)).ok();
        }
    }

    if let Ok(histogram) = Histogram::with_opts(HistogramOpts::new(
        "inference_duration_seconds",
        "Wall time of completion requests to the inference provider",
    )) {
        if INFERENCE_DURATION.set(histogram.clone()).is_ok() {
            REGISTRY.register(Box::new(histogram)).ok();
        }
    }
}

pub fn inc_request(route: &str, status: &str) {
    if let Some(counter) = REQ_COUNTER.get() {
        counter.with_label_values(&[route, status]).inc();
    }
}

pub fn inc_secondary_failure(step: &str) {
    if let Some(counter) = SECONDARY_FAILURES.get() {
        counter.with_label_values(&[step]).inc();
    }
}

pub fn observe_inference(duration: f64) {
    if let Some(histogram) = INFERENCE_DURATION.get() {
        histogram.observe(duration);
    }
}

pub async fn get_metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; version=0.0.4")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
}
