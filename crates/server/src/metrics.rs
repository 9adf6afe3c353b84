//! Prometheus metrics for the lode server.
//!
//! Exposes counters for registry mutations, authentication failures and
//! post-publish hooks, plus publish latency.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no package names or usernames, only aggregate counts, but
//! the endpoint should still be network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Registry mutations
pub static VERSIONS_PUBLISHED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lode_versions_published_total",
        "Total number of versions published",
    )
    .expect("metric creation failed")
});

pub static VERSIONS_UNPUBLISHED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lode_versions_unpublished_total",
        "Total number of versions unpublished",
    )
    .expect("metric creation failed")
});

pub static PACKAGES_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lode_packages_deleted_total",
        "Total number of packages destroyed, explicitly or by removing the last version",
    )
    .expect("metric creation failed")
});

pub static TAG_MUTATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lode_tag_mutations_total", "Tag mutations by operation"),
        &["operation"],
    )
    .expect("metric creation failed")
});

pub static AUTHOR_MUTATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lode_author_mutations_total", "Author mutations by operation"),
        &["operation"],
    )
    .expect("metric creation failed")
});

pub static PUBLISH_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "lode_publish_duration_seconds",
            "Time from lock acquisition to committed publish",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
    )
    .expect("metric creation failed")
});

// Authentication
pub static AUTH_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lode_auth_failures_total",
            "Rejected credentials by credential shape",
        ),
        &["shape"],
    )
    .expect("metric creation failed")
});

// Post-publish hooks
pub static HOOK_RUNS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("lode_hook_runs_total", "Post-publish hook runs by hook and outcome"),
        &["hook", "outcome"],
    )
    .expect("metric creation failed")
});

pub static HOOK_EVENTS_DROPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "lode_hook_events_dropped_total",
        "Publish events dropped because the hook queue was full or closed",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(VERSIONS_PUBLISHED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(VERSIONS_UNPUBLISHED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PACKAGES_DELETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TAG_MUTATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTHOR_MUTATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(PUBLISH_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(AUTH_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HOOK_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(HOOK_EVENTS_DROPPED.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the /metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record a rejected credential.
pub fn record_auth_failure(shape: &str) {
    AUTH_FAILURES.with_label_values(&[shape]).inc();
}

/// Record the outcome of one hook run.
pub fn record_hook_run(hook: &str, outcome: &str) {
    HOOK_RUNS.with_label_values(&[hook, outcome]).inc();
}
