//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Jobs (terminal statuses, intake rejections)
//! - Entities (terminal outcomes, attempts, admission waits)
//! - Artifacts (documents downloaded)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Jobs finalized, by terminal status.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("harvester_jobs_total", "Jobs finalized by terminal status"),
        &["status"], // "success", "error", "invalid"
    )
    .unwrap()
});

/// Inbound messages rejected at intake.
pub static INTAKE_REJECTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_intake_rejections_total",
        "Inbound job messages rejected as malformed",
    )
    .unwrap()
});

/// Entity terminal outcomes, by bucket.
pub static ENTITY_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "harvester_entity_outcomes_total",
            "Entity terminal outcomes",
        ),
        &["outcome"], // "success", "no_results", "permission_denied", "error"
    )
    .unwrap()
});

/// Attempts consumed per entity.
pub static ENTITY_ATTEMPTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "harvester_entity_attempts",
            "Attempts consumed per terminal entity",
        )
        .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0]),
    )
    .unwrap()
});

/// Admission-gate waits. These never consume an attempt.
pub static ADMISSION_WAITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_admission_waits_total",
        "Times an entity attempt was deferred by the admission gate",
    )
    .unwrap()
});

/// Documents downloaded.
pub static DOCUMENTS_DOWNLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "harvester_documents_downloaded_total",
        "Documents downloaded across all jobs",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(JOBS_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(INTAKE_REJECTIONS.clone()))
        .unwrap();
    registry
        .register(Box::new(ENTITY_OUTCOMES.clone()))
        .unwrap();
    registry
        .register(Box::new(ENTITY_ATTEMPTS.clone()))
        .unwrap();
    registry
        .register(Box::new(ADMISSION_WAITS.clone()))
        .unwrap();
    registry
        .register(Box::new(DOCUMENTS_DOWNLOADED.clone()))
        .unwrap();
}
