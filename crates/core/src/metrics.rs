//! Prometheus metrics for the conversion engine.
//!
//! The collectors are process-wide statics; hosts that expose metrics add
//! them to their registry with [`register_metrics`].

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::time::Duration;

use crate::converter::ConversionOutcome;

/// Conversions total by strategy and outcome.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convertino_conversions_total", "Total conversion requests"),
        &["strategy", "outcome"], // outcome: "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Failures by kind.
pub static CONVERSION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convertino_conversion_failures_total",
            "Failed conversions by failure kind",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convertino_conversion_duration_seconds",
            "Duration of conversions",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["strategy"],
    )
    .unwrap()
});

/// Partial targets that could not be deleted.
pub static PARTIAL_CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_partial_cleanup_failures_total",
        "Partial outputs that could not be removed",
    )
    .unwrap()
});

/// Records one finished request.
pub fn record_outcome(strategy: &str, outcome: &ConversionOutcome, elapsed: Duration) {
    CONVERSIONS_TOTAL
        .with_label_values(&[strategy, outcome.label()])
        .inc();
    if let Some(kind) = outcome.failure_kind() {
        CONVERSION_FAILURES
            .with_label_values(&[kind.as_str()])
            .inc();
    }
    CONVERSION_DURATION
        .with_label_values(&[strategy])
        .observe(elapsed.as_secs_f64());
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_FAILURES.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(PARTIAL_CLEANUP_FAILURES.clone()),
    ]
}

/// Registers every core metric with `registry`.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    for collector in all_metrics() {
        registry.register(collector)?;
    }
    Ok(())
}
