//! Metrics and observability utilities
//!
//! Counters, gauges and histograms for the retrieval pipeline, recorded through the
//! `metrics` facade. Nothing is exported unless the host installs a recorder.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};

/// Metrics prefix for all NoteForge metrics
pub const METRICS_PREFIX: &str = "noteforge";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total retrieval queries by mode and outcome"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_query_results_count", METRICS_PREFIX),
        Unit::Count,
        "Results returned by the most recent query, by mode"
    );

    describe_counter!(
        format!("{}_seed_tier_total", METRICS_PREFIX),
        Unit::Count,
        "Seeder tier that produced the seed set"
    );

    describe_counter!(
        format!("{}_search_tool_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Search tool invocations that failed or timed out"
    );

    describe_counter!(
        format!("{}_rerank_batches_total", METRICS_PREFIX),
        Unit::Count,
        "Scoring batches by status"
    );

    describe_counter!(
        format!("{}_completion_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Completion API requests by status"
    );

    describe_histogram!(
        format!("{}_completion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Completion API latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record query metrics
pub fn record_query(duration_secs: f64, mode: &str, outcome: &str, result_count: usize) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .record(duration_secs);

    gauge!(
        format!("{}_query_results_count", METRICS_PREFIX),
        "mode" => mode.to_string()
    )
    .set(result_count as f64);
}

/// Helper to record which seeder tier filled the seed set
pub fn record_seed_tier(tier: &str) {
    counter!(
        format!("{}_seed_tier_total", METRICS_PREFIX),
        "tier" => tier.to_string()
    )
    .increment(1);
}

/// Helper to record a search tool soft failure
pub fn record_tool_failure(reason: &str) {
    counter!(
        format!("{}_search_tool_failures_total", METRICS_PREFIX),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Helper to record a scoring batch
pub fn record_rerank_batch(status: &str) {
    counter!(
        format!("{}_rerank_batches_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record completion metrics
pub fn record_completion(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_completion_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_completion_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}
