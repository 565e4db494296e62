//! Gateway metrics

use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec,
    HistogramVec, IntCounterVec,
};

lazy_static::lazy_static! {
    /// Requests routed to a provider, by outcome (`success`, `rejected`, `error`)
    pub static ref RAIL_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "rail_requests_total",
        "Total rail requests",
        &["provider", "operation", "outcome"]
    )
    .unwrap();

    /// Provider call latency
    pub static ref RAIL_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "rail_request_duration_seconds",
        "Rail request duration",
        &["provider", "operation"]
    )
    .unwrap();

    /// Requests for which no provider could be selected
    pub static ref RAIL_SELECTION_MISSES: IntCounterVec = register_int_counter_vec!(
        "rail_selection_misses_total",
        "Requests with no matching provider",
        &["operation"]
    )
    .unwrap();
}

/// Outcome label for a business result
pub fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "rejected"
    }
}

/// Record one provider call
pub fn record_request(provider: &str, operation: &str, outcome: &str, seconds: f64) {
    RAIL_REQUEST_DURATION
        .with_label_values(&[provider, operation])
        .observe(seconds);
    RAIL_REQUESTS_TOTAL
        .with_label_values(&[provider, operation, outcome])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_counts() {
        let before = RAIL_REQUESTS_TOTAL
            .with_label_values(&["metrics-test", "transfer", "success"])
            .get();
        record_request("metrics-test", "transfer", outcome(true), 0.01);
        let after = RAIL_REQUESTS_TOTAL
            .with_label_values(&["metrics-test", "transfer", "success"])
            .get();
        assert_eq!(after - before, 1.0);
    }
}
