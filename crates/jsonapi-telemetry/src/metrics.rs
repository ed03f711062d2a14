//! Request metrics.
//!
//! Metrics are recorded through the `metrics` facade. Nothing is exported
//! unless the application installs a recorder.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `jsonapi_requests_total` | Counter | `path`, `status` | Handled calls |
//! | `jsonapi_request_duration_seconds` | Histogram | `path` | Call latency |
//! | `jsonapi_in_flight_requests` | Gauge | - | Calls in progress |
//!
//! `status` is the HTTP status of the reply, `asis` for raw replies.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Name of the call counter.
pub const REQUESTS_TOTAL: &str = "jsonapi_requests_total";

/// Name of the latency histogram.
pub const REQUEST_DURATION: &str = "jsonapi_request_duration_seconds";

/// Name of the in-flight gauge.
pub const IN_FLIGHT: &str = "jsonapi_in_flight_requests";

/// Registers descriptions for the standard metrics.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of API calls handled");
    describe_histogram!(REQUEST_DURATION, "API call duration in seconds");
    describe_gauge!(IN_FLIGHT, "Number of API calls currently being handled");
}

/// Records a finished call.
pub fn record_request(path: &str, status: &str, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION, "path" => path.to_string()).record(duration.as_secs_f64());
}

/// Increments the in-flight gauge until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT).decrement(1.0);
    }
}
