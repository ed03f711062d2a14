//! Request metrics.

use std::sync::Arc;
use std::time::Instant;

use jsonapi_core::{Error, Handler, HandlerResult, ResponseWriter};
use jsonapi_telemetry::{record_request, InFlightGuard};

use crate::middleware::Middleware;

/// Records `jsonapi_requests_total` and `jsonapi_request_duration_seconds`
/// for each call, labelled by request path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsStage;

/// The status the envelope will reply with, as a label value.
fn status_label(w: &ResponseWriter, result: &HandlerResult) -> String {
    match result {
        Ok(_) => w.status().map_or(200, |s| s.as_u16()).to_string(),
        Err(e) if e.is_as_is() => "asis".to_string(),
        Err(Error::Api(e)) => e.code().to_string(),
        Err(_) => "500".to_string(),
    }
}

impl Middleware for MetricsStage {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, next: Handler) -> Handler {
        Handler::new(move |ctx, req| {
            let next = next.clone();
            async move {
                let _in_flight = InFlightGuard::new();
                let started = Instant::now();
                let result = next.call(ctx, Arc::clone(&req)).await;

                let status = status_label(req.resp(), &result);
                record_request(req.req().path(), &status, started.elapsed());
                result
            }
        })
    }
}

/// Creates the metrics middleware.
#[must_use]
pub fn metrics_stage() -> MetricsStage {
    MetricsStage
}
