//! Force response headers.

use std::sync::Arc;

use http::HeaderMap;
use jsonapi_core::{Handler, ResponseWriter};

use crate::middleware::Middleware;

/// Sets fixed response headers once the inner handler returns.
///
/// Headers are applied whatever the outcome of the call, replacing values
/// the handler may have set.
#[derive(Debug, Clone, Default)]
pub struct ForceHeader {
    headers: HeaderMap,
}

impl ForceHeader {
    /// Creates the middleware.
    #[must_use]
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }
}

impl Middleware for ForceHeader {
    fn name(&self) -> &'static str {
        "force_header"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let headers = self.headers.clone();
        Handler::new(move |ctx, req| {
            let next = next.clone();
            let headers = headers.clone();
            async move {
                let result = next.call(ctx, Arc::clone(&req)).await;
                apply(req.resp(), &headers);
                result
            }
        })
    }
}

pub(crate) fn apply(w: &ResponseWriter, headers: &HeaderMap) {
    for name in headers.keys() {
        w.remove_header(name);
        for value in headers.get_all(name) {
            w.append_header(name.clone(), value.clone());
        }
    }
}

/// Shortcut for [`ForceHeader::new`].
#[must_use]
pub fn force_header(headers: HeaderMap) -> ForceHeader {
    ForceHeader::new(headers)
}
