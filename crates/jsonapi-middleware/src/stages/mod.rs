//! Helper middlewares.
//!
//! | Middleware | Purpose |
//! |------------|---------|
//! | [`force_header`] | Set fixed response headers |
//! | [`cors`], [`cors_any`] | CORS headers and preflight replies |
//! | [`log_in`], [`log_err_in`] | Log calls through a [`LogProvider`] |
//! | [`last_modified`] | Reply 304 when the client copy is current |
//! | [`TotpMiddleware`] | Require a time-based one-time password |
//! | [`metrics_stage`] | Record request metrics |

pub mod cors;
pub mod header;
pub mod last_modified;
pub mod logging;
pub mod metrics;
pub mod totp;

pub use cors::{cors, cors_any, Cors, CorsOption};
pub use header::{force_header, ForceHeader};
pub use last_modified::{last_modified, LastModified};
pub use logging::{
    basic_format, json_format, log_err_in, log_in, simple_format, JsonLog, LogIn, LogProvider,
};
pub use metrics::{metrics_stage, MetricsStage};
pub use totp::{
    otp_code_by_form, otp_code_by_header, totp_in_form, totp_in_header, CodeSource, FailHandler,
    TotpMiddleware, E403_TOTP,
};
