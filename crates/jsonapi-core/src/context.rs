//! Per-call context.
//!
//! A [`Context`] is created for every inbound call and handed to the handler.
//! It carries the request id, timing information, an optional deadline and a
//! [`CancelToken`] which the transport fires when the caller goes away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;
use uuid::Uuid;

/// A unique identifier for each call, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps ids sortable in logs.
///
/// # Example
///
/// ```
/// use jsonapi_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID, e.g. one read from a header.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelState {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// A cancellation signal shared between the transport and a call.
///
/// Cancelling a token cancels every child created from it. Cancelling a child
/// leaves its parents untouched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    own: Arc<CancelState>,
    parents: Vec<Arc<CancelState>>,
}

impl CancelToken {
    /// Creates a token which is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child token, cancelled together with this one.
    #[must_use]
    pub fn child_token(&self) -> Self {
        let mut parents = self.parents.clone();
        parents.push(Arc::clone(&self.own));
        Self {
            own: Arc::new(CancelState::default()),
            parents,
        }
    }

    /// Fires the signal. Calling it more than once has no further effect.
    pub fn cancel(&self) {
        self.own.cancel();
    }

    /// Returns `true` once this token or one of its parents is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.own.is_cancelled() || self.parents.iter().any(|p| p.is_cancelled())
    }

    /// Waits until the token is cancelled.
    pub async fn cancelled(&self) {
        let states: Vec<&Arc<CancelState>> =
            std::iter::once(&self.own).chain(self.parents.iter()).collect();

        loop {
            // Register interest before checking the flag so a concurrent
            // cancel between the check and the wait is not lost.
            let waiters: Vec<_> = states
                .iter()
                .map(|s| Box::pin(s.notify.notified()))
                .collect();

            if self.is_cancelled() {
                return;
            }

            futures_util::future::select_all(waiters).await;
        }
    }
}

/// Why a context is no longer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelReason {
    /// The token was cancelled, usually because the caller disconnected.
    #[error("context canceled")]
    Canceled,

    /// The deadline has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Per-call context handed to handlers and middlewares.
///
/// Contexts are cheap to clone. Clones share the cancellation signal.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use jsonapi_core::Context;
///
/// let ctx = Context::new().with_timeout(Duration::from_secs(5));
/// assert!(!ctx.is_canceled());
///
/// ctx.cancel_token().cancel();
/// assert!(ctx.is_canceled());
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    request_id: RequestId,
    started_at: Instant,
    deadline: Option<Instant>,
    cancel: CancelToken,
}

impl Context {
    /// Creates a context with a fresh request id, no deadline and a new token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            started_at: Instant::now(),
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Sets an absolute deadline. An earlier existing deadline is kept.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        });
        self
    }

    /// Sets a deadline relative to now. A timeout too large for `Instant`
    /// sets no deadline.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Derives a context for a sub-call. Cancelling the child does not affect
    /// this context.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id,
            started_at: self.started_at,
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns when the call started.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the time elapsed since the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<CancelReason> {
        if self.cancel.is_cancelled() {
            return Some(CancelReason::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns `true` when the context was cancelled or its deadline passed.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.err().is_some()
    }

    /// Waits until the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.cancel.cancelled() => {}
                    () = tokio::time::sleep_until(deadline.into()) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
