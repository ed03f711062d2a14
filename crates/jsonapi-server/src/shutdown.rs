//! Graceful shutdown.
//!
//! A [`ShutdownSignal`] is a [`CancelToken`] owned by the server. Every
//! per-request [`Context`](jsonapi_core::Context) gets a child of it, so
//! triggering shutdown also cancels the calls still running. The envelope
//! then suppresses their replies and the server answers with 503.
//!
//! ```rust
//! use jsonapi_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::new();
//! let call = shutdown.token().child_token();
//!
//! shutdown.trigger();
//! assert!(shutdown.is_shutdown());
//! assert!(call.is_cancelled());
//! ```

use std::sync::Arc;

use jsonapi_core::CancelToken;
use tokio::sync::watch;

/// Triggers and awaits a server shutdown. Clones share the signal.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancelToken,
}

impl ShutdownSignal {
    /// Creates a signal which has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Further calls do nothing.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("shutdown triggered");
        }
        self.token.cancel();
    }

    /// Returns `true` once the signal fired.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits until the signal fires.
    pub async fn recv(&self) {
        self.token.cancelled().await;
    }

    /// The underlying token. Children of it are cancelled on shutdown.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Creates a signal fired by SIGTERM or SIGINT (Ctrl+C elsewhere).
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });

        signal
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "failed to install signal handlers");
                std::future::pending::<()>().await;
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

/// Counts open connections so shutdown can wait for them.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    count: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            count: Arc::new(watch::Sender::new(0)),
        }
    }

    /// Registers a connection. It counts until the token is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.count.send_modify(|n| *n += 1);
        ConnectionToken {
            count: Arc::clone(&self.count),
        }
    }

    /// Number of connections currently open.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        *self.count.borrow()
    }

    /// Waits until every token was dropped.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in self, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one connection counted while alive.
#[derive(Debug)]
pub struct ConnectionToken {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        self.count.send_modify(|n| *n = n.saturating_sub(1));
    }
}
