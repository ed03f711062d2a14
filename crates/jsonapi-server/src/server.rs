//! The HTTP server.
//!
//! Every connection is served by hyper's HTTP/1 implementation on its own
//! task. Each request gets a fresh [`Context`]:
//!
//! - the request timeout becomes its deadline,
//! - its cancel token is a child of the [`ShutdownSignal`],
//!
//! and is then run through the envelope protocol of the root handler.
//! When the call produced no response because its context ended, the
//! server answers with 504 (deadline) or 503 (shutdown) itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use jsonapi_core::{Handler, Mux, Reply};
//! use jsonapi_server::{ServeMux, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut mux = ServeMux::new();
//!     mux.handle("/hello", Handler::new(|_, _| async { Ok(Reply::from("hi")) }));
//!
//!     Server::builder()
//!         .http_addr("127.0.0.1:8080")
//!         .handler(mux)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use jsonapi_core::{
    write_result, ApiError, CancelReason, Context, Handler, RemoteAddr, ResponseWriter,
    TransportRequest, CONTENT_TYPE_JSON, E400, E413, E503, E504,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::mux::ServeMux;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Response type produced by the server.
pub type HttpResponse = Response<Full<Bytes>>;

/// Serves one root handler over HTTP/1.
pub struct Server {
    config: ServerConfig,
    handler: Handler,
}

impl Server {
    /// Creates a server for `handler`, usually a [`ServeMux`].
    pub fn new(config: ServerConfig, handler: impl Into<Handler>) -> Self {
        Self {
            config,
            handler: handler.into(),
        }
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is invalid or taken.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("invalid address '{}': {e}", self.config.http_addr()))
        })?;

        TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind to {addr}: {e}")))
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Accepts connections from `listener` until `shutdown` fires, then
    /// waits up to the shutdown timeout for open connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener address cannot be read.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        tracing::info!(addr = %listener.local_addr()?, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            let result =
                                server.handle_connection(stream, remote_addr, shutdown).await;
                            if let Err(e) = result {
                                tracing::debug!(
                                    remote_addr = %remote_addr,
                                    error = %e,
                                    "connection error"
                                );
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?timeout,
            connections = tracker.active_connections(),
            "waiting for open connections"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(timeout) => tracing::warn!(
                connections = tracker.active_connections(),
                "shutdown timeout reached"
            ),
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let signal = shutdown.clone();

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            let signal = signal.clone();
            async move {
                Ok::<_, Infallible>(server.handle_request(req, remote_addr, &signal).await)
            }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                tracing::debug!(remote_addr = %remote_addr, "closing connection for shutdown");
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(
        &self,
        mut req: Request<Incoming>,
        remote_addr: SocketAddr,
        shutdown: &ShutdownSignal,
    ) -> HttpResponse {
        req.extensions_mut().insert(RemoteAddr(remote_addr));

        let mut ctx = Context::new().with_cancel_token(shutdown.token().child_token());
        if let Some(timeout) = self.config.request_timeout() {
            ctx = ctx.with_timeout(timeout);
        }

        let (parts, body) = req.into_parts();
        let transport = TransportRequest::from_parts(&parts);
        let method = parts.method;
        let path = parts.uri.path().to_string();
        tracing::debug!(request_id = %ctx.request_id(), method = %method, path = %path, "request");

        let resp = match Limited::new(body, self.config.max_body_bytes()).collect().await {
            Ok(collected) => self.dispatch(&ctx, transport, collected.to_bytes()).await,
            Err(e) if e.is::<LengthLimitError>() => error_response(&path, E413),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read request body");
                error_response(&path, E400.set_origin(e))
            }
        };

        let elapsed_ms = duration_ms(ctx.elapsed());
        jsonapi_telemetry::log_request_complete!(
            ctx.request_id(),
            method,
            path,
            resp.status().as_u16(),
            elapsed_ms
        );
        resp
    }

    async fn dispatch(&self, ctx: &Context, req: TransportRequest, payload: Bytes) -> HttpResponse {
        let path = req.path().to_string();
        let call = self.handler.serve_transport(ctx.clone(), req, payload);

        let w = match ctx.deadline() {
            Some(deadline) => match tokio::time::timeout_at(deadline.into(), call).await {
                Ok(w) => w,
                Err(_) => {
                    ctx.cancel_token().cancel();
                    tracing::warn!(request_id = %ctx.request_id(), path = %path, "call timed out");
                    return error_response(&path, E504);
                }
            },
            None => call.await,
        };

        if !w.is_committed() {
            match ctx.err() {
                Some(CancelReason::DeadlineExceeded) => return error_response(&path, E504),
                Some(CancelReason::Canceled) => return error_response(&path, E503),
                None => {}
            }
        }
        w.to_response()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn error_response(path: &str, err: ApiError) -> HttpResponse {
    let w = ResponseWriter::new();
    w.set_header(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    write_result(&w, path, Err(err.into()));
    w.to_response()
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: crate::config::ServerConfigBuilder,
    handler: Option<Handler>,
}

impl ServerBuilder {
    /// Creates a builder with the default configuration and an empty mux.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root handler.
    #[must_use]
    pub fn handler(mut self, handler: impl Into<Handler>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Sets the bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config = self.config.http_addr(addr);
        self
    }

    /// Sets the graceful shutdown timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.shutdown_timeout(timeout);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.request_timeout(timeout);
        self
    }

    /// Sets the body size limit.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config = self.config.max_body_bytes(limit);
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        let handler = self
            .handler
            .unwrap_or_else(|| ServeMux::new().into_handler());
        Server::new(self.config.build(), handler)
    }
}
