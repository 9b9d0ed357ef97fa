//! HTTP server.
//!
//! A hyper HTTP/1.1 accept loop in front of the [`Dispatcher`]. Each request
//! body is collected up to `max_body_size`, the peer address is attached as
//! a [`RemoteAddr`] extension, and dispatch runs under `request_timeout`.
//! A background task purges stale rate-limit windows.
//!
//! On shutdown the accept loop stops and every open connection is told to
//! finish its in-flight request and then close, bounded by
//! `shutdown_timeout`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use structureone_server::{Dispatcher, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//!     let dispatcher: Arc<Dispatcher> = build();
//!     Server::new(config, dispatcher).run().await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use structureone_core::ApiError;
use structureone_middleware::RemoteAddr;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ServerError;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Response type written to the wire.
pub type HttpResponse = Response<Full<Bytes>>;

/// The StructureOne HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub fn new(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The dispatcher requests are handed to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the configured address.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::BindError(format!("Invalid address '{}': {e}", self.config.http_addr()))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's local address cannot be read.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();
        let purge = tokio::spawn(Self::purge_loop(Arc::clone(&server), shutdown.clone()));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                    tracing::debug!(client = %remote_addr, error = %e, "connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            active = tracker.active_connections(),
            "waiting for connections to close"
        );
        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still active"
                );
            }
        }

        purge.abort();
        tracing::info!("server stopped");
        Ok(())
    }

    async fn purge_loop(server: Arc<Self>, shutdown: ShutdownSignal) {
        let period = server.config.purge_interval().max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let limiter = server.dispatcher.services().limiter().clone();
                    match tokio::task::spawn_blocking(move || limiter.purge()).await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "purged stale rate-limit windows"),
                        Err(e) => tracing::warn!(error = %e, "rate-limit purge task failed"),
                    }
                }
                () = shutdown.recv() => break,
            }
        }
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);
        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req, remote_addr).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);
        tokio::select! {
            result = conn.as_mut() => return result,
            () = shutdown.recv() => {
                tracing::debug!(client = %remote_addr, "draining connection for shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }
        conn.await
    }

    async fn handle_request(
        &self,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> Result<HttpResponse, Infallible> {
        let (parts, body) = req.into_parts();
        let timeout = self.config.request_timeout();

        let collected = tokio::time::timeout(
            timeout,
            Limited::new(body, self.config.max_body_size()).collect(),
        )
        .await;
        let bytes = match collected {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                tracing::debug!(client = %remote_addr, limit = self.config.max_body_size(), "request body too large");
                return Ok(self.reject(&ApiError::status(413, "Request body too large")));
            }
            Ok(Err(e)) => {
                tracing::debug!(client = %remote_addr, error = %e, "failed to read request body");
                return Ok(self.reject(&ApiError::bad_request(format!(
                    "Failed to read request body: {e}"
                ))));
            }
            Err(_) => {
                tracing::warn!(client = %remote_addr, "request body collection timed out");
                return Ok(self.reject(&ApiError::status(408, "Request body collection timed out")));
            }
        };

        let mut request = Request::from_parts(parts, bytes);
        request.extensions_mut().insert(RemoteAddr(remote_addr));
        let response = self.dispatcher.dispatch_within(request, timeout).await;
        Ok(response.map(Full::new))
    }

    fn reject(&self, err: &ApiError) -> HttpResponse {
        self.dispatcher.reject(err).map(Full::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Routes;
    use crate::services::AppServices;
    use crate::RouteContext;
    use structureone_core::{ApiResponse, ApiResult, BoxFuture, TokenService};
    use structureone_middleware::RateLimiter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn echo(ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        Box::pin(async move {
            let ip = ctx.client_ip().to_string();
            let size = ctx.body().len();
            Ok(ApiResponse::ok("echo").with_field("ip", ip).with_field("size", size))
        })
    }

    fn slow(_ctx: &mut RouteContext) -> BoxFuture<'_, ApiResult<ApiResponse>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(ApiResponse::ok("slow done"))
        })
    }

    fn dispatcher() -> Arc<Dispatcher> {
        let mut routes = Routes::new();
        routes.legacy("echo").entry(echo);
        routes.legacy("slow").entry(slow);
        let services = AppServices::new(TokenService::new("server-secret", 60), RateLimiter::in_memory());
        Arc::new(Dispatcher::new(routes, Arc::new(services)))
    }

    async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    async fn start(config: ServerConfig) -> (SocketAddr, ShutdownSignal, tokio::task::JoinHandle<Result<(), ServerError>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = Server::new(config, dispatcher());
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, shutdown, handle)
    }

    fn quick_config() -> ServerConfig {
        ServerConfig::builder()
            .shutdown_timeout(Duration::from_millis(100))
            .build()
    }

    #[tokio::test]
    async fn test_run_invalid_address() {
        let config = ServerConfig::builder().http_addr("not-a-valid-address").build();
        let result = Server::new(config, dispatcher())
            .run_with_shutdown(ShutdownSignal::new())
            .await;
        match result {
            Err(ServerError::BindError(msg)) => assert!(msg.contains("Invalid address")),
            other => panic!("expected BindError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let config = ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .shutdown_timeout(Duration::from_millis(100))
            .build();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Server::new(config, dispatcher()).run_with_shutdown(shutdown),
        )
        .await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_serves_request_with_peer_address() {
        let (addr, shutdown, handle) = start(quick_config()).await;

        let raw = roundtrip(
            addr,
            "POST /api/echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
        )
        .await;
        assert!(raw.starts_with("HTTP/1.1 200 OK"), "{raw}");
        assert!(raw.contains("\"ip\": \"127.0.0.1\""), "{raw}");
        assert!(raw.contains("\"size\": 2"), "{raw}");

        shutdown.trigger();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_rejects_oversized_body() {
        let config = ServerConfig::builder()
            .max_body_size(4)
            .shutdown_timeout(Duration::from_millis(100))
            .build();
        let (addr, shutdown, handle) = start(config).await;

        let raw = roundtrip(
            addr,
            "POST /api/echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\nConnection: close\r\n\r\n0123456789",
        )
        .await;
        assert!(raw.starts_with("HTTP/1.1 413"), "{raw}");
        assert!(raw.contains("Request body too large"), "{raw}");
        assert!(raw.contains("access-control-allow-origin: *"), "{raw}");

        shutdown.trigger();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_request() {
        let config = ServerConfig::builder()
            .shutdown_timeout(Duration::from_secs(5))
            .build();
        let (addr, shutdown, handle) = start(config).await;

        let client = tokio::spawn(roundtrip(
            addr,
            "GET /api/slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();

        let raw = client.await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"), "{raw}");
        assert!(raw.contains("slow done"), "{raw}");
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_slow_route_times_out_with_cors() {
        let config = ServerConfig::builder()
            .request_timeout(Duration::from_millis(50))
            .shutdown_timeout(Duration::from_millis(100))
            .build();
        let (addr, shutdown, handle) = start(config).await;

        let raw = roundtrip(
            addr,
            "GET /api/slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(raw.starts_with("HTTP/1.1 504"), "{raw}");
        assert!(raw.contains("access-control-allow-origin: *"), "{raw}");

        shutdown.trigger();
        assert!(handle.await.unwrap().is_ok());
    }
}
