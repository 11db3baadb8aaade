//! Embedded HTTP/1.1 listener.
//!
//! Connections are accepted on a tokio listener and each one is served by a
//! hyper connection task running the dispatch router.
use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::ConnectInfo,
    http::{HeaderValue, header},
};
use eyre::{Result, WrapErr};
use hyper::{body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{
    config::ConnectorSettings,
    ports::HttpServer,
    utils::{PoolActivity, ShutdownToken},
};

/// Value of the `Server` response header.
pub const SERVER_VERSION: &str = concat!("microboot/", env!("CARGO_PKG_VERSION"));

/// hyper rejects smaller read buffers.
const MIN_READ_BUFFER: usize = 8192;

pub struct EmbeddedServer {
    listener: TcpListener,
    router: Router,
    connection: http1::Builder,
    activity: Arc<PoolActivity>,
    shutdown: ShutdownToken,
}

impl EmbeddedServer {
    /// Bind `addr` and prepare the connection settings. Nothing is accepted
    /// until [`HttpServer::run`] is awaited.
    pub async fn bind(
        addr: &str,
        router: Router,
        settings: &ConnectorSettings,
        idle_timeout: Duration,
        activity: Arc<PoolActivity>,
        shutdown: ShutdownToken,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        let router = if settings.send_server_version {
            router.layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                HeaderValue::from_static(SERVER_VERSION),
            ))
        } else {
            router
        };

        let mut connection = http1::Builder::new();
        connection
            .timer(TokioTimer::new())
            .header_read_timeout(idle_timeout)
            .max_buf_size(settings.request_header_size.max(MIN_READ_BUFFER))
            .keep_alive(true);

        tracing::info!(
            address = %listener.local_addr()?,
            request_header_size = settings.request_header_size,
            response_header_size = settings.response_header_size,
            output_buffer_size = settings.output_buffer_size,
            secure_scheme = %settings.secure_scheme,
            secure_port = settings.secure_port,
            idle_timeout = %humantime::format_duration(idle_timeout),
            "HTTP listener bound"
        );

        Ok(Self {
            listener,
            router,
            connection,
            activity,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn serve_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let router = self.router.clone();
        let connection = self.connection.clone();
        let activity = self.activity.clone();

        tokio::spawn(async move {
            let _open = ConnectionGuard::new(activity.clone());
            let service = service_fn(move |mut req: hyper::Request<Incoming>| {
                req.extensions_mut().insert(ConnectInfo(peer));
                let router = router.clone();
                let in_flight = RequestGuard::new(activity.clone());
                async move {
                    let response = router.oneshot(req).await;
                    drop(in_flight);
                    response
                }
            });

            if let Err(e) = connection.serve_connection(TokioIo::new(stream), service).await {
                if e.is_incomplete_message() || e.is_canceled() {
                    tracing::debug!("Connection from {} closed early: {}", peer, e);
                } else if e.is_timeout() {
                    tracing::debug!("Connection from {} timed out", peer);
                } else {
                    tracing::warn!("Error serving connection from {}: {}", peer, e);
                }
            }
        });
    }
}

impl HttpServer for EmbeddedServer {
    async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                reason = self.shutdown.wait_for_shutdown() => {
                    tracing::info!("Listener stopping: {:?}", reason);
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                        }
                        self.serve_connection(stream, peer);
                    }
                    Err(e) if is_transient(&e) => {
                        tracing::warn!("Rejected connection: {}", e);
                        if is_resource_exhaustion(&e) {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                    Err(e) => {
                        return Err(e).wrap_err("Listener failed to accept connections");
                    }
                },
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    ) || is_resource_exhaustion(e)
}

// ENFILE / EMFILE: wait for descriptors to free up.
fn is_resource_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(23 | 24))
}

struct ConnectionGuard(Arc<PoolActivity>);

impl ConnectionGuard {
    fn new(activity: Arc<PoolActivity>) -> Self {
        activity.connection_opened();
        Self(activity)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.connection_closed();
    }
}

struct RequestGuard(Arc<PoolActivity>);

impl RequestGuard {
    fn new(activity: Arc<PoolActivity>) -> Self {
        activity.request_started();
        Self(activity)
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.0.request_finished();
    }
}
