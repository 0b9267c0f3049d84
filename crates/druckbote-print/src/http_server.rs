// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Network print API and its listener lifecycle.
//
// The listener accepts TCP connections (optionally wrapped in TLS) and serves
// each one with hyper's HTTP/1 connection driver in front of an axum router.
// Every open connection is tracked so that `stop` can close them forcibly
// instead of waiting for idle keep-alive clients.
//
// # Routes
//
//   GET  /printers    name -> status map of host printers
//   POST /print       array of jobs -> array of outcomes, same order
//                     (local paths only inside the network document dir)
//   POST /test-page   one calibration page -> outcome
//   GET  /interfaces  addresses of this host
//
// # Lifecycle
//
// `start` while running is a no-op that returns the bound address.  `stop`
// cancels the accept loop (dropping the listener), force-closes every
// tracked connection and waits for all connection tasks before reporting
// `Stopped`, so the port is free once it returns.  Jobs run on service-owned
// tasks, so closing a connection never cancels a dispatch in progress.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{
    JobOutcome, NetworkInterface, PrinterList, ServerConfig, ServerState, ServerStatus,
    TestPageRequest, Transport,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::service::{JobOrigin, PrintService};
use crate::session::SessionEvent;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the print API router.
pub fn router(service: Arc<PrintService>) -> Router {
    Router::new()
        .route("/printers", get(list_printers))
        .route("/print", post(print_batch))
        .route("/test-page", post(print_test_page))
        .route("/interfaces", get(list_interfaces))
        .with_state(service)
}

/// Error body for enumeration endpoints.
struct ApiError(DruckboteError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            DruckboteError::NoActivePrinterContext => StatusCode::SERVICE_UNAVAILABLE,
            DruckboteError::UnsupportedPlatform(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<DruckboteError> for ApiError {
    fn from(e: DruckboteError) -> Self {
        Self(e)
    }
}

async fn list_printers(
    State(service): State<Arc<PrintService>>,
) -> std::result::Result<Json<PrinterList>, ApiError> {
    Ok(Json(service.printers().await?))
}

async fn print_batch(
    State(service): State<Arc<PrintService>>,
    Json(batch): Json<Vec<serde_json::Value>>,
) -> Json<Vec<JobOutcome>> {
    Json(service.submit_json(batch, JobOrigin::Network).await)
}

async fn print_test_page(
    State(service): State<Arc<PrintService>>,
    Json(request): Json<TestPageRequest>,
) -> Json<JobOutcome> {
    Json(service.test_page(request).await)
}

async fn list_interfaces(
    State(service): State<Arc<PrintService>>,
) -> std::result::Result<Json<Vec<NetworkInterface>>, ApiError> {
    Ok(Json(service.interfaces()?))
}

// ---------------------------------------------------------------------------
// Connection tracking
// ---------------------------------------------------------------------------

/// Open connections on the active listener.
#[derive(Default)]
struct ConnectionSet {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, (SocketAddr, CancellationToken)>>,
}

impl ConnectionSet {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, (SocketAddr, CancellationToken)>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, peer: SocketAddr) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.lock().insert(id, (peer, token.clone()));
        (id, token)
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Signal every open connection to close.  Returns how many there were.
    fn close_all(&self) -> usize {
        let open = self.lock();
        for (peer, token) in open.values() {
            debug!(peer = %peer, "closing connection");
            token.cancel();
        }
        open.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

// ---------------------------------------------------------------------------
// PrintServer
// ---------------------------------------------------------------------------

struct RunningServer {
    address: SocketAddr,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
    tracker: TaskTracker,
}

/// Owner of the print API listener.  At most one listener is active.
pub struct PrintServer {
    service: Arc<PrintService>,
    running: tokio::sync::Mutex<Option<RunningServer>>,
    status: watch::Sender<ServerStatus>,
    connections: Arc<ConnectionSet>,
}

impl PrintServer {
    /// Create a server in `Stopped` state.
    pub fn new(service: Arc<PrintService>) -> Self {
        let (status, _) = watch::channel(ServerStatus::stopped());
        Self {
            service,
            running: tokio::sync::Mutex::new(None),
            status,
            connections: Arc::new(ConnectionSet::default()),
        }
    }

    /// Snapshot of the lifecycle state.  Never waits on a transition in
    /// progress; reflects the last completed one.
    pub fn state(&self) -> ServerStatus {
        let mut status = self.status.borrow().clone();
        if status.state == ServerState::Running {
            status.active_connections = self.connections.len();
        }
        status
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Bind and start serving.  Resolves with the bound address.
    #[instrument(skip(self, config), fields(target = %config.bind_target()))]
    pub async fn start(&self, config: &ServerConfig) -> Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if let Some(server) = running.as_ref() {
            debug!(address = %server.address, "print API already running");
            return Ok(server.address);
        }

        let acceptor = match &config.transport {
            Transport::Plaintext => None,
            Transport::Encrypted {
                cert_path,
                key_path,
            } => Some(TlsAcceptor::from(druckbote_security::load_server_config(
                cert_path, key_path,
            )?)),
        };
        let encrypted = acceptor.is_some();

        let target = config.bind_target();
        let listener = TcpListener::bind(&target)
            .await
            .map_err(|source| DruckboteError::Bind {
                addr: target.clone(),
                source,
            })?;
        let address = listener.local_addr()?;

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            acceptor,
            router(Arc::clone(&self.service)),
            Arc::clone(&self.connections),
            shutdown.clone(),
            tracker.clone(),
        ));

        *running = Some(RunningServer {
            address,
            shutdown,
            accept_task,
            tracker,
        });

        let status = ServerStatus {
            state: ServerState::Running,
            address: Some(address),
            encrypted,
            started_at: Some(Utc::now()),
            active_connections: 0,
        };
        self.publish(status);
        info!(address = %address, encrypted, "print API listening");
        Ok(address)
    }

    /// Stop serving.  Resolves once every connection is closed and the port
    /// is released.  Stopping a stopped server is a no-op.
    pub async fn stop(&self) -> ServerStatus {
        let mut running = self.running.lock().await;
        let Some(server) = running.take() else {
            return self.state();
        };

        info!(address = %server.address, "stopping print API");

        server.shutdown.cancel();
        if let Err(e) = server.accept_task.await {
            warn!(error = %e, "accept loop ended abnormally");
        }

        let closed = self.connections.close_all();
        server.tracker.close();
        server.tracker.wait().await;

        let status = ServerStatus::stopped();
        self.publish(status.clone());
        info!(address = %server.address, closed, "print API stopped");
        status
    }

    fn publish(&self, status: ServerStatus) {
        self.status.send_replace(status.clone());
        self.service
            .sessions()
            .notify(SessionEvent::ServerStateChanged(status));
    }
}

/// Accept connections until `shutdown` fires.  The listener is dropped on
/// return.
async fn accept_loop(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    router: Router,
    connections: Arc<ConnectionSet>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("accept loop received shutdown signal");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "incoming connection");
                    let (id, token) = connections.add(peer);
                    let connections = Arc::clone(&connections);
                    let acceptor = acceptor.clone();
                    let router = router.clone();
                    tracker.spawn(async move {
                        handle_connection(stream, peer, acceptor, router, token).await;
                        connections.remove(id);
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            },
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: Option<TlsAcceptor>,
    router: Router,
    token: CancellationToken,
) {
    let Some(acceptor) = acceptor else {
        serve_connection(stream, peer, router, token).await;
        return;
    };

    let handshake = tokio::select! {
        result = acceptor.accept(stream) => result,
        _ = token.cancelled() => return,
    };
    match handshake {
        Ok(tls) => serve_connection(tls, peer, router, token).await,
        Err(e) => warn!(peer = %peer, error = %e, "TLS handshake failed"),
    }
}

/// Drive one HTTP/1 connection until the peer hangs up or `token` fires.
async fn serve_connection<IO>(io: IO, peer: SocketAddr, router: Router, token: CancellationToken)
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
        router.clone().oneshot(request)
    });
    let connection = http1::Builder::new().serve_connection(TokioIo::new(io), service);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                debug!(peer = %peer, error = %e, "connection ended with error");
            }
        }
        _ = token.cancelled() => {
            debug!(peer = %peer, "connection force-closed");
        }
    }
}
