// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local control channel.
//
// Requests arrive as `ControlRequest` values carrying a one-shot reply
// sender.  One task owns the receiving end and serves every request on its
// own spawned task, so a long print never holds up `stop` or `state`.  The
// handlers call the same `PrintService`/`PrintServer` functions as the HTTP
// routes.

use std::net::SocketAddr;
use std::sync::Arc;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{
    JobOutcome, JobRequest, NetworkInterface, PrinterList, ServerConfig, ServerStatus,
    TestPageRequest,
};
use druckbote_print::{PrintServer, PrintService};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const CONTROL_QUEUE_DEPTH: usize = 32;

/// One request on the control channel.
#[derive(Debug)]
pub enum ControlRequest {
    Printers {
        reply: oneshot::Sender<Result<PrinterList>>,
    },
    Interfaces {
        reply: oneshot::Sender<Result<Vec<NetworkInterface>>>,
    },
    Print {
        job: JobRequest,
        reply: oneshot::Sender<JobOutcome>,
    },
    TestPage {
        request: TestPageRequest,
        reply: oneshot::Sender<JobOutcome>,
    },
    Start {
        reply: oneshot::Sender<Result<SocketAddr>>,
    },
    Stop {
        reply: oneshot::Sender<ServerStatus>,
    },
    State {
        reply: oneshot::Sender<ServerStatus>,
    },
}

/// Sending side of the control channel.  Cheap to clone.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

fn closed() -> DruckboteError {
    DruckboteError::Server("control channel closed".into())
}

impl ControlHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControlRequest,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| closed())?;
        response.await.map_err(|_| closed())
    }

    pub async fn printers(&self) -> Result<PrinterList> {
        self.request(|reply| ControlRequest::Printers { reply }).await?
    }

    pub async fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        self.request(|reply| ControlRequest::Interfaces { reply }).await?
    }

    pub async fn print(&self, job: JobRequest) -> Result<JobOutcome> {
        self.request(|reply| ControlRequest::Print { job, reply }).await
    }

    pub async fn test_page(&self, request: TestPageRequest) -> Result<JobOutcome> {
        self.request(|reply| ControlRequest::TestPage { request, reply }).await
    }

    pub async fn start(&self) -> Result<SocketAddr> {
        self.request(|reply| ControlRequest::Start { reply }).await?
    }

    pub async fn stop(&self) -> Result<ServerStatus> {
        self.request(|reply| ControlRequest::Stop { reply }).await
    }

    pub async fn state(&self) -> Result<ServerStatus> {
        self.request(|reply| ControlRequest::State { reply }).await
    }
}

/// Spawn the control task.  `listen` is the configuration used by `Start`.
pub fn spawn(
    service: Arc<PrintService>,
    server: Arc<PrintServer>,
    listen: ServerConfig,
) -> (ControlHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
    let task = tokio::spawn(serve(rx, service, server, Arc::new(listen)));
    (ControlHandle { tx }, task)
}

/// Serve requests until every handle has been dropped.
async fn serve(
    mut rx: mpsc::Receiver<ControlRequest>,
    service: Arc<PrintService>,
    server: Arc<PrintServer>,
    listen: Arc<ServerConfig>,
) {
    while let Some(request) = rx.recv().await {
        debug!(?request, "control request");
        let service = Arc::clone(&service);
        let server = Arc::clone(&server);
        let listen = Arc::clone(&listen);
        tokio::spawn(async move {
            handle(request, &service, &server, &listen).await;
        });
    }
    info!("control channel closed");
}

// A dropped reply receiver only means the caller stopped waiting.
async fn handle(
    request: ControlRequest,
    service: &Arc<PrintService>,
    server: &PrintServer,
    listen: &ServerConfig,
) {
    match request {
        ControlRequest::Printers { reply } => {
            let _ = reply.send(service.printers().await);
        }
        ControlRequest::Interfaces { reply } => {
            let _ = reply.send(service.interfaces());
        }
        ControlRequest::Print { job, reply } => {
            let _ = reply.send(service.submit_one(job).await);
        }
        ControlRequest::TestPage { request, reply } => {
            let _ = reply.send(service.test_page(request).await);
        }
        ControlRequest::Start { reply } => {
            let _ = reply.send(server.start(listen).await);
        }
        ControlRequest::Stop { reply } => {
            let _ = reply.send(server.stop().await);
        }
        ControlRequest::State { reply } => {
            let _ = reply.send(server.state());
        }
    }
}
