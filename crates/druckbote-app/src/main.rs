// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Druckbote — local print dispatcher.
//
// Entry point. Initialises logging, loads settings, wires the print
// pipeline, registers the console session, starts the network listener when
// configured to, then runs the console (or waits for Ctrl-C when silent).

mod cli;
mod console;
mod control;
mod services;

use std::process::ExitCode;

use clap::Parser;
use druckbote_print::Session;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cli::Cli;
use services::app_services::AppServices;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    info!("Druckbote starting");

    let services = match AppServices::init(cli.config.as_deref()) {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    info!(data_dir = %services.data_dir().display(), "services ready");

    let session = services.sessions().register();
    let server_config = services.config().server_config();
    let (control, control_task) =
        control::spawn(services.service(), services.server(), server_config);

    // Autostart is independent of --silent.
    if services.config().auto_start_server {
        match control.start().await {
            Ok(addr) => info!(%addr, "print service listening"),
            Err(e) => error!(error = %e, "print service failed to start"),
        }
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_ctrl_c(shutdown.clone()));

    if cli.silent {
        log_events(session, shutdown.clone()).await;
    } else {
        console::run(control.clone(), session, shutdown.clone()).await;
    }

    let status = services.server().stop().await;
    info!(state = ?status.state, "print service stopped");
    services.service().drain().await;

    drop(control);
    if let Err(e) = control_task.await {
        error!(error = %e, "control task panicked");
        return ExitCode::FAILURE;
    }

    info!("Druckbote exiting");
    ExitCode::SUCCESS
}

async fn watch_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received");
            shutdown.cancel();
        }
        Err(e) => error!(error = %e, "cannot listen for Ctrl-C"),
    }
}

/// Keep the session alive and drain its events into the log until shutdown.
async fn log_events(mut session: Session, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(event) = session.next_event() => info!(?event, "session event"),
        }
    }
}
