// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Interactive console. Reads commands from stdin, forwards them over the
// control channel and prints replies.  Unsolicited session events (server
// state changes, finished jobs) are printed as they arrive.

use druckbote_core::{JobRequest, ServerState, ServerStatus, TestPageRequest};
use druckbote_print::{Session, SessionEvent};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::control::ControlHandle;

const HELP: &str = "\
commands:
  printers                              list host printers
  interfaces                            list network interfaces
  print <printer> <url> [settings]      print one document; settings is a JSON object
  test-page <printer> <profile>         print a calibration page
  start | stop | status                 control the network listener
  help                                  show this text
  quit                                  exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Printers,
    Interfaces,
    Print(JobRequest),
    TestPage(TestPageRequest),
    Start,
    Stop,
    Status,
    Help,
    Quit,
}

/// Parse one console line.  Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb {
        "" => return Ok(None),
        "printers" => ConsoleCommand::Printers,
        "interfaces" => ConsoleCommand::Interfaces,
        "start" => ConsoleCommand::Start,
        "stop" => ConsoleCommand::Stop,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "print" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let printer = parts.next().filter(|p| !p.is_empty());
            let url = parts.next().map(str::trim).filter(|u| !u.is_empty());
            let (Some(printer), Some(url)) = (printer, url) else {
                return Err("usage: print <printer> <url> [settings]".into());
            };
            let settings = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
                Some(json) => serde_json::from_str(json).map_err(|e| format!("settings: {e}"))?,
                None => serde_json::Value::Null,
            };
            ConsoleCommand::Print(JobRequest {
                printer: printer.to_string(),
                url: url.to_string(),
                settings,
            })
        }
        "test-page" => {
            let words: Vec<&str> = rest.split_whitespace().collect();
            let [printer, profile] = words[..] else {
                return Err("usage: test-page <printer> <profile>".into());
            };
            ConsoleCommand::TestPage(TestPageRequest {
                printer: printer.to_string(),
                profile: profile.to_string(),
                settings: serde_json::Value::Null,
            })
        }
        other => return Err(format!("unknown command {other:?}; try help")),
    };
    Ok(Some(command))
}

fn show<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => warn!(error = %e, "cannot format reply"),
    }
}

fn describe_status(status: &ServerStatus) -> String {
    match (status.state, status.address) {
        (ServerState::Running, Some(addr)) => {
            let scheme = if status.encrypted { "https" } else { "http" };
            format!(
                "running on {scheme}://{addr} ({} connection(s))",
                status.active_connections
            )
        }
        (ServerState::Running, None) => "running".into(),
        (ServerState::Stopped, _) => "stopped".into(),
    }
}

fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::ServerStateChanged(status) => format!("server {}", describe_status(status)),
        SessionEvent::JobFinished { printer, outcome } => match &outcome.error {
            None => format!("job on {printer} finished"),
            Some(error) => format!("job on {printer} failed: {error}"),
        },
    }
}

/// Execute one command.  Returns `false` when the console should exit.
async fn execute(control: &ControlHandle, command: ConsoleCommand) -> bool {
    let result = match command {
        ConsoleCommand::Printers => control.printers().await.map(|p| show(&p)),
        ConsoleCommand::Interfaces => control.interfaces().await.map(|i| show(&i)),
        ConsoleCommand::Print(job) => control.print(job).await.map(|o| show(&o)),
        ConsoleCommand::TestPage(request) => control.test_page(request).await.map(|o| show(&o)),
        ConsoleCommand::Start => control.start().await.map(|addr| println!("listening on {addr}")),
        ConsoleCommand::Stop => control
            .stop()
            .await
            .map(|s| println!("{}", describe_status(&s))),
        ConsoleCommand::Status => control
            .state()
            .await
            .map(|s| println!("{}", describe_status(&s))),
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Quit => return false,
    };
    if let Err(e) = result {
        println!("error: {e}");
    }
    true
}

/// Run the console until `quit`, end of input, or `shutdown` fires.
pub async fn run(control: ControlHandle, mut session: Session, shutdown: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("druckbote console; type help for commands");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(event) = session.next_event() => println!("{}", describe_event(&event)),
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse_command(&line) {
                    Ok(Some(command)) => {
                        if !execute(&control, command).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                }
            }
        }
    }
    debug!("console closed");
}
