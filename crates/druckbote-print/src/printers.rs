// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host printer enumeration.
//
// POSIX hosts are asked through `lpstat -p`; Windows hosts through the
// PowerShell `Get-Printer` cmdlet with JSON output.  Both outputs are parsed
// into a name -> status map.

use std::sync::Arc;

use async_trait::async_trait;
use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{Dialect, Platform, PrinterList};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::process::{CommandRunner, ProcessCommand};

/// `lpstat` exits non-zero with this message when no queue is configured.
const LPSTAT_NO_DESTINATIONS: &str = "No destinations added";

const GET_PRINTER_SCRIPT: &str = "Get-Printer | Select-Object Name,@{Name='Status';Expression={$_.PrinterStatus.ToString()}} | ConvertTo-Json -Compress";

/// Source of the host's printer list.
#[async_trait]
pub trait PrinterProvider: Send + Sync {
    async fn list(&self) -> Result<PrinterList>;
}

/// Asks the host print subsystem.
#[derive(Clone)]
pub struct SystemPrinters {
    platform: Platform,
    runner: Arc<dyn CommandRunner>,
}

impl SystemPrinters {
    pub fn new(platform: Platform, runner: Arc<dyn CommandRunner>) -> Self {
        Self { platform, runner }
    }

    fn command(dialect: Dialect) -> ProcessCommand {
        match dialect {
            Dialect::Posix => ProcessCommand::new("lpstat").arg("-p"),
            Dialect::Windows => ProcessCommand::new("powershell.exe").args([
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                GET_PRINTER_SCRIPT,
            ]),
        }
    }
}

#[async_trait]
impl PrinterProvider for SystemPrinters {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<PrinterList> {
        let dialect = self.platform.dialect()?;
        let command = Self::command(dialect);

        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| DruckboteError::PrinterList(format!("launch {}: {e}", command.program.display())))?;

        if !output.success {
            let stderr = output.stderr_text();
            if dialect == Dialect::Posix && stderr.contains(LPSTAT_NO_DESTINATIONS) {
                return Ok(PrinterList::new());
            }
            return Err(DruckboteError::PrinterList(format!(
                "{} exited with {:?}: {stderr}",
                command.program.display(),
                output.exit_status
            )));
        }

        let printers = match dialect {
            Dialect::Posix => parse_lpstat(&output.stdout_text()),
            Dialect::Windows => parse_get_printer(&output.stdout_text())?,
        };
        debug!(count = printers.len(), "printers enumerated");
        Ok(printers)
    }
}

/// Parse `lpstat -p` output.
///
/// ```text
/// printer Office is idle.  enabled since Mon 01 Jan 2026 09:00:00
/// printer Label now printing Label-42.  enabled since ...
/// printer Old disabled since Tue 02 Jan 2026 10:00:00 -
/// ```
pub fn parse_lpstat(output: &str) -> PrinterList {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("printer "))
        .filter_map(|rest| {
            let (name, remainder) = rest.split_once(' ').unwrap_or((rest, ""));
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), lpstat_status(remainder)))
        })
        .collect()
}

fn lpstat_status(remainder: &str) -> Option<String> {
    let remainder = remainder.trim_start();
    let remainder = remainder.strip_prefix("is ").unwrap_or(remainder);
    let remainder = remainder.strip_prefix("now ").unwrap_or(remainder);
    remainder
        .split(|c: char| c == '.' || c.is_whitespace())
        .next()
        .filter(|word| !word.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PowerShellPrinter {
    name: String,
    #[serde(default)]
    status: Option<String>,
}

/// `ConvertTo-Json` emits a bare object for one printer and an array for
/// several; empty output means none.
#[derive(Deserialize)]
#[serde(untagged)]
enum PowerShellPrinters {
    Many(Vec<PowerShellPrinter>),
    One(PowerShellPrinter),
}

/// Parse `Get-Printer | ConvertTo-Json` output.
pub fn parse_get_printer(output: &str) -> Result<PrinterList> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(PrinterList::new());
    }

    let printers: PowerShellPrinters = serde_json::from_str(output)
        .map_err(|e| DruckboteError::PrinterList(format!("unexpected Get-Printer output: {e}")))?;
    let printers = match printers {
        PowerShellPrinters::Many(list) => list,
        PowerShellPrinters::One(printer) => vec![printer],
    };

    Ok(printers
        .into_iter()
        .map(|p| (p.name, p.status.filter(|s| !s.is_empty())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::FakeRunner;

    #[test]
    fn lpstat_states_are_extracted() {
        let output = "\
printer Office is idle.  enabled since Mon 01 Jan 2026 09:00:00
printer Label now printing Label-42.  enabled since Mon 01 Jan 2026 09:00:00
printer Old disabled since Tue 02 Jan 2026 10:00:00 -
\treason unknown
";
        let printers = parse_lpstat(output);
        assert_eq!(printers.len(), 3);
        assert_eq!(printers["Office"].as_deref(), Some("idle"));
        assert_eq!(printers["Label"].as_deref(), Some("printing"));
        assert_eq!(printers["Old"].as_deref(), Some("disabled"));
    }

    #[test]
    fn lpstat_without_status_yields_none() {
        let printers = parse_lpstat("printer Bare\n");
        assert_eq!(printers["Bare"], None);
    }

    #[test]
    fn get_printer_array_and_single_object() {
        let many = r#"[{"Name":"HP LaserJet","Status":"Normal"},{"Name":"PDF","Status":null}]"#;
        let printers = parse_get_printer(many).unwrap();
        assert_eq!(printers["HP LaserJet"].as_deref(), Some("Normal"));
        assert_eq!(printers["PDF"], None);

        let one = r#"{"Name":"Zebra","Status":"Paused"}"#;
        let printers = parse_get_printer(one).unwrap();
        assert_eq!(printers.len(), 1);
        assert_eq!(printers["Zebra"].as_deref(), Some("Paused"));
    }

    #[test]
    fn get_printer_empty_output_is_empty_list() {
        assert!(parse_get_printer("  \r\n").unwrap().is_empty());
    }

    #[test]
    fn get_printer_garbage_is_error() {
        let err = parse_get_printer("Get-Printer : access denied").unwrap_err();
        assert!(matches!(err, DruckboteError::PrinterList(_)));
    }

    #[tokio::test]
    async fn system_provider_runs_lpstat() {
        let runner = Arc::new(FakeRunner::default().with_stdout("printer HP is idle.  enabled\n"));
        let provider = SystemPrinters::new(Platform::Posix, runner.clone());

        let printers = provider.list().await.unwrap();

        assert_eq!(printers["HP"].as_deref(), Some("idle"));
        let calls = runner.calls();
        assert_eq!(calls[0].command, ProcessCommand::new("lpstat").arg("-p"));
    }

    #[tokio::test]
    async fn lpstat_without_destinations_is_empty() {
        let runner = Arc::new(FakeRunner::default().failing_all(1, "lpstat: No destinations added."));
        let provider = SystemPrinters::new(Platform::Posix, runner);
        assert!(provider.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_platform_cannot_list() {
        let provider = SystemPrinters::new(Platform::Unsupported("plan9".into()), Arc::new(FakeRunner::default()));
        assert!(matches!(
            provider.list().await.unwrap_err(),
            DruckboteError::UnsupportedPlatform(_)
        ));
    }
}
