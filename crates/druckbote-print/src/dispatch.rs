// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print dispatch -- run the host print utility against an artifact.
//
//   POSIX:   lp -d <printer> <codec tokens...> <artifact>
//   Windows: SumatraPDF.exe -print-to <printer> [-print-settings ...] -silent <artifact>
//
// A dispatch either succeeds completely (exit status 0) or fails with the
// utility's exit status and stderr.  There is no partial success.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{Dialect, Platform, PrintSettings};
use druckbote_document::{Artifact, ResourceLocator};
use tracing::{info, instrument, warn};

use crate::codec;
use crate::process::{CommandRunner, ProcessCommand};

/// Build the print utility invocation for one artifact.
pub fn print_command(
    dialect: Dialect,
    utility: PathBuf,
    printer: &str,
    settings: &PrintSettings,
    artifact_path: &str,
) -> ProcessCommand {
    let settings_args = codec::encode(settings, dialect);
    match dialect {
        Dialect::Posix => ProcessCommand::new(utility)
            .arg("-d")
            .arg(printer)
            .args(settings_args)
            .arg(artifact_path),
        Dialect::Windows => ProcessCommand::new(utility)
            .arg("-print-to")
            .arg(printer)
            .args(settings_args)
            .arg("-silent")
            .arg(artifact_path),
    }
}

/// Hands artifacts to the platform print utility.
#[derive(Clone)]
pub struct PrintDispatcher {
    platform: Platform,
    resources: ResourceLocator,
    runner: Arc<dyn CommandRunner>,
}

impl PrintDispatcher {
    pub fn new(platform: Platform, resources: ResourceLocator, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            platform,
            resources,
            runner,
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Dialect of this host, or `UnsupportedPlatform`.
    pub fn dialect(&self) -> Result<Dialect> {
        self.platform.dialect()
    }

    /// Print `artifact` on `printer`.  Returns the utility's stdout.
    #[instrument(skip(self, artifact, settings), fields(artifact = %artifact.path().display()))]
    pub async fn dispatch(
        &self,
        artifact: &Artifact,
        printer: &str,
        settings: &PrintSettings,
    ) -> Result<String> {
        let dialect = self.dialect()?;
        let path = artifact_path(artifact.path())?;
        let command = print_command(
            dialect,
            self.resources.print_utility(dialect),
            printer,
            settings,
            path,
        );
        let line = command.command_line(dialect)?;
        info!(command = %line, bytes = artifact.len(), "dispatching to print utility");

        let output = self.runner.run(&command).await.map_err(|e| DruckboteError::Dispatch {
            exit_status: None,
            stderr: format!("failed to launch {}: {e}", command.program.display()),
        })?;

        if !output.success {
            let stderr = output.stderr_text();
            warn!(exit_status = ?output.exit_status, stderr = %stderr, "print utility failed");
            return Err(DruckboteError::Dispatch {
                exit_status: output.exit_status,
                stderr,
            });
        }

        let stdout = output.stdout_text();
        info!(output = %stdout.trim(), "print utility accepted job");
        Ok(stdout)
    }
}

fn artifact_path(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| DruckboteError::Dispatch {
        exit_status: None,
        stderr: format!("artifact path is not valid UTF-8: {}", path.display()),
    })
}
