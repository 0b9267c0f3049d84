// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rendering surfaces — off-screen contexts that turn arbitrary web content
// into a fixed-layout PDF.
//
// The rendering engine itself is an external collaborator.  The system
// implementation drives a headless Chromium through `--print-to-pdf`; each
// surface owns a private profile/output directory that is removed on close.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use druckbote_core::error::{DruckboteError, Result};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Browser executables tried, in order, when no renderer path is configured.
const CHROMIUM_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
];

/// Opens rendering surfaces.
#[async_trait]
pub trait RenderSurfaceProvider: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RenderSurface>>;
}

/// One off-screen rendering context.
#[async_trait]
pub trait RenderSurface: Send {
    /// Load the document at `url`.
    async fn load(&mut self, url: &str) -> Result<()>;

    /// Convert the loaded document to PDF.
    async fn print_to_pdf(&mut self) -> Result<Vec<u8>>;

    /// Tear the surface down.  Must not fail.
    async fn close(self: Box<Self>);
}

/// Load `url` on a fresh surface and convert it to PDF.
///
/// The surface is closed whether or not loading and conversion succeed.
pub async fn render_to_pdf(provider: &dyn RenderSurfaceProvider, url: &str) -> Result<Vec<u8>> {
    let mut surface = provider.open().await?;

    let result = match surface.load(url).await {
        Ok(()) => surface.print_to_pdf().await,
        Err(e) => Err(e),
    };

    surface.close().await;
    result
}

// ---------------------------------------------------------------------------
// Headless Chromium
// ---------------------------------------------------------------------------

/// Surface provider backed by a headless Chromium-family browser.
#[derive(Debug, Clone)]
pub struct HeadlessChromium {
    binary: PathBuf,
}

impl HeadlessChromium {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Use the configured binary, or the first known browser found on `PATH`.
    pub fn detect(configured: Option<&Path>) -> Option<Self> {
        if let Some(path) = configured {
            return Some(Self::new(path));
        }
        CHROMIUM_CANDIDATES
            .iter()
            .find_map(|name| find_on_path(name))
            .map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl RenderSurfaceProvider for HeadlessChromium {
    async fn open(&self) -> Result<Box<dyn RenderSurface>> {
        let workdir = tempfile::Builder::new()
            .prefix("druckbote-render-")
            .tempdir()
            .map_err(|e| DruckboteError::Conversion(format!("create render workspace: {e}")))?;

        debug!(dir = %workdir.path().display(), "render surface opened");
        Ok(Box::new(ChromiumSurface {
            binary: self.binary.clone(),
            workdir,
            url: None,
        }))
    }
}

struct ChromiumSurface {
    binary: PathBuf,
    workdir: TempDir,
    url: Option<String>,
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn load(&mut self, url: &str) -> Result<()> {
        // Chromium loads and prints in one invocation; the URL is only
        // validated and remembered here.
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| DruckboteError::Conversion(format!("cannot load '{url}': {e}")))?;
        self.url = Some(parsed.to_string());
        Ok(())
    }

    #[instrument(skip(self), fields(binary = %self.binary.display()))]
    async fn print_to_pdf(&mut self) -> Result<Vec<u8>> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| DruckboteError::Conversion("no document loaded".into()))?;

        let output_path = self.workdir.path().join("output.pdf");
        let profile_dir = self.workdir.path().join("profile");

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg("--no-pdf-header-footer")
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .arg(format!("--print-to-pdf={}", output_path.display()))
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                DruckboteError::Conversion(format!("launch {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            return Err(DruckboteError::Conversion(format!(
                "renderer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pdf = tokio::fs::read(&output_path)
            .await
            .map_err(|e| DruckboteError::Conversion(format!("renderer produced no output: {e}")))?;
        if pdf.is_empty() {
            return Err(DruckboteError::Conversion("renderer produced an empty document".into()));
        }

        info!(url, bytes = pdf.len(), "document rendered to PDF");
        Ok(pdf)
    }

    async fn close(self: Box<Self>) {
        let this = *self;
        let path = this.workdir.path().display().to_string();
        let workdir = this.workdir;
        match tokio::task::spawn_blocking(move || workdir.close()).await {
            Ok(Ok(())) => debug!(dir = %path, "render surface closed"),
            Ok(Err(e)) => warn!(dir = %path, error = %e, "failed to remove render workspace"),
            Err(e) => warn!(dir = %path, error = %e, "render teardown task failed"),
        }
    }
}

/// Search `PATH` for an executable called `name`.
fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}
