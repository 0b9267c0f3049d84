// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bundled resource resolution (calibration font, Windows print utility).
//
// Two layouts exist: a development checkout, where resources live in the
// workspace `resources/` directory, and a packaged install, where they sit in
// a `resources/` directory next to the executable.

use std::path::{Path, PathBuf};

use druckbote_core::Dialect;
use druckbote_core::error::{DruckboteError, Result};
use tracing::debug;

/// Environment variable overriding the resource directory.
pub const RESOURCE_DIR_ENV: &str = "DRUCKBOTE_RESOURCES";

/// File name of the calibration font inside `fonts/`.
pub const CALIBRATION_FONT: &str = "DejaVuSans.ttf";

/// File name of the Windows print utility inside `bin/`.
pub const WINDOWS_PRINT_UTILITY: &str = "SumatraPDF.exe";

/// POSIX print utility, resolved through `PATH`.
pub const POSIX_PRINT_UTILITY: &str = "lp";

/// Which layout the resource directory was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceLayout {
    Development,
    Packaged,
    Explicit,
}

/// Resolves paths of bundled resources.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    root: PathBuf,
    layout: ResourceLayout,
}

impl ResourceLocator {
    /// Use `root` as the resource directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            layout: ResourceLayout::Explicit,
        }
    }

    /// Locate the resource directory.
    ///
    /// Order: explicit override, `DRUCKBOTE_RESOURCES`, `resources/` next to
    /// the executable (packaged), then the workspace `resources/` directory
    /// (development).
    pub fn detect(override_dir: Option<&Path>) -> Self {
        if let Some(dir) = override_dir {
            return Self::new(dir);
        }
        if let Some(dir) = std::env::var_os(RESOURCE_DIR_ENV) {
            return Self::new(PathBuf::from(dir));
        }

        let packaged = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("resources")))
            .filter(|dir| dir.is_dir());

        let locator = match packaged {
            Some(root) => Self {
                root,
                layout: ResourceLayout::Packaged,
            },
            None => Self {
                root: Path::new(env!("CARGO_MANIFEST_DIR")).join("../../resources"),
                layout: ResourceLayout::Development,
            },
        };
        debug!(root = %locator.root.display(), layout = ?locator.layout, "resource directory");
        locator
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> ResourceLayout {
        self.layout
    }

    /// Path of the calibration font.
    pub fn font_path(&self) -> PathBuf {
        self.root.join("fonts").join(CALIBRATION_FONT)
    }

    /// Program to invoke for the given print dialect.
    pub fn print_utility(&self, dialect: Dialect) -> PathBuf {
        match dialect {
            Dialect::Posix => PathBuf::from(POSIX_PRINT_UTILITY),
            Dialect::Windows => self.root.join("bin").join(WINDOWS_PRINT_UTILITY),
        }
    }

    /// Read the calibration font.  Missing or empty files are `FontLoad` errors.
    pub async fn load_font(&self) -> Result<Vec<u8>> {
        let path = self.font_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| DruckboteError::FontLoad(format!("{}: {e}", path.display())))?;
        if bytes.is_empty() {
            return Err(DruckboteError::FontLoad(format!("{} is empty", path.display())));
        }
        Ok(bytes)
    }
}
