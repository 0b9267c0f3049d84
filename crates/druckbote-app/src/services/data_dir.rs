// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::PathBuf;

use tracing::warn;

/// Return the application data directory, creating it if needed.
///
/// `$XDG_DATA_HOME/druckbote`, then `~/.local/share/druckbote`, then a
/// directory under the system temp dir.
pub fn data_dir() -> PathBuf {
    let dir = dirs_fallback().join("druckbote");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(path = %dir.display(), error = %e, "cannot create data directory");
    }
    dir
}

fn dirs_fallback() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}
