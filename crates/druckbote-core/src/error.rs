// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Druckbote.

use thiserror::Error;

/// Top-level error type for all Druckbote operations.
///
/// Every variant is local to one job or one lifecycle call; callers convert
/// it into a structured result at that boundary instead of propagating it
/// further.
#[derive(Debug, Error)]
pub enum DruckboteError {
    // -- Content resolution --
    #[error("fetching {url} failed: {message}")]
    Fetch {
        url: String,
        /// Upstream HTTP status, when a response was received.
        status: Option<u16>,
        /// Leading part of the upstream body, for diagnostics.
        body: Option<String>,
        message: String,
    },

    #[error("conversion to a print-ready document failed: {0}")]
    Conversion(String),

    // -- Artifacts --
    #[error("writing print artifact failed: {0}")]
    Write(#[source] std::io::Error),

    // -- Dispatch --
    #[error("print utility failed (exit status {}): {stderr}", display_status(.exit_status))]
    Dispatch {
        exit_status: Option<i32>,
        stderr: String,
    },

    #[error("printing is not supported on platform '{0}'")]
    UnsupportedPlatform(String),

    #[error("invalid print settings: {0}")]
    InvalidSettings(String),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    // -- Test page --
    #[error("unknown paper profile '{0}'")]
    UnknownPaperProfile(String),

    #[error("loading calibration font failed: {0}")]
    FontLoad(String),

    #[error("rendering test page failed: {0}")]
    Render(String),

    // -- Host enumeration --
    #[error("no active printer context registered")]
    NoActivePrinterContext,

    #[error("listing printers failed: {0}")]
    PrinterList(String),

    #[error("listing network interfaces failed: {0}")]
    NetworkInterfaces(String),

    // -- Server lifecycle --
    #[error("binding {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("print server error: {0}")]
    Server(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DruckboteError {
    /// Build a `Fetch` error for a transport-level failure (no response).
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            status: None,
            body: None,
            message: message.into(),
        }
    }
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "none".to_string(), |code| code.to_string())
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DruckboteError>;
