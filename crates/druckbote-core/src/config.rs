// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ServerConfig, Transport};

/// Default port for the print API.
pub const DEFAULT_PORT: u16 = 3630;

/// Certificate and key locations for the encrypted transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsPaths {
    /// PEM certificate chain.
    pub cert_path: PathBuf,
    /// PEM private key (PKCS#8, PKCS#1 or SEC1).
    pub key_path: PathBuf,
}

/// Persistent application settings.  Read once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Whether the print API starts automatically on launch.
    pub auto_start_server: bool,
    /// Interface the print API binds to.
    pub server_hostname: String,
    /// Port for the print API.
    pub server_port: u16,
    /// Serve over TLS with this material when set.
    pub tls: Option<TlsPaths>,
    /// Where temporary print artifacts are written (system temp dir if unset).
    pub artifact_dir: Option<PathBuf>,
    /// Headless browser used to render non-PDF documents (searched on PATH if unset).
    pub renderer_path: Option<PathBuf>,
    /// Override for the bundled resource directory (fonts, print utility).
    pub resource_dir: Option<PathBuf>,
    /// Directory network clients may print local files from.  Unset means
    /// network jobs must use `http`/`https` URLs.
    pub network_document_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auto_start_server: true,
            server_hostname: "127.0.0.1".into(),
            server_port: DEFAULT_PORT,
            tls: None,
            artifact_dir: None,
            renderer_path: None,
            resource_dir: None,
            network_document_dir: None,
        }
    }
}

impl AppConfig {
    /// Listener configuration derived from the persisted settings.
    pub fn server_config(&self) -> ServerConfig {
        let transport = match &self.tls {
            Some(tls) => Transport::Encrypted {
                cert_path: tls.cert_path.clone(),
                key_path: tls.key_path.clone(),
            },
            None => Transport::Plaintext,
        };
        ServerConfig {
            hostname: self.server_hostname.clone(),
            port: self.server_port,
            transport,
        }
    }
}
