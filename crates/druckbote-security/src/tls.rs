// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TLS server configuration for the encrypted print API transport.
//
// Certificate chain and private key are read from PEM files named in the
// persisted settings.  The `ring` provider is installed explicitly on the
// config so the process-wide default provider is never consulted.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use druckbote_core::error::{DruckboteError, Result};
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::{debug, instrument};

/// Build a rustls server config from PEM certificate and key files.
///
/// The config advertises `http/1.1` via ALPN, which is all the print API
/// speaks.
#[instrument(fields(cert = %cert_path.display(), key = %key_path.display()))]
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let certs = read_certificates(cert_path)?;
    let key = read_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| DruckboteError::Tls(format!("protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| DruckboteError::Tls(format!("certificate/key mismatch: {e}")))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| DruckboteError::Tls(format!("open {}: {e}", path.display())))
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| DruckboteError::Tls(format!("parse {}: {e}", path.display())))?;

    if certs.is_empty() {
        return Err(DruckboteError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }

    debug!(count = certs.len(), "loaded certificate chain");
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| DruckboteError::Tls(format!("parse {}: {e}", path.display())))?
        .ok_or_else(|| DruckboteError::Tls(format!("no private key found in {}", path.display())))
}
