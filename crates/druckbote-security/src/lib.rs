// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// druckbote-security — TLS server configuration for the encrypted print API
// transport, and SHA-256 fingerprints used to correlate dispatched documents
// in the logs.

pub mod integrity;
pub mod tls;

pub use integrity::{fingerprint, hash_bytes};
pub use tls::load_server_config;
