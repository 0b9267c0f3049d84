// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document fingerprints — SHA-256 hashing for log correlation.

use sha2::{Digest, Sha256};

/// Hex digits kept by [`fingerprint`].
const FINGERPRINT_LEN: usize = 16;

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Short SHA-256 prefix identifying a document in log lines.
///
/// Lets an operator match a dispatched artifact against the bytes a client
/// sent without logging the document itself.
pub fn fingerprint(data: &[u8]) -> String {
    let mut full = hash_bytes(data);
    full.truncate(FINGERPRINT_LEN);
    full
}
