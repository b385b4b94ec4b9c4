//! Request fingerprints.
//!
//! A job records the SHA-256 of the request it was created from so two jobs
//! for the same inputs can be recognised in logs and listings.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Fingerprint a process execution request.
///
/// `serde_json::Map` keeps keys sorted, so the serialized form (and the
/// digest) does not depend on the key order the client sent.
pub fn request_fingerprint(process_id: &str, inputs: &serde_json::Value) -> String {
    let mut canonical = Vec::with_capacity(process_id.len() + 1);
    canonical.extend_from_slice(process_id.as_bytes());
    canonical.push(0);
    canonical.extend_from_slice(inputs.to_string().as_bytes());
    sha256_hex(&canonical)
}
