//! Content hashing for payload re-delivery detection

use std::fmt;

/// BLAKE3 digest of an accepted payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash `data` with BLAKE3.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Decide whether `new_value` is new relative to the last accepted payload.
///
/// Returns `None` when the payload is a re-delivery, either byte-identical to
/// `previous_value` or hashing to `previous_digest`. Otherwise returns the
/// digest to record for the newly accepted payload.
pub fn compute_digest(
    previous_value: Option<&[u8]>,
    previous_digest: Option<&ContentDigest>,
    new_value: &[u8],
) -> Option<ContentDigest> {
    if previous_value == Some(new_value) {
        return None;
    }

    let digest = ContentDigest::of(new_value);
    if previous_digest == Some(&digest) {
        return None;
    }

    Some(digest)
}
