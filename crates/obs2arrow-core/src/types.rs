//! Shared payload types used by the core and the processor crate

use bytes::Bytes;

/// An accepted payload, tagged with its arrival index.
///
/// Indices increase monotonically per processor and are used to name the
/// payload in errors and logs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPayload {
    pub index: u64,
    pub data: Bytes,
}

impl RawPayload {
    pub fn new(index: u64, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            data: data.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
