use bytes::Bytes;
use obs2arrow_core::{compute_digest, ContentDigest, RawPayload};

/// Observable state of a [`PendingBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Empty,
    Accepting,
}

/// Payloads accepted since the last materialization.
///
/// Re-delivery is checked against the most recently accepted payload only.
/// Draining forgets that payload's bytes but keeps its digest, so an identical
/// payload arriving right after a drain is still recognised.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    payloads: Vec<RawPayload>,
    last_accepted: Option<Bytes>,
    last_digest: Option<ContentDigest>,
    next_index: u64,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` unless it repeats the previous accepted payload.
    ///
    /// Returns the arrival index assigned to the payload when accepted.
    pub fn accept(&mut self, data: Bytes) -> Option<u64> {
        let digest = compute_digest(
            self.last_accepted.as_deref(),
            self.last_digest.as_ref(),
            &data,
        )?;

        let index = self.next_index;
        self.next_index += 1;
        self.last_accepted = Some(data.clone());
        self.last_digest = Some(digest);
        self.payloads.push(RawPayload::new(index, data));
        Some(index)
    }

    /// Take every pending payload, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<RawPayload> {
        self.last_accepted = None;
        std::mem::take(&mut self.payloads)
    }

    pub fn state(&self) -> BufferState {
        if self.payloads.is_empty() {
            BufferState::Empty
        } else {
            BufferState::Accepting
        }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn last_digest(&self) -> Option<&ContentDigest> {
        self.last_digest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_assigns_increasing_indices() {
        let mut buffer = PendingBuffer::new();
        assert_eq!(buffer.state(), BufferState::Empty);
        assert_eq!(buffer.accept(Bytes::from_static(b"a")), Some(0));
        assert_eq!(buffer.accept(Bytes::from_static(b"b")), Some(1));
        assert_eq!(buffer.state(), BufferState::Accepting);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_consecutive_duplicate_is_ignored() {
        let mut buffer = PendingBuffer::new();
        buffer.accept(Bytes::from_static(b"a"));
        assert_eq!(buffer.accept(Bytes::from_static(b"a")), None);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_dedup_is_single_step() {
        let mut buffer = PendingBuffer::new();
        buffer.accept(Bytes::from_static(b"a"));
        buffer.accept(Bytes::from_static(b"b"));
        // "a" is no longer the previous payload
        assert_eq!(buffer.accept(Bytes::from_static(b"a")), Some(2));
    }

    #[test]
    fn test_drain_keeps_digest() {
        let mut buffer = PendingBuffer::new();
        buffer.accept(Bytes::from_static(b"a"));
        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].index, 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last_digest(), Some(&ContentDigest::of(b"a")));

        assert_eq!(buffer.accept(Bytes::from_static(b"a")), None);
        assert_eq!(buffer.accept(Bytes::from_static(b"c")), Some(1));
    }
}
