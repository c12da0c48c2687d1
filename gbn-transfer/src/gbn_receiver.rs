//! Go-Back-N receive-side state.
//!
//! [`GbnReceiver`] implements the Sink side of Go-Back-N:
//!
//! - Only the **in-order** segment (seq == `expected`) is accepted.
//! - Out-of-order and duplicate segments are **discarded**, never buffered.
//! - After every data segment (accepted or not) the caller sends a
//!   **cumulative ACK** carrying [`ack_number`](GbnReceiver::ack_number),
//!   the last sequence number accepted in order.  For a discarded segment
//!   this repeats the previous ACK, which re-prompts the Source.
//!
//! This module only manages state; writing payloads and sending ACKs is the
//! caller's responsibility.

/// Go-Back-N receive-side state for one session.
#[derive(Debug)]
pub struct GbnReceiver {
    /// Next expected sequence number.
    expected: u32,
    /// Segments accepted so far.
    accepted: u64,
    /// Payload bytes accepted so far.
    bytes: u64,
}

impl GbnReceiver {
    /// `expected` is the first sequence number the peer will use for data.
    pub fn new(expected: u32) -> Self {
        Self {
            expected,
            accepted: 0,
            bytes: 0,
        }
    }

    /// Offer an inbound data segment.
    ///
    /// Returns `true` if it was the expected one; the caller must then append
    /// `payload` to the output.  Anything else is discarded.
    pub fn on_segment(&mut self, seq: u32, payload: &[u8]) -> bool {
        if seq != self.expected {
            return false;
        }
        self.expected = self.expected.wrapping_add(1);
        self.accepted += 1;
        self.bytes += payload.len() as u64;
        true
    }

    /// Consume a FIN if it sits exactly at the expected position.
    ///
    /// A FIN ahead of a gap means data is still missing; it is ignored so the
    /// Source keeps retransmitting.
    pub fn on_fin(&mut self, fin_seq: u32) -> bool {
        if fin_seq == self.expected {
            self.expected = self.expected.wrapping_add(1);
            true
        } else {
            false
        }
    }

    /// Cumulative ACK value: the last sequence number accepted in order.
    pub fn ack_number(&self) -> u32 {
        self.expected.wrapping_sub(1)
    }

    /// Next sequence number this side expects (`localAck`).
    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn segments_accepted(&self) -> u64 {
        self.accepted
    }

    pub fn bytes_accepted(&self) -> u64 {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_ack_names_slot_before_expected() {
        let r = GbnReceiver::new(42);
        assert_eq!(r.expected(), 42);
        assert_eq!(r.ack_number(), 41);
    }

    #[test]
    fn in_order_segment_accepted() {
        let mut r = GbnReceiver::new(100);
        assert!(r.on_segment(100, b"hello"));
        assert_eq!(r.expected(), 101);
        assert_eq!(r.ack_number(), 100);
        assert_eq!(r.bytes_accepted(), 5);
    }

    #[test]
    fn out_of_order_segment_discarded() {
        let mut r = GbnReceiver::new(100);
        assert!(!r.on_segment(102, b"future"));
        assert_eq!(r.expected(), 100);
        assert_eq!(r.ack_number(), 99);
        assert_eq!(r.segments_accepted(), 0);
    }

    #[test]
    fn duplicate_segment_discarded() {
        let mut r = GbnReceiver::new(0);
        assert!(r.on_segment(0, b"a"));
        assert!(!r.on_segment(0, b"a"));
        assert_eq!(r.segments_accepted(), 1);
        assert_eq!(r.ack_number(), 0);
    }

    #[test]
    fn gap_then_fill() {
        let mut r = GbnReceiver::new(0);
        assert!(r.on_segment(0, b"x"));
        assert!(!r.on_segment(2, b"z"));
        assert!(r.on_segment(1, b"y"));
        assert!(r.on_segment(2, b"z"));
        assert_eq!(r.ack_number(), 2);
    }

    #[test]
    fn fin_only_at_expected() {
        let mut r = GbnReceiver::new(50);
        assert!(!r.on_fin(51));
        assert_eq!(r.expected(), 50);
        assert!(r.on_fin(50));
        assert_eq!(r.expected(), 51);
    }

    #[test]
    fn seq_wrap_around() {
        let mut r = GbnReceiver::new(u32::MAX);
        assert!(r.on_segment(u32::MAX, b"a"));
        assert_eq!(r.expected(), 0);
        assert_eq!(r.ack_number(), u32::MAX);
        assert!(r.on_segment(0, b"b"));
        assert_eq!(r.ack_number(), 0);
    }
}
