//! Go-Back-N send-side window state.
//!
//! [`GbnSender`] maintains a sliding window of up to `N` in-flight segments.
//!
//! # Protocol contract
//!
//! - Every data segment occupies exactly one sequence number.
//! - At most `window_size` segments may be in flight at once:
//!   `send_base ≤ next_seq ≤ send_base + window_size` (mod 2^32).
//! - ACKs are **cumulative** and inclusive: `ack_num = K` means the receiver
//!   has accepted every segment up to and including `K`, so `send_base`
//!   moves to `K + 1`.
//! - On timeout, the caller retransmits **all** unacked segments from
//!   `send_base` onwards (go back N).
//! - Every comparison goes through [`crate::seq_space`].
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use std::collections::VecDeque;

use crate::seq_space;

/// A single in-flight segment occupying one slot in the window.
#[derive(Debug, Clone)]
pub struct InFlight {
    /// Sequence number the segment was sent with.
    pub seq: u32,
    /// The exact encoded bytes last put on the wire.
    pub bytes: Vec<u8>,
}

/// Go-Back-N send-side state for one session.
///
/// # Sequence-number layout
///
/// ```text
///  send_base          next_seq      send_base + N
///      │                  │               │
///  ────┼──────────────────┼───────────────┼──────▶ seq space
///      │ <── in flight ──▶│ <── usable ──▶│
/// ```
#[derive(Debug)]
pub struct GbnSender {
    /// Sequence number of the **oldest** unacked segment (left window edge).
    send_base: u32,

    /// Sequence number to use for the **next** new segment.
    next_seq: u32,

    /// Maximum number of segments that may be in flight simultaneously (N).
    window_size: u32,

    /// In-flight segments in ascending sequence order (front = oldest).
    /// Holds exactly the sequence numbers `[send_base, next_seq)`.
    window: VecDeque<InFlight>,
}

impl GbnSender {
    /// Create a new [`GbnSender`] whose first segment will carry `seq_start`.
    pub fn new(seq_start: u32, window_size: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        Self {
            send_base: seq_start,
            next_seq: seq_start,
            window_size,
            window: VecDeque::with_capacity(window_size as usize),
        }
    }

    pub fn send_base(&self) -> u32 {
        self.send_base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// `true` while `next_seq` is still inside `[send_base, send_base + N)`.
    pub fn can_send(&self) -> bool {
        seq_space::less_than(
            self.next_seq,
            seq_space::add(self.send_base, self.window_size),
        )
    }

    /// Number of segments currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.window.len()
    }

    pub fn has_unacked(&self) -> bool {
        !self.window.is_empty()
    }

    /// Place a just-transmitted segment into the window and advance
    /// `next_seq`.  `bytes` must have been encoded with `seq == next_seq()`.
    ///
    /// Returns `true` when this is the only outstanding segment, i.e. the
    /// caller must start the retransmission timer.
    pub fn record_sent(&mut self, bytes: Vec<u8>) -> bool {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full window ({} / {})",
            self.window.len(),
            self.window_size
        );
        let first = self.window.is_empty();
        self.window.push_back(InFlight {
            seq: self.next_seq,
            bytes,
        });
        self.next_seq = seq_space::add(self.next_seq, 1);
        first
    }

    /// Process a cumulative ACK.
    ///
    /// Advances `send_base` to `ack_num + 1`, discards every entry below it,
    /// and returns the number of newly acknowledged segments.  Returns `0`
    /// for a duplicate or stale ACK and for one that acknowledges data never
    /// sent; `send_base` never moves backwards.
    pub fn on_ack(&mut self, ack_num: u32) -> usize {
        // The window holds exactly [send_base, next_seq), so only an ACK
        // naming one of its entries is progress.
        if !seq_space::in_window(ack_num, self.send_base, self.window.len() as u32) {
            return 0;
        }

        let acked = seq_space::distance(self.send_base, ack_num) as usize + 1;
        self.window.drain(..acked);
        self.send_base = seq_space::add(ack_num, 1);
        acked
    }

    /// All in-flight segments from oldest to newest: the "go back N" set.
    pub fn window_entries(&self) -> impl Iterator<Item = &InFlight> {
        self.window.iter()
    }

    /// `send_base ≤ next_seq ≤ send_base + N` and the window holds exactly
    /// `[send_base, next_seq)`.
    pub fn invariant_holds(&self) -> bool {
        let span = seq_space::distance(self.send_base, self.next_seq);
        span <= self.window_size
            && span as usize == self.window.len()
            && self
                .window
                .iter()
                .enumerate()
                .all(|(i, e)| e.seq == seq_space::add(self.send_base, i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(s: &mut GbnSender, n: usize) {
        for _ in 0..n {
            let seq = s.next_seq();
            s.record_sent(seq.to_be_bytes().to_vec());
        }
    }

    #[test]
    fn initial_state() {
        let s = GbnSender::new(100, 4);
        assert_eq!(s.send_base(), 100);
        assert_eq!(s.next_seq(), 100);
        assert!(s.can_send());
        assert!(!s.has_unacked());
        assert!(s.invariant_holds());
    }

    #[test]
    fn first_record_asks_for_timer() {
        let mut s = GbnSender::new(0, 4);
        assert!(s.record_sent(vec![1]));
        assert!(!s.record_sent(vec![2]));
        assert_eq!(s.next_seq(), 2);
        assert_eq!(s.send_base(), 0);
    }

    #[test]
    fn window_full_blocks_send() {
        let mut s = GbnSender::new(0, 3);
        fill(&mut s, 3);
        assert!(!s.can_send());
        assert_eq!(s.in_flight(), 3);
        assert!(s.invariant_holds());
    }

    #[test]
    fn ack_is_inclusive() {
        let mut s = GbnSender::new(10, 4);
        fill(&mut s, 2);
        assert_eq!(s.on_ack(10), 1);
        assert_eq!(s.send_base(), 11);
        assert_eq!(s.in_flight(), 1);
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let mut s = GbnSender::new(0, 8);
        fill(&mut s, 5);
        assert_eq!(s.on_ack(3), 4);
        assert_eq!(s.send_base(), 4);
        assert_eq!(s.in_flight(), 1);
        assert!(s.can_send());
        assert!(s.invariant_holds());
    }

    #[test]
    fn duplicate_and_stale_acks_ignored() {
        let mut s = GbnSender::new(0, 8);
        fill(&mut s, 4);
        assert_eq!(s.on_ack(1), 2);
        assert_eq!(s.on_ack(1), 0);
        assert_eq!(s.on_ack(0), 0);
        assert_eq!(s.send_base(), 2, "send_base never moves backwards");
    }

    #[test]
    fn ack_before_first_segment_is_not_progress() {
        // The Sink's re-prompt before it has accepted anything names the slot
        // just below send_base.
        let mut s = GbnSender::new(50, 4);
        fill(&mut s, 2);
        assert_eq!(s.on_ack(49), 0);
        assert_eq!(s.send_base(), 50);
    }

    #[test]
    fn ack_beyond_next_seq_ignored() {
        let mut s = GbnSender::new(0, 4);
        fill(&mut s, 2);
        assert_eq!(s.on_ack(2), 0);
        assert_eq!(s.on_ack(1000), 0);
        assert_eq!(s.send_base(), 0);
    }

    #[test]
    fn window_keeps_encoded_bytes() {
        let mut s = GbnSender::new(7, 4);
        fill(&mut s, 3);
        s.on_ack(7);
        let kept: Vec<&[u8]> = s.window_entries().map(|e| e.bytes.as_slice()).collect();
        assert_eq!(kept, vec![&8u32.to_be_bytes()[..], &9u32.to_be_bytes()[..]]);
    }

    #[test]
    fn retransmit_set_is_ascending_window() {
        let mut s = GbnSender::new(0, 16);
        fill(&mut s, 16);
        s.on_ack(6);
        let seqs: Vec<u32> = s.window_entries().map(|e| e.seq).collect();
        assert_eq!(seqs, (7..16).collect::<Vec<_>>());
    }

    #[test]
    fn seq_wrap_around() {
        let start = u32::MAX - 5;
        let mut s = GbnSender::new(start, 16);
        fill(&mut s, 12);
        assert_eq!(s.next_seq(), 6);
        assert!(s.invariant_holds());

        // Ack across the wrap point.
        assert_eq!(s.on_ack(2), 9);
        assert_eq!(s.send_base(), 3);
        assert_eq!(s.in_flight(), 3);
        assert!(s.invariant_holds());

        fill(&mut s, 13);
        assert!(!s.can_send());
        assert_eq!(s.on_ack(s.next_seq().wrapping_sub(1)), 16);
        assert!(!s.has_unacked());
    }

    #[test]
    fn wrap_matches_origin() {
        // Same script of sends and acks, once near zero and once across the
        // wrap; observable behaviour must be identical.
        let script = |start: u32| {
            let mut s = GbnSender::new(start, 4);
            let mut trace = Vec::new();
            for step in 0..40u32 {
                while s.can_send() {
                    let seq = s.next_seq();
                    s.record_sent(vec![seq as u8]);
                }
                let acked = s.on_ack(start.wrapping_add(step));
                trace.push((acked, s.in_flight(), s.can_send()));
                assert!(s.invariant_holds());
            }
            trace
        };
        assert_eq!(script(0), script(u32::MAX - 20));
    }
}
