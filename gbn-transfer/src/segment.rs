//! Wire-format definitions for protocol segments.
//!
//! Every datagram exchanged between peers carries exactly one [`Segment`].
//! This module is responsible for:
//! - Defining the on-wire binary layout (three flag bytes, three 32-bit
//!   header words, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Splitting a raw byte slice back into a [`Segment`].
//! - Computing and verifying the CRC-32 of the payload.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      SYN      |      ACK      |      FIN      |  Sequence ... |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      ... Number (cont.)       |  Acknowledgment Number ...    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  ... (cont.)  |               CRC-32 of payload               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload (0-1024 bytes) ...                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 15 bytes.
//! syn(1) + ack(1) + fin(1) + seq(4) + ack_num(4) + checksum(4)
//!
//! The checksum covers the payload only; a corrupted header is not
//! detected by this layer.

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 15;

/// Largest payload a single segment may carry.
pub const MAX_PAYLOAD: usize = 1024;

/// Largest datagram ever produced by [`Segment::encode`].
pub const MAX_SEGMENT: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_SYN: usize = 0;
const OFF_ACK_FLAG: usize = 1;
const OFF_FIN: usize = 2;
const OFF_SEQ: usize = 3;
const OFF_ACK: usize = 7;
const OFF_CHECKSUM: usize = 11;

/// The three independent control flags.
///
/// Each is carried in its own byte on the wire (0 or 1).  Any non-zero byte
/// decodes as `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
}

impl Flags {
    /// No flag set: a plain data segment.
    pub const DATA: Flags = Flags { syn: false, ack: false, fin: false };
    /// Handshake initiation.
    pub const SYN: Flags = Flags { syn: true, ack: false, fin: false };
    /// Handshake response.
    pub const SYN_ACK: Flags = Flags { syn: true, ack: true, fin: false };
    /// Pure acknowledgement.
    pub const ACK: Flags = Flags { syn: false, ack: true, fin: false };
    /// Sender has no more data.
    pub const FIN: Flags = Flags { syn: false, ack: false, fin: true };
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = Vec::with_capacity(3);
        if self.syn {
            names.push("SYN");
        }
        if self.ack {
            names.push("ACK");
        }
        if self.fin {
            names.push("FIN");
        }
        if names.is_empty() {
            f.write_str("DATA")
        } else {
            f.write_str(&names.join("+"))
        }
    }
}

/// A complete protocol segment: header fields + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub flags: Flags,
    /// Sequence number of this segment (one slot per segment).
    pub seq: u32,
    /// Acknowledgement number.
    pub ack: u32,
    /// CRC-32 of `payload` as carried on the wire.
    ///
    /// [`Segment::new`] fills it in; [`Segment::decode`] copies it from the
    /// buffer without checking it.  Use [`Segment::verify`] for that.
    pub checksum: u32,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Build a segment, computing the checksum over `payload`.
    ///
    /// Payload length is the caller's responsibility to bound at
    /// [`MAX_PAYLOAD`].
    pub fn new(flags: Flags, seq: u32, ack: u32, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        debug_assert!(payload.len() <= MAX_PAYLOAD, "payload exceeds {MAX_PAYLOAD} bytes");
        Self {
            flags,
            seq,
            ack,
            checksum: checksum(&payload),
            payload,
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    ///
    /// The checksum is recomputed from the payload; the value stored in
    /// `self.checksum` is ignored.
    pub fn encode(&self) -> Vec<u8> {
        encode(self.flags, self.seq, self.ack, &self.payload)
    }

    /// Split a raw datagram into header fields and payload.
    ///
    /// Only the length is validated here: anything shorter than a header or
    /// longer than [`MAX_SEGMENT`] is malformed.  A corrupted payload still
    /// decodes; call [`Segment::verify`] before trusting it.
    pub fn decode(buf: &[u8]) -> Result<Self, SegmentError> {
        if !(HEADER_LEN..=MAX_SEGMENT).contains(&buf.len()) {
            return Err(SegmentError::Malformed { len: buf.len() });
        }

        Ok(Segment {
            flags: Flags {
                syn: buf[OFF_SYN] != 0,
                ack: buf[OFF_ACK_FLAG] != 0,
                fin: buf[OFF_FIN] != 0,
            },
            seq: read_u32(buf, OFF_SEQ),
            ack: read_u32(buf, OFF_ACK),
            checksum: read_u32(buf, OFF_CHECKSUM),
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }

    /// `true` when the carried checksum matches the payload.
    pub fn verify(&self) -> bool {
        verify(&self.payload, self.checksum)
    }

    /// Like [`Segment::verify`], but reports the mismatch as an error.
    pub fn check(&self) -> Result<(), SegmentError> {
        let actual = checksum(&self.payload);
        if actual == self.checksum {
            Ok(())
        } else {
            Err(SegmentError::ChecksumMismatch {
                expected: self.checksum,
                actual,
            })
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} seq={} ack={} crc={:08x} len={}",
            self.flags,
            self.seq,
            self.ack,
            self.checksum,
            self.payload.len()
        )
    }
}

/// Pack a segment straight into wire bytes.
pub fn encode(flags: Flags, seq: u32, ack: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; HEADER_LEN + payload.len()];

    buf[OFF_SYN] = u8::from(flags.syn);
    buf[OFF_ACK_FLAG] = u8::from(flags.ack);
    buf[OFF_FIN] = u8::from(flags.fin);
    buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&seq.to_be_bytes());
    buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&ack.to_be_bytes());
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&checksum(payload).to_be_bytes());
    buf[HEADER_LEN..].copy_from_slice(payload);

    buf
}

/// CRC-32 (IEEE) of `payload`.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// `true` when `expected` is the CRC-32 of `payload`.
pub fn verify(payload: &[u8], expected: u32) -> bool {
    checksum(payload) == expected
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Errors that can arise when interpreting a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// Datagram shorter than the fixed header or longer than a full segment.
    #[error("malformed segment: {len} bytes, expected {HEADER_LEN}..={MAX_SEGMENT}")]
    Malformed { len: usize },
    /// Payload does not match the carried CRC-32.
    #[error("checksum mismatch: header says {expected:08x}, payload hashes to {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
}
