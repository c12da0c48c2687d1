//! Three-way handshake.
//!
//! ```text
//!  Initiator                                Responder
//!     │ ── SYN  seq=X ───────────────────────▶ │  learns peer, localAck = X+1
//!     │ ◀──────────── SYN+ACK seq=Y ack=X+1 ── │  localSeq = Y+1 (phantom byte)
//!     │ ── ACK  seq=X+1 ack=Y+1 ─────────────▶ │
//!  ESTABLISHED                             ESTABLISHED
//! ```
//!
//! Both initial sequence numbers are drawn uniformly from `[0, 2^32)` using
//! the operating system's CSPRNG.
//!
//! SYN and SYN+ACK are retransmitted every `rto` without an answer, up to
//! `max_control_retries` times.  A lost final ACK is recovered by the
//! Responder repeating SYN+ACK; the established Initiator answers that from
//! its data loop (see [`Session::answer_stray_syn_ack`]).
//!
//! # Filename announcement
//!
//! The control payload of a synchronising segment is its tag (`SYN` or
//! `SYN/ACK`), optionally followed by `\n` and a UTF-8 file name.  The Source
//! uses it to tell the Sink what to call the output; no data sequence
//! number is spent on it.

use std::net::SocketAddr;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::segment::{Flags, Segment};
use crate::seq_space;
use crate::session::Session;
use crate::socket::Datagram;
use crate::state::{DataRole, HandshakeRole, HandshakeState};

pub const SYN_TAG: &[u8] = b"SYN";
pub const SYN_ACK_TAG: &[u8] = b"SYN/ACK";
pub const ACK_TAG: &[u8] = b"ACK";

const NAME_SEPARATOR: u8 = b'\n';

/// Draw a fresh initial sequence number from the OS random source.
pub fn generate_isn() -> u32 {
    OsRng.next_u32()
}

/// Build a synchronising payload: `tag`, then `\n` + `name` when announced.
pub fn control_payload(tag: &[u8], name: Option<&str>) -> Vec<u8> {
    let mut payload = tag.to_vec();
    if let Some(name) = name {
        payload.push(NAME_SEPARATOR);
        payload.extend_from_slice(name.as_bytes());
    }
    payload
}

/// Extract the file name from a synchronising payload, if one is present.
pub fn announced_name(payload: &[u8]) -> Option<String> {
    let at = payload.iter().position(|&b| b == NAME_SEPARATOR)?;
    let name = std::str::from_utf8(&payload[at + 1..]).ok()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

/// An unconnected endpoint: socket, data role and tunables.
///
/// Turn it into a [`Session`] with [`Endpoint::connect`] (Initiator) or
/// [`Endpoint::accept`] (Responder).
#[derive(Debug)]
pub struct Endpoint<D: Datagram> {
    socket: D,
    data_role: DataRole,
    config: EngineConfig,
    announce: Option<String>,
}

impl<D: Datagram> Endpoint<D> {
    pub fn new(socket: D, data_role: DataRole, config: EngineConfig) -> Self {
        Self {
            socket,
            data_role,
            config,
            announce: None,
        }
    }

    /// Announce `name` as the destination file name during the handshake.
    pub fn announce(mut self, name: impl Into<String>) -> Self {
        self.announce = Some(name.into());
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    fn initial_seq(&self) -> u32 {
        self.config.initial_seq.unwrap_or_else(generate_isn)
    }

    /// Active open: send SYN to `peer` and wait for SYN+ACK.
    pub async fn connect(self, peer: SocketAddr) -> Result<Session<D>> {
        let isn = self.initial_seq();
        let announce = self.announce;
        let mut s = Session::new(
            self.socket,
            self.config,
            HandshakeRole::Initiator,
            self.data_role,
            isn,
            Some(peer),
        );

        let syn = Segment::new(Flags::SYN, isn, 0, control_payload(SYN_TAG, announce.as_deref()));
        let expected_ack = seq_space::add(isn, 1);
        let attempts = s.config.max_control_retries + 1;

        log::info!("[handshake] connecting to {peer} with ISN {isn}");
        s.handshake_state = HandshakeState::SynSent;

        let mut syn_ack = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                log::debug!("[handshake] no SYN+ACK; re-sending SYN (attempt {attempt})");
                s.stats.retransmissions += 1;
            }
            s.send(&syn).await?;

            let deadline = Instant::now() + s.config.rto;
            while let Some((seg, _)) = s.recv_deadline(Some(deadline)).await? {
                if seg.flags == Flags::SYN_ACK && seg.ack == expected_ack {
                    syn_ack = Some(seg);
                    break;
                }
                log::debug!("[handshake] unexpected {seg} while in SYN_SENT");
            }
            if syn_ack.is_some() {
                break;
            }
        }
        let Some(syn_ack) = syn_ack else {
            log::warn!("[handshake] {peer} never answered");
            return Err(TransferError::HandshakeFailed { attempts });
        };

        s.local_seq = seq_space::add(isn, 1);
        s.local_ack = seq_space::add(syn_ack.seq, 1);
        s.peer_name = announced_name(&syn_ack.payload);

        let ack = Segment::new(Flags::ACK, s.local_seq, s.local_ack, ACK_TAG);
        let bytes = s.send(&ack).await?;
        s.handshake_ack = Some(bytes);
        s.handshake_state = HandshakeState::Established;

        log::info!(
            "[handshake] established with {peer}: localSeq={} localAck={}",
            s.local_seq,
            s.local_ack
        );
        Ok(s)
    }

    /// Passive open: wait for a SYN, answer with SYN+ACK, wait for the ACK.
    ///
    /// The first SYN fixes the peer address for the whole session.
    pub async fn accept(self) -> Result<Session<D>> {
        let isn = self.initial_seq();
        let announce = self.announce;
        let mut s = Session::new(
            self.socket,
            self.config,
            HandshakeRole::Responder,
            self.data_role,
            isn,
            None,
        );

        log::info!("[handshake] listening on {}", s.socket().local_addr());
        let listen_until = s.config.accept_timeout.map(|t| Instant::now() + t);
        let (syn, from) = loop {
            match s.recv_deadline(listen_until).await? {
                Some((seg, from)) if seg.flags == Flags::SYN => break (seg, from),
                Some((seg, from)) => log::debug!("[handshake] ignoring {seg} from {from} while listening"),
                None => return Err(TransferError::HandshakeFailed { attempts: 0 }),
            }
        };

        s.peer = Some(from);
        s.local_ack = seq_space::add(syn.seq, 1);
        s.peer_name = announced_name(&syn.payload);

        let syn_ack = Segment::new(
            Flags::SYN_ACK,
            isn,
            s.local_ack,
            control_payload(SYN_ACK_TAG, announce.as_deref()),
        );
        // SYN+ACK consumes one sequence number.
        s.local_seq = seq_space::add(isn, 1);
        s.handshake_state = HandshakeState::SynReceived;
        log::info!("[handshake] SYN from {from} (seq={}); answering with ISN {isn}", syn.seq);

        let attempts = s.config.max_control_retries + 1;
        for attempt in 1..=attempts {
            if attempt > 1 {
                log::debug!("[handshake] no ACK; re-sending SYN+ACK (attempt {attempt})");
                s.stats.retransmissions += 1;
            }
            let bytes = s.send(&syn_ack).await?;

            let deadline = Instant::now() + s.config.rto;
            while let Some((seg, _)) = s.recv_deadline(Some(deadline)).await? {
                if seg.flags == Flags::ACK && seg.ack == s.local_seq {
                    s.handshake_state = HandshakeState::Established;
                    log::info!(
                        "[handshake] established with {from}: localSeq={} localAck={}",
                        s.local_seq,
                        s.local_ack
                    );
                    return Ok(s);
                }
                if seg.flags == Flags::SYN && seg.seq == syn.seq {
                    log::debug!("[handshake] repeated SYN; re-sending SYN+ACK");
                    s.send_raw(&bytes).await?;
                    continue;
                }
                log::debug!("[handshake] unexpected {seg} while in SYN_RECEIVED");
            }
        }

        log::warn!("[handshake] {from} never completed the handshake");
        Err(TransferError::HandshakeFailed { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_without_name_is_bare_tag() {
        assert_eq!(control_payload(SYN_ACK_TAG, None), b"SYN/ACK");
        assert_eq!(announced_name(b"SYN/ACK"), None);
    }

    #[test]
    fn name_roundtrips_through_payload() {
        let p = control_payload(SYN_ACK_TAG, Some("OutputApple.jpg"));
        assert_eq!(p, b"SYN/ACK\nOutputApple.jpg");
        assert_eq!(announced_name(&p).as_deref(), Some("OutputApple.jpg"));
    }

    #[test]
    fn empty_or_invalid_name_ignored() {
        assert_eq!(announced_name(b"SYN\n"), None);
        assert_eq!(announced_name(b"SYN\n\xff\xfe"), None);
    }

    #[test]
    fn consecutive_isns_differ() {
        // Collision odds for two uniform 32-bit draws are 2^-32; four in a
        // row all colliding is not going to happen.
        let draws: Vec<u32> = (0..5).map(|_| generate_isn()).collect();
        assert!(draws.windows(2).any(|w| w[0] != w[1]));
    }
}
