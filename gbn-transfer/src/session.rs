//! Per-connection state.
//!
//! A [`Session`] owns everything one transfer needs: the socket, the
//! negotiated sequence numbers, the peer address and the counters that end
//! up in the final [`TransferReport`].  Nothing is shared between sessions,
//! so any number of them can run concurrently on distinct sockets.
//!
//! Sessions are created by [`crate::handshake::Endpoint`], driven by
//! [`Session::send_content`] or [`Session::receive_content`], and consumed
//! by [`Session::close`], which drops the socket.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::config::EngineConfig;
use crate::error::{Result, TransferError};
use crate::segment::{Flags, Segment, MAX_SEGMENT};
use crate::socket::Datagram;
use crate::state::{DataRole, HandshakeRole, HandshakeState, TerminationState};

/// Room for one maximum segment plus slack, so an oversized datagram
/// arrives longer than [`MAX_SEGMENT`] and is rejected by the decoder
/// instead of being silently truncated.
const RECV_BUF: usize = MAX_SEGMENT + 64;

/// Running counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Datagrams put on the wire, first transmissions and retransmissions.
    pub segments_sent: u64,
    /// Datagrams sent again after a timeout.
    pub retransmissions: u64,
    /// Retransmission timer expiries (data phase).
    pub timeouts: u64,
    /// FIN transmissions (the Source sends one per teardown attempt).
    pub fin_transmissions: u64,
    /// Datagrams too short or too long to hold a segment.
    pub dropped_malformed: u64,
    /// Datagrams whose payload failed the CRC check.
    pub dropped_corrupt: u64,
    /// File bytes pushed (Source) or delivered (Sink).
    pub bytes: u64,
}

/// What a finished session reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub handshake_role: HandshakeRole,
    pub data_role: DataRole,
    pub peer: Option<SocketAddr>,
    pub initial_seq: u32,
    pub handshake_state: HandshakeState,
    pub termination_state: TerminationState,
    pub stats: SessionStats,
    pub elapsed: Duration,
}

impl std::fmt::Display for TransferReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} finished ({}): {} bytes, {} segment(s) sent, {} timeout(s), {} retransmission(s). Time lapsed in seconds: {:.2}",
            self.data_role,
            self.termination_state,
            self.stats.bytes,
            self.stats.segments_sent,
            self.stats.timeouts,
            self.stats.retransmissions,
            self.elapsed.as_secs_f64()
        )
    }
}

/// One reliable transfer over a datagram socket.
#[derive(Debug)]
pub struct Session<D: Datagram> {
    socket: D,
    pub(crate) config: EngineConfig,
    pub(crate) handshake_role: HandshakeRole,
    pub(crate) data_role: DataRole,
    pub(crate) handshake_state: HandshakeState,
    pub(crate) termination_state: TerminationState,
    /// Next sequence number this side will send.
    pub(crate) local_seq: u32,
    /// Next sequence number expected from the peer.
    pub(crate) local_ack: u32,
    pub(crate) initial_seq: u32,
    /// Fixed for the session lifetime once learned.
    pub(crate) peer: Option<SocketAddr>,
    /// Destination name the peer announced during the handshake.
    pub(crate) peer_name: Option<String>,
    /// Final handshake ACK, kept by an Initiator to answer a repeated SYN+ACK.
    pub(crate) handshake_ack: Option<Vec<u8>>,
    pub(crate) stats: SessionStats,
    started: Instant,
    rx_buf: Vec<u8>,
}

impl<D: Datagram> Session<D> {
    pub(crate) fn new(
        socket: D,
        config: EngineConfig,
        handshake_role: HandshakeRole,
        data_role: DataRole,
        initial_seq: u32,
        peer: Option<SocketAddr>,
    ) -> Self {
        Self {
            socket,
            config,
            handshake_role,
            data_role,
            handshake_state: HandshakeState::Idle,
            termination_state: TerminationState::Active,
            local_seq: initial_seq,
            local_ack: 0,
            initial_seq,
            peer,
            peer_name: None,
            handshake_ack: None,
            stats: SessionStats::default(),
            started: Instant::now(),
            rx_buf: vec![0u8; RECV_BUF],
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn local_seq(&self) -> u32 {
        self.local_seq
    }

    pub fn local_ack(&self) -> u32 {
        self.local_ack
    }

    pub fn initial_seq(&self) -> u32 {
        self.initial_seq
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn handshake_role(&self) -> HandshakeRole {
        self.handshake_role
    }

    pub fn data_role(&self) -> DataRole {
        self.data_role
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake_state
    }

    pub fn termination_state(&self) -> TerminationState {
        self.termination_state
    }

    /// The file name the peer announced during the handshake, if any.
    pub fn peer_announced_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn socket(&self) -> &D {
        &self.socket
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    pub(crate) fn require_role(&self, role: DataRole, msg: &'static str) -> Result<()> {
        if self.data_role == role {
            Ok(())
        } else {
            Err(TransferError::BadState(msg))
        }
    }

    pub(crate) fn require_established(&self) -> Result<()> {
        if self.handshake_state == HandshakeState::Established
            && self.termination_state == TerminationState::Active
        {
            Ok(())
        } else {
            Err(TransferError::BadState("session is not established"))
        }
    }

    fn peer_addr(&self) -> Result<SocketAddr> {
        self.peer
            .ok_or(TransferError::BadState("peer address not yet known"))
    }

    // -----------------------------------------------------------------------
    // Segment I/O
    // -----------------------------------------------------------------------

    /// Encode `seg`, send it to the peer, and return the bytes sent.
    pub(crate) async fn send(&mut self, seg: &Segment) -> Result<Vec<u8>> {
        let bytes = seg.encode();
        self.send_raw(&bytes).await?;
        log::debug!("[{:?}] → {seg}", self.data_role);
        Ok(bytes)
    }

    /// Send pre-encoded bytes to the peer.
    pub(crate) async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        let peer = self.peer_addr()?;
        self.socket.send_to(bytes, peer).await?;
        self.stats.segments_sent += 1;
        Ok(())
    }

    /// Receive one datagram and turn it into a verified segment.
    ///
    /// Returns `Ok(None)` when the datagram is dropped: it came from
    /// somewhere other than the peer, its length cannot hold a segment, or
    /// it fails the checksum.  Socket failures are fatal.  Cancel-safe.
    pub(crate) async fn recv(&mut self) -> Result<Option<(Segment, SocketAddr)>> {
        let (n, from) = self.socket.recv_from(&mut self.rx_buf).await?;

        if let Some(peer) = self.peer {
            if from != peer {
                log::debug!("[{:?}] ignoring {n} bytes from stranger {from}", self.data_role);
                return Ok(None);
            }
        }

        let seg = match Segment::decode(&self.rx_buf[..n]) {
            Ok(seg) => seg,
            Err(e) => {
                log::warn!("[{:?}] {e}; dropped", self.data_role);
                self.stats.dropped_malformed += 1;
                return Ok(None);
            }
        };

        if let Err(e) = seg.check() {
            log::debug!("[{:?}] seq={} {e}; dropped", self.data_role, seg.seq);
            self.stats.dropped_corrupt += 1;
            return Ok(None);
        }

        log::debug!("[{:?}] ← {seg}", self.data_role);
        Ok(Some((seg, from)))
    }

    /// Receive the next valid segment, giving up at `deadline`.
    ///
    /// `None` for the deadline waits forever.  Dropped datagrams do not end
    /// the wait; only the deadline does, reported as `Ok(None)`.
    pub(crate) async fn recv_deadline(
        &mut self,
        deadline: Option<Instant>,
    ) -> Result<Option<(Segment, SocketAddr)>> {
        loop {
            let received = match deadline {
                Some(at) => match timeout_at(at, self.recv()).await {
                    Ok(r) => r?,
                    Err(_elapsed) => return Ok(None),
                },
                None => self.recv().await?,
            };
            if received.is_some() {
                return Ok(received);
            }
        }
    }

    /// An established Initiator answers a repeated SYN+ACK by re-sending its
    /// final handshake ACK: the first one was lost and the Responder is still
    /// waiting for it.
    ///
    /// Returns `true` when `seg` was such a SYN+ACK and has been handled.
    pub(crate) async fn answer_stray_syn_ack(&mut self, seg: &Segment) -> Result<bool> {
        if seg.flags != Flags::SYN_ACK {
            return Ok(false);
        }
        match self.handshake_ack.clone() {
            Some(ack) => {
                log::debug!("[handshake] repeated SYN+ACK; re-sending ACK");
                self.send_raw(&ack).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Snapshot the counters without ending the session.
    pub fn report(&self) -> TransferReport {
        TransferReport {
            handshake_role: self.handshake_role,
            data_role: self.data_role,
            peer: self.peer,
            initial_seq: self.initial_seq,
            handshake_state: self.handshake_state,
            termination_state: self.termination_state,
            stats: self.stats,
            elapsed: self.started.elapsed(),
        }
    }

    /// Consume the session, closing its socket.
    pub(crate) fn into_report(self) -> TransferReport {
        let report = self.report();
        log::info!("{report}");
        report
    }
}
