//! Orderly close, initiated by the Source once all data is acknowledged.
//!
//! ```text
//!  Source                                   Sink
//!  ACTIVE ── FIN seq=F ──────────────────────▶ ACTIVE
//!  FIN_SENT ◀─────────────────── ACK ack=F ── FIN_RECEIVED
//!  FIN_ACKED ── ACK seq=F+1 ─────────────────▶
//!  CLOSED                                     CLOSED
//! ```
//!
//! The Source resends FIN every `rto` until acknowledged, at most
//! `max_control_retries` times.  The Sink re-acknowledges repeated FINs while
//! it waits for the final ACK; if that ACK never comes it closes anyway,
//! since every byte has already been delivered.

use tokio::time::Instant;

use crate::error::{Result, TransferError};
use crate::handshake::ACK_TAG;
use crate::segment::{Flags, Segment};
use crate::seq_space;
use crate::session::{Session, TransferReport};
use crate::socket::Datagram;
use crate::state::{DataRole, TerminationState};

pub const FIN_TAG: &[u8] = b"FIN";

impl<D: Datagram> Session<D> {
    /// Finish the session and release its socket.
    ///
    /// A Source runs the FIN / ACK / ACK exchange here.  A Sink has already
    /// answered the teardown inside [`Session::receive_content`]; closing it
    /// any earlier is an error.
    pub async fn close(mut self) -> Result<TransferReport> {
        match self.data_role {
            DataRole::Source => self.initiate_close().await?,
            DataRole::Sink => {
                if self.termination_state != TerminationState::Closed {
                    return Err(TransferError::BadState(
                        "a Sink closes when the Source's FIN arrives",
                    ));
                }
            }
        }
        Ok(self.into_report())
    }

    async fn initiate_close(&mut self) -> Result<()> {
        self.require_established()?;

        let fin_seq = self.local_seq;
        let fin = Segment::new(Flags::FIN, fin_seq, self.local_ack, FIN_TAG).encode();
        self.local_seq = seq_space::add(self.local_seq, 1);
        self.termination_state = TerminationState::FinSent;

        let attempts = self.config.max_control_retries + 1;
        let mut acked = false;
        for attempt in 1..=attempts {
            if attempt > 1 {
                log::debug!("[fin] FIN unacknowledged; re-sending (attempt {attempt})");
                self.stats.retransmissions += 1;
            }
            self.send_raw(&fin).await?;
            self.stats.fin_transmissions += 1;
            log::debug!("[fin] → FIN seq={fin_seq}");

            let deadline = Instant::now() + self.config.rto;
            while let Some((seg, _)) = self.recv_deadline(Some(deadline)).await? {
                if self.answer_stray_syn_ack(&seg).await? {
                    continue;
                }
                if seg.flags == Flags::ACK && seg.payload.is_empty() && seg.ack == fin_seq {
                    acked = true;
                    break;
                }
                // Late duplicates of data ACKs land here.
                log::debug!("[fin] ignoring {seg} in FIN_SENT");
            }
            if acked {
                break;
            }
        }
        if !acked {
            log::warn!("[fin] FIN never acknowledged");
            return Err(TransferError::TeardownFailed { attempts });
        }

        self.local_ack = seq_space::add(self.local_ack, 1);
        self.termination_state = TerminationState::FinAcked;

        let last = Segment::new(Flags::ACK, self.local_seq, self.local_ack, ACK_TAG);
        self.send(&last).await?;
        self.local_seq = seq_space::add(self.local_seq, 1);
        self.termination_state = TerminationState::Closed;
        log::debug!("[fin] closed");
        Ok(())
    }

    /// Sink side: acknowledge the in-order FIN at `fin_seq` and wait for
    /// the Source's final ACK.
    pub(crate) async fn finish_as_sink(&mut self, fin_seq: u32) -> Result<()> {
        // Bare, like every cumulative ACK, so a late handshake ACK can't
        // pass for it.
        let ack = Segment::new(Flags::ACK, self.local_seq, fin_seq, Vec::new());
        let ack = self.send(&ack).await?;
        self.termination_state = TerminationState::FinReceived;

        let final_seq = seq_space::add(fin_seq, 1);
        let attempts = self.config.max_control_retries + 1;
        for _ in 0..attempts {
            let deadline = Instant::now() + self.config.rto;
            while let Some((seg, _)) = self.recv_deadline(Some(deadline)).await? {
                if seg.flags == Flags::ACK && seg.seq == final_seq {
                    self.termination_state = TerminationState::Closed;
                    log::debug!("[fin] final ACK received; closed");
                    return Ok(());
                }
                if seg.flags.fin && seg.seq == fin_seq {
                    log::debug!("[fin] repeated FIN; re-sending ACK");
                    self.send_raw(&ack).await?;
                    continue;
                }
                log::debug!("[fin] ignoring {seg} in FIN_RECEIVED");
            }
        }

        log::warn!("[fin] final ACK never arrived; closing anyway");
        self.termination_state = TerminationState::Closed;
        Ok(())
    }
}
