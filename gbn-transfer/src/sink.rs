//! The Sink's data phase.
//!
//! Accept only the segment carrying the expected sequence number, append
//! its payload, and answer every data segment with a cumulative ACK.
//! Out-of-order and duplicate segments are discarded and re-acknowledged
//! with the previous ACK.  Corrupted segments never reach this loop (the
//! session drops them) and are not acknowledged, so the Source's timeout
//! is the only recovery path for them.
//!
//! The phase ends when the FIN arrives in order; the Sink then answers the
//! teardown (see [`crate::termination`]).

use tokio::time::Instant;

use crate::error::{Result, TransferError};
use crate::file_io::AppendBytes;
use crate::gbn_receiver::GbnReceiver;
use crate::segment::{Flags, Segment};
use crate::session::Session;
use crate::socket::Datagram;
use crate::state::DataRole;

impl<D: Datagram> Session<D> {
    /// Receive the peer's content into `out` until the peer closes.
    ///
    /// Returns the number of bytes delivered.  On return the session has
    /// completed its side of the teardown and `out` has been finished.
    pub async fn receive_content<W: AppendBytes>(&mut self, out: &mut W) -> Result<u64> {
        self.require_role(DataRole::Sink, "only the Sink receives content")?;
        self.require_established()?;

        let mut receiver = GbnReceiver::new(self.local_ack);
        let idle = self.config.idle_timeout;

        loop {
            let deadline = idle.map(|d| Instant::now() + d);
            let Some((seg, _)) = self.recv_deadline(deadline).await? else {
                let waited = idle.unwrap_or_default();
                log::warn!("[sink] nothing from the peer for {waited:?}");
                return Err(TransferError::PeerSilent(waited));
            };

            if self.answer_stray_syn_ack(&seg).await? {
                continue;
            }

            if seg.flags.fin {
                if receiver.on_fin(seg.seq) {
                    self.local_ack = receiver.expected();
                    self.stats.bytes = receiver.bytes_accepted();
                    out.finish()?;
                    log::info!(
                        "[sink] FIN after {} segment(s), {} bytes",
                        receiver.segments_accepted(),
                        receiver.bytes_accepted()
                    );
                    self.finish_as_sink(seg.seq).await?;
                    return Ok(receiver.bytes_accepted());
                }
                log::debug!("[sink] FIN seq={} ahead of expected={}", seg.seq, receiver.expected());
                self.send_data_ack(&receiver).await?;
                continue;
            }

            if seg.flags.syn || seg.flags.ack {
                log::debug!("[sink] ignoring {seg} during data phase");
                continue;
            }

            if receiver.on_segment(seg.seq, &seg.payload) {
                out.append_bytes(&seg.payload)?;
                self.local_ack = receiver.expected();
            } else {
                log::debug!(
                    "[sink] discarding seq={} (expected {})",
                    seg.seq,
                    receiver.expected()
                );
            }
            self.send_data_ack(&receiver).await?;
        }
    }

    async fn send_data_ack(&mut self, receiver: &GbnReceiver) -> Result<()> {
        let ack = Segment::new(Flags::ACK, self.local_seq, receiver.ack_number(), Vec::new());
        self.send(&ack).await?;
        Ok(())
    }
}
