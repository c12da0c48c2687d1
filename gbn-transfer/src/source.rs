//! Go-Back-N window controller: the Source's data phase.
//!
//! One flow of control alternates between three steps until every chunk has
//! been sent and acknowledged:
//!
//! 1. **Transmit** — while the window has room and content remains, send
//!    the next chunk (≤ 1024 bytes) with `seq = next_seq` and keep its exact
//!    bytes for retransmission.  The first outstanding segment starts the
//!    timer.
//! 2. **Receive** — a verified ACK is cumulative: everything up to and
//!    including `ack` leaves the window.  Progress restarts the timer, or
//!    stops it once the window drains.  Stale and duplicate ACKs change
//!    nothing.
//! 3. **Timeout** — re-arm the timer first, then resend the whole window
//!    `[send_base, next_seq)` in ascending order.
//!
//! Receive and timeout are awaited together in one `select!`, so a blocked
//! receive never delays a retransmission.

use crate::error::{Result, TransferError};
use crate::gbn_sender::GbnSender;
use crate::segment::{Flags, Segment, MAX_PAYLOAD};
use crate::session::Session;
use crate::socket::Datagram;
use crate::state::DataRole;
use crate::timer::RetransmitTimer;

impl<D: Datagram> Session<D> {
    /// Push `content` to the peer using Go-Back-N.
    ///
    /// Returns once every segment has been acknowledged.  Call
    /// [`Session::close`] afterwards to run the FIN exchange.
    pub async fn send_content(&mut self, content: &[u8]) -> Result<()> {
        self.require_role(DataRole::Source, "only the Source sends content")?;
        self.require_established()?;

        let mut sender = GbnSender::new(self.local_seq, self.config.window_size);
        let mut timer = RetransmitTimer::new(self.config.rto);
        let mut chunks = content.chunks(MAX_PAYLOAD);
        let mut pending = chunks.next();
        // Timeouts since the window last moved.
        let mut stalled = 0u32;

        log::info!(
            "[gbn] sending {} bytes in {} segment(s), window {}",
            content.len(),
            content.len().div_ceil(MAX_PAYLOAD),
            sender.window_size()
        );

        loop {
            while sender.can_send() {
                let Some(chunk) = pending else { break };
                let seg = Segment::new(Flags::DATA, sender.next_seq(), self.local_ack, chunk);
                let bytes = self.send(&seg).await?;
                self.stats.bytes += chunk.len() as u64;
                if sender.record_sent(bytes) {
                    timer.start();
                }
                pending = chunks.next();
            }
            debug_assert!(sender.invariant_holds());

            if pending.is_none() && !sender.has_unacked() {
                break;
            }

            tokio::select! {
                _ = timer.expired() => {
                    self.stats.timeouts += 1;
                    stalled += 1;
                    if let Some(max) = self.config.max_data_retries {
                        if stalled > max {
                            log::warn!("[gbn] {stalled} timeouts without progress; giving up");
                            return Err(TransferError::MaxRetriesExceeded { timeouts: stalled });
                        }
                    }

                    timer.restart();
                    log::debug!(
                        "[gbn] timeout #{} — retransmitting {} segment(s) from seq={}",
                        self.stats.timeouts,
                        sender.in_flight(),
                        sender.send_base()
                    );
                    for entry in sender.window_entries() {
                        self.send_raw(&entry.bytes).await?;
                        self.stats.retransmissions += 1;
                    }
                }
                received = self.recv() => {
                    let Some((seg, _)) = received? else { continue };
                    if self.answer_stray_syn_ack(&seg).await? {
                        continue;
                    }
                    if seg.flags != Flags::ACK {
                        log::debug!("[gbn] ignoring {seg} during data phase");
                        continue;
                    }
                    // Cumulative ACKs are bare; a tagged one is a repeated
                    // handshake ACK and acknowledges no data.
                    if !seg.payload.is_empty() {
                        log::debug!("[gbn] ignoring tagged {seg}");
                        continue;
                    }

                    let acked = sender.on_ack(seg.ack);
                    if acked == 0 {
                        log::debug!("[gbn] duplicate ack={} (base={})", seg.ack, sender.send_base());
                        continue;
                    }
                    stalled = 0;
                    if sender.has_unacked() {
                        timer.restart();
                    } else {
                        timer.stop();
                    }
                    log::debug!(
                        "[gbn] ack={} slid {} segment(s); base={} in_flight={}",
                        seg.ack,
                        acked,
                        sender.send_base(),
                        sender.in_flight()
                    );
                }
            }
            debug_assert!(sender.invariant_holds());
        }

        self.local_seq = sender.next_seq();
        log::info!("[gbn] all {} bytes acknowledged", content.len());
        Ok(())
    }
}
