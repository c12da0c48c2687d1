//! Fault-injecting datagram channel.
//!
//! Real networks drop, corrupt and duplicate datagrams.  To exercise the
//! reliability mechanisms without depending on actual network conditions,
//! [`LossySocket`] wraps a [`Socket`] and applies a [`FaultPlan`] to every
//! outbound datagram:
//!
//! | Fault       | Trigger                                               |
//! |-------------|-------------------------------------------------------|
//! | Loss        | datagram index in `drop`, or with probability `loss_rate` |
//! | Corruption  | index in `corrupt`, or with probability `corrupt_rate`; one payload bit is flipped |
//! | Duplication | with probability `duplicate_rate`                     |
//!
//! Datagram indices count every `send_to` call on this socket from zero,
//! including handshake and teardown segments.  Random faults draw from a
//! seeded RNG so failures are reproducible.  Inbound traffic passes through
//! untouched; wrap the peer as well to degrade both directions.

use std::collections::BTreeSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::segment::HEADER_LEN;
use crate::socket::{Datagram, Socket};

/// Which outbound datagrams to damage.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Indices of datagrams to drop.
    pub drop: BTreeSet<u64>,
    /// Indices of datagrams to corrupt.
    pub corrupt: BTreeSet<u64>,
    /// Probability in `[0.0, 1.0]` that any datagram is dropped.
    pub loss_rate: f64,
    /// Probability that any datagram has one payload bit flipped.
    pub corrupt_rate: f64,
    /// Probability that any datagram is sent twice.
    pub duplicate_rate: f64,
    /// RNG seed for the probabilistic faults.
    pub seed: u64,
}

impl FaultPlan {
    /// No faults; the socket is a transparent pass-through.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn drop_nth(mut self, index: u64) -> Self {
        self.drop.insert(index);
        self
    }

    pub fn corrupt_nth(mut self, index: u64) -> Self {
        self.corrupt.insert(index);
        self
    }

    pub fn random(loss_rate: f64, corrupt_rate: f64, duplicate_rate: f64, seed: u64) -> Self {
        Self {
            loss_rate,
            corrupt_rate,
            duplicate_rate,
            seed,
            ..Self::default()
        }
    }
}

/// Counters of what the simulator did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub sent: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
}

enum Fate {
    Deliver,
    Drop,
    Corrupt,
    Duplicate,
}

/// A [`Socket`] that damages its outbound traffic according to a plan.
#[derive(Debug)]
pub struct LossySocket {
    inner: Socket,
    plan: FaultPlan,
    rng: Mutex<StdRng>,
    next_index: AtomicU64,
    stats: Mutex<FaultStats>,
}

impl LossySocket {
    pub fn new(inner: Socket, plan: FaultPlan) -> Self {
        let rng = StdRng::seed_from_u64(plan.seed);
        Self {
            inner,
            plan,
            rng: Mutex::new(rng),
            next_index: AtomicU64::new(0),
            stats: Mutex::new(FaultStats::default()),
        }
    }

    /// Bind a fresh UDP socket and wrap it.
    pub async fn bind(local_addr: SocketAddr, plan: FaultPlan) -> io::Result<Self> {
        Ok(Self::new(Socket::bind(local_addr).await?, plan))
    }

    pub fn stats(&self) -> FaultStats {
        *self.stats.lock()
    }

    fn fate(&self, index: u64) -> Fate {
        if self.plan.drop.contains(&index) {
            return Fate::Drop;
        }
        if self.plan.corrupt.contains(&index) {
            return Fate::Corrupt;
        }
        let mut rng = self.rng.lock();
        if self.plan.loss_rate > 0.0 && rng.gen_bool(self.plan.loss_rate) {
            Fate::Drop
        } else if self.plan.corrupt_rate > 0.0 && rng.gen_bool(self.plan.corrupt_rate) {
            Fate::Corrupt
        } else if self.plan.duplicate_rate > 0.0 && rng.gen_bool(self.plan.duplicate_rate) {
            Fate::Duplicate
        } else {
            Fate::Deliver
        }
    }

    fn flip_payload_bit(&self, bytes: &mut [u8]) {
        if bytes.is_empty() {
            return;
        }
        // Header-only segments get their last byte damaged instead.
        let (lo, hi) = if bytes.len() > HEADER_LEN {
            (HEADER_LEN, bytes.len())
        } else {
            (bytes.len() - 1, bytes.len())
        };
        let mut rng = self.rng.lock();
        let at = rng.gen_range(lo..hi);
        let bit = rng.gen_range(0..8u8);
        bytes[at] ^= 1 << bit;
    }
}

impl Datagram for LossySocket {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let fate = self.fate(index);
        self.stats.lock().sent += 1;

        match fate {
            Fate::Deliver => self.inner.send_to(bytes, dest).await,
            Fate::Drop => {
                log::debug!("[sim] drop datagram #{index} ({} bytes)", bytes.len());
                self.stats.lock().dropped += 1;
                Ok(())
            }
            Fate::Corrupt => {
                log::debug!("[sim] corrupt datagram #{index}");
                let mut damaged = bytes.to_vec();
                self.flip_payload_bit(&mut damaged);
                self.stats.lock().corrupted += 1;
                self.inner.send_to(&damaged, dest).await
            }
            Fate::Duplicate => {
                log::debug!("[sim] duplicate datagram #{index}");
                self.stats.lock().duplicated += 1;
                self.inner.send_to(bytes, dest).await?;
                self.inner.send_to(bytes, dest).await
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}
