//! `gbn-transfer` — reliable one-way file transfer over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────────┐                         ┌──────────────┐
//!  │    Source    │── DATA seq=n ──────────▶│     Sink     │
//!  │  GbnSender   │◀────────── ACK ack=n ───│  GbnReceiver │
//!  └──────┬───────┘                         └──────┬───────┘
//!         │                                        │
//!  ┌──────▼────────────────────────────────────────▼───────┐
//!  │   Session: handshake · data phase · termination       │
//!  │   (owns socket, sequence numbers, peer, counters)     │
//!  └──────┬────────────────────────────────────────────────┘
//!         │ raw datagrams (15-byte header + ≤ 1024 payload)
//!  ┌──────▼──────┐
//!  │  Datagram   │  Socket (tokio UDP) or LossySocket (tests)
//!  └─────────────┘
//! ```
//!
//! Sequence numbers count segments, not bytes, and live in a 32-bit
//! modular space.  The sending side keeps up to `window_size` segments in
//! flight and resends the whole window when the retransmission timer
//! fires; the receiving side accepts strictly in order and acknowledges
//! cumulatively.
//!
//! Modules:
//! - [`segment`]      — wire format and CRC-32
//! - [`seq_space`]    — modular sequence arithmetic
//! - [`config`]       — engine tunables
//! - [`error`]        — error taxonomy
//! - [`state`]        — roles and state-machine states
//! - [`timer`]        — retransmission timer
//! - [`socket`]       — datagram channel trait and UDP binding
//! - [`simulator`]    — fault-injecting channel
//! - [`session`]      — per-connection state and final report
//! - [`handshake`]    — three-way open
//! - [`gbn_sender`] / [`gbn_receiver`] — pure window state
//! - [`source`] / [`sink`] — data-phase loops
//! - [`termination`]  — FIN / ACK / ACK close
//! - [`file_io`]      — file collaborators
//! - [`transfer`]     — whole-file drivers and the session launcher

pub mod config;
pub mod error;
pub mod file_io;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod handshake;
pub mod segment;
pub mod seq_space;
pub mod session;
pub mod simulator;
pub mod sink;
pub mod socket;
pub mod source;
pub mod state;
pub mod termination;
pub mod timer;
pub mod transfer;

pub use config::EngineConfig;
pub use error::{Result, TransferError};
pub use handshake::Endpoint;
pub use session::{Session, TransferReport};
pub use state::DataRole;
