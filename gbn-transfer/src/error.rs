//! Error taxonomy for engine operations.
//!
//! Malformed and corrupted segments are not errors at this level: the engine
//! drops them, counts them, and keeps going.  Everything here ends the
//! session.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// The file to send does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Any other failure reading or writing a local file.
    #[error("file I/O error on {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bind, send or receive failed on the datagram socket.
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// No valid answer to SYN / SYN+ACK within the retry budget.
    #[error("handshake failed after {attempts} attempt(s)")]
    HandshakeFailed { attempts: u32 },

    /// No acknowledgement of FIN within the retry budget.
    #[error("teardown not acknowledged after {attempts} attempt(s)")]
    TeardownFailed { attempts: u32 },

    /// Data-phase retransmissions exhausted without progress.
    #[error("gave up after {timeouts} consecutive retransmission timeout(s)")]
    MaxRetriesExceeded { timeouts: u32 },

    /// No valid segment from the peer for too long.
    #[error("peer silent for {0:?}")]
    PeerSilent(Duration),

    /// The operation does not fit the session's role or state.
    #[error("operation not allowed: {0}")]
    BadState(&'static str),

    /// The session was aborted by its owner.
    #[error("transfer cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, TransferError>;
