//! Datagram channel abstraction.
//!
//! The engine talks to the network through the [`Datagram`] trait: send one
//! datagram to an address, receive one datagram and learn where it came
//! from.  [`Socket`] is the production binding, a thin wrapper around
//! `tokio::net::UdpSocket`; [`crate::simulator::LossySocket`] wraps it to
//! inject faults in tests.
//!
//! This layer moves raw bytes only.  Decoding and checksum verification
//! happen in the session so that malformed or corrupt datagrams can be
//! dropped without failing the receive.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// An unreliable, unordered datagram transport.
pub trait Datagram: Send + Sync {
    /// Send `bytes` as one datagram to `dest`.
    fn send_to(&self, bytes: &[u8], dest: SocketAddr)
        -> impl Future<Output = io::Result<()>> + Send;

    /// Receive one datagram into `buf`, returning its length and origin.
    ///
    /// Must be cancel-safe: dropping the future before it completes loses
    /// no datagram.
    fn recv_from(&self, buf: &mut [u8])
        -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Address this endpoint is bound to.
    fn local_addr(&self) -> SocketAddr;
}

/// An async UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port 0 lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        log::debug!("[socket] bound {local_addr}");
        Ok(Self { local_addr, inner })
    }
}

impl Datagram for Socket {
    async fn send_to(&self, bytes: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
