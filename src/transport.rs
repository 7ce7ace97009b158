//! Blocking UDP endpoints used by the audio worker threads.
//!
//! Each direction gets its own socket: outgoing audio sends from an ephemeral
//! port to the puppet, incoming audio is received on a fixed local port.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::RelayError;

/// Send-only datagram endpoint bound to one remote address.
pub struct SendTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl SendTransport {
    /// Resolve `host:port` once and bind an ephemeral local socket.
    pub fn connect(host: &str, port: u16) -> Result<Self, RelayError> {
        let target = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(ErrorKind::NotFound, format!("no address for {}:{}", host, port))
        })?;
        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)?;
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// One datagram, fire-and-forget.
    pub fn send(&self, payload: &[u8]) -> Result<(), RelayError> {
        self.socket.send_to(payload, self.target)?;
        Ok(())
    }
}

/// Receive-only datagram endpoint on a fixed local port.
///
/// Reads time out after `poll_interval` so the owning thread can notice a
/// stop request.
pub struct ReceiveTransport {
    socket: UdpSocket,
}

impl ReceiveTransport {
    pub fn bind(port: u16, poll_interval: Duration) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        socket.set_read_timeout(Some(poll_interval))?;
        Ok(Self { socket })
    }

    pub fn local_port(&self) -> Result<u16, RelayError> {
        Ok(self.socket.local_addr()?.port())
    }

    /// `Ok(None)` when nothing arrived within the poll interval.
    pub fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, RelayError> {
        match self.socket.recv_from(buf) {
            Ok((len, _)) => Ok(Some(len)),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
