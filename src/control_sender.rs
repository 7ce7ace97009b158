use crate::protocol::{ControlFrame, MAX_FRAME_LEN, PROTOCOL_TERMINATOR};
use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};

/// Fire-and-forget sender of control frames to the puppet controller.
pub struct ControlSender {
    socket: UdpSocket,
    target_addr: Option<SocketAddr>,
}

impl ControlSender {
    /// Resolve the controller address once. An unresolvable host is logged and
    /// every later send becomes a no-op.
    pub async fn new(remote_host: &str, remote_port: u16) -> anyhow::Result<Self> {
        let target_addr = match lookup_host((remote_host, remote_port)).await {
            Ok(mut addrs) => addrs.next(),
            Err(e) => {
                log::error!("Cannot resolve {}:{}: {}", remote_host, remote_port, e);
                None
            }
        };
        if target_addr.is_none() {
            log::warn!("Control frames to {}:{} will be dropped", remote_host, remote_port);
        }

        let bind_addr = match target_addr {
            Some(SocketAddr::V6(_)) => "[::]:0",
            _ => "0.0.0.0:0",
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        // try_send_to 需要套接字先被 reactor 标记为可写
        socket.writable().await?;

        Ok(Self {
            socket,
            target_addr,
        })
    }

    #[cfg(test)]
    pub fn target_addr(&self) -> Option<SocketAddr> {
        self.target_addr
    }

    pub fn send(&self, frame: &ControlFrame) -> bool {
        self.send_encoded(&frame.encode())
    }

    /// Send an already encoded frame. Frames of `MAX_FRAME_LEN` characters or
    /// more are dropped. Returns whether a datagram was handed to the socket.
    pub fn send_encoded(&self, encoded: &str) -> bool {
        if encoded.len() >= MAX_FRAME_LEN {
            log::debug!("Dropping oversized control frame ({} chars)", encoded.len());
            return false;
        }
        let Some(target) = self.target_addr else {
            return false;
        };

        let mut msg = String::with_capacity(encoded.len() + 1);
        msg.push_str(encoded);
        msg.push(PROTOCOL_TERMINATOR);

        match self.socket.try_send_to(msg.as_bytes(), target) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Control frame not sent: {}", e);
                false
            }
        }
    }
}
