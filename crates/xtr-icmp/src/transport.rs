//! ICMP echo transport.

use crate::packet::{classify_reply, create_echo_request, strip_ipv4_header};
use crate::socket::{open_icmp_socket, set_hop_limit, SocketMode};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};
use xtr_core::{EchoTransport, Family, Reply, XtrError, ECHO_PAYLOAD};

/// Largest datagram read from the socket.
const RECV_BUFFER_SIZE: usize = 1500;

/// Returns the echo identifier for this process.
///
/// Computed once at startup and handed to every transport of the run.
pub fn process_echo_id() -> u16 {
    std::process::id() as u16
}

/// Echo transport over one ICMP or ICMPv6 socket.
pub struct IcmpTransport {
    family: Family,
    /// ICMP socket, driven by tokio.
    socket: UdpSocket,
    mode: SocketMode,
    /// Echo ID for this run.
    echo_id: u16,
    /// Read buffer.
    buffer: Vec<u8>,
}

impl IcmpTransport {
    /// Opens a transport for `family` tagging probes with `echo_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(family: Family, echo_id: u16) -> Result<Self, XtrError> {
        let (socket, mode) = open_icmp_socket(family)?;
        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)
            .map_err(|source| XtrError::SocketCreation { family, source })?;

        debug!(%family, ?mode, echo_id, "Opened ICMP socket");

        Ok(Self {
            family,
            socket,
            mode,
            echo_id,
            buffer: vec![0u8; RECV_BUFFER_SIZE],
        })
    }

    pub fn mode(&self) -> SocketMode {
        self.mode
    }

    /// Identifier to match replies against. Ping sockets rewrite it, and the
    /// kernel already hands them only their own replies.
    fn expected_echo_id(&self) -> Option<u16> {
        match self.mode {
            SocketMode::Raw => Some(self.echo_id),
            SocketMode::Dgram => None,
        }
    }
}

#[async_trait]
impl EchoTransport for IcmpTransport {
    fn family(&self) -> Family {
        self.family
    }

    async fn send_probe(&mut self, destination: IpAddr, hop_limit: u8) -> Result<(), XtrError> {
        if Family::of(&destination) != self.family {
            return Err(XtrError::Internal(format!(
                "{} transport asked to probe {}",
                self.family, destination
            )));
        }

        set_hop_limit(&self.socket, self.family, hop_limit)?;

        // Sequence carries the hop limit for packet captures only; replies are
        // matched on type and identifier.
        let packet = create_echo_request(
            self.family,
            self.echo_id,
            u16::from(hop_limit),
            ECHO_PAYLOAD,
        )?;

        trace!(
            hop_limit,
            echo_id = self.echo_id,
            "Sending ICMP Echo Request probe"
        );

        // ICMP doesn't have a port, but we need to provide a SocketAddr
        let target_addr = SocketAddr::new(destination, 0);
        self.socket
            .send_to(&packet, target_addr)
            .await
            .map_err(|source| XtrError::WriteFailed {
                addr: destination,
                source,
            })?;

        Ok(())
    }

    async fn receive(&mut self, deadline: Instant) -> Result<Option<Reply>, XtrError> {
        let (n, peer) =
            match tokio::time::timeout_at(deadline, self.socket.recv_from(&mut self.buffer)).await {
                Err(_) => return Ok(None),
                Ok(Err(e)) => return Err(XtrError::ReadFailed(e)),
                Ok(Ok(received)) => received,
            };

        let mut icmp = &self.buffer[..n];
        if self.family == Family::V4 && self.mode == SocketMode::Raw {
            icmp = strip_ipv4_header(icmp)?;
        }

        let kind = classify_reply(self.family, icmp, self.expected_echo_id())?;
        Ok(Some(Reply {
            addr: peer.ip(),
            kind,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_echo_id_is_stable() {
        assert_eq!(process_echo_id(), process_echo_id());
        assert_eq!(process_echo_id(), std::process::id() as u16);
    }

    #[tokio::test]
    async fn test_loopback_echo() {
        // Needs either CAP_NET_RAW or an unprivileged ping range; skip otherwise.
        let Ok(mut transport) = IcmpTransport::open(Family::V4, process_echo_id()) else {
            return;
        };
        let destination: IpAddr = "127.0.0.1".parse().unwrap();
        if transport.send_probe(destination, 64).await.is_err() {
            return;
        }

        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        loop {
            match transport.receive(deadline).await {
                Ok(Some(reply)) => {
                    assert_eq!(reply.addr, destination);
                    assert_eq!(reply.kind, xtr_core::ReplyKind::EchoReply);
                    return;
                }
                Ok(None) => return,
                Err(e) if e.is_retryable() => continue,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[tokio::test]
    async fn test_rejects_family_mismatch() {
        let Ok(mut transport) = IcmpTransport::open(Family::V4, process_echo_id()) else {
            return;
        };
        let result = transport.send_probe("::1".parse().unwrap(), 1).await;
        assert!(matches!(result, Err(XtrError::Internal(_))));
    }
}
