//! ICMP socket setup.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tracing::warn;
use xtr_core::{Family, XtrError};

/// How the kernel exposes ICMP to the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketMode {
    /// Raw socket. Sees all ICMP traffic; IPv4 reads include the IP header.
    Raw,
    /// Unprivileged "ping" socket. The kernel owns the echo identifier and
    /// only delivers messages for this socket.
    Dgram,
}

fn domain(family: Family) -> Domain {
    match family {
        Family::V4 => Domain::IPV4,
        Family::V6 => Domain::IPV6,
    }
}

fn protocol(family: Family) -> Protocol {
    match family {
        Family::V4 => Protocol::ICMPV4,
        Family::V6 => Protocol::ICMPV6,
    }
}

/// Creates a raw ICMP socket for the family.
pub fn create_raw_icmp_socket(family: Family) -> std::io::Result<Socket> {
    Socket::new(domain(family), Type::RAW, Some(protocol(family)))
}

/// Creates an unprivileged ICMP socket (SOCK_DGRAM) for the family.
pub fn create_dgram_icmp_socket(family: Family) -> std::io::Result<Socket> {
    Socket::new(domain(family), Type::DGRAM, Some(protocol(family)))
}

/// Opens a non-blocking ICMP socket, preferring raw and falling back to an
/// unprivileged one.
pub fn open_icmp_socket(family: Family) -> Result<(Socket, SocketMode), XtrError> {
    let (socket, mode) = match create_raw_icmp_socket(family) {
        Ok(socket) => (socket, SocketMode::Raw),
        Err(raw_err) => match create_dgram_icmp_socket(family) {
            Ok(socket) => {
                warn!(
                    %family,
                    error = %raw_err,
                    "Raw ICMP socket unavailable, using unprivileged ICMP; router replies may not be visible"
                );
                (socket, SocketMode::Dgram)
            }
            Err(_) => {
                return Err(XtrError::SocketCreation {
                    family,
                    source: raw_err,
                })
            }
        },
    };

    socket
        .set_nonblocking(true)
        .map_err(|source| XtrError::SocketCreation { family, source })?;

    Ok((socket, mode))
}

/// Sets the hop limit for outgoing packets: TTL for IPv4, unicast hops for IPv6.
pub fn set_hop_limit<'s>(
    socket: impl Into<SockRef<'s>>,
    family: Family,
    hop_limit: u8,
) -> Result<(), XtrError> {
    let socket = socket.into();
    let result = match family {
        Family::V4 => socket.set_ttl(u32::from(hop_limit)),
        Family::V6 => socket.set_unicast_hops_v6(u32::from(hop_limit)),
    };
    result.map_err(|source| XtrError::HopLimit { hop_limit, source })
}
