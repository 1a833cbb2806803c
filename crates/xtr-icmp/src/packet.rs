//! ICMP packet construction and classification using pnet.

use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpPacket, IcmpType, IcmpTypes};
use pnet_packet::icmpv6::{Icmpv6Packet, Icmpv6Types};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use xtr_core::{Family, ReplyKind, XtrError};

/// ICMP header size (type, code, checksum, identifier, sequence).
pub const ICMP_HEADER_SIZE: usize = 8;

const IPV4_MIN_HEADER_SIZE: usize = 20;
const IPV6_HEADER_SIZE: usize = 40;

/// Creates an ICMP (or ICMPv6) Echo Request.
///
/// The ICMPv4 checksum is filled in here. The ICMPv6 checksum covers a
/// pseudo-header with the source address, so it is left for the kernel.
pub fn create_echo_request(
    family: Family,
    echo_id: u16,
    sequence: u16,
    payload: &[u8],
) -> Result<Vec<u8>, XtrError> {
    let mut buffer = vec![0u8; ICMP_HEADER_SIZE + payload.len()];

    {
        let mut packet = MutableEchoRequestPacket::new(&mut buffer)
            .ok_or_else(|| XtrError::Internal("Failed to create ICMP packet".to_string()))?;

        match family {
            Family::V4 => packet.set_icmp_type(IcmpTypes::EchoRequest),
            Family::V6 => packet.set_icmp_type(IcmpType::new(Icmpv6Types::EchoRequest.0)),
        }
        packet.set_icmp_code(IcmpCode::new(0));
        packet.set_identifier(echo_id);
        packet.set_sequence_number(sequence);
        packet.set_payload(payload);
    }

    if family == Family::V4 {
        let view = IcmpPacket::new(&buffer)
            .ok_or_else(|| XtrError::Internal("Failed to create ICMP view".to_string()))?;
        let cksum = pnet_packet::icmp::checksum(&view);
        buffer[2..4].copy_from_slice(&cksum.to_be_bytes());
    }

    Ok(buffer)
}

/// Returns the ICMP message inside an IPv4 datagram.
///
/// Raw IPv4 sockets deliver the IP header along with the ICMP message.
pub fn strip_ipv4_header(buf: &[u8]) -> Result<&[u8], XtrError> {
    let ip = Ipv4Packet::new(buf).ok_or(XtrError::PacketTooShort {
        expected: IPV4_MIN_HEADER_SIZE,
        actual: buf.len(),
    })?;
    let header_len = ip.get_header_length() as usize * 4;
    if header_len < IPV4_MIN_HEADER_SIZE {
        return Err(XtrError::MalformedPacket(format!(
            "IPv4 header length {}",
            header_len
        )));
    }
    if buf.len() < header_len {
        return Err(XtrError::PacketTooShort {
            expected: header_len,
            actual: buf.len(),
        });
    }
    Ok(&buf[header_len..])
}

/// Classifies an inbound ICMP message for the given family.
///
/// Only Echo Reply and Time Exceeded are accepted. When `echo_id` is set,
/// the identifier must match: the echo header for a reply, the quoted Echo
/// Request for Time Exceeded. Everything else is `PacketMismatch`.
pub fn classify_reply(
    family: Family,
    icmp: &[u8],
    echo_id: Option<u16>,
) -> Result<ReplyKind, XtrError> {
    if icmp.len() < ICMP_HEADER_SIZE {
        return Err(XtrError::PacketTooShort {
            expected: ICMP_HEADER_SIZE,
            actual: icmp.len(),
        });
    }

    match family {
        Family::V4 => classify_v4(icmp, echo_id),
        Family::V6 => classify_v6(icmp, echo_id),
    }
}

fn classify_v4(icmp: &[u8], echo_id: Option<u16>) -> Result<ReplyKind, XtrError> {
    let packet = IcmpPacket::new(icmp).ok_or(XtrError::PacketTooShort {
        expected: ICMP_HEADER_SIZE,
        actual: icmp.len(),
    })?;
    let icmp_type = packet.get_icmp_type();

    if icmp_type == IcmpTypes::EchoReply {
        check_echo_id(icmp, echo_id)?;
        return Ok(ReplyKind::EchoReply);
    }

    if icmp_type == IcmpTypes::TimeExceeded {
        // Unused word, then the quoted IP header and at least 8 bytes of its payload
        let inner = &icmp[ICMP_HEADER_SIZE..];
        let inner_ip = Ipv4Packet::new(inner).ok_or(XtrError::PacketTooShort {
            expected: ICMP_HEADER_SIZE + IPV4_MIN_HEADER_SIZE,
            actual: icmp.len(),
        })?;
        if inner_ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
            return Err(XtrError::PacketMismatch);
        }
        let quoted = strip_ipv4_header(inner)?;
        check_quoted_request(quoted, IcmpTypes::EchoRequest.0, echo_id)?;
        return Ok(ReplyKind::TimeExceeded);
    }

    Err(XtrError::PacketMismatch)
}

fn classify_v6(icmp: &[u8], echo_id: Option<u16>) -> Result<ReplyKind, XtrError> {
    let packet = Icmpv6Packet::new(icmp).ok_or(XtrError::PacketTooShort {
        expected: ICMP_HEADER_SIZE,
        actual: icmp.len(),
    })?;
    let icmp_type = packet.get_icmpv6_type();

    if icmp_type == Icmpv6Types::EchoReply {
        check_echo_id(icmp, echo_id)?;
        return Ok(ReplyKind::EchoReply);
    }

    if icmp_type == Icmpv6Types::TimeExceeded {
        let inner = &icmp[ICMP_HEADER_SIZE..];
        let inner_ip = Ipv6Packet::new(inner).ok_or(XtrError::PacketTooShort {
            expected: ICMP_HEADER_SIZE + IPV6_HEADER_SIZE,
            actual: icmp.len(),
        })?;
        if inner_ip.get_next_header() != IpNextHeaderProtocols::Icmpv6 {
            return Err(XtrError::PacketMismatch);
        }
        check_quoted_request(
            &inner[IPV6_HEADER_SIZE..],
            Icmpv6Types::EchoRequest.0,
            echo_id,
        )?;
        return Ok(ReplyKind::TimeExceeded);
    }

    Err(XtrError::PacketMismatch)
}

fn check_quoted_request(
    quoted: &[u8],
    request_type: u8,
    echo_id: Option<u16>,
) -> Result<(), XtrError> {
    if quoted.len() < ICMP_HEADER_SIZE {
        return Err(XtrError::PacketTooShort {
            expected: ICMP_HEADER_SIZE,
            actual: quoted.len(),
        });
    }
    if quoted[0] != request_type {
        return Err(XtrError::PacketMismatch);
    }
    check_echo_id(quoted, echo_id)
}

/// Echo identifier sits at bytes 4-5 of an echo header.
fn check_echo_id(echo: &[u8], echo_id: Option<u16>) -> Result<(), XtrError> {
    let Some(expected) = echo_id else {
        return Ok(());
    };
    let id = u16::from_be_bytes([echo[4], echo[5]]);
    if id != expected {
        tracing::trace!(expected, actual = id, "Ignored ICMP message with different echo ID");
        return Err(XtrError::PacketMismatch);
    }
    Ok(())
}
