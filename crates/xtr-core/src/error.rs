//! Error types for path discovery.

use std::net::IpAddr;
use thiserror::Error;

/// Main error type for xtr operations.
#[derive(Error, Debug)]
pub enum XtrError {
    // Socket/IO errors
    #[error("Failed to create {family} ICMP socket: {source}")]
    SocketCreation {
        family: crate::Family,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set hop limit {hop_limit}: {source}")]
    HopLimit {
        hop_limit: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to {addr} failed: {source}")]
    WriteFailed {
        addr: IpAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Read failed: {0}")]
    ReadFailed(#[source] std::io::Error),

    // Packet errors
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Packet did not belong to this run")]
    PacketMismatch,

    // DNS errors
    #[error("Failed to resolve hostname {hostname}: {source}")]
    DnsResolutionFailed {
        hostname: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("No addresses found for {hostname}")]
    NoAddresses { hostname: String },

    // Configuration errors
    #[error("Invalid probe parameters: {0}")]
    InvalidParams(String),

    // Walk errors
    #[error("exceeded max hops: {max_hops}")]
    ExceededHopBudget { max_hops: u8 },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl XtrError {
    /// Returns true if the packet that caused this error should simply be skipped.
    ///
    /// An ICMP socket sees every ICMP message delivered to the host, so
    /// unrelated traffic is expected and must not end the hop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PacketMismatch | Self::MalformedPacket(_) | Self::PacketTooShort { .. }
        )
    }
}

/// Result type alias for xtr operations.
pub type XtrResult<T> = Result<T, XtrError>;
