//! Seams between the engine and the outside world.

use crate::{Family, Reply, XtrError};
use async_trait::async_trait;
use std::net::IpAddr;
use tokio::time::Instant;

/// Sends Echo probes and classifies what comes back, for one address family.
///
/// Each walk owns its transport exclusively.
#[async_trait]
pub trait EchoTransport: Send {
    /// Returns the family this transport probes.
    fn family(&self) -> Family;

    /// Sends one Echo Request to `destination` with the given hop limit.
    async fn send_probe(&mut self, destination: IpAddr, hop_limit: u8) -> Result<(), XtrError>;

    /// Receives one inbound packet, waiting at most until `deadline`.
    ///
    /// Returns `Ok(None)` once the deadline has passed.
    /// Returns a retryable error for packets that are not an answer to this run.
    /// Any other `Err` is fatal for the walk.
    async fn receive(&mut self, deadline: Instant) -> Result<Option<Reply>, XtrError>;
}

/// Forward and reverse name resolution.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolves a hostname to its addresses, in resolver order.
    async fn resolve_forward(&self, hostname: &str) -> Result<Vec<IpAddr>, XtrError>;

    /// Resolves an address to its hostnames, in resolver order.
    async fn resolve_reverse(&self, addr: IpAddr) -> Result<Vec<String>, XtrError>;
}
