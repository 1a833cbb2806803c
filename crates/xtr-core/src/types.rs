//! Core types for path discovery.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::XtrError;

/// Payload carried by every Echo Request of a run.
pub const ECHO_PAYLOAD: &[u8] = b"xtr-echo";

/// IP address family a walk runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    V4,
    V6,
}

impl Family {
    /// Returns the family of the given address.
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::V4 => write!(f, "v4"),
            Family::V6 => write!(f, "v6"),
        }
    }
}

/// A resolved probe target for one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    addr: IpAddr,
}

impl Destination {
    pub fn new(addr: IpAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn family(&self) -> Family {
        Family::of(&self.addr)
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.addr.fmt(f)
    }
}

/// Destinations picked from a forward lookup, at most one per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Destinations {
    pub v4: Option<Destination>,
    pub v6: Option<Destination>,
}

impl Destinations {
    /// Takes the first address of each family, in resolver order.
    pub fn pick(addrs: &[IpAddr]) -> Self {
        let mut picked = Self::default();
        for addr in addrs {
            let slot = match addr {
                IpAddr::V4(_) => &mut picked.v4,
                IpAddr::V6(_) => &mut picked.v6,
            };
            if slot.is_none() {
                *slot = Some(Destination::new(*addr));
            }
            if picked.v4.is_some() && picked.v6.is_some() {
                break;
            }
        }
        picked
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_none() && self.v6.is_none()
    }
}

/// ICMP message kinds accepted as an answer to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// The probed address itself answered.
    EchoReply,
    /// A router on the path dropped the probe when its hop limit ran out.
    TimeExceeded,
}

/// A reply accepted by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub addr: IpAddr,
    pub kind: ReplyKind,
}

/// Classified result of probing one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Responded { addr: IpAddr, kind: ReplyKind },
    TimedOut,
}

impl ProbeOutcome {
    /// Address of the responder, if any.
    pub fn responder(&self) -> Option<IpAddr> {
        match self {
            ProbeOutcome::Responded { addr, .. } => Some(*addr),
            ProbeOutcome::TimedOut => None,
        }
    }
}

impl From<Reply> for ProbeOutcome {
    fn from(reply: Reply) -> Self {
        ProbeOutcome::Responded {
            addr: reply.addr,
            kind: reply.kind,
        }
    }
}

/// Outcome of one probed hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopRecord {
    /// Hop limit the probe was sent with, starting at 1.
    pub hop: u8,
    pub outcome: ProbeOutcome,
}

/// How a walk ended.
#[derive(Debug)]
pub enum RouteStatus {
    ReachedDestination,
    ExceededHopBudget { max_hops: u8 },
    TransportError(XtrError),
}

/// One item of a walk's output stream.
#[derive(Debug)]
pub enum RouteEvent {
    Hop(HopRecord),
    /// Terminal marker, always the last event of a walk.
    End(RouteStatus),
}

/// A fully drained walk.
#[derive(Debug)]
pub struct RouteResult {
    pub destination: Destination,
    pub hops: Vec<HopRecord>,
    pub status: RouteStatus,
}

/// Parameters for probing.
#[derive(Debug, Clone)]
pub struct ProbeParams {
    /// Highest hop limit to probe.
    pub max_hops: u8,
    /// Attempt budget per hop. Only the first attempt is ever sent.
    pub attempts: u32,
    /// How long to wait for a reply after each probe.
    pub timeout: Duration,
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            max_hops: 64,
            attempts: 3,
            timeout: Duration::from_secs(1),
        }
    }
}

impl ProbeParams {
    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), XtrError> {
        if self.max_hops == 0 {
            return Err(XtrError::InvalidParams("max hops must be at least 1".into()));
        }
        if self.attempts == 0 {
            return Err(XtrError::InvalidParams("attempts must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(XtrError::InvalidParams("timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// High-level run configuration.
#[derive(Debug, Clone)]
pub struct XtrConfig {
    /// Target hostname or IP address.
    pub hostname: String,
    pub params: ProbeParams,
    pub format: OutputFormat,
}
