//! In-memory transport and resolver with scripted behavior.
//!
//! These stand in for sockets and DNS so walks and correlation can be
//! exercised deterministically.

use crate::{EchoTransport, Family, NameResolver, Reply, ReplyKind, XtrError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Gap between two unrelated packets of [`Script::Flood`].
pub const FLOOD_INTERVAL: Duration = Duration::from_millis(10);

/// What happens after a probe is sent for one hop.
#[derive(Debug, Clone)]
pub enum Script {
    /// Nothing comes back before the deadline.
    Silent,
    /// One accepted reply.
    Reply(Reply),
    /// `count` unrelated packets arrive, then `then` plays out.
    Noise { count: usize, then: Box<Script> },
    /// Unrelated packets keep arriving, one every [`FLOOD_INTERVAL`], past the deadline.
    Flood,
    /// The send itself fails.
    SendFails,
    /// The socket read fails.
    ReadFails,
}

impl Script {
    pub fn time_exceeded(addr: IpAddr) -> Self {
        Script::Reply(Reply {
            addr,
            kind: ReplyKind::TimeExceeded,
        })
    }

    pub fn echo_reply(addr: IpAddr) -> Self {
        Script::Reply(Reply {
            addr,
            kind: ReplyKind::EchoReply,
        })
    }

    pub fn noise_then(count: usize, then: Script) -> Self {
        Script::Noise {
            count,
            then: Box::new(then),
        }
    }
}

enum Step {
    Reply(Reply),
    Noise,
    Flood,
    ReadFails,
}

/// Transport whose replies are scripted per hop limit. Unscripted hops are silent.
///
/// Silence lasts until the receive deadline, on tokio's clock, so tests can
/// run it under a paused runtime.
pub struct ScriptedTransport {
    family: Family,
    scripts: HashMap<u8, Script>,
    pending: VecDeque<Step>,
    sent: Vec<u8>,
}

impl ScriptedTransport {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            scripts: HashMap::new(),
            pending: VecDeque::new(),
            sent: Vec::new(),
        }
    }

    /// Scripts the behavior for probes sent with `hop_limit`.
    pub fn hop(mut self, hop_limit: u8, script: Script) -> Self {
        self.scripts.insert(hop_limit, script);
        self
    }

    /// Scripts a path: entry `i` answers hop `i + 1` with Time Exceeded,
    /// `None` entries stay silent.
    pub fn path(family: Family, routers: &[Option<IpAddr>]) -> Self {
        routers
            .iter()
            .enumerate()
            .fold(Self::new(family), |transport, (i, router)| {
                let script = match router {
                    Some(addr) => Script::time_exceeded(*addr),
                    None => Script::Silent,
                };
                transport.hop(i as u8 + 1, script)
            })
    }

    /// Hop limits of every probe sent so far, in order.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    fn load(&mut self, script: &Script) {
        match script {
            Script::Silent | Script::SendFails => {}
            Script::Reply(reply) => self.pending.push_back(Step::Reply(*reply)),
            Script::Noise { count, then } => {
                for _ in 0..*count {
                    self.pending.push_back(Step::Noise);
                }
                self.load(then);
            }
            Script::Flood => self.pending.push_back(Step::Flood),
            Script::ReadFails => self.pending.push_back(Step::ReadFails),
        }
    }
}

#[async_trait]
impl EchoTransport for ScriptedTransport {
    fn family(&self) -> Family {
        self.family
    }

    async fn send_probe(&mut self, _destination: IpAddr, hop_limit: u8) -> Result<(), XtrError> {
        self.sent.push(hop_limit);
        self.pending.clear();

        let script = self.scripts.get(&hop_limit).cloned().unwrap_or(Script::Silent);
        if let Script::SendFails = script {
            return Err(XtrError::HopLimit {
                hop_limit,
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            });
        }
        self.load(&script);
        Ok(())
    }

    async fn receive(&mut self, deadline: Instant) -> Result<Option<Reply>, XtrError> {
        if let Some(Step::Flood) = self.pending.front() {
            tokio::time::sleep_until((Instant::now() + FLOOD_INTERVAL).min(deadline)).await;
            return Err(XtrError::PacketMismatch);
        }

        match self.pending.pop_front() {
            Some(Step::Reply(reply)) => Ok(Some(reply)),
            Some(Step::Noise) => Err(XtrError::PacketMismatch),
            Some(Step::ReadFails) => Err(XtrError::ReadFailed(std::io::Error::from(
                std::io::ErrorKind::ConnectionReset,
            ))),
            Some(Step::Flood) | None => {
                tokio::time::sleep_until(deadline).await;
                Ok(None)
            }
        }
    }
}

/// Resolver backed by fixed tables. Unknown names and addresses fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StubResolver {
    forward: HashMap<String, Vec<IpAddr>>,
    reverse: HashMap<IpAddr, Vec<String>>,
}

impl StubResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forward(mut self, hostname: &str, addrs: &[IpAddr]) -> Self {
        self.forward.insert(hostname.to_string(), addrs.to_vec());
        self
    }

    pub fn reverse(mut self, addr: IpAddr, names: &[&str]) -> Self {
        self.reverse
            .insert(addr, names.iter().map(|n| n.to_string()).collect());
        self
    }
}

#[async_trait]
impl NameResolver for StubResolver {
    async fn resolve_forward(&self, hostname: &str) -> Result<Vec<IpAddr>, XtrError> {
        self.forward
            .get(hostname)
            .cloned()
            .ok_or_else(|| XtrError::NoAddresses {
                hostname: hostname.to_string(),
            })
    }

    async fn resolve_reverse(&self, addr: IpAddr) -> Result<Vec<String>, XtrError> {
        self.reverse
            .get(&addr)
            .cloned()
            .ok_or_else(|| XtrError::DnsResolutionFailed {
                hostname: addr.to_string(),
                source: "no PTR record".into(),
            })
    }
}
