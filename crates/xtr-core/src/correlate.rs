//! Dual-stack correlation.
//!
//! Drains the IPv4 and IPv6 walks, names every responder through reverse
//! DNS and tracks the hostnames that answer on both paths.
//!
//! The table is deliberately one-directional: the IPv4 path creates entries
//! and the IPv6 path can only complete them. A hostname first seen on the
//! IPv6 path is never tracked.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tracing::{debug, trace};

use crate::execution::RouteStream;
use crate::report::{
    FamilyTrace, Report, SharedHop, TraceHeader, TraceLine, TraceProgress, TraceStatus,
};
use crate::{Family, NameResolver, ProbeOutcome, RouteEvent};

/// Responder addresses recorded under one hostname.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelationEntry {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl CorrelationEntry {
    pub fn is_complete(&self) -> bool {
        self.ipv4.is_some() && self.ipv6.is_some()
    }
}

/// Hostname to responder addresses, plus the shared-hop count.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: BTreeMap<String, CorrelationEntry>,
    shared: usize,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an IPv4 responder, creating the entry or overwriting its IPv4 address.
    pub fn record_v4(&mut self, hostname: &str, addr: Ipv4Addr) {
        let entry = self.entries.entry(hostname.to_string()).or_default();
        let was_complete = entry.is_complete();
        entry.ipv4 = Some(addr);
        if !was_complete && entry.is_complete() {
            self.shared += 1;
        }
    }

    /// Records an IPv6 responder against an existing entry.
    ///
    /// Returns false, recording nothing, if the hostname was never seen on
    /// the IPv4 path.
    pub fn record_v6(&mut self, hostname: &str, addr: Ipv6Addr) -> bool {
        let Some(entry) = self.entries.get_mut(hostname) else {
            return false;
        };
        let was_complete = entry.is_complete();
        entry.ipv6 = Some(addr);
        if !was_complete && entry.is_complete() {
            self.shared += 1;
        }
        true
    }

    /// Number of entries holding both addresses.
    pub fn shared(&self) -> usize {
        self.shared
    }

    /// Every complete entry, ordered by hostname.
    pub fn shared_hops(&self) -> Vec<SharedHop> {
        self.entries
            .iter()
            .filter_map(|(hostname, entry)| match (entry.ipv4, entry.ipv6) {
                (Some(ipv4), Some(ipv6)) => Some(SharedHop {
                    hostname: hostname.clone(),
                    ipv4,
                    ipv6,
                }),
                _ => None,
            })
            .collect()
    }
}

/// Strips the root label and anything that could act as a terminal escape.
pub(crate) fn clean_hostname(name: &str) -> Option<String> {
    let cleaned: String = name
        .trim_end_matches('.')
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Consumes both walks and builds the report.
pub struct Correlator<R> {
    resolver: R,
    table: CorrelationTable,
    v4: Option<FamilyTrace>,
    v6: Option<FamilyTrace>,
}

impl<R: NameResolver> Correlator<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            table: CorrelationTable::new(),
            v4: None,
            v6: None,
        }
    }

    /// Drains one family's walk in emission order and returns its trace section.
    ///
    /// `None` stands for a family the target has no address in. `on_progress`
    /// sees the header first, then every hop as soon as it is named, then the
    /// finished section.
    pub async fn trace_family<F>(
        &mut self,
        family: Family,
        stream: Option<RouteStream>,
        mut on_progress: F,
    ) -> &FamilyTrace
    where
        F: FnMut(TraceProgress<'_>),
    {
        let trace = match stream {
            Some(stream) => self.drain(family, stream, &mut on_progress).await,
            None => {
                let trace = FamilyTrace::not_probed(family);
                on_progress(TraceProgress::Started(trace.header()));
                trace
            }
        };
        let slot = match family {
            Family::V4 => &mut self.v4,
            Family::V6 => &mut self.v6,
        };
        let trace = slot.insert(trace);
        on_progress(TraceProgress::Finished(trace));
        trace
    }

    async fn drain<F>(
        &mut self,
        family: Family,
        mut stream: RouteStream,
        on_progress: &mut F,
    ) -> FamilyTrace
    where
        F: FnMut(TraceProgress<'_>),
    {
        let destination = stream.destination().addr();
        on_progress(TraceProgress::Started(TraceHeader {
            family,
            destination: Some(destination),
        }));
        let mut hops = Vec::new();

        let status = loop {
            let record = match stream.next().await {
                Some(RouteEvent::Hop(record)) => record,
                Some(RouteEvent::End(status)) => break TraceStatus::from(status),
                None => {
                    break TraceStatus::TransportError {
                        message: "route stream already drained".into(),
                    }
                }
            };

            let line = match record.outcome {
                ProbeOutcome::TimedOut => TraceLine {
                    hop: record.hop,
                    ip_address: None,
                    hostname: None,
                    reply: None,
                },
                ProbeOutcome::Responded { addr, kind } => {
                    let hostname = self.hostname(addr).await;
                    if let Some(hostname) = &hostname {
                        self.correlate(family, hostname, addr);
                    }
                    TraceLine {
                        hop: record.hop,
                        ip_address: Some(addr),
                        hostname,
                        reply: Some(kind),
                    }
                }
            };
            on_progress(TraceProgress::Hop(&line));
            hops.push(line);
        };

        FamilyTrace {
            family,
            destination: Some(destination),
            hops,
            status,
        }
    }

    /// First reverse DNS name of `addr`, if any.
    async fn hostname(&self, addr: IpAddr) -> Option<String> {
        match self.resolver.resolve_reverse(addr).await {
            Ok(names) => names.first().and_then(|name| clean_hostname(name)),
            Err(e) => {
                trace!(ip = %addr, error = %e, "Reverse lookup failed");
                None
            }
        }
    }

    fn correlate(&mut self, family: Family, hostname: &str, addr: IpAddr) {
        match (family, addr) {
            (Family::V4, IpAddr::V4(v4)) => self.table.record_v4(hostname, v4),
            (Family::V6, IpAddr::V6(v6)) => {
                if !self.table.record_v6(hostname, v6) {
                    trace!(hostname, ip = %v6, "Hostname not on the IPv4 path");
                }
            }
            _ => debug!(%family, ip = %addr, "Responder address does not match walk family"),
        }
    }

    /// Finishes correlation. Families never traced are reported as not probed.
    pub fn finish(self) -> Report {
        Report {
            v4: self.v4.unwrap_or_else(|| FamilyTrace::not_probed(Family::V4)),
            v6: self.v6.unwrap_or_else(|| FamilyTrace::not_probed(Family::V6)),
            shared: self.table.shared(),
            shared_hops: self.table.shared_hops(),
        }
    }
}

/// Drains the IPv4 walk, then the IPv6 walk, and returns the report.
pub async fn correlate<R: NameResolver>(
    resolver: R,
    v4: Option<RouteStream>,
    v6: Option<RouteStream>,
) -> Report {
    let mut correlator = Correlator::new(resolver);
    correlator.trace_family(Family::V4, v4, |_| {}).await;
    correlator.trace_family(Family::V6, v6, |_| {}).await;
    correlator.finish()
}

#[cfg(test)]
impl CorrelationTable {
    fn get(&self, hostname: &str) -> Option<&CorrelationEntry> {
        self.entries.get(hostname)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
