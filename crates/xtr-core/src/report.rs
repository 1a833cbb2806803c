//! Report types and their text rendering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{Family, ReplyKind, RouteStatus, XtrError};

/// One rendered hop of a trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLine {
    /// Hop limit the probe was sent with.
    pub hop: u8,
    /// The address that responded (None if the hop timed out).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<IpAddr>,
    /// First reverse DNS name of the responder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyKind>,
}

impl fmt::Display for TraceLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.ip_address, &self.hostname) {
            (Some(ip), Some(hostname)) => write!(f, "{:2}: {} ({})", self.hop, hostname, ip),
            (Some(ip), None) => write!(f, "{:2}: {}", self.hop, ip),
            (None, _) => write!(f, "{:2}: *", self.hop),
        }
    }
}

/// How a family's trace ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TraceStatus {
    ReachedDestination,
    ExceededHopBudget { max_hops: u8 },
    TransportError { message: String },
    /// The target has no address in this family.
    NotProbed,
}

impl From<RouteStatus> for TraceStatus {
    fn from(status: RouteStatus) -> Self {
        match status {
            RouteStatus::ReachedDestination => TraceStatus::ReachedDestination,
            RouteStatus::ExceededHopBudget { max_hops } => TraceStatus::ExceededHopBudget { max_hops },
            RouteStatus::TransportError(e) => TraceStatus::TransportError {
                message: e.to_string(),
            },
        }
    }
}

/// The trace section of one family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTrace {
    pub family: Family,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<IpAddr>,
    pub hops: Vec<TraceLine>,
    #[serde(flatten)]
    pub status: TraceStatus,
}

impl FamilyTrace {
    pub fn header(&self) -> TraceHeader {
        TraceHeader {
            family: self.family,
            destination: self.destination,
        }
    }

    /// A section for a family the target has no address in.
    pub fn not_probed(family: Family) -> Self {
        Self {
            family,
            destination: None,
            hops: Vec::new(),
            status: TraceStatus::NotProbed,
        }
    }

    /// The error to report for this walk, if it did not reach its destination.
    pub fn error(&self) -> Option<String> {
        match &self.status {
            TraceStatus::ReachedDestination | TraceStatus::NotProbed => None,
            TraceStatus::ExceededHopBudget { max_hops } => {
                Some(XtrError::ExceededHopBudget { max_hops: *max_hops }.to_string())
            }
            TraceStatus::TransportError { message } => Some(message.clone()),
        }
    }
}

impl fmt::Display for FamilyTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for line in &self.hops {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)
    }
}

/// First line of a family's section, known before any hop is probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    pub family: Family,
    pub destination: Option<IpAddr>,
}

impl fmt::Display for TraceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.destination {
            Some(dest) => write!(f, "{}: {}", self.family, dest),
            None => write!(f, "{}: none", self.family),
        }
    }
}

/// Incremental view of a family's section while its walk is drained.
#[derive(Debug, Clone, Copy)]
pub enum TraceProgress<'a> {
    Started(TraceHeader),
    Hop(&'a TraceLine),
    Finished(&'a FamilyTrace),
}

/// A router seen on both paths under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedHop {
    pub hostname: String,
    pub ipv4: Ipv4Addr,
    pub ipv6: Ipv6Addr,
}

impl fmt::Display for SharedHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) ({})", self.hostname, self.ipv4, self.ipv6)
    }
}

/// Final output of a dual-stack run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub v4: FamilyTrace,
    pub v6: FamilyTrace,
    /// Number of shared hops.
    pub shared: usize,
    pub shared_hops: Vec<SharedHop>,
}

impl Report {
    /// Serializes the report to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Renders the closing section: the shared count and every shared hop.
    pub fn summary(&self) -> String {
        let mut out = format!("xtr: {}\n", self.shared);
        if self.shared > 0 {
            for hop in &self.shared_hops {
                out.push_str(&format!("{}\n", hop));
            }
        }
        out
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.v4, self.v6, self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(hop: u8, ip: Option<&str>, hostname: Option<&str>) -> TraceLine {
        TraceLine {
            hop,
            ip_address: ip.map(|s| s.parse().unwrap()),
            hostname: hostname.map(String::from),
            reply: ip.map(|_| ReplyKind::TimeExceeded),
        }
    }

    #[test]
    fn test_trace_line_formats() {
        assert_eq!(
            line(1, Some("192.0.2.1"), Some("gw.example")).to_string(),
            " 1: gw.example (192.0.2.1)"
        );
        assert_eq!(line(5, Some("192.0.2.5"), None).to_string(), " 5: 192.0.2.5");
        assert_eq!(line(12, None, None).to_string(), "12: *");
    }

    #[test]
    fn test_report_text() {
        let report = Report {
            v4: FamilyTrace {
                family: Family::V4,
                destination: Some("192.0.2.99".parse().unwrap()),
                hops: vec![
                    line(1, Some("192.0.2.1"), Some("core-router.example")),
                    line(2, None, None),
                ],
                status: TraceStatus::ReachedDestination,
            },
            v6: FamilyTrace::not_probed(Family::V6),
            shared: 1,
            shared_hops: vec![SharedHop {
                hostname: "core-router.example".into(),
                ipv4: "192.0.2.1".parse().unwrap(),
                ipv6: "2001:db8::1".parse().unwrap(),
            }],
        };

        let expected = "v4: 192.0.2.99\n \
                        1: core-router.example (192.0.2.1)\n \
                        2: *\n\
                        \n\
                        v6: none\n\
                        \n\
                        xtr: 1\n\
                        core-router.example (192.0.2.1) (2001:db8::1)\n";
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn test_summary_without_shared_hops() {
        let report = Report {
            v4: FamilyTrace::not_probed(Family::V4),
            v6: FamilyTrace::not_probed(Family::V6),
            shared: 0,
            shared_hops: Vec::new(),
        };
        assert_eq!(report.summary(), "xtr: 0\n");
    }

    #[test]
    fn test_family_trace_error() {
        let mut trace = FamilyTrace::not_probed(Family::V4);
        assert_eq!(trace.error(), None);

        trace.status = TraceStatus::ExceededHopBudget { max_hops: 64 };
        assert_eq!(trace.error().as_deref(), Some("exceeded max hops: 64"));
        assert_eq!(
            trace.error(),
            Some(XtrError::ExceededHopBudget { max_hops: 64 }.to_string())
        );
    }

    #[test]
    fn test_exceeded_budget_status_from_walk() {
        let status = TraceStatus::from(RouteStatus::ExceededHopBudget { max_hops: 3 });
        assert_eq!(status, TraceStatus::ExceededHopBudget { max_hops: 3 });
    }

    #[test]
    fn test_header_formats() {
        let mut trace = FamilyTrace::not_probed(Family::V6);
        assert_eq!(trace.header().to_string(), "v6: none");

        trace.destination = Some("2001:db8::99".parse().unwrap());
        assert_eq!(trace.header().to_string(), "v6: 2001:db8::99");
    }

    #[test]
    fn test_report_json() {
        let mut v4 = FamilyTrace::not_probed(Family::V4);
        v4.destination = Some("192.0.2.99".parse().unwrap());
        v4.hops.push(line(1, Some("192.0.2.1"), None));
        v4.status = TraceStatus::ExceededHopBudget { max_hops: 1 };
        let report = Report {
            v4,
            v6: FamilyTrace::not_probed(Family::V6),
            shared: 0,
            shared_hops: Vec::new(),
        };

        let json = report.to_json().unwrap();
        assert!(json.contains("\"family\": \"v4\""));
        assert!(json.contains("\"status\": \"exceeded_hop_budget\""));
        assert!(json.contains("\"max_hops\": 1"));
        assert!(json.contains("\"status\": \"not_probed\""));

        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
