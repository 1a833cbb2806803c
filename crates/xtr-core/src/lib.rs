//! Core types, traits, and algorithms for xtr.
//!
//! This crate holds everything that decides how a dual-stack path discovery
//! behaves, independent of sockets and DNS:
//!
//! - [`EchoTransport`] and [`NameResolver`] seams for I/O
//! - [`execution::probe_hop`] and [`execution::walk_route`] for probing
//! - [`correlate::Correlator`] for matching the IPv4 and IPv6 paths
//! - [`XtrError`] for error handling
//! - [`report::Report`] for output

pub mod correlate;
pub mod error;
pub mod execution;
pub mod report;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
pub mod types;

pub use correlate::{correlate, CorrelationEntry, CorrelationTable, Correlator};
pub use error::{XtrError, XtrResult};
pub use execution::{probe_hop, spawn_walk, walk_route, RouteStream};
pub use report::{
    FamilyTrace, Report, SharedHop, TraceHeader, TraceLine, TraceProgress, TraceStatus,
};
pub use traits::{EchoTransport, NameResolver};
pub use types::{
    Destination, Destinations, Family, HopRecord, OutputFormat, ProbeOutcome, ProbeParams, Reply,
    ReplyKind, RouteEvent, RouteResult, RouteStatus, XtrConfig, ECHO_PAYLOAD,
};
