//! Probe execution.
//!
//! A walk probes one hop at a time; each hop is a single probe followed by
//! a bounded wait for its reply.

pub mod probe;
pub mod walk;

pub use probe::probe_hop;
pub use walk::{spawn_walk, walk_route, RouteStream};
