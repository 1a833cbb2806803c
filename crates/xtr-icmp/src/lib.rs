//! ICMP echo transport for xtr.
//!
//! Opens one ICMP (or ICMPv6) socket per family, sends Echo Requests with a
//! chosen hop limit and classifies what comes back.

pub mod packet;
pub mod socket;
mod transport;

pub use packet::{classify_reply, create_echo_request};
pub use socket::SocketMode;
pub use transport::{process_echo_id, IcmpTransport};
