//! Hop-by-hop route walking.
//!
//! Probes hop limits 1, 2, 3, ... one at a time and streams every hop to the
//! consumer as soon as it is known.

use crate::execution::probe_hop;
use crate::{
    Destination, EchoTransport, HopRecord, ProbeParams, RouteEvent, RouteResult, RouteStatus,
    XtrError,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Walks the route to `destination`, sending every hop and then exactly one
/// terminal marker to `events`.
///
/// Hop `n + 1` is only probed once hop `n` has an outcome. Timed-out hops are
/// reported and skipped. The walk ends when the destination itself answers,
/// when `params.max_hops` is exhausted, or on the first transport error.
/// If the receiving side goes away the walk stops early.
pub async fn walk_route<T: EchoTransport + ?Sized>(
    transport: &mut T,
    destination: Destination,
    params: &ProbeParams,
    events: &mpsc::Sender<RouteEvent>,
) {
    let family = transport.family();

    for hop in 1..=params.max_hops {
        let outcome = match probe_hop(transport, destination, hop, params).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%family, hop, error = %e, "Aborting walk");
                let _ = events.send(RouteEvent::End(RouteStatus::TransportError(e))).await;
                return;
            }
        };

        let reached = outcome.responder() == Some(destination.addr());
        if events
            .send(RouteEvent::Hop(HopRecord { hop, outcome }))
            .await
            .is_err()
        {
            debug!(%family, hop, "Route consumer went away, stopping");
            return;
        }

        if reached {
            debug!(%family, hop, "Reached destination, stopping");
            let _ = events.send(RouteEvent::End(RouteStatus::ReachedDestination)).await;
            return;
        }
    }

    debug!(%family, max_hops = params.max_hops, "Exceeded hop budget");
    let _ = events
        .send(RouteEvent::End(RouteStatus::ExceededHopBudget {
            max_hops: params.max_hops,
        }))
        .await;
}

/// Runs [`walk_route`] on its own task and returns the stream of its events.
pub fn spawn_walk<T>(mut transport: T, destination: Destination, params: ProbeParams) -> RouteStream
where
    T: EchoTransport + 'static,
{
    let (tx, rx) = mpsc::channel(params.max_hops as usize + 1);
    tokio::spawn(async move {
        walk_route(&mut transport, destination, &params, &tx).await;
    });
    RouteStream::new(destination, rx)
}

/// Ordered, finite event stream of one walk.
pub struct RouteStream {
    destination: Destination,
    events: mpsc::Receiver<RouteEvent>,
    finished: bool,
}

impl RouteStream {
    pub fn new(destination: Destination, events: mpsc::Receiver<RouteEvent>) -> Self {
        Self {
            destination,
            events,
            finished: false,
        }
    }

    /// A stream for a walk that could not start: just the terminal marker.
    pub fn failed(destination: Destination, error: XtrError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(RouteEvent::End(RouteStatus::TransportError(error)));
        Self::new(destination, rx)
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Returns the next event, or `None` after the terminal marker.
    ///
    /// A walk that disappears without a terminal marker is reported as a
    /// transport error so the stream always ends with exactly one marker.
    pub async fn next(&mut self) -> Option<RouteEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv().await {
            Some(RouteEvent::Hop(record)) => Some(RouteEvent::Hop(record)),
            Some(RouteEvent::End(status)) => {
                self.finished = true;
                Some(RouteEvent::End(status))
            }
            None => {
                self.finished = true;
                Some(RouteEvent::End(RouteStatus::TransportError(
                    XtrError::Internal("route stream closed without a terminal marker".into()),
                )))
            }
        }
    }

    /// Drains the stream into a [`RouteResult`].
    pub async fn collect(mut self) -> RouteResult {
        let mut hops = Vec::new();
        let status = loop {
            match self.next().await {
                Some(RouteEvent::Hop(record)) => hops.push(record),
                Some(RouteEvent::End(status)) => break status,
                None => {
                    break RouteStatus::TransportError(XtrError::Internal(
                        "route stream already drained".into(),
                    ))
                }
            }
        };

        RouteResult {
            destination: self.destination,
            hops,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedTransport};
    use crate::{Family, ProbeOutcome};
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_destination() {
        let dest = Destination::new(ip("192.0.2.99"));
        let transport = ScriptedTransport::path(Family::V4, &[Some(ip("192.0.2.1"))])
            .hop(2, Script::echo_reply(dest.addr()))
            .hop(3, Script::time_exceeded(ip("192.0.2.3")));

        let result = spawn_walk(transport, dest, ProbeParams::default()).collect().await;

        assert_eq!(result.hops.len(), 2);
        assert_eq!(result.hops[1].outcome.responder(), Some(dest.addr()));
        assert!(matches!(result.status, RouteStatus::ReachedDestination));
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_exceeded_from_destination_address_also_ends_walk() {
        // Termination is decided by address, not by reply kind.
        let dest = Destination::new(ip("192.0.2.99"));
        let transport = ScriptedTransport::path(Family::V4, &[Some(dest.addr())]);

        let result = spawn_walk(transport, dest, ProbeParams::default()).collect().await;

        assert_eq!(result.hops.len(), 1);
        assert!(matches!(result.status, RouteStatus::ReachedDestination));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_aborts_walk() {
        let dest = Destination::new(ip("2001:db8::99"));
        let transport = ScriptedTransport::path(Family::V6, &[Some(ip("2001:db8::1")), None])
            .hop(3, Script::ReadFails);

        let result = spawn_walk(transport, dest, ProbeParams::default()).collect().await;

        assert_eq!(result.hops.len(), 2);
        assert_eq!(result.hops[1].outcome, ProbeOutcome::TimedOut);
        assert!(matches!(
            result.status,
            RouteStatus::TransportError(XtrError::ReadFailed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_synthesises_terminal_marker() {
        let (tx, rx) = mpsc::channel(4);
        let dest = Destination::new(ip("192.0.2.99"));
        tx.send(RouteEvent::Hop(HopRecord {
            hop: 1,
            outcome: ProbeOutcome::TimedOut,
        }))
        .await
        .unwrap();
        drop(tx);

        let mut stream = RouteStream::new(dest, rx);
        assert!(matches!(stream.next().await, Some(RouteEvent::Hop(_))));
        assert!(matches!(
            stream.next().await,
            Some(RouteEvent::End(RouteStatus::TransportError(XtrError::Internal(_))))
        ));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stream_is_only_a_terminal_marker() {
        let dest = Destination::new(ip("2001:db8::99"));
        let result = RouteStream::failed(dest, XtrError::Internal("no socket".into()))
            .collect()
            .await;

        assert!(result.hops.is_empty());
        assert_eq!(result.destination, dest);
        assert!(matches!(result.status, RouteStatus::TransportError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_walk_stops_when_consumer_is_gone() {
        let dest = Destination::new(ip("192.0.2.99"));
        let mut transport = ScriptedTransport::new(Family::V4);
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        walk_route(&mut transport, dest, &ProbeParams::default(), &tx).await;

        assert_eq!(transport.sent(), &[1]);
    }
}
