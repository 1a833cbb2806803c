//! Single-hop probing.

use crate::{Destination, EchoTransport, ProbeOutcome, ProbeParams, XtrError};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Probes one hop and classifies the outcome.
///
/// Sends one Echo Request with `hop_limit` and reads replies until the
/// per-attempt timeout elapses. The first accepted reply wins. Packets the
/// transport rejects as unrelated are skipped.
///
/// `params.attempts` is the attempt budget, but a timed-out attempt is final:
/// no further probe is sent for the hop.
pub async fn probe_hop<T: EchoTransport + ?Sized>(
    transport: &mut T,
    destination: Destination,
    hop_limit: u8,
    params: &ProbeParams,
) -> Result<ProbeOutcome, XtrError> {
    if params.attempts == 0 {
        return Ok(ProbeOutcome::TimedOut);
    }

    debug!(
        family = %transport.family(),
        hop = hop_limit,
        "Sending probe"
    );
    transport.send_probe(destination.addr(), hop_limit).await?;

    let deadline = Instant::now() + params.timeout;
    loop {
        match transport.receive(deadline).await {
            Ok(Some(reply)) => {
                debug!(
                    family = %transport.family(),
                    hop = hop_limit,
                    ip = %reply.addr,
                    kind = ?reply.kind,
                    "Received reply"
                );
                return Ok(reply.into());
            }
            Ok(None) => {
                debug!(family = %transport.family(), hop = hop_limit, "Timeout waiting for reply");
                return Ok(ProbeOutcome::TimedOut);
            }
            Err(e) if e.is_retryable() => {
                trace!(error = %e, "Discarding packet");
                if Instant::now() >= deadline {
                    return Ok(ProbeOutcome::TimedOut);
                }
            }
            Err(e) => {
                debug!(hop = hop_limit, error = %e, "Fatal error during receive");
                return Err(e);
            }
        }
    }
}
