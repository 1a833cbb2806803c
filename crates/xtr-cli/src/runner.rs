//! Runner that orchestrates a dual-stack run.

use crate::dns::SystemResolver;
use tracing::{debug, info, warn};
use xtr_core::{
    spawn_walk, Correlator, Destination, Destinations, Family, NameResolver, ProbeParams, Report,
    RouteStream, TraceProgress, XtrConfig, XtrError,
};
use xtr_icmp::{process_echo_id, IcmpTransport};

type Opened = Option<(Destination, Result<IcmpTransport, XtrError>)>;

fn open_transport(destination: Option<Destination>, echo_id: u16) -> Opened {
    destination.map(|dest| {
        let family = dest.family();
        let transport = IcmpTransport::open(family, echo_id);
        if let Err(e) = &transport {
            warn!(%family, error = %e, "Failed to open ICMP socket");
        }
        (dest, transport)
    })
}

fn start_walk(
    destination: Destination,
    transport: Result<IcmpTransport, XtrError>,
    params: &ProbeParams,
) -> RouteStream {
    match transport {
        Ok(transport) => {
            debug!(
                family = %destination.family(),
                %destination,
                mode = ?transport.mode(),
                "Starting walk"
            );
            spawn_walk(transport, destination, params.clone())
        }
        // The failure is reported in that family's section.
        Err(e) => RouteStream::failed(destination, e),
    }
}

/// Starts one walk per resolved family.
///
/// Fails only when no resolved family could open a socket.
pub fn start_walks(
    destinations: &Destinations,
    echo_id: u16,
    params: &ProbeParams,
) -> Result<(Option<RouteStream>, Option<RouteStream>), XtrError> {
    let v4 = open_transport(destinations.v4, echo_id);
    let v6 = open_transport(destinations.v6, echo_id);

    match (v4, v6) {
        (Some((_, Err(e))), None | Some((_, Err(_)))) | (None, Some((_, Err(e)))) => Err(e),
        (v4, v6) => Ok((
            v4.map(|(dest, transport)| start_walk(dest, transport, params)),
            v6.map(|(dest, transport)| start_walk(dest, transport, params)),
        )),
    }
}

/// Resolves the target, probes every family it has an address in, and
/// correlates the two paths.
///
/// `on_progress` follows the IPv4 section hop by hop, then the IPv6 section.
pub async fn run_xtr<F>(config: XtrConfig, mut on_progress: F) -> Result<Report, XtrError>
where
    F: FnMut(TraceProgress<'_>),
{
    config.params.validate()?;

    let resolver = SystemResolver::new();
    let addrs = resolver.resolve_forward(&config.hostname).await?;
    let destinations = Destinations::pick(&addrs);
    if destinations.is_empty() {
        return Err(XtrError::NoAddresses {
            hostname: config.hostname,
        });
    }

    info!(
        target = %config.hostname,
        v4 = ?destinations.v4.map(|d| d.addr()),
        v6 = ?destinations.v6.map(|d| d.addr()),
        max_hops = config.params.max_hops,
        attempts = config.params.attempts,
        "Starting xtr"
    );

    let echo_id = process_echo_id();
    let (v4, v6) = start_walks(&destinations, echo_id, &config.params)?;

    let mut correlator = Correlator::new(resolver);
    for (family, stream) in [(Family::V4, v4), (Family::V6, v6)] {
        let trace = correlator
            .trace_family(family, stream, &mut on_progress)
            .await;
        if let Some(error) = trace.error() {
            debug!(%family, %error, "Walk did not reach its destination");
        }
    }

    let report = correlator.finish();
    debug!(shared = report.shared, "Correlation finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtr_core::OutputFormat;

    #[tokio::test]
    async fn test_invalid_params_rejected_before_probing() {
        let config = XtrConfig {
            hostname: "192.0.2.1".to_string(),
            params: ProbeParams {
                attempts: 0,
                ..Default::default()
            },
            format: OutputFormat::Text,
        };

        let mut events = 0;
        let result = run_xtr(config, |_| events += 1).await;

        assert!(matches!(result, Err(XtrError::InvalidParams(_))));
        assert_eq!(events, 0);
    }

    #[test]
    fn test_no_destinations_starts_nothing() {
        let (v4, v6) =
            start_walks(&Destinations::default(), 1, &ProbeParams::default()).unwrap();
        assert!(v4.is_none());
        assert!(v6.is_none());
    }
}
