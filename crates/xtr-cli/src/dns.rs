//! System DNS resolution.

use async_trait::async_trait;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use tracing::warn;
use xtr_core::{NameResolver, XtrError};

/// [`NameResolver`] backed by the system's DNS configuration.
pub struct SystemResolver {
    resolver: TokioAsyncResolver,
}

impl SystemResolver {
    /// Builds a resolver from the system configuration, falling back to the
    /// library defaults when it cannot be read.
    pub fn new() -> Self {
        let (config, mut opts) = read_system_conf().unwrap_or_else(|e| {
            warn!("Failed to read system DNS configuration, using defaults: {}", e);
            (ResolverConfig::default(), ResolverOpts::default())
        });
        // Both families are needed, not whichever answers first.
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameResolver for SystemResolver {
    async fn resolve_forward(&self, hostname: &str) -> Result<Vec<IpAddr>, XtrError> {
        // First check if it's already an IP address
        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }

        let lookup = self
            .resolver
            .lookup_ip(hostname)
            .await
            .map_err(|e| XtrError::DnsResolutionFailed {
                hostname: hostname.to_string(),
                source: Box::new(e),
            })?;

        let addrs: Vec<IpAddr> = lookup.iter().collect();
        if addrs.is_empty() {
            return Err(XtrError::NoAddresses {
                hostname: hostname.to_string(),
            });
        }
        Ok(addrs)
    }

    async fn resolve_reverse(&self, addr: IpAddr) -> Result<Vec<String>, XtrError> {
        let names = self
            .resolver
            .reverse_lookup(addr)
            .await
            .map_err(|e| XtrError::DnsResolutionFailed {
                hostname: addr.to_string(),
                source: Box::new(e),
            })?;

        Ok(names.iter().map(|name| name.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[tokio::test]
    async fn test_resolve_ip_address() {
        let resolver = SystemResolver::new();

        let v4 = resolver.resolve_forward("8.8.8.8").await.unwrap();
        assert_eq!(v4, vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))]);

        let v6 = resolver.resolve_forward("2001:db8::1").await.unwrap();
        assert_eq!(
            v6,
            vec![IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))]
        );
    }
}
