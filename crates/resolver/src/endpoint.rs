//! Resolving a name server's own address.
//!
//! A server named by domain label has no endpoint until something resolves
//! it. This runs the iterative resolver from the roots for the server's
//! A/AAAA and writes the result back into the `NameServer`. Returns a boxed
//! future because it re-enters the resolver that may call it.

use crate::cache::DnsCache;
use crate::iterative::IterativeResolver;
use crate::message::answer_addresses;
use crate::proxy::ProxyDispatcher;
use ferric_dns_domain::{DnsProtocol, NameServer, RecordType, ResolveError, ResolverConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use hickory_proto::op::{Message, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fills in `server.endpoint` if absent. On failure the endpoint stays
/// unset and the error propagates. `protocol` decides the port written and
/// whether a DoH URL is synthesized; the resolution itself iterates from
/// the roots over UDP.
pub fn resolve_endpoint<'a>(
    server: &'a mut NameServer,
    cache: Option<Arc<dyn DnsCache>>,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
    prefer_ipv6: bool,
    protocol: DnsProtocol,
    retries: usize,
    timeout: Duration,
) -> BoxFuture<'a, Result<(), ResolveError>> {
    async move {
        if server.endpoint.is_some() {
            return Ok(());
        }

        let config = ResolverConfig {
            protocol: DnsProtocol::Udp,
            ns_protocol: DnsProtocol::Udp,
            retries,
            timeout_ms: timeout.as_millis() as u64,
            prefer_ipv6,
            ..ResolverConfig::default()
        };
        let mut resolver = IterativeResolver::new(config);
        if let Some(cache) = cache {
            resolver = resolver.with_cache(cache);
        }
        if let Some(proxy) = proxy {
            resolver = resolver.with_proxy(proxy);
        }

        let rtype = if prefer_ipv6 {
            RecordType::Aaaa
        } else {
            RecordType::A
        };
        let mut response = resolver.resolve(&server.host, rtype).await?;

        // An AAAA question that came back empty falls back to A.
        if prefer_ipv6
            && response.message.response_code() == ResponseCode::NoError
            && answer_addresses(&response.message).is_empty()
        {
            response = resolver.resolve(&server.host, RecordType::A).await?;
        }

        if response.message.response_code() == ResponseCode::NXDomain {
            return Err(ResolveError::NxDomain {
                name: server.host.to_string(),
            });
        }

        match answer_addresses(&response.message).first() {
            Some(ip) => {
                let port = server.port_for(protocol);
                server.endpoint = Some(SocketAddr::new(*ip, port));
                if protocol.is_https() && server.doh_url.is_none() {
                    server.doh_url = Some(format!("https://{}/dns-query", server.host).into());
                }
                debug!(host = %server.host, endpoint = %server.endpoint.unwrap(), "Name server resolved");
                Ok(())
            }
            None => Err(ResolveError::NameServerUnresolved {
                host: server.host.to_string(),
            }),
        }
    }
    .boxed()
}

/// Writes the first A/AAAA of `answer` into `server`, honoring the frame's
/// protocol for the port and DoH URL. Returns false when the answer carries
/// no usable address.
pub(crate) fn install_endpoint(
    server: &mut NameServer,
    answer: &Message,
    protocol: DnsProtocol,
) -> bool {
    let Some(ip) = answer_addresses(answer).first().copied() else {
        return false;
    };
    let port = server.port_for(protocol);
    server.endpoint = Some(SocketAddr::new(ip, port));
    if protocol.is_https() && server.doh_url.is_none() {
        server.doh_url = Some(format!("https://{}/dns-query", server.host).into());
    }
    true
}
