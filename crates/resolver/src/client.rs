//! Single-hop resolution against a fixed list of servers: random start
//! index, round-robin rotation, a retry budget of retries × servers, and
//! the UDP-specific truncation retry over TCP.

use crate::cache::{DnsCache, InMemoryCache};
use crate::endpoint;
use crate::message::{self, DnsResponse};
use crate::proxy::ProxyDispatcher;
use crate::transport::create_transport;
use ferric_dns_domain::{DnsProtocol, NameServer, RecordType, ResolveError};
use hickory_proto::op::Message;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ClientResolver {
    servers: Vec<NameServer>,
    protocol: DnsProtocol,
    retries: usize,
    timeout: Duration,
    prefer_ipv6: bool,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
}

impl ClientResolver {
    pub fn new(
        servers: Vec<NameServer>,
        protocol: DnsProtocol,
        retries: usize,
        timeout: Duration,
    ) -> Self {
        ClientResolver {
            servers,
            protocol,
            retries,
            timeout,
            prefer_ipv6: false,
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn ProxyDispatcher>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_prefer_ipv6(mut self, prefer_ipv6: bool) -> Self {
        self.prefer_ipv6 = prefer_ipv6;
        self
    }

    /// Builds a recursion-desired query for `(name, rtype)` and resolves it.
    /// This is the stub-resolver entry point for callers who just want to
    /// ask a full resolver.
    pub async fn query(
        &self,
        name: &str,
        rtype: RecordType,
    ) -> Result<DnsResponse, ResolveError> {
        let name = message::parse_name(name)?;
        let request = message::build_query(&name, rtype, true);
        self.resolve(request).await
    }

    /// Sends `request` to one of the configured servers, rotating through
    /// the list on failure until the retry budget runs out.
    pub async fn resolve(&self, mut request: Message) -> Result<DnsResponse, ResolveError> {
        if self.servers.is_empty() {
            return Err(ResolveError::InvalidNameServer(
                "empty server list".to_string(),
            ));
        }

        // A proxy that cannot carry UDP upgrades the whole call to TCP.
        let mut protocol = self.protocol;
        if protocol == DnsProtocol::Udp {
            if let Some(proxy) = &self.proxy {
                if !proxy.udp_available() {
                    debug!("Proxy without UDP support; upgrading to TCP");
                    protocol = DnsProtocol::Tcp;
                }
            }
        }

        // Working copy: endpoint resolution rewrites entries, and the
        // caller's list must never be touched.
        let mut servers = self.servers.clone();
        let mut index = rand::thread_rng().gen_range(0..servers.len());
        let budget = self.retries.max(1) * servers.len();
        let mut last_error: Option<ResolveError> = None;

        for _attempt in 0..budget {
            let i = index % servers.len();
            index += 1;

            if !servers[i].is_resolved(protocol) && self.proxy.is_none() {
                let fresh_cache: Arc<dyn DnsCache> = Arc::new(InMemoryCache::new());
                if let Err(e) = endpoint::resolve_endpoint(
                    &mut servers[i],
                    Some(fresh_cache),
                    None,
                    self.prefer_ipv6,
                    protocol,
                    self.retries,
                    self.timeout,
                )
                .await
                {
                    warn!(host = %servers[i].host, error = %e, "Failed to resolve name server");
                    last_error = Some(e);
                    continue;
                }
            }
            let server = servers[i].clone();

            request.set_id(message::fresh_id());
            let transport = match create_transport(&server, protocol, self.proxy.clone()) {
                Ok(transport) => transport,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };

            match transport.exchange(&request, self.timeout).await {
                Ok(response) => {
                    if response.truncated() && protocol == DnsProtocol::Udp {
                        debug!(server = %server, "Truncated UDP response; retrying over TCP");
                        request.set_id(message::fresh_id());
                        let tcp = match create_transport(
                            &server,
                            DnsProtocol::Tcp,
                            self.proxy.clone(),
                        ) {
                            Ok(transport) => transport,
                            Err(e) => {
                                last_error = Some(e);
                                continue;
                            }
                        };
                        match tcp.exchange(&request, self.timeout).await {
                            Ok(tcp_response) => {
                                return Ok(DnsResponse::new(
                                    tcp_response,
                                    server.to_string().into(),
                                    DnsProtocol::Tcp,
                                ));
                            }
                            Err(e) => {
                                last_error = Some(e);
                                continue;
                            }
                        }
                    }
                    return Ok(DnsResponse::new(
                        response,
                        server.to_string().into(),
                        protocol,
                    ));
                }
                Err(e) => {
                    debug!(server = %server, error = %e, "Query attempt failed");
                    last_error = Some(e);
                    continue;
                }
            }
        }

        Err(ResolveError::no_response(last_error))
    }
}
