//! UDP transport (RFC 1035 §4.2.1). Messages travel unframed; a truncated
//! response (TC bit) is retried over TCP by the client resolver, not here.

use super::{map_io_error, timeout_error, DnsTransport};
use crate::message;
use crate::proxy::ProxyDispatcher;
use async_trait::async_trait;
use ferric_dns_domain::{DnsProtocol, NameServer, ResolveError};
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Maximum response size we accept with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

pub struct UdpTransport {
    addr: Option<SocketAddr>,
    host: Arc<str>,
    port: u16,
    display: String,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
}

impl UdpTransport {
    pub fn new(
        server: &NameServer,
        proxy: Option<Arc<dyn ProxyDispatcher>>,
    ) -> Result<Self, ResolveError> {
        let addr = server.addr_for(DnsProtocol::Udp);
        if addr.is_none() && proxy.is_none() {
            return Err(ResolveError::NameServerUnresolved {
                host: server.host.to_string(),
            });
        }
        Ok(UdpTransport {
            addr,
            host: Arc::clone(&server.host),
            port: server.port_for(DnsProtocol::Udp),
            display: server.to_string(),
            proxy,
        })
    }

    async fn exchange_direct(
        &self,
        request_bytes: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError> {
        let server_addr = self.addr.ok_or_else(|| ResolveError::NameServerUnresolved {
            host: self.host.to_string(),
        })?;

        let bind_addr: SocketAddr = if server_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| map_io_error(&self.display, e))?;

        tokio::time::timeout(timeout, socket.send_to(request_bytes, server_addr))
            .await
            .map_err(|_| timeout_error(&self.display))?
            .map_err(|e| map_io_error(&self.display, e))?;

        debug!(server = %self.display, bytes = request_bytes.len(), "UDP query sent");

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let (received, from_addr) =
            tokio::time::timeout(timeout, socket.recv_from(&mut recv_buf))
                .await
                .map_err(|_| timeout_error(&self.display))?
                .map_err(|e| map_io_error(&self.display, e))?;

        if from_addr.ip() != server_addr.ip() {
            warn!(
                expected = %server_addr,
                received_from = %from_addr,
                "UDP response from unexpected source"
            );
        }

        recv_buf.truncate(received);
        Ok(recv_buf)
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn exchange(
        &self,
        request: &Message,
        timeout: Duration,
    ) -> Result<Message, ResolveError> {
        let request_bytes = message::serialize(request)?;

        let response_bytes = match &self.proxy {
            Some(proxy) => {
                if !proxy.udp_available() {
                    return Err(ResolveError::ProxyUdpUnavailable);
                }
                proxy
                    .udp_exchange(&self.host, self.port, &request_bytes, timeout)
                    .await?
            }
            None => self.exchange_direct(&request_bytes, timeout).await?,
        };

        let response = message::parse(&response_bytes)?;
        if response.id() != request.id() {
            return Err(ResolveError::Malformed(format!(
                "Response id {} does not match query id {}",
                response.id(),
                request.id()
            )));
        }

        debug!(
            server = %self.display,
            bytes = response_bytes.len(),
            "UDP response received"
        );
        Ok(response)
    }

    fn protocol(&self) -> DnsProtocol {
        DnsProtocol::Udp
    }
}
