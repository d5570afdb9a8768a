//! DNS-over-TLS transport (RFC 7858): TCP framing inside a TLS session on
//! port 853. Connections are opened per exchange; the resolver makes no
//! pooling promise across calls.

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use super::{map_io_error, timeout_error, DnsTransport};
use crate::message;
use crate::proxy::ProxyDispatcher;
use async_trait::async_trait;
use ferric_dns_domain::{DnsProtocol, NameServer, ResolveError};
use hickory_proto::op::Message;
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

pub struct TlsTransport {
    addr: Option<SocketAddr>,
    host: Arc<str>,
    port: u16,
    display: String,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
}

impl TlsTransport {
    pub fn new(
        server: &NameServer,
        proxy: Option<Arc<dyn ProxyDispatcher>>,
    ) -> Result<Self, ResolveError> {
        let addr = server.addr_for(DnsProtocol::Tls);
        if addr.is_none() && proxy.is_none() {
            return Err(ResolveError::NameServerUnresolved {
                host: server.host.to_string(),
            });
        }
        Ok(TlsTransport {
            addr,
            host: Arc::clone(&server.host),
            port: server.port_for(DnsProtocol::Tls),
            display: server.to_string(),
            proxy,
        })
    }

    async fn exchange_wrapped<S>(
        &self,
        stream: S,
        request_bytes: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let connector = tokio_rustls::TlsConnector::from(SHARED_TLS_CONFIG.clone());
        let server_name = ServerName::try_from(self.host.to_string()).map_err(|e| {
            ResolveError::InvalidNameServer(format!("Bad TLS server name '{}': {}", self.host, e))
        })?;

        let mut tls_stream = tokio::time::timeout(timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| timeout_error(&self.display))?
            .map_err(|e| map_io_error(&self.display, e))?;

        debug!(server = %self.display, "TLS session established");

        tokio::time::timeout(
            timeout,
            send_with_length_prefix(&mut tls_stream, request_bytes, &self.display),
        )
        .await
        .map_err(|_| timeout_error(&self.display))??;

        let response_bytes = tokio::time::timeout(
            timeout,
            read_with_length_prefix(&mut tls_stream, &self.display),
        )
        .await
        .map_err(|_| timeout_error(&self.display))??;

        Ok(response_bytes)
    }
}

#[async_trait]
impl DnsTransport for TlsTransport {
    async fn exchange(
        &self,
        request: &Message,
        timeout: Duration,
    ) -> Result<Message, ResolveError> {
        let request_bytes = message::serialize(request)?;

        let response_bytes = match &self.proxy {
            Some(proxy) => {
                let stream = proxy.connect(&self.host, self.port).await?;
                self.exchange_wrapped(stream, &request_bytes, timeout).await?
            }
            None => {
                let addr = self.addr.ok_or_else(|| ResolveError::NameServerUnresolved {
                    host: self.host.to_string(),
                })?;
                let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
                    .await
                    .map_err(|_| timeout_error(&self.display))?
                    .map_err(|e| map_io_error(&self.display, e))?;
                self.exchange_wrapped(stream, &request_bytes, timeout).await?
            }
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
            "TLS response received"
        );
        Ok(response)
    }

    fn protocol(&self) -> DnsProtocol {
        DnsProtocol::Tls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_transport_default_port() {
        let server: NameServer = "1.1.1.1".parse().unwrap();
        let transport = TlsTransport::new(&server, None).unwrap();
        assert_eq!(transport.port, 853);
        assert_eq!(transport.addr.unwrap().port(), 853);
    }
}
