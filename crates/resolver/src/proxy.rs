//! Contract for dispatching transport connections through a tunneling proxy.
//!
//! When a proxy is installed on a resolver, UDP, TCP and TLS socket
//! acquisition is delegated to it; the HTTPS transports keep their own
//! pooled client. A proxy that cannot carry UDP forces the client resolver
//! to upgrade the exchange to TCP for the lifetime of the call.

use async_trait::async_trait;
use ferric_dns_domain::ResolveError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// A connected byte stream handed out by a proxy.
pub trait ProxyStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ProxyStream for T {}

#[async_trait]
pub trait ProxyDispatcher: Send + Sync {
    /// Opens a stream to `host:port` through the proxy. Proxies connect by
    /// name, so an unresolved host label is acceptable here.
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn ProxyStream>, ResolveError>;

    /// Whether this proxy can relay UDP datagrams.
    fn udp_available(&self) -> bool {
        false
    }

    /// Relays one datagram and returns the reply. Only called when
    /// [`udp_available`](Self::udp_available) reports `true`.
    async fn udp_exchange(
        &self,
        host: &str,
        port: u16,
        _request: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError> {
        let _ = (host, port);
        Err(ResolveError::ProxyUdpUnavailable)
    }

    /// Opens a tunnel for callers outside DNS (an SMTP client, say),
    /// optionally TLS-wrapped.
    async fn create_tunnel(
        &self,
        host: &str,
        port: u16,
        tls_wrap: bool,
        ignore_cert: bool,
    ) -> Result<Box<dyn ProxyStream>, ResolveError> {
        let _ = (tls_wrap, ignore_cert);
        self.connect(host, port).await
    }
}
