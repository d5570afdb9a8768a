pub mod https;
pub mod https_json;
pub mod tcp;
pub mod tls;
pub mod udp;

use crate::proxy::ProxyDispatcher;
use async_trait::async_trait;
use ferric_dns_domain::{DnsProtocol, NameServer, ResolveError};
use hickory_proto::op::Message;
use std::io;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// One request in, one response out, under `timeout`.
    async fn exchange(&self, request: &Message, timeout: Duration)
        -> Result<Message, ResolveError>;

    fn protocol(&self) -> DnsProtocol;
}

pub enum Transport {
    Udp(udp::UdpTransport),
    Tcp(tcp::TcpTransport),
    Tls(tls::TlsTransport),
    Https(https::HttpsTransport),
    HttpsJson(https_json::HttpsJsonTransport),
}

impl Transport {
    pub async fn exchange(
        &self,
        request: &Message,
        timeout: Duration,
    ) -> Result<Message, ResolveError> {
        match self {
            Self::Udp(t) => DnsTransport::exchange(t, request, timeout).await,
            Self::Tcp(t) => DnsTransport::exchange(t, request, timeout).await,
            Self::Tls(t) => DnsTransport::exchange(t, request, timeout).await,
            Self::Https(t) => DnsTransport::exchange(t, request, timeout).await,
            Self::HttpsJson(t) => DnsTransport::exchange(t, request, timeout).await,
        }
    }

    pub fn protocol(&self) -> DnsProtocol {
        match self {
            Self::Udp(_) => DnsProtocol::Udp,
            Self::Tcp(_) => DnsProtocol::Tcp,
            Self::Tls(_) => DnsProtocol::Tls,
            Self::Https(_) => DnsProtocol::Https,
            Self::HttpsJson(_) => DnsProtocol::HttpsJson,
        }
    }
}

pub fn create_transport(
    server: &NameServer,
    protocol: DnsProtocol,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
) -> Result<Transport, ResolveError> {
    match protocol {
        DnsProtocol::Udp => Ok(Transport::Udp(udp::UdpTransport::new(server, proxy)?)),
        DnsProtocol::Tcp => Ok(Transport::Tcp(tcp::TcpTransport::new(server, proxy)?)),
        DnsProtocol::Tls => Ok(Transport::Tls(tls::TlsTransport::new(server, proxy)?)),
        DnsProtocol::Https => Ok(Transport::Https(https::HttpsTransport::new(server))),
        DnsProtocol::HttpsJson => Ok(Transport::HttpsJson(https_json::HttpsJsonTransport::new(
            server,
        ))),
    }
}

pub(crate) fn map_io_error(server: &str, e: io::Error) -> ResolveError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ResolveError::TransportRefused {
            server: server.to_string(),
        },
        io::ErrorKind::TimedOut => ResolveError::TransportTimeout {
            server: server.to_string(),
        },
        _ => ResolveError::TransportIo {
            server: server.to_string(),
            detail: e.to_string(),
        },
    }
}

pub(crate) fn timeout_error(server: &str) -> ResolveError {
    ResolveError::TransportTimeout {
        server: server.to_string(),
    }
}
