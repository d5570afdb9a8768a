//! DNS-over-HTTPS wire transport (RFC 8484): POST with
//! `application/dns-message`, the body being the raw DNS message both ways.

use super::{timeout_error, DnsTransport};
use crate::message;
use async_trait::async_trait;
use ferric_dns_domain::{DnsProtocol, NameServer, ResolveError};
use hickory_proto::op::Message;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::debug;

/// Shared HTTP/2 client with connection pooling.
pub(crate) static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(4)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

pub struct HttpsTransport {
    url: Arc<str>,
}

impl HttpsTransport {
    pub fn new(server: &NameServer) -> Self {
        HttpsTransport {
            url: server.doh_url_for(),
        }
    }
}

#[async_trait]
impl DnsTransport for HttpsTransport {
    async fn exchange(
        &self,
        request: &Message,
        timeout: Duration,
    ) -> Result<Message, ResolveError> {
        let request_bytes = message::serialize(request)?;

        debug!(url = %self.url, bytes = request_bytes.len(), "Sending DoH query");

        let response = tokio::time::timeout(
            timeout,
            SHARED_CLIENT
                .post(self.url.as_ref())
                .header("content-type", DNS_MESSAGE_CONTENT_TYPE)
                .header("accept", DNS_MESSAGE_CONTENT_TYPE)
                .body(request_bytes)
                .send(),
        )
        .await
        .map_err(|_| timeout_error(&self.url))?
        .map_err(|e| ResolveError::TransportIo {
            server: self.url.to_string(),
            detail: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                url: self.url.to_string(),
                status: status.as_u16(),
            });
        }

        let response_bytes = tokio::time::timeout(timeout, response.bytes())
            .await
            .map_err(|_| timeout_error(&self.url))?
            .map_err(|e| ResolveError::TransportIo {
                server: self.url.to_string(),
                detail: e.to_string(),
            })?;

        debug!(url = %self.url, bytes = response_bytes.len(), "DoH response received");

        let response = message::parse(&response_bytes)?;
        if response.id() != request.id() {
            return Err(ResolveError::Malformed(format!(
                "Response id {} does not match query id {}",
                response.id(),
                request.id()
            )));
        }
        Ok(response)
    }

    fn protocol(&self) -> DnsProtocol {
        DnsProtocol::Https
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_transport_url() {
        let server: NameServer = "https://dns.google/dns-query".parse().unwrap();
        let transport = HttpsTransport::new(&server);
        assert_eq!(transport.url.as_ref(), "https://dns.google/dns-query");
    }

    #[test]
    fn test_https_transport_synthesized_url() {
        let server: NameServer = "1.1.1.1".parse().unwrap();
        let transport = HttpsTransport::new(&server);
        assert_eq!(transport.url.as_ref(), "https://1.1.1.1/dns-query");
    }
}
