//! TCP transport. Requests and responses carry a two-byte length prefix
//! (RFC 1035 §4.2.2). The framing helpers are generic over the stream so the
//! TLS transport and proxy byte-streams reuse them.

use super::{map_io_error, timeout_error, DnsTransport};
use crate::message;
use crate::proxy::ProxyDispatcher;
use async_trait::async_trait;
use ferric_dns_domain::{DnsProtocol, NameServer, ResolveError};
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const MAX_TCP_MESSAGE_SIZE: usize = 65535;

pub struct TcpTransport {
    addr: Option<SocketAddr>,
    host: Arc<str>,
    port: u16,
    display: String,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
}

impl TcpTransport {
    pub fn new(
        server: &NameServer,
        proxy: Option<Arc<dyn ProxyDispatcher>>,
    ) -> Result<Self, ResolveError> {
        let addr = server.addr_for(DnsProtocol::Tcp);
        if addr.is_none() && proxy.is_none() {
            return Err(ResolveError::NameServerUnresolved {
                host: server.host.to_string(),
            });
        }
        Ok(TcpTransport {
            addr,
            host: Arc::clone(&server.host),
            port: server.port_for(DnsProtocol::Tcp),
            display: server.to_string(),
            proxy,
        })
    }

    async fn exchange_on<S>(
        &self,
        stream: &mut S,
        request_bytes: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, ResolveError>
    where
        S: AsyncReadExt + AsyncWriteExt + Unpin + Send,
    {
        tokio::time::timeout(
            timeout,
            send_with_length_prefix(stream, request_bytes, &self.display),
        )
        .await
        .map_err(|_| timeout_error(&self.display))??;

        debug!(server = %self.display, bytes = request_bytes.len(), "TCP query sent");

        let response_bytes =
            tokio::time::timeout(timeout, read_with_length_prefix(stream, &self.display))
                .await
                .map_err(|_| timeout_error(&self.display))??;

        debug!(
            server = %self.display,
            bytes = response_bytes.len(),
            "TCP response received"
        );
        Ok(response_bytes)
    }
}

#[async_trait]
impl DnsTransport for TcpTransport {
    async fn exchange(
        &self,
        request: &Message,
        timeout: Duration,
    ) -> Result<Message, ResolveError> {
        let request_bytes = message::serialize(request)?;

        let response_bytes = match &self.proxy {
            Some(proxy) => {
                let mut stream = proxy.connect(&self.host, self.port).await?;
                self.exchange_on(&mut stream, &request_bytes, timeout).await?
            }
            None => {
                let addr = self.addr.ok_or_else(|| ResolveError::NameServerUnresolved {
                    host: self.host.to_string(),
                })?;
                let mut stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
                    .await
                    .map_err(|_| timeout_error(&self.display))?
                    .map_err(|e| map_io_error(&self.display, e))?;
                self.exchange_on(&mut stream, &request_bytes, timeout).await?
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
        Ok(response)
    }

    fn protocol(&self) -> DnsProtocol {
        DnsProtocol::Tcp
    }
}

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    message_bytes: &[u8],
    server: &str,
) -> Result<(), ResolveError>
where
    S: AsyncWriteExt + Unpin + Send,
{
    let length = message_bytes.len() as u16;
    stream
        .write_all(&length.to_be_bytes())
        .await
        .map_err(|e| map_io_error(server, e))?;
    stream
        .write_all(message_bytes)
        .await
        .map_err(|e| map_io_error(server, e))?;
    stream.flush().await.map_err(|e| map_io_error(server, e))?;
    Ok(())
}

pub(crate) async fn read_with_length_prefix<S>(
    stream: &mut S,
    server: &str,
) -> Result<Vec<u8>, ResolveError>
where
    S: AsyncReadExt + Unpin + Send,
{
    let mut len_buf = [0u8; 2];
    stream
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| map_io_error(server, e))?;

    let response_len = u16::from_be_bytes(len_buf) as usize;
    if response_len > MAX_TCP_MESSAGE_SIZE {
        return Err(ResolveError::Malformed(format!(
            "Response too large: {} bytes",
            response_len
        )));
    }

    let mut response = vec![0u8; response_len];
    stream
        .read_exact(&mut response)
        .await
        .map_err(|e| map_io_error(server, e))?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_transport_creation() {
        let server: NameServer = "[2001:4860:4860::8888]:53".parse().unwrap();
        let transport = TcpTransport::new(&server, None).unwrap();
        assert_eq!(transport.protocol(), DnsProtocol::Tcp);
        assert_eq!(transport.port, 53);
    }
}
