use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("Invalid domain name: {0}")]
    InvalidName(String),

    #[error("Invalid name server address: {0}")]
    InvalidNameServer(String),

    #[error("Malformed DNS message: {0}")]
    Malformed(String),

    #[error("Transport timeout waiting on {server}")]
    TransportTimeout { server: String },

    #[error("Connection refused by {server}")]
    TransportRefused { server: String },

    #[error("I/O error talking to {server}: {detail}")]
    TransportIo { server: String, detail: String },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Proxy could not reach {server}: {detail}")]
    Proxy { server: String, detail: String },

    #[error("Proxy does not support UDP")]
    ProxyUdpUnavailable,

    #[error("Name server {host} could not be resolved to an address")]
    NameServerUnresolved { host: String },

    #[error("Name does not exist: {name}")]
    NxDomain { name: String },

    #[error("No records of the requested type for {name}")]
    NoRecords { name: String },

    #[error("Server returned {rcode} for {name}")]
    ErrorResponse { name: String, rcode: String },

    #[error("No response from any name server{}", .last.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    NoResponse { last: Option<Box<ResolveError>> },
}

impl ResolveError {
    pub fn no_response(last: Option<ResolveError>) -> Self {
        ResolveError::NoResponse {
            last: last.map(Box::new),
        }
    }

    /// True for failures of the wire, not of the DNS data: the caller may
    /// retry the same question against another server.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ResolveError::TransportTimeout { .. }
                | ResolveError::TransportRefused { .. }
                | ResolveError::TransportIo { .. }
                | ResolveError::HttpStatus { .. }
                | ResolveError::Proxy { .. }
                | ResolveError::ProxyUdpUnavailable
        )
    }
}
