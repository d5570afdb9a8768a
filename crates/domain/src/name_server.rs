use crate::errors::ResolveError;
use crate::protocol::DnsProtocol;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

/// One name server, possibly not yet resolved to an address.
///
/// Accepted textual forms: `host`, `host:port`, `ip`, `ip:port`,
/// `[ipv6]:port` and `https://…/dns-query`. The port is optional; when it is
/// absent the default port of the protocol in use applies (53 for Udp/Tcp,
/// 853 for Tls, 443 for the HTTPS variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameServer {
    /// Domain label or IP address in textual form.
    pub host: Arc<str>,
    /// Resolved address, if known. The resolver fills this in for servers
    /// named by domain.
    pub endpoint: Option<SocketAddr>,
    /// Explicit port from the textual form, if one was given.
    pub port: Option<u16>,
    /// DNS-over-HTTPS query URL, for the HTTPS transports.
    pub doh_url: Option<Arc<str>>,
}

impl NameServer {
    pub fn new(host: impl Into<Arc<str>>) -> Self {
        let host = host.into();
        let endpoint = host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, DnsProtocol::Udp.default_port()));
        NameServer {
            host,
            endpoint,
            port: None,
            doh_url: None,
        }
    }

    pub fn with_endpoint(host: impl Into<Arc<str>>, endpoint: SocketAddr) -> Self {
        NameServer {
            host: host.into(),
            endpoint: Some(endpoint),
            port: Some(endpoint.port()),
            doh_url: None,
        }
    }

    pub fn from_ip(ip: IpAddr, port: u16) -> Self {
        NameServer {
            host: ip.to_string().into(),
            endpoint: Some(SocketAddr::new(ip, port)),
            port: Some(port),
            doh_url: None,
        }
    }

    /// The address to dial for `protocol`, substituting the protocol default
    /// port when the textual form carried none.
    pub fn addr_for(&self, protocol: DnsProtocol) -> Option<SocketAddr> {
        self.endpoint.map(|ep| {
            SocketAddr::new(ep.ip(), self.port.unwrap_or_else(|| protocol.default_port()))
        })
    }

    pub fn port_for(&self, protocol: DnsProtocol) -> u16 {
        self.port.unwrap_or_else(|| protocol.default_port())
    }

    /// Whether this server can be dialed for `protocol` without resolving
    /// its host first. The HTTPS transports dial by URL, so a host name is
    /// always enough for them.
    pub fn is_resolved(&self, protocol: DnsProtocol) -> bool {
        if protocol.is_https() {
            self.doh_url.is_some() || !self.host.is_empty()
        } else {
            self.endpoint.is_some()
        }
    }

    /// The DoH query URL, synthesized from the host when none was given.
    pub fn doh_url_for(&self) -> Arc<str> {
        match &self.doh_url {
            Some(url) => Arc::clone(url),
            None => format!("https://{}/dns-query", self.host).into(),
        }
    }
}

fn parse_host_port(s: &str) -> Option<(&str, Option<u16>)> {
    if let Some(rest) = s.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        let after = &rest[end + 1..];
        if after.is_empty() {
            return Some((host, None));
        }
        let port = after.strip_prefix(':')?.parse::<u16>().ok()?;
        return Some((host, Some(port)));
    }
    match s.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str.parse::<u16>().ok()?;
            Some((host, Some(port)))
        }
        None => Some((s, None)),
    }
}

impl FromStr for NameServer {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ResolveError::InvalidNameServer(s.to_string()));
        }

        if let Some(rest) = s.strip_prefix("https://") {
            let authority = rest.split('/').next().unwrap_or(rest);
            let (host, port) = parse_host_port(authority)
                .ok_or_else(|| ResolveError::InvalidNameServer(s.to_string()))?;
            let endpoint = host
                .parse::<IpAddr>()
                .ok()
                .map(|ip| SocketAddr::new(ip, port.unwrap_or(443)));
            return Ok(NameServer {
                host: host.into(),
                endpoint,
                port,
                doh_url: Some(s.into()),
            });
        }

        // A socket address covers `ip:port` and `[ipv6]:port`.
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(NameServer {
                host: addr.ip().to_string().into(),
                endpoint: Some(addr),
                port: Some(addr.port()),
                doh_url: None,
            });
        }

        // A bare IPv6 address contains colons but is not a socket address.
        if let Ok(ip) = s.parse::<Ipv6Addr>() {
            return Ok(NameServer {
                host: s.to_string().into(),
                endpoint: Some(SocketAddr::new(IpAddr::V6(ip), 53)),
                port: None,
                doh_url: None,
            });
        }

        let (host, port) =
            parse_host_port(s).ok_or_else(|| ResolveError::InvalidNameServer(s.to_string()))?;
        if host.is_empty() {
            return Err(ResolveError::InvalidNameServer(s.to_string()));
        }
        let endpoint = host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, port.unwrap_or(53)));
        Ok(NameServer {
            host: host.into(),
            endpoint,
            port,
            doh_url: None,
        })
    }
}

impl fmt::Display for NameServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(url) = &self.doh_url {
            return write!(f, "{}", url);
        }
        match self.port {
            Some(port) => {
                if self.host.contains(':') {
                    write!(f, "[{}]:{}", self.host, port)
                } else {
                    write!(f, "{}:{}", self.host, port)
                }
            }
            None => write!(f, "{}", self.host),
        }
    }
}
