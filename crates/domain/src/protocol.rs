use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire carrier for a DNS exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DnsProtocol {
    #[default]
    Udp,
    Tcp,
    Tls,
    Https,
    HttpsJson,
}

impl DnsProtocol {
    pub fn default_port(&self) -> u16 {
        match self {
            DnsProtocol::Udp | DnsProtocol::Tcp => 53,
            DnsProtocol::Tls => 853,
            DnsProtocol::Https | DnsProtocol::HttpsJson => 443,
        }
    }

    /// TLS and the HTTPS variants only talk to full resolvers; they never
    /// drive referral chasing.
    pub fn is_forwarder_only(&self) -> bool {
        matches!(
            self,
            DnsProtocol::Tls | DnsProtocol::Https | DnsProtocol::HttpsJson
        )
    }

    pub fn is_https(&self) -> bool {
        matches!(self, DnsProtocol::Https | DnsProtocol::HttpsJson)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DnsProtocol::Udp => "udp",
            DnsProtocol::Tcp => "tcp",
            DnsProtocol::Tls => "tls",
            DnsProtocol::Https => "https",
            DnsProtocol::HttpsJson => "https-json",
        }
    }
}

impl fmt::Display for DnsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DnsProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(DnsProtocol::Udp),
            "tcp" => Ok(DnsProtocol::Tcp),
            "tls" => Ok(DnsProtocol::Tls),
            "https" => Ok(DnsProtocol::Https),
            "https-json" | "json" => Ok(DnsProtocol::HttpsJson),
            _ => Err(format!("Unknown DNS protocol: {}", s)),
        }
    }
}
