use crate::protocol::DnsProtocol;
use serde::Deserialize;
use std::time::Duration;

/// Tunables for a resolver instance. All per-call mutable state lives on the
/// call itself; this struct is immutable once the resolver is built.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Transport used for the question being resolved.
    #[serde(default)]
    pub protocol: DnsProtocol,

    /// Transport used when the resolver has to resolve a name server's own
    /// address mid-flight.
    #[serde(default)]
    pub ns_protocol: DnsProtocol,

    /// Retries per server within one pass over a server list.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Per-transport-operation timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Ask for AAAA before A, and prefer IPv6 roots and glue.
    #[serde(default)]
    pub prefer_ipv6: bool,

    /// Referral-following steps per question attempt.
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Suspended resolutions allowed while chasing name-server addresses.
    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,
}

fn default_retries() -> usize {
    2
}

fn default_timeout_ms() -> u64 {
    2_000
}

fn default_max_hops() -> usize {
    16
}

fn default_max_stack_depth() -> usize {
    10
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            protocol: DnsProtocol::Udp,
            ns_protocol: DnsProtocol::Udp,
            retries: default_retries(),
            timeout_ms: default_timeout_ms(),
            prefer_ipv6: false,
            max_hops: default_max_hops(),
            max_stack_depth: default_max_stack_depth(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
