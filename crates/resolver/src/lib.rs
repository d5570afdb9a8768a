//! Iterative DNS client resolver.
//!
//! Resolution starts from the root servers (or a caller-supplied set),
//! chases referrals and CNAME chains, and can consult a pluggable cache and
//! dispatch through a tunneling proxy. Five transports are supported: UDP,
//! TCP, DNS-over-TLS, DNS-over-HTTPS wire format and DNS-over-HTTPS JSON.

pub mod cache;
pub mod client;
pub mod endpoint;
pub mod iterative;
pub mod lookup;
pub mod message;
pub mod proxy;
pub mod record_map;
pub mod referral;
pub mod roots;
pub mod transport;

pub use cache::{DnsCache, InMemoryCache};
pub use client::ClientResolver;
pub use ferric_dns_domain::{DnsProtocol, NameServer, RecordType, ResolveError, ResolverConfig};
pub use iterative::IterativeResolver;
pub use message::DnsResponse;
pub use proxy::{ProxyDispatcher, ProxyStream};
