//! Cache contract and the bundled in-memory implementation.
//!
//! The contract speaks whole messages: what a lookup returns is interpreted
//! by the resolver purely through RCODE and section layout. Answers mean a
//! positive hit, SOA in authority a negative hit, NS-plus-glue a known
//! delegation, NXDOMAIN a cached name error. `None` (or an empty NoError
//! message) is a miss.

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Name, RecordType as WireType};
use std::time::{Duration, Instant};
use tracing::debug;

pub trait DnsCache: Send + Sync {
    fn lookup(&self, request: &Message) -> Option<Message>;

    /// Idempotent and best-effort; failures are swallowed.
    fn store(&self, response: &Message);
}

#[derive(Debug, Hash, PartialEq, Eq, Clone)]
struct CacheKey {
    name: String,
    rtype: u16,
}

struct CacheEntry {
    message: Message,
    expires_at: Instant,
}

/// Message cache keyed by lowercased owner name and query type, with
/// referral responses filed under the delegated zone's NS slot.
#[derive(Default)]
pub struct InMemoryCache {
    entries: dashmap::DashMap<CacheKey, CacheEntry>,
}

/// Lifetime for cached entries that carry no records at all (a bare
/// NXDOMAIN, say).
const BARE_ENTRY_TTL: Duration = Duration::from_secs(30);

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_fresh(&self, key: &CacheKey) -> Option<Message> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.message.clone());
            }
        }
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    fn insert(&self, key: CacheKey, message: Message, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                message,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl DnsCache for InMemoryCache {
    fn lookup(&self, request: &Message) -> Option<Message> {
        let query = request.queries().first()?;
        let name = key_name(query.name());
        let rtype = u16::from(query.query_type());

        if let Some(hit) = self.get_fresh(&CacheKey {
            name: name.clone(),
            rtype,
        }) {
            debug!(name = %name, rtype, "Cache hit");
            return Some(hit);
        }

        // No exact entry: the closest cached delegation still helps the
        // resolver skip ahead of the roots.
        let mut zone = name.as_str();
        loop {
            if let Some(hit) = self.get_fresh(&CacheKey {
                name: zone.to_string(),
                rtype: u16::from(WireType::NS),
            }) {
                debug!(name = %name, zone = %zone, "Cached delegation hit");
                return Some(hit);
            }
            match zone.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => zone = parent,
                _ => break,
            }
        }
        None
    }

    fn store(&self, response: &Message) {
        let Some(query) = response.queries().first() else {
            return;
        };
        let key = CacheKey {
            name: key_name(query.name()),
            rtype: u16::from(query.query_type()),
        };
        let ttl = min_ttl(response);

        match response.response_code() {
            ResponseCode::NXDomain => {
                self.insert(key, response.clone(), ttl);
            }
            ResponseCode::NoError => {
                if !response.answers().is_empty() {
                    self.insert(key, response.clone(), ttl);
                    return;
                }
                let authority = response.name_servers();
                if let Some(first) = authority.first() {
                    if first.record_type() == WireType::SOA {
                        self.insert(key, response.clone(), ttl);
                        return;
                    }
                }
                // A referral: file it under the delegated zone so later
                // questions below that zone can pick it up.
                if let Some(ns_record) = authority
                    .iter()
                    .find(|record| record.record_type() == WireType::NS)
                {
                    let zone_key = CacheKey {
                        name: key_name(ns_record.name()),
                        rtype: u16::from(WireType::NS),
                    };
                    self.insert(zone_key, response.clone(), ttl);
                }
            }
            _ => {}
        }
    }
}

fn key_name(name: &Name) -> String {
    name.to_utf8()
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

fn min_ttl(message: &Message) -> Duration {
    message
        .answers()
        .iter()
        .chain(message.name_servers())
        .chain(message.additionals())
        .map(|record| record.ttl())
        .min()
        .map(|ttl| Duration::from_secs(u64::from(ttl)))
        .unwrap_or(BARE_ENTRY_TTL)
}
