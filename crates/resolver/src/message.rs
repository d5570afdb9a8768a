//! Adapter over the wire codec: query construction, serialization and the
//! handful of message inspections the resolver needs.

use crate::record_map::to_wire_type;
use ferric_dns_domain::{DnsProtocol, RecordType, ResolveError};
use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use rand::Rng;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

/// A decoded response together with where it came from.
#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub message: Message,
    /// Display form of the responding server (or `"cache"`).
    pub server: Arc<str>,
    /// Transport the response actually arrived over.
    pub protocol: DnsProtocol,
}

impl DnsResponse {
    pub fn new(message: Message, server: Arc<str>, protocol: DnsProtocol) -> Self {
        DnsResponse {
            message,
            server,
            protocol,
        }
    }

    pub fn from_cache(message: Message, protocol: DnsProtocol) -> Self {
        DnsResponse {
            message,
            server: "cache".into(),
            protocol,
        }
    }
}

pub fn parse_name(name: &str) -> Result<Name, ResolveError> {
    let mut parsed = Name::from_str(name)
        .map_err(|e| ResolveError::InvalidName(format!("{}: {}", name, e)))?;
    parsed.set_fqdn(true);
    Ok(parsed)
}

/// Builds a query for `(name, rtype)` with a freshly sampled random id.
pub fn build_query(name: &Name, rtype: RecordType, recursion_desired: bool) -> Message {
    let mut query = Query::new();
    query.set_name(name.clone());
    query.set_query_type(to_wire_type(rtype));
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new();
    message.set_id(fresh_id());
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(recursion_desired);
    message.add_query(query);
    message.set_edns(default_edns());
    message
}

/// Every outgoing query, including each retry, carries a new random id.
pub fn fresh_id() -> u16 {
    rand::thread_rng().gen::<u16>()
}

fn default_edns() -> Edns {
    let mut edns = Edns::new();
    edns.set_max_payload(4096);
    edns.set_version(0);
    edns
}

pub fn serialize(message: &Message) -> Result<Vec<u8>, ResolveError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| ResolveError::Malformed(format!("Failed to encode DNS message: {}", e)))?;
    Ok(buf)
}

pub fn parse(bytes: &[u8]) -> Result<Message, ResolveError> {
    Message::from_vec(bytes)
        .map_err(|e| ResolveError::Malformed(format!("Failed to decode DNS message: {}", e)))
}

/// Owner-name comparison, case-insensitive and indifferent to the trailing
/// dot.
pub fn names_equal(a: &Name, b: &Name) -> bool {
    let a = a.to_utf8();
    let b = b.to_utf8();
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

pub fn name_equals_str(name: &Name, other: &str) -> bool {
    name.to_utf8()
        .trim_end_matches('.')
        .eq_ignore_ascii_case(other.trim_end_matches('.'))
}

/// The reverse-lookup name for an address: `<rev>.in-addr.arpa` for IPv4,
/// nibble-reversed `ip6.arpa` for IPv6.
pub fn reverse_name(ip: IpAddr) -> Name {
    let text = match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}.in-addr.arpa.", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => {
            let mut labels = Vec::with_capacity(32);
            for byte in v6.octets().iter().rev() {
                labels.push(format!("{:x}", byte & 0x0f));
                labels.push(format!("{:x}", byte >> 4));
            }
            format!("{}.ip6.arpa.", labels.join("."))
        }
    };
    // Both shapes are valid names by construction.
    Name::from_str(&text).expect("reverse name is well formed")
}

/// All A/AAAA addresses in the answer section.
pub fn answer_addresses(message: &Message) -> Vec<IpAddr> {
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

/// The first CNAME target in the answer section, if any.
pub fn answer_cname(message: &Message) -> Option<Name> {
    message.answers().iter().find_map(|record| match record.data() {
        RData::CNAME(cname) => Some(cname.0.clone()),
        _ => None,
    })
}

/// Glue addresses in the additional section owned by `target`.
pub fn glue_for(records: &[Record], target: &Name) -> Vec<IpAddr> {
    records
        .iter()
        .filter(|record| names_equal(record.name(), target))
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}
