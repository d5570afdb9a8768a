//! Mapping between the domain-level record type and the codec's.

use ferric_dns_domain::RecordType;
use hickory_proto::rr::RecordType as WireType;

pub fn to_wire_type(rtype: RecordType) -> WireType {
    match rtype {
        RecordType::A => WireType::A,
        RecordType::Aaaa => WireType::AAAA,
        RecordType::Ns => WireType::NS,
        RecordType::Cname => WireType::CNAME,
        RecordType::Soa => WireType::SOA,
        RecordType::Ptr => WireType::PTR,
        RecordType::Mx => WireType::MX,
        RecordType::Txt => WireType::TXT,
        RecordType::Srv => WireType::SRV,
        RecordType::Any => WireType::ANY,
    }
}

pub fn from_wire_type(rtype: WireType) -> Option<RecordType> {
    match rtype {
        WireType::A => Some(RecordType::A),
        WireType::AAAA => Some(RecordType::Aaaa),
        WireType::NS => Some(RecordType::Ns),
        WireType::CNAME => Some(RecordType::Cname),
        WireType::SOA => Some(RecordType::Soa),
        WireType::PTR => Some(RecordType::Ptr),
        WireType::MX => Some(RecordType::Mx),
        WireType::TXT => Some(RecordType::Txt),
        WireType::SRV => Some(RecordType::Srv),
        WireType::ANY => Some(RecordType::Any),
        _ => None,
    }
}
