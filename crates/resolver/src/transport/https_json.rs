//! DNS-over-HTTPS JSON transport, per the Google/Cloudflare schema:
//! `GET <url>?name=<q>&type=<n>[&cd=1]` with `accept: application/dns-json`,
//! the reply being a JSON object translated back into a wire message.

use super::https::SHARED_CLIENT;
use super::{timeout_error, DnsTransport};
use crate::message;
use crate::record_map::from_wire_type;
use async_trait::async_trait;
use ferric_dns_domain::{DnsProtocol, NameServer, RecordType, ResolveError};
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, SOA, TXT};
use hickory_proto::rr::{RData, Record, RecordType as WireType};
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DNS_JSON_CONTENT_TYPE: &str = "application/dns-json";

#[derive(Debug, Deserialize)]
pub(crate) struct JsonReply {
    #[serde(rename = "Status")]
    pub status: u16,
    #[serde(rename = "TC", default)]
    pub tc: bool,
    #[serde(rename = "RA", default)]
    pub ra: bool,
    #[serde(rename = "Answer", default)]
    pub answer: Vec<JsonRecord>,
    #[serde(rename = "Authority", default)]
    pub authority: Vec<JsonRecord>,
    #[serde(rename = "Additional", default)]
    pub additional: Vec<JsonRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub rtype: u16,
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    pub data: String,
}

pub struct HttpsJsonTransport {
    url: Arc<str>,
}

impl HttpsJsonTransport {
    pub fn new(server: &NameServer) -> Self {
        HttpsJsonTransport {
            url: server.doh_url_for(),
        }
    }
}

#[async_trait]
impl DnsTransport for HttpsJsonTransport {
    async fn exchange(
        &self,
        request: &Message,
        timeout: Duration,
    ) -> Result<Message, ResolveError> {
        let query = request
            .queries()
            .first()
            .ok_or_else(|| ResolveError::Malformed("Query without a question".to_string()))?;
        let name = query.name().to_utf8();
        let rtype = u16::from(query.query_type());

        let mut http_request = SHARED_CLIENT
            .get(self.url.as_ref())
            .header("accept", DNS_JSON_CONTENT_TYPE)
            .query(&[("name", name.as_str()), ("type", &rtype.to_string())]);
        if request.checking_disabled() {
            http_request = http_request.query(&[("cd", "1")]);
        }

        debug!(url = %self.url, name = %name, rtype, "Sending DoH JSON query");

        let response = tokio::time::timeout(timeout, http_request.send())
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

        let reply: JsonReply = tokio::time::timeout(timeout, response.json())
            .await
            .map_err(|_| timeout_error(&self.url))?
            .map_err(|e| ResolveError::Malformed(format!("Bad DoH JSON reply: {}", e)))?;

        translate_reply(request, reply)
    }

    fn protocol(&self) -> DnsProtocol {
        DnsProtocol::HttpsJson
    }
}

/// Rebuilds a wire message from the JSON reply, keeping the request's id and
/// question so the rest of the resolver sees the standard datagram shape.
pub(crate) fn translate_reply(
    request: &Message,
    reply: JsonReply,
) -> Result<Message, ResolveError> {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(reply.ra);
    response.set_response_code(status_to_rcode(reply.status));
    response.set_truncated(reply.tc);
    if let Some(query) = request.queries().first() {
        response.add_query(query.clone());
    }

    for record in &reply.answer {
        if let Some(record) = translate_record(record) {
            response.add_answer(record);
        }
    }
    for record in &reply.authority {
        if let Some(record) = translate_record(record) {
            response.add_name_server(record);
        }
    }
    for record in &reply.additional {
        if let Some(record) = translate_record(record) {
            response.add_additional(record);
        }
    }

    Ok(response)
}

fn status_to_rcode(status: u16) -> ResponseCode {
    match status {
        0 => ResponseCode::NoError,
        1 => ResponseCode::FormErr,
        2 => ResponseCode::ServFail,
        3 => ResponseCode::NXDomain,
        4 => ResponseCode::NotImp,
        5 => ResponseCode::Refused,
        _ => ResponseCode::ServFail,
    }
}

fn translate_record(record: &JsonRecord) -> Option<Record> {
    let name = message::parse_name(&record.name).ok()?;
    let rtype = from_wire_type(WireType::from(record.rtype))?;
    let rdata = parse_rdata(rtype, &record.data)?;
    let mut built = Record::from_rdata(name, record.ttl, rdata);
    built.set_dns_class(hickory_proto::rr::DNSClass::IN);
    Some(built)
}

fn parse_rdata(rtype: RecordType, data: &str) -> Option<RData> {
    match rtype {
        RecordType::A => data.parse::<Ipv4Addr>().ok().map(|ip| RData::A(A(ip))),
        RecordType::Aaaa => data
            .parse::<Ipv6Addr>()
            .ok()
            .map(|ip| RData::AAAA(AAAA(ip))),
        RecordType::Ns => message::parse_name(data).ok().map(|n| RData::NS(NS(n))),
        RecordType::Cname => message::parse_name(data)
            .ok()
            .map(|n| RData::CNAME(CNAME(n))),
        RecordType::Ptr => message::parse_name(data).ok().map(|n| RData::PTR(PTR(n))),
        RecordType::Mx => {
            let (preference, exchange) = data.split_once(' ')?;
            let preference = preference.parse::<u16>().ok()?;
            let exchange = message::parse_name(exchange.trim()).ok()?;
            Some(RData::MX(MX::new(preference, exchange)))
        }
        RecordType::Soa => {
            let fields: Vec<&str> = data.split_whitespace().collect();
            if fields.len() != 7 {
                return None;
            }
            let mname = message::parse_name(fields[0]).ok()?;
            let rname = message::parse_name(fields[1]).ok()?;
            let serial = fields[2].parse().ok()?;
            let refresh = fields[3].parse().ok()?;
            let retry = fields[4].parse().ok()?;
            let expire = fields[5].parse().ok()?;
            let minimum = fields[6].parse().ok()?;
            Some(RData::SOA(SOA::new(
                mname, rname, serial, refresh, retry, expire, minimum,
            )))
        }
        RecordType::Txt => {
            let text = data.trim_matches('"').to_string();
            Some(RData::TXT(TXT::new(vec![text])))
        }
        RecordType::Srv | RecordType::Any => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{build_query, parse_name};
    use std::net::IpAddr;

    fn reply_with_answer(rtype: u16, data: &str) -> JsonReply {
        JsonReply {
            status: 0,
            tc: false,
            ra: true,
            answer: vec![JsonRecord {
                name: "example.com.".to_string(),
                rtype,
                ttl: 300,
                data: data.to_string(),
            }],
            authority: vec![],
            additional: vec![],
        }
    }

    #[test]
    fn test_translate_a_record() {
        let name = parse_name("example.com").unwrap();
        let request = build_query(&name, RecordType::A, true);
        let response = translate_reply(&request, reply_with_answer(1, "93.184.216.34")).unwrap();

        assert_eq!(response.id(), request.id());
        assert_eq!(response.response_code(), ResponseCode::NoError);
        let addrs = message::answer_addresses(&response);
        assert_eq!(addrs, vec!["93.184.216.34".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_translate_mx_record() {
        let name = parse_name("example.com").unwrap();
        let request = build_query(&name, RecordType::Mx, true);
        let response = translate_reply(&request, reply_with_answer(15, "10 mail.example.com."))
            .unwrap();

        let record = &response.answers()[0];
        match record.data() {
            RData::MX(mx) => {
                assert_eq!(mx.preference(), 10);
                assert!(message::name_equals_str(mx.exchange(), "mail.example.com"));
            }
            other => panic!("Expected MX rdata, got {:?}", other),
        }
    }

    #[test]
    fn test_translate_nxdomain_status() {
        let name = parse_name("missing.example").unwrap();
        let request = build_query(&name, RecordType::A, true);
        let reply = JsonReply {
            status: 3,
            tc: false,
            ra: true,
            answer: vec![],
            authority: vec![],
            additional: vec![],
        };
        let response = translate_reply(&request, reply).unwrap();
        assert_eq!(response.response_code(), ResponseCode::NXDomain);
    }

    #[test]
    fn test_malformed_record_is_dropped() {
        let name = parse_name("example.com").unwrap();
        let request = build_query(&name, RecordType::A, true);
        let response = translate_reply(&request, reply_with_answer(1, "not-an-ip")).unwrap();
        assert!(response.answers().is_empty());
    }
}
