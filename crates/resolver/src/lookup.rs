//! Convenience lookups layered on the iterative resolver: addresses, mail
//! exchangers and reverse names. All of them chase CNAME chains, bounded by
//! the resolver's hop limit.

use crate::iterative::IterativeResolver;
use crate::message::{self, DnsResponse};
use crate::record_map::to_wire_type;
use ferric_dns_domain::{RecordType, ResolveError};
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{RData, Record};
use std::net::IpAddr;
use tracing::debug;

impl IterativeResolver {
    /// Resolves a host name to addresses. Asks AAAA first when the resolver
    /// prefers IPv6, falling back to A when that comes back empty.
    pub async fn resolve_ip(&self, name: &str) -> Result<Vec<IpAddr>, ResolveError> {
        if self.config().prefer_ipv6 {
            let (_, records) = self.resolve_chasing(name, RecordType::Aaaa).await?;
            let addrs = addresses_of(&records);
            if !addrs.is_empty() {
                return Ok(addrs);
            }
        }
        let (_, records) = self.resolve_chasing(name, RecordType::A).await?;
        Ok(addresses_of(&records))
    }

    /// Resolves the mail exchangers of `domain`, ordered by preference.
    ///
    /// With `resolve_ip` set, each exchange is turned into addresses using
    /// glue from the additional section when present, and a full address
    /// lookup otherwise. An exchange whose lookup fails transiently stays in
    /// the output by name; one that does not exist is dropped.
    pub async fn resolve_mx(
        &self,
        domain: &str,
        resolve_ip: bool,
    ) -> Result<Vec<String>, ResolveError> {
        let (response, records) = self.resolve_chasing(domain, RecordType::Mx).await?;

        let mut exchanges: Vec<(u16, hickory_proto::rr::Name)> = records
            .iter()
            .filter_map(|record| match record.data() {
                RData::MX(mx) => Some((mx.preference(), mx.exchange().clone())),
                _ => None,
            })
            .collect();
        exchanges.sort_by_key(|(preference, _)| *preference);

        if !resolve_ip {
            return Ok(exchanges
                .into_iter()
                .map(|(_, exchange)| trim_dot(&exchange.to_utf8()))
                .collect());
        }

        let mut out = Vec::new();
        for (_, exchange) in exchanges {
            let glue = message::glue_for(response.message.additionals(), &exchange);
            if !glue.is_empty() {
                out.extend(glue.into_iter().map(|ip| ip.to_string()));
                continue;
            }

            let host = trim_dot(&exchange.to_utf8());
            match self.resolve_ip(&host).await {
                Ok(addrs) => out.extend(addrs.into_iter().map(|ip| ip.to_string())),
                Err(ResolveError::NxDomain { .. }) => {
                    debug!(exchange = %host, "Mail exchanger does not exist; dropping");
                }
                Err(e) => {
                    debug!(exchange = %host, error = %e, "Mail exchanger lookup failed; keeping name");
                    out.push(host);
                }
            }
        }
        Ok(out)
    }

    /// Reverse lookup: the names an address points back to.
    pub async fn resolve_ptr(&self, ip: IpAddr) -> Result<Vec<String>, ResolveError> {
        let name = message::reverse_name(ip);
        let (_, records) = self
            .resolve_chasing(&name.to_utf8(), RecordType::Ptr)
            .await?;
        Ok(records
            .iter()
            .filter_map(|record| match record.data() {
                RData::PTR(ptr) => Some(trim_dot(&ptr.0.to_utf8())),
                _ => None,
            })
            .collect())
    }

    /// Resolves and follows CNAME indirections until records of the asked
    /// type appear, the name turns out not to exist, or the hop limit is
    /// reached. Returns the final response and the matching answer records.
    async fn resolve_chasing(
        &self,
        name: &str,
        rtype: RecordType,
    ) -> Result<(DnsResponse, Vec<Record>), ResolveError> {
        let mut current = name.to_string();
        let mut last = None;

        for _ in 0..self.config().max_hops {
            let response = self.resolve(&current, rtype).await?;
            match response.message.response_code() {
                ResponseCode::NoError => {}
                ResponseCode::NXDomain => {
                    return Err(ResolveError::NxDomain { name: current });
                }
                other => {
                    return Err(ResolveError::ErrorResponse {
                        name: current,
                        rcode: format!("{:?}", other),
                    });
                }
            }

            let wanted = to_wire_type(rtype);
            let matching: Vec<Record> = response
                .message
                .answers()
                .iter()
                .filter(|record| {
                    rtype == RecordType::Any || record.record_type() == wanted
                })
                .cloned()
                .collect();
            if !matching.is_empty() {
                return Ok((response, matching));
            }

            if let Some(target) = message::answer_cname(&response.message) {
                debug!(from = %current, to = %target, "Following CNAME");
                current = target.to_utf8();
                last = Some(response);
                continue;
            }

            return Ok((response, Vec::new()));
        }

        match last {
            Some(response) => Ok((response, Vec::new())),
            None => Err(ResolveError::no_response(None)),
        }
    }
}

fn addresses_of(records: &[Record]) -> Vec<IpAddr> {
    records
        .iter()
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

fn trim_dot(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}
