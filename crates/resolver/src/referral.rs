//! Referral handling: pulling the next zone's name servers out of a
//! response and the shuffling applied before a server list is used.

use crate::message::{glue_for, name_equals_str, names_equal};
use ferric_dns_domain::NameServer;
use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RData};
use rand::seq::SliceRandom;
use std::net::{IpAddr, SocketAddr};

/// CSPRNG permutation, applied once per entry into a server-list level.
pub fn shuffle(servers: &mut [NameServer]) {
    servers.shuffle(&mut rand::thread_rng());
}

/// Walks the authority section for NS records and pairs each with glue from
/// the additional section. Entries without glue are kept as unresolved
/// servers unless `only_resolved` is set. DNS order is preserved; the
/// resolver shuffles at adoption time.
pub fn extract_referral(
    response: &Message,
    prefer_ipv6: bool,
    only_resolved: bool,
) -> Vec<NameServer> {
    let additionals = response.additionals();
    let mut servers = Vec::new();

    for record in response.name_servers() {
        let RData::NS(ns) = record.data() else {
            continue;
        };
        let target: &Name = &ns.0;
        let host = target.to_utf8().trim_end_matches('.').to_string();

        let glue = glue_for(additionals, target);
        match pick_address(&glue, prefer_ipv6) {
            Some(ip) => {
                servers.push(NameServer::with_endpoint(host, SocketAddr::new(ip, 53)));
            }
            None => {
                if !only_resolved {
                    servers.push(NameServer::new(host));
                }
            }
        }
    }
    servers
}

fn pick_address(addrs: &[IpAddr], prefer_ipv6: bool) -> Option<IpAddr> {
    let preferred = addrs
        .iter()
        .find(|ip| ip.is_ipv6() == prefer_ipv6)
        .copied();
    preferred.or_else(|| addrs.first().copied())
}

/// Detects the shape some authoritative servers answer with when a name has
/// no records at all: no answers, and an authority NS whose owner is the
/// question name and whose target is the very server that responded.
pub fn is_authoritative_empty(response: &Message, question_name: &Name, server_host: &str) -> bool {
    if !response.answers().is_empty() {
        return false;
    }
    response.name_servers().iter().any(|record| {
        if !names_equal(record.name(), question_name) {
            return false;
        }
        match record.data() {
            RData::NS(ns) => name_equals_str(&ns.0, server_host),
            _ => false,
        }
    })
}
