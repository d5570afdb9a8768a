//! IANA root name servers. Immutable process-wide tables; callers always
//! receive fresh copies.

use ferric_dns_domain::NameServer;
use std::net::{IpAddr, SocketAddr};

pub const ROOT_SERVERS_IPV4: [(&str, &str); 13] = [
    ("a.root-servers.net", "198.41.0.4"),
    ("b.root-servers.net", "199.9.14.201"),
    ("c.root-servers.net", "192.33.4.12"),
    ("d.root-servers.net", "199.7.91.13"),
    ("e.root-servers.net", "192.203.230.10"),
    ("f.root-servers.net", "192.5.5.241"),
    ("g.root-servers.net", "192.112.36.4"),
    ("h.root-servers.net", "198.97.190.53"),
    ("i.root-servers.net", "192.36.148.17"),
    ("j.root-servers.net", "192.58.128.30"),
    ("k.root-servers.net", "193.0.14.129"),
    ("l.root-servers.net", "199.7.83.42"),
    ("m.root-servers.net", "202.12.27.33"),
];

pub const ROOT_SERVERS_IPV6: [(&str, &str); 13] = [
    ("a.root-servers.net", "2001:503:ba3e::2:30"),
    ("b.root-servers.net", "2001:500:200::b"),
    ("c.root-servers.net", "2001:500:2::c"),
    ("d.root-servers.net", "2001:500:2d::d"),
    ("e.root-servers.net", "2001:500:a8::e"),
    ("f.root-servers.net", "2001:500:2f::f"),
    ("g.root-servers.net", "2001:500:12::d0d"),
    ("h.root-servers.net", "2001:500:1::53"),
    ("i.root-servers.net", "2001:7fe::53"),
    ("j.root-servers.net", "2001:503:c27::2:30"),
    ("k.root-servers.net", "2001:7fd::1"),
    ("l.root-servers.net", "2001:500:9f::42"),
    ("m.root-servers.net", "2001:dc3::35"),
];

pub fn root_servers(prefer_ipv6: bool) -> Vec<NameServer> {
    let table = if prefer_ipv6 {
        &ROOT_SERVERS_IPV6
    } else {
        &ROOT_SERVERS_IPV4
    };
    table
        .iter()
        .map(|(host, ip)| {
            let ip: IpAddr = ip.parse().expect("root table addresses are valid");
            NameServer::with_endpoint(*host, SocketAddr::new(ip, 53))
        })
        .collect()
}
