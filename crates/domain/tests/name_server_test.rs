use ferric_dns_domain::{DnsProtocol, NameServer};
use std::net::SocketAddr;

#[test]
fn test_parse_bare_host() {
    let ns: NameServer = "ns1.example.com".parse().unwrap();
    assert_eq!(ns.host.as_ref(), "ns1.example.com");
    assert!(ns.endpoint.is_none());
    assert_eq!(ns.port, None);
    assert!(ns.doh_url.is_none());
}

#[test]
fn test_parse_host_with_port() {
    let ns: NameServer = "ns1.example.com:5353".parse().unwrap();
    assert_eq!(ns.host.as_ref(), "ns1.example.com");
    assert_eq!(ns.port, Some(5353));
    assert!(ns.endpoint.is_none());
}

#[test]
fn test_parse_ipv4() {
    let ns: NameServer = "8.8.8.8".parse().unwrap();
    assert_eq!(ns.endpoint, Some("8.8.8.8:53".parse::<SocketAddr>().unwrap()));
    assert_eq!(ns.port, None);
}

#[test]
fn test_parse_ipv4_with_port() {
    let ns: NameServer = "8.8.8.8:5353".parse().unwrap();
    assert_eq!(
        ns.endpoint,
        Some("8.8.8.8:5353".parse::<SocketAddr>().unwrap())
    );
    assert_eq!(ns.port, Some(5353));
}

#[test]
fn test_parse_bracketed_ipv6() {
    let ns: NameServer = "[2606:4700:4700::1111]:853".parse().unwrap();
    assert_eq!(ns.host.as_ref(), "2606:4700:4700::1111");
    assert_eq!(ns.port, Some(853));
    assert!(ns.endpoint.unwrap().is_ipv6());
}

#[test]
fn test_parse_bare_ipv6() {
    let ns: NameServer = "2606:4700:4700::1111".parse().unwrap();
    assert_eq!(ns.port, None);
    assert!(ns.endpoint.unwrap().is_ipv6());
}

#[test]
fn test_parse_doh_url() {
    let ns: NameServer = "https://dns.google/dns-query".parse().unwrap();
    assert_eq!(ns.host.as_ref(), "dns.google");
    assert_eq!(ns.doh_url.as_deref(), Some("https://dns.google/dns-query"));
    assert!(ns.endpoint.is_none());
}

#[test]
fn test_parse_doh_url_with_ip() {
    let ns: NameServer = "https://1.1.1.1/dns-query".parse().unwrap();
    assert_eq!(ns.host.as_ref(), "1.1.1.1");
    assert_eq!(
        ns.endpoint,
        Some("1.1.1.1:443".parse::<SocketAddr>().unwrap())
    );
}

#[test]
fn test_parse_rejects_garbage() {
    assert!("".parse::<NameServer>().is_err());
    assert!("host:notaport".parse::<NameServer>().is_err());
}

#[test]
fn test_addr_for_substitutes_protocol_default_port() {
    let ns: NameServer = "1.1.1.1".parse().unwrap();
    assert_eq!(ns.addr_for(DnsProtocol::Udp).unwrap().port(), 53);
    assert_eq!(ns.addr_for(DnsProtocol::Tls).unwrap().port(), 853);
    assert_eq!(ns.addr_for(DnsProtocol::Https).unwrap().port(), 443);

    let pinned: NameServer = "1.1.1.1:5353".parse().unwrap();
    assert_eq!(pinned.addr_for(DnsProtocol::Tls).unwrap().port(), 5353);
}

#[test]
fn test_is_resolved_depends_on_protocol() {
    let unresolved: NameServer = "ns1.example.com".parse().unwrap();
    assert!(!unresolved.is_resolved(DnsProtocol::Udp));
    // HTTPS dials by URL, so a host label alone is enough.
    assert!(unresolved.is_resolved(DnsProtocol::Https));

    let resolved: NameServer = "8.8.8.8".parse().unwrap();
    assert!(resolved.is_resolved(DnsProtocol::Udp));
}

#[test]
fn test_doh_url_synthesized_from_host() {
    let ns: NameServer = "dns.example".parse().unwrap();
    assert_eq!(ns.doh_url_for().as_ref(), "https://dns.example/dns-query");
}

#[test]
fn test_display_forms() {
    let ns: NameServer = "ns1.example.com:5353".parse().unwrap();
    assert_eq!(ns.to_string(), "ns1.example.com:5353");

    let bare: NameServer = "ns1.example.com".parse().unwrap();
    assert_eq!(bare.to_string(), "ns1.example.com");

    let v6: NameServer = "[2606:4700:4700::1111]:853".parse().unwrap();
    assert_eq!(v6.to_string(), "[2606:4700:4700::1111]:853");

    let url: NameServer = "https://dns.google/dns-query".parse().unwrap();
    assert_eq!(url.to_string(), "https://dns.google/dns-query");
}
