mod helpers;

use ferric_dns_resolver::{
    DnsCache, InMemoryCache, IterativeResolver, NameServer, RecordType, ResolverConfig,
};
use helpers::MockDnsServer;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RecordType as WireType;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn test_config() -> ResolverConfig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    ResolverConfig {
        timeout_ms: 1_000,
        ..ResolverConfig::default()
    }
}

/// Two-hop referral walk: fake root, fake TLD, fake authority. The TLD and
/// authority sit on distinct loopback addresses at port 53 because referral
/// glue always points there; without permission to bind 53 the test bows
/// out.
#[tokio::test]
async fn test_two_hop_referral_resolves_address() {
    let tld = helpers::start_authority(
        "127.0.0.101",
        Arc::new(|request, _| {
            helpers::referral(
                request,
                vec![helpers::ns_record("example.com", "ns.example.com")],
                vec![helpers::a_record("ns.example.com", "127.0.0.102")],
            )
        }),
    )
    .await;
    let auth = helpers::start_authority(
        "127.0.0.102",
        Arc::new(|request, _| {
            helpers::answer(
                request,
                vec![helpers::a_record("example.com", "93.184.216.34")],
            )
        }),
    )
    .await;
    let (Some(tld), Some(auth)) = (tld, auth) else {
        return;
    };

    let (root, root_addr) = MockDnsServer::start(Arc::new(|request, _| {
        helpers::referral(
            request,
            vec![helpers::ns_record("com", "a.gtld.test")],
            vec![helpers::a_record("a.gtld.test", "127.0.0.101")],
        )
    }))
    .await
    .unwrap();

    let resolver = IterativeResolver::new(test_config())
        .with_servers(vec![NameServer::with_endpoint("root.test", root_addr)]);

    let addrs = resolver.resolve_ip("example.com").await.unwrap();
    assert_eq!(addrs, vec!["93.184.216.34".parse::<IpAddr>().unwrap()]);

    drop((root, tld, auth));
}

#[tokio::test]
async fn test_nxdomain_surfaces_authority() {
    let (server, addr) = MockDnsServer::start(Arc::new(|request, _| {
        helpers::nxdomain(request, "test")
    }))
    .await
    .unwrap();

    let resolver = IterativeResolver::new(test_config())
        .with_servers(vec![NameServer::with_endpoint("auth.test", addr)]);

    let response = resolver
        .resolve("does-not-exist.test", RecordType::A)
        .await
        .unwrap();
    assert_eq!(response.message.response_code(), ResponseCode::NXDomain);
    assert!(!response.message.name_servers().is_empty());

    drop(server);
}

#[tokio::test]
async fn test_nodata_soa_is_terminal() {
    let (server, addr) = MockDnsServer::start(Arc::new(|request, _| {
        helpers::nodata(request, "example.com")
    }))
    .await
    .unwrap();

    let resolver = IterativeResolver::new(test_config())
        .with_servers(vec![NameServer::with_endpoint("auth.test", addr)]);

    let response = resolver
        .resolve("example.com", RecordType::Aaaa)
        .await
        .unwrap();
    assert_eq!(response.message.response_code(), ResponseCode::NoError);
    assert!(response.message.answers().is_empty());
    assert_eq!(
        response.message.name_servers()[0].record_type(),
        WireType::SOA
    );

    drop(server);
}

/// A referral naming a server without glue suspends the walk, resolves the
/// server's own address (here out of a seeded cache delegation), installs
/// it and resumes.
#[tokio::test]
async fn test_glueless_referral_suspends_and_resumes() {
    let tld = helpers::start_authority(
        "127.0.0.101",
        Arc::new(|request, _| match helpers::qname(request).as_str() {
            "example.com" => helpers::referral(
                request,
                vec![helpers::ns_record("example.com", "ns1.example.net")],
                vec![],
            ),
            _ => helpers::nxdomain(request, "com"),
        }),
    )
    .await;
    let auth = helpers::start_authority(
        "127.0.0.102",
        Arc::new(|request, _| {
            helpers::answer(
                request,
                vec![helpers::a_record("example.com", "93.184.216.34")],
            )
        }),
    )
    .await;
    // Serves the A record of the glueless name server.
    let ns_zone = helpers::start_authority(
        "127.0.0.103",
        Arc::new(|request, _| match helpers::qname(request).as_str() {
            "ns1.example.net" => helpers::answer(
                request,
                vec![helpers::a_record("ns1.example.net", "127.0.0.102")],
            ),
            _ => helpers::nxdomain(request, "example.net"),
        }),
    )
    .await;
    let (Some(tld), Some(auth), Some(ns_zone)) = (tld, auth, ns_zone) else {
        return;
    };

    let (root, root_addr) = MockDnsServer::start(Arc::new(|request, _| {
        helpers::referral(
            request,
            vec![helpers::ns_record("com", "a.gtld.test")],
            vec![helpers::a_record("a.gtld.test", "127.0.0.101")],
        )
    }))
    .await
    .unwrap();

    // Seed a delegation so the suspended walk finds example.net's authority
    // without touching the real roots.
    let cache = Arc::new(InMemoryCache::new());
    let probe = ferric_dns_resolver::message::build_query(
        &helpers::name("ns1.example.net"),
        RecordType::A,
        false,
    );
    let seeded = helpers::referral(
        &probe,
        vec![helpers::ns_record("example.net", "ns.example.net")],
        vec![helpers::a_record("ns.example.net", "127.0.0.103")],
    );
    cache.store(&seeded);

    let resolver = IterativeResolver::new(test_config())
        .with_cache(cache)
        .with_servers(vec![NameServer::with_endpoint("root.test", root_addr)]);

    let response = resolver.resolve("example.com", RecordType::A).await.unwrap();
    assert_eq!(response.message.response_code(), ResponseCode::NoError);
    assert_eq!(response.message.answers().len(), 1);

    drop((root, tld, auth, ns_zone));
}

#[tokio::test]
async fn test_warm_cache_answers_without_queries() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let (server, addr) = MockDnsServer::start(Arc::new(move |request, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        helpers::answer(request, vec![helpers::a_record("cached.test", "10.7.7.7")])
    }))
    .await
    .unwrap();

    let cache = Arc::new(InMemoryCache::new());
    let resolver = IterativeResolver::new(test_config())
        .with_cache(cache)
        .with_servers(vec![NameServer::with_endpoint("auth.test", addr)]);

    let first = resolver.resolve_ip("cached.test").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let second = resolver.resolve_ip("cached.test").await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1, "second lookup hit the wire");
    assert_eq!(first, second);

    drop(server);
}

#[tokio::test]
async fn test_caller_server_list_is_not_reordered() {
    let (server, addr) = MockDnsServer::start(Arc::new(|request, _| {
        helpers::answer(request, vec![helpers::a_record("example.com", "10.0.0.1")])
    }))
    .await
    .unwrap();

    let servers: Vec<NameServer> = (0..4)
        .map(|i| {
            let mut ns = NameServer::with_endpoint(format!("ns{}.test", i), addr);
            ns.port = Some(addr.port());
            ns
        })
        .collect();
    let original = servers.clone();

    let resolver = IterativeResolver::new(test_config()).with_servers(servers.clone());
    for _ in 0..4 {
        resolver.resolve("example.com", RecordType::A).await.unwrap();
    }
    assert_eq!(servers, original);

    drop(server);
}
