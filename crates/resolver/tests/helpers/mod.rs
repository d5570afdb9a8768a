#![allow(dead_code)]

use ferric_dns_resolver::message;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, MX, NS, SOA};
use hickory_proto::rr::{Name, RData, Record, RecordType as WireType};
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProto {
    Udp,
    Tcp,
}

pub type Handler = Arc<dyn Fn(&Message, WireProto) -> Message + Send + Sync>;

/// A scripted DNS server answering on UDP and TCP at the same address.
pub struct MockDnsServer {
    addr: SocketAddr,
    udp_shutdown: Option<oneshot::Sender<()>>,
    tcp_shutdown: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start(handler: Handler) -> std::io::Result<(Self, SocketAddr)> {
        let udp = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = udp.local_addr()?;
        let tcp = TcpListener::bind(addr).await?;
        let server = Self::spawn(udp, tcp, addr, handler);
        Ok((server, addr))
    }

    /// Binds a specific address. Referral glue always points at port 53, so
    /// multi-level tests park fake authorities on distinct loopback
    /// addresses; when the environment refuses the bind, the caller skips.
    pub async fn start_on(addr: SocketAddr, handler: Handler) -> std::io::Result<(Self, SocketAddr)> {
        let udp = UdpSocket::bind(addr).await?;
        let addr = udp.local_addr()?;
        let tcp = TcpListener::bind(addr).await?;
        let server = Self::spawn(udp, tcp, addr, handler);
        Ok((server, addr))
    }

    fn spawn(udp: UdpSocket, tcp: TcpListener, addr: SocketAddr, handler: Handler) -> Self {
        let (udp_tx, mut udp_rx) = oneshot::channel();
        let udp_handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut udp_rx => break,
                    received = udp.recv_from(&mut buf) => {
                        let Ok((len, peer)) = received else { break };
                        let Ok(request) = Message::from_vec(&buf[..len]) else { continue };
                        let response = udp_handler(&request, WireProto::Udp);
                        if let Ok(bytes) = message::serialize(&response) {
                            let _ = udp.send_to(&bytes, peer).await;
                        }
                    }
                }
            }
        });

        let (tcp_tx, mut tcp_rx) = oneshot::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut tcp_rx => break,
                    accepted = tcp.accept() => {
                        let Ok((mut stream, _)) = accepted else { break };
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            let mut len_buf = [0u8; 2];
                            if stream.read_exact(&mut len_buf).await.is_err() {
                                return;
                            }
                            let len = u16::from_be_bytes(len_buf) as usize;
                            let mut buf = vec![0u8; len];
                            if stream.read_exact(&mut buf).await.is_err() {
                                return;
                            }
                            let Ok(request) = Message::from_vec(&buf) else { return };
                            let response = handler(&request, WireProto::Tcp);
                            let Ok(bytes) = message::serialize(&response) else { return };
                            let prefix = (bytes.len() as u16).to_be_bytes();
                            let _ = stream.write_all(&prefix).await;
                            let _ = stream.write_all(&bytes).await;
                            let _ = stream.flush().await;
                        });
                    }
                }
            }
        });

        MockDnsServer {
            addr,
            udp_shutdown: Some(udp_tx),
            tcp_shutdown: Some(tcp_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.udp_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(tx) = self.tcp_shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Tries to park a mock authority on `ip:53`. Port 53 needs privileges in
/// some environments; `None` means the test should bow out.
pub async fn start_authority(ip: &str, handler: Handler) -> Option<MockDnsServer> {
    let addr: SocketAddr = format!("{}:53", ip).parse().unwrap();
    match MockDnsServer::start_on(addr, handler).await {
        Ok((server, _)) => Some(server),
        Err(e) => {
            eprintln!("skipping: cannot bind {}: {}", addr, e);
            None
        }
    }
}

pub fn name(s: &str) -> Name {
    let mut parsed = Name::from_str(s).expect("test name is valid");
    parsed.set_fqdn(true);
    parsed
}

pub fn qname(request: &Message) -> String {
    request
        .queries()
        .first()
        .map(|q| q.name().to_utf8().trim_end_matches('.').to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn qtype(request: &Message) -> Option<WireType> {
    request.queries().first().map(|q| q.query_type())
}

/// Response skeleton mirroring the request's id and question.
pub fn respond_to(request: &Message) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.set_recursion_desired(request.recursion_desired());
    if let Some(query) = request.queries().first() {
        response.add_query(query.clone());
    }
    response
}

pub fn a_record(owner: &str, ip: &str) -> Record {
    let ip: Ipv4Addr = ip.parse().unwrap();
    Record::from_rdata(name(owner), 300, RData::A(A(ip)))
}

pub fn aaaa_record(owner: &str, ip: &str) -> Record {
    Record::from_rdata(name(owner), 300, RData::AAAA(AAAA(ip.parse().unwrap())))
}

pub fn ns_record(owner: &str, target: &str) -> Record {
    Record::from_rdata(name(owner), 3600, RData::NS(NS(name(target))))
}

pub fn mx_record(owner: &str, preference: u16, exchange: &str) -> Record {
    Record::from_rdata(
        name(owner),
        300,
        RData::MX(MX::new(preference, name(exchange))),
    )
}

pub fn soa_record(zone: &str) -> Record {
    let soa = SOA::new(
        name(&format!("ns1.{}", zone)),
        name(&format!("hostmaster.{}", zone)),
        1,
        7200,
        900,
        86400,
        300,
    );
    Record::from_rdata(name(zone), 300, RData::SOA(soa))
}

/// An answer: the records land in the answer section, AA set.
pub fn answer(request: &Message, records: Vec<Record>) -> Message {
    let mut response = respond_to(request);
    response.set_authoritative(true);
    for record in records {
        response.add_answer(record);
    }
    response
}

/// A referral: NS records in authority, glue in additional.
pub fn referral(request: &Message, ns: Vec<Record>, glue: Vec<Record>) -> Message {
    let mut response = respond_to(request);
    for record in ns {
        response.add_name_server(record);
    }
    for record in glue {
        response.add_additional(record);
    }
    response
}

pub fn nxdomain(request: &Message, zone: &str) -> Message {
    let mut response = respond_to(request);
    response.set_response_code(ResponseCode::NXDomain);
    response.set_authoritative(true);
    response.add_name_server(soa_record(zone));
    response
}

/// NoError with the zone SOA in authority: the name exists, the type does
/// not.
pub fn nodata(request: &Message, zone: &str) -> Message {
    let mut response = respond_to(request);
    response.set_authoritative(true);
    response.add_name_server(soa_record(zone));
    response
}

pub fn truncated(request: &Message) -> Message {
    let mut response = respond_to(request);
    response.set_truncated(true);
    response
}
