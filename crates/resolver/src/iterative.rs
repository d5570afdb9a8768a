//! The iterative resolution state machine.
//!
//! Resolution walks from the roots (or a caller-supplied server set) toward
//! an authoritative answer, adopting referral server sets hop by hop. When a
//! referral names a server whose address is unknown, the walk suspends: the
//! current question, server list, position and protocol are pushed as a
//! frame, and the walk restarts with the server's own A/AAAA as the
//! question. Popping a frame installs the resolved address and resumes the
//! parent at the server it was about to try.

use crate::cache::DnsCache;
use crate::client::ClientResolver;
use crate::endpoint;
use crate::message::{self, DnsResponse};
use crate::proxy::ProxyDispatcher;
use crate::referral;
use crate::roots;
use ferric_dns_domain::{DnsProtocol, NameServer, RecordType, ResolveError, ResolverConfig};
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Name, RecordType as WireType};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Question {
    name: Name,
    rtype: RecordType,
}

/// A suspended resolution, waiting on the address of one of its servers.
#[derive(Debug, Clone)]
struct ResolverFrame {
    question: Question,
    servers: Vec<NameServer>,
    ns_index: usize,
    protocol: DnsProtocol,
}

/// Per-call mutable state. The resolver itself stays immutable so
/// concurrent `resolve` calls never interfere.
struct Walk {
    question: Question,
    servers: Vec<NameServer>,
    protocol: DnsProtocol,
    stack: Vec<ResolverFrame>,
    /// Server index to resume at after a pop; read once, then reset.
    stack_ns_index: usize,
}

impl Walk {
    /// Suspends the current level to go resolve `servers[index]`'s address.
    fn suspend(&mut self, index: usize, ns_question: Question, ns_protocol: DnsProtocol) {
        let servers = std::mem::take(&mut self.servers);
        self.stack.push(ResolverFrame {
            question: std::mem::replace(&mut self.question, ns_question),
            servers,
            ns_index: index,
            protocol: self.protocol,
        });
        self.protocol = ns_protocol;
        self.stack_ns_index = 0;
    }

    /// Pops the parent frame and installs the resolved address into the
    /// server that was being resolved. If the answer carries no usable
    /// address the server is skipped instead.
    fn resume(&mut self, answer: &Message) {
        let frame = self.stack.pop().expect("resume with an empty stack");
        let mut servers = frame.servers;
        let installed =
            endpoint::install_endpoint(&mut servers[frame.ns_index], answer, frame.protocol);
        self.question = frame.question;
        self.protocol = frame.protocol;
        self.servers = servers;
        self.stack_ns_index = if installed {
            frame.ns_index
        } else {
            frame.ns_index + 1
        };
    }

    /// Pops the parent frame, advancing past the server that could not be
    /// used.
    fn pop_skip(&mut self) {
        let frame = self.stack.pop().expect("pop with an empty stack");
        self.question = frame.question;
        self.protocol = frame.protocol;
        self.servers = frame.servers;
        self.stack_ns_index = frame.ns_index + 1;
    }
}

enum ResponseKind {
    Answers,
    NegativeSoa,
    Delegation,
    NxDomain,
    Miss,
}

fn classify(message: &Message) -> ResponseKind {
    match message.response_code() {
        ResponseCode::NXDomain => ResponseKind::NxDomain,
        ResponseCode::NoError => {
            if !message.answers().is_empty() {
                return ResponseKind::Answers;
            }
            let authority = message.name_servers();
            if let Some(first) = authority.first() {
                if first.record_type() == WireType::SOA {
                    return ResponseKind::NegativeSoa;
                }
                if authority
                    .iter()
                    .any(|record| record.record_type() == WireType::NS)
                {
                    return ResponseKind::Delegation;
                }
            }
            ResponseKind::Miss
        }
        _ => ResponseKind::Miss,
    }
}

pub struct IterativeResolver {
    config: ResolverConfig,
    servers: Option<Vec<NameServer>>,
    cache: Option<Arc<dyn DnsCache>>,
    proxy: Option<Arc<dyn ProxyDispatcher>>,
}

impl IterativeResolver {
    pub fn new(config: ResolverConfig) -> Self {
        IterativeResolver {
            config,
            servers: None,
            cache: None,
            proxy: None,
        }
    }

    /// Starts resolution from this fixed set instead of the roots.
    pub fn with_servers(mut self, servers: Vec<NameServer>) -> Self {
        self.servers = Some(servers);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn DnsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn ProxyDispatcher>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `(name, rtype)` to a response that answers it, is an
    /// authoritative negative, or is NXDOMAIN. If every path is exhausted
    /// without a cleaner result the last observed response is returned.
    pub async fn resolve(
        &self,
        name: &str,
        rtype: RecordType,
    ) -> Result<DnsResponse, ResolveError> {
        let name = message::parse_name(name)?;
        self.run(Question { name, rtype }).await
    }

    async fn run(&self, question: Question) -> Result<DnsResponse, ResolveError> {
        let prefer_ipv6 = self.config.prefer_ipv6;
        let mut state = Walk {
            question,
            servers: Vec::new(),
            protocol: self.config.protocol,
            stack: Vec::new(),
            stack_ns_index: 0,
        };
        // Work on a copy of the caller's list; shuffling must never touch
        // their storage.
        if let Some(list) = &self.servers {
            if !list.is_empty() {
                state.servers = list.clone();
                referral::shuffle(&mut state.servers);
            }
        }

        let mut skip_cache = false;
        let mut last_error: Option<ResolveError> = None;
        let mut last_response: Option<DnsResponse> = None;

        'stack: loop {
            if !std::mem::take(&mut skip_cache) {
                if let Some(cache) = &self.cache {
                    let probe =
                        message::build_query(&state.question.name, state.question.rtype, false);
                    if let Some(hit) = cache.lookup(&probe) {
                        match classify(&hit) {
                            ResponseKind::Answers => {
                                let response = DnsResponse::from_cache(hit, state.protocol);
                                if state.stack.is_empty() {
                                    return Ok(response);
                                }
                                state.resume(&response.message);
                                continue 'stack;
                            }
                            ResponseKind::NegativeSoa => {
                                if state.stack.is_empty() {
                                    return Ok(DnsResponse::from_cache(hit, state.protocol));
                                }
                                if state.question.rtype == RecordType::Aaaa {
                                    state.question.rtype = RecordType::A;
                                    continue 'stack;
                                }
                                state.pop_skip();
                                continue 'stack;
                            }
                            ResponseKind::Delegation => {
                                if state.servers.is_empty() {
                                    let mut cached =
                                        referral::extract_referral(&hit, prefer_ipv6, true);
                                    if !cached.is_empty() {
                                        debug!(
                                            count = cached.len(),
                                            "Starting from cached delegation"
                                        );
                                        referral::shuffle(&mut cached);
                                        state.servers = cached;
                                    }
                                }
                            }
                            ResponseKind::NxDomain => {
                                if state.stack.is_empty() {
                                    return Ok(DnsResponse::from_cache(hit, state.protocol));
                                }
                                state.pop_skip();
                                continue 'stack;
                            }
                            ResponseKind::Miss => {}
                        }
                    }
                }
            }

            if state.servers.is_empty() {
                state.servers = roots::root_servers(prefer_ipv6);
                referral::shuffle(&mut state.servers);
            }

            for hop in 1..=self.config.max_hops {
                let list_len = state.servers.len();
                let start = std::mem::take(&mut state.stack_ns_index).min(list_len);
                let mut next_servers: Option<Vec<NameServer>> = None;

                'servers: for i in start..list_len {
                    if !state.servers[i].is_resolved(state.protocol) && self.proxy.is_none() {
                        if state.stack.len() >= self.config.max_stack_depth {
                            warn!(
                                host = %state.servers[i].host,
                                "Name-server resolution depth exhausted"
                            );
                            return match last_response {
                                Some(response) => Ok(response),
                                None => Err(ResolveError::no_response(last_error)),
                            };
                        }
                        let ns_name = match message::parse_name(&state.servers[i].host) {
                            Ok(name) => name,
                            Err(e) => {
                                last_error = Some(e);
                                continue 'servers;
                            }
                        };
                        debug!(host = %state.servers[i].host, depth = state.stack.len() + 1, "Suspending to resolve name server");
                        let rtype = if prefer_ipv6 {
                            RecordType::Aaaa
                        } else {
                            RecordType::A
                        };
                        state.suspend(
                            i,
                            Question {
                                name: ns_name,
                                rtype,
                            },
                            self.config.ns_protocol,
                        );
                        continue 'stack;
                    }
                    let server = state.servers[i].clone();

                    let mut client = ClientResolver::new(
                        vec![server.clone()],
                        state.protocol,
                        self.config.retries,
                        self.config.timeout(),
                    )
                    .with_prefer_ipv6(prefer_ipv6);
                    if let Some(proxy) = &self.proxy {
                        client = client.with_proxy(Arc::clone(proxy));
                    }

                    let request = message::build_query(
                        &state.question.name,
                        state.question.rtype,
                        state.protocol.is_forwarder_only(),
                    );
                    let response = match client.resolve(request).await {
                        Ok(response) => response,
                        Err(e) => {
                            debug!(server = %server, error = %e, "Name server unusable");
                            // For a single server the client wraps the cause;
                            // keep the underlying error as the last one seen.
                            last_error = Some(match e {
                                ResolveError::NoResponse { last: Some(inner) } => *inner,
                                other => other,
                            });
                            continue 'servers;
                        }
                    };

                    if let Some(cache) = &self.cache {
                        cache.store(&response.message);
                    }
                    last_response = Some(response.clone());

                    // The client already retried truncated UDP over TCP, so
                    // truncation surviving here is terminal.
                    if response.message.truncated() {
                        if state.stack.is_empty() {
                            return Ok(response);
                        }
                        state.pop_skip();
                        continue 'stack;
                    }

                    match response.message.response_code() {
                        ResponseCode::NoError => {
                            if !response.message.answers().is_empty() {
                                let first = &response.message.answers()[0];
                                if !message::names_equal(first.name(), &state.question.name) {
                                    debug!(
                                        server = %server,
                                        owner = %first.name(),
                                        "Answer owner does not match question; trying next server"
                                    );
                                    continue 'servers;
                                }
                                if state.stack.is_empty() {
                                    return Ok(response);
                                }
                                state.resume(&response.message);
                                skip_cache = true;
                                continue 'stack;
                            }

                            let authority = response.message.name_servers();
                            if !authority.is_empty() {
                                if authority[0].record_type() == WireType::SOA {
                                    // The name exists with no record of this
                                    // type.
                                    if state.stack.is_empty() {
                                        return Ok(response);
                                    }
                                    if state.question.rtype == RecordType::Aaaa {
                                        state.question.rtype = RecordType::A;
                                        continue 'stack;
                                    }
                                    state.pop_skip();
                                    continue 'stack;
                                }

                                if referral::is_authoritative_empty(
                                    &response.message,
                                    &state.question.name,
                                    &server.host,
                                ) {
                                    if state.stack.is_empty() {
                                        return Ok(response);
                                    }
                                    state.pop_skip();
                                    continue 'stack;
                                }

                                if hop == self.config.max_hops {
                                    warn!(hops = hop, "Referral hop limit reached");
                                    if state.stack.is_empty() {
                                        return Ok(response);
                                    }
                                    state.pop_skip();
                                    continue 'stack;
                                }

                                let extracted = referral::extract_referral(
                                    &response.message,
                                    prefer_ipv6,
                                    false,
                                );
                                if extracted.is_empty() {
                                    // Tie-break against the length of the
                                    // list being iterated, not a reassigned
                                    // one.
                                    if i + 1 == list_len {
                                        if state.stack.is_empty() {
                                            return Ok(response);
                                        }
                                        state.pop_skip();
                                        continue 'stack;
                                    }
                                    continue 'servers;
                                }

                                if state.protocol.is_forwarder_only() {
                                    if state.stack.is_empty() {
                                        return Ok(response);
                                    }
                                    state.pop_skip();
                                    continue 'stack;
                                }

                                next_servers = Some(extracted);
                                break 'servers;
                            }

                            // NoError with nothing at all in it.
                            if i + 1 == list_len {
                                if state.stack.is_empty() {
                                    return Ok(response);
                                }
                                state.pop_skip();
                                continue 'stack;
                            }
                            continue 'servers;
                        }
                        ResponseCode::NXDomain => {
                            if state.stack.is_empty() {
                                return Ok(response);
                            }
                            state.pop_skip();
                            continue 'stack;
                        }
                        other => {
                            debug!(
                                server = %server,
                                rcode = ?other,
                                "Unexpected RCODE; server possibly misconfigured"
                            );
                            if i + 1 < list_len {
                                continue 'servers;
                            }
                            if state.stack.is_empty() {
                                return Ok(response);
                            }
                            state.pop_skip();
                            continue 'stack;
                        }
                    }
                }

                match next_servers {
                    Some(mut extracted) => {
                        debug!(hop, count = extracted.len(), "Following referral");
                        referral::shuffle(&mut extracted);
                        state.servers = extracted;
                    }
                    None => {
                        // Every server in this list failed at the transport
                        // level.
                        if state.stack.is_empty() {
                            return Err(ResolveError::no_response(last_error));
                        }
                        state.pop_skip();
                        continue 'stack;
                    }
                }
            }

            // Hop limit exhausted without a terminal response.
            match last_response {
                Some(response) if state.stack.is_empty() => return Ok(response),
                Some(_) => {
                    state.pop_skip();
                }
                None => {
                    if state.stack.is_empty() {
                        return Err(ResolveError::no_response(last_error));
                    }
                    state.pop_skip();
                }
            }
        }
    }
}
