//! # Quill extension-aware resolver
//!
//! The resolver front end that makes HIP-5 naming work: queries are first
//! answered by a conventional recursive stub, and names whose top-level zone
//! delegates to an underscore-tagged pseudo-host (for example
//! `<payload>._eth.`) are dispatched to a registered extension handler
//! instead. Handler output is flattened — CNAMEs chased, delegations
//! followed over the wire with DNSSEC verification when DS records are
//! present — so callers always receive leaf records with an authoritative
//! Secure bit.
//!
//! The moving parts:
//!
//! - [`StubResolver`]: the conventional recursive stub seam; [`Hip5Resolver`]
//!   implements it too, so it can be installed wherever a stub is expected
//! - [`Hip5Registry`]: the immutable extension-tag → handler table
//! - [`Exchanger`] / [`DnsClient`]: datagram transport with single-in-flight
//!   coalescing; tests substitute their own exchangers
//! - [`ForwardStub`]: a UDP forwarder to upstream recursive resolvers

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod forward;
pub mod hip5;
pub mod registry;

pub use client::DnsClient;
pub use forward::ForwardStub;
pub use hip5::{Hip5Resolver, Hip5ResolverBuilder, MAX_FLATTEN_DEPTH};
pub use registry::{eth_ns_rrset, HandlerError, Hip5Handler, Hip5Registry, RegistryBuilder};

use async_trait::async_trait;
use quill_dnssec::DnssecError;
use quill_proto::{Message, Name, RData, RecordType, ResourceRecord, ResponseCode};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failures from a single datagram exchange.
///
/// Kept `Clone` so a coalesced exchange can hand the same outcome to every
/// waiter.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The exchange did not complete within its deadline.
    #[error("exchange timed out")]
    Timeout,

    /// The response carried the TC bit.
    #[error("response truncated")]
    Truncated,

    /// The response carried an unexpected response code.
    #[error("exchange failed with rcode {0}")]
    BadRcode(ResponseCode),

    /// The response id did not match the query.
    #[error("response id mismatch")]
    IdMismatch,

    /// Socket-level failure.
    #[error("network error: {0}")]
    Io(String),

    /// The response could not be parsed.
    #[error("protocol error: {0}")]
    Proto(String),
}

/// Errors surfaced by the resolver pipeline.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The root zone chain is not synced; resolution is meaningless.
    #[error("resolver not fully synced")]
    NotReady,

    /// The stub's upstream answered SERVFAIL.
    #[error("upstream returned SERVFAIL")]
    ServFail,

    /// No registered extension handler applied to the name.
    #[error("no supported hip-5 record found")]
    Hip5NotSupported,

    /// A CNAME pointed back at the queried name.
    #[error("bad cname target")]
    BadCnameTarget,

    /// CNAME chasing or delegation following exceeded the recursion bound.
    #[error("max depth reached")]
    MaxDepthReached,

    /// A handler-produced delegation was internally inconsistent.
    #[error("bad delegation: {0}")]
    BadDelegation(String),

    /// An extension handler failed.
    #[error("hip-5 handler failed: {0}")]
    Handler(String),

    /// A wire exchange failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// DNSSEC validation of a sub-response failed.
    #[error(transparent)]
    Dnssec(#[from] DnssecError),
}

/// Result alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// The outcome of a resolution: leaf records plus the Secure bit.
///
/// The Secure bit is authoritative only when the query returned without an
/// error; `false` covers both "validated insecure" and "not validated".
#[derive(Debug, Clone, Default)]
pub struct DnsResult {
    /// Resolved records, filtered to the queried type.
    pub records: Vec<ResourceRecord>,
    /// True when every record is covered by a verified signature chain.
    pub secure: bool,
}

impl DnsResult {
    /// Creates a result.
    pub fn new(records: Vec<ResourceRecord>, secure: bool) -> Self {
        Self { records, secure }
    }

    /// Extracts the A/AAAA addresses from the records.
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.records
            .iter()
            .filter_map(|rr| match rr.rdata() {
                RData::A(a) => Some(IpAddr::V4(*a)),
                RData::AAAA(a) => Some(IpAddr::V6(*a)),
                _ => None,
            })
            .collect()
    }
}

/// The conventional recursive stub interface.
///
/// [`Hip5Resolver`] both consumes a stub (for non-extension names) and
/// implements this trait itself, so callers written against the stub seam
/// transparently become extension-aware.
#[async_trait]
pub trait StubResolver: Send + Sync {
    /// Resolves `(name, qtype)` to records plus a Secure bit.
    async fn query(&self, name: &Name, qtype: RecordType) -> Result<DnsResult>;

    /// Resolves a host to its addresses, trying A then AAAA.
    async fn lookup_ip(&self, host: &Name) -> Result<Vec<IpAddr>> {
        let mut ips = Vec::new();
        let mut last_err = None;

        for qtype in [RecordType::A, RecordType::AAAA] {
            match self.query(host, qtype).await {
                Ok(result) => ips.extend(result.addresses()),
                Err(e) => last_err = Some(e),
            }
        }

        if ips.is_empty() {
            if let Some(e) = last_err {
                return Err(e);
            }
        }
        Ok(ips)
    }
}

/// A single datagram exchange with one server.
///
/// The production implementation is [`DnsClient`]; tests install scripted
/// exchangers to drive the pipeline without sockets.
#[async_trait]
pub trait Exchanger: Send + Sync {
    /// Sends `query` to `addr` and awaits one response.
    async fn exchange(
        &self,
        query: &Message,
        addr: SocketAddr,
    ) -> std::result::Result<Message, TransportError>;
}

/// An optional predicate consulted before everything else in the pipeline,
/// including the sync gate. Returning a result short-circuits resolution;
/// external collaborators use this for liveness probes.
pub type QueryMiddleware = Arc<dyn Fn(&Name, RecordType) -> Option<DnsResult> + Send + Sync>;

/// The sync predicate: reports whether the root zone chain is caught up
/// enough for resolution to be meaningful.
pub type SyncCheck = Arc<dyn Fn() -> bool + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    struct ScriptedStub;

    #[async_trait]
    impl StubResolver for ScriptedStub {
        async fn query(&self, _name: &Name, qtype: RecordType) -> Result<DnsResult> {
            match qtype {
                RecordType::A => Ok(DnsResult::new(
                    vec![ResourceRecord::a(
                        Name::from_str("host.example.").unwrap(),
                        60,
                        Ipv4Addr::new(192, 0, 2, 1),
                    )],
                    false,
                )),
                _ => Err(ResolveError::ServFail),
            }
        }
    }

    #[tokio::test]
    async fn lookup_ip_collects_partial_results() {
        let stub = ScriptedStub;
        let ips = stub
            .lookup_ip(&Name::from_str("host.example.").unwrap())
            .await
            .unwrap();
        // AAAA failed but A succeeded; the error is swallowed.
        assert_eq!(ips, vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))]);
    }

    #[test]
    fn dns_result_addresses() {
        let name = Name::from_str("host.example.").unwrap();
        let result = DnsResult::new(
            vec![
                ResourceRecord::a(name.clone(), 60, Ipv4Addr::new(10, 0, 0, 1)),
                ResourceRecord::cname(name.clone(), 60, name),
            ],
            true,
        );
        assert_eq!(result.addresses().len(), 1);
    }
}
