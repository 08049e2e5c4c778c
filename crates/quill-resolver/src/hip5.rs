//! The extension-aware query pipeline and result flattener.

use crate::client::DnsClient;
use crate::registry::{Hip5Registry, RESERVED_ETH_TLD};
use crate::{
    eth_ns_rrset, DnsResult, Exchanger, QueryMiddleware, ResolveError, Result, StubResolver,
    SyncCheck, TransportError,
};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use quill_dnssec::{TrustedKeys, MIN_RSA_KEY_SIZE};
use quill_proto::{Message, Name, Question, RData, RecordType, ResourceRecord};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

/// Recursion bound shared by CNAME chasing and delegation following.
pub const MAX_FLATTEN_DEPTH: usize = 10;

/// Timeout for trusted-root exchanges.
const ROOT_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for delegated-nameserver exchanges.
const NS_TIMEOUT: Duration = Duration::from_secs(4);

/// Builder for [`Hip5Resolver`].
///
/// The exchanger hooks exist for tests: scenario tests install scripted root
/// and nameserver exchangers instead of real sockets.
pub struct Hip5ResolverBuilder {
    stub: Arc<dyn StubResolver>,
    root_addr: SocketAddr,
    synced: SyncCheck,
    registry: Hip5Registry,
    root_exchange: Option<Arc<dyn Exchanger>>,
    ns_exchange: Option<Arc<dyn Exchanger>>,
    middleware: Option<QueryMiddleware>,
    min_rsa_bits: usize,
}

impl Hip5ResolverBuilder {
    /// Starts a builder from the required pieces: the conventional stub, the
    /// trusted-root address, and the chain-synced predicate.
    pub fn new(
        stub: Arc<dyn StubResolver>,
        root_addr: SocketAddr,
        synced: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            stub,
            root_addr,
            synced: Arc::new(synced),
            registry: Hip5Registry::default(),
            root_exchange: None,
            ns_exchange: None,
            middleware: None,
            min_rsa_bits: MIN_RSA_KEY_SIZE,
        }
    }

    /// Installs the extension handler registry.
    pub fn registry(mut self, registry: Hip5Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Overrides the trusted-root exchanger.
    pub fn root_exchange(mut self, exchanger: Arc<dyn Exchanger>) -> Self {
        self.root_exchange = Some(exchanger);
        self
    }

    /// Overrides the delegated-nameserver exchanger.
    pub fn ns_exchange(mut self, exchanger: Arc<dyn Exchanger>) -> Self {
        self.ns_exchange = Some(exchanger);
        self
    }

    /// Installs the query middleware consulted before the sync gate.
    pub fn middleware(mut self, middleware: QueryMiddleware) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// Overrides the minimum RSA key size used during sub-validation.
    pub fn min_rsa_key_size(mut self, bits: usize) -> Self {
        self.min_rsa_bits = bits;
        self
    }

    /// Builds the resolver.
    pub fn build(self) -> Hip5Resolver {
        Hip5Resolver {
            stub: self.stub,
            root_addr: self.root_addr,
            synced: self.synced,
            registry: self.registry,
            root_exchange: self
                .root_exchange
                .unwrap_or_else(|| Arc::new(DnsClient::new(ROOT_TIMEOUT))),
            ns_exchange: self
                .ns_exchange
                .unwrap_or_else(|| Arc::new(DnsClient::new(NS_TIMEOUT))),
            middleware: self.middleware,
            min_rsa_bits: self.min_rsa_bits,
        }
    }
}

/// The extension-aware resolver.
///
/// Non-extension names go to the stub first; a SERVFAIL (or a reserved TLD)
/// triggers a trusted-root NS lookup, HIP-5 handler dispatch, and flattening
/// of the handler's output into leaf records with a computed Secure bit.
pub struct Hip5Resolver {
    stub: Arc<dyn StubResolver>,
    root_addr: SocketAddr,
    synced: SyncCheck,
    registry: Hip5Registry,
    root_exchange: Arc<dyn Exchanger>,
    ns_exchange: Arc<dyn Exchanger>,
    middleware: Option<QueryMiddleware>,
    min_rsa_bits: usize,
}

impl Hip5Resolver {
    /// Resolves a query.
    pub async fn query(&self, name: &Name, qtype: RecordType) -> Result<DnsResult> {
        if let Some(middleware) = &self.middleware {
            if let Some(result) = middleware(name, qtype) {
                return Ok(result);
            }
        }
        self.query_internal(name.clone(), qtype, 0).await
    }

    fn query_internal(
        &self,
        name: Name,
        qtype: RecordType,
        depth: usize,
    ) -> BoxFuture<'_, Result<DnsResult>> {
        async move {
            if !(self.synced)() {
                return Err(ResolveError::NotReady);
            }
            if depth > MAX_FLATTEN_DEPTH {
                return Err(ResolveError::MaxDepthReached);
            }

            let name = name.to_lowercase();
            let tld = name.tld();

            // Non-reserved TLDs go to the stub first; anything but a
            // SERVFAIL is final.
            let mut stub_result: Option<Result<DnsResult>> = None;
            if tld != RESERVED_ETH_TLD {
                let result = self.stub.query(&name, qtype).await;
                match &result {
                    Err(ResolveError::ServFail) => stub_result = Some(result),
                    _ => return result,
                }
            }

            trace!(%name, %qtype, depth, "attempting hip-5 resolution");
            match self.attempt_hip5(&tld, &name, qtype, depth).await {
                Ok((records, secure)) => Ok(DnsResult::new(records, secure)),
                // The name has no extension; whatever the stub said stands.
                Err(ResolveError::Hip5NotSupported) if stub_result.is_some() => {
                    stub_result.take().ok_or(ResolveError::Hip5NotSupported)?
                }
                Err(e) => Err(e),
            }
        }
        .boxed()
    }

    /// Looks up the TLD's extension NS records and runs the matching
    /// handlers, flattening the first success.
    async fn attempt_hip5(
        &self,
        tld: &str,
        qname: &Name,
        qtype: RecordType,
        depth: usize,
    ) -> Result<(Vec<ResourceRecord>, bool)> {
        if tld.is_empty() {
            // The root apex cannot carry hip-5 records.
            return Err(ResolveError::Hip5NotSupported);
        }

        let extensions = self.lookup_extensions(tld).await?;
        if extensions.is_empty() {
            return Err(ResolveError::Hip5NotSupported);
        }

        let records = self.run_handlers(&extensions, qname, qtype).await?;
        let (records, secure) = self
            .flatten(records, Vec::new(), true, qname.clone(), qtype, depth)
            .await?;

        Ok((filter_type(records, qtype), secure))
    }

    /// Fetches `NS(tld)` from the trusted root and keeps the records whose
    /// pseudo-host selects a registered handler.
    ///
    /// The reserved `eth` TLD short-circuits to its synthetic delegation.
    async fn lookup_extensions(&self, tld: &str) -> Result<Vec<ResourceRecord>> {
        if tld == RESERVED_ETH_TLD {
            return Ok(eth_ns_rrset());
        }

        let tld_name = Name::from_str(tld)
            .map_err(|e| ResolveError::BadDelegation(format!("invalid tld {tld}: {e}")))?;
        let mut query = Message::query_dnssec(Question::internet(tld_name, RecordType::NS));
        query.header_mut().set_recursion_desired(false);

        let response = self
            .root_exchange
            .exchange(&query, self.root_addr)
            .await
            .map_err(ResolveError::Transport)?;

        if response.rcode() != quill_proto::ResponseCode::NoError {
            return Err(TransportError::BadRcode(response.rcode()).into());
        }
        if response.is_truncated() {
            return Err(TransportError::Truncated.into());
        }

        let mut extensions = Vec::new();
        for rr in response.authority() {
            let Some(host) = rr.rdata().as_ns() else {
                continue;
            };
            if self.registry.is_registered(&host.tld()) {
                extensions.push(rr.clone());
            }
        }

        debug!(tld, count = extensions.len(), "hip-5 extension lookup");
        Ok(extensions)
    }

    /// Dispatches to handlers in NS order; the first success wins.
    async fn run_handlers(
        &self,
        extensions: &[ResourceRecord],
        qname: &Name,
        qtype: RecordType,
    ) -> Result<Vec<ResourceRecord>> {
        let mut last_err: Option<ResolveError> = None;

        for rr in extensions {
            let Some(host) = rr.rdata().as_ns() else {
                continue;
            };
            let Some(handler) = self.registry.get(&host.tld()) else {
                continue;
            };

            match handler.resolve(qname, qtype, rr).await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    warn!(host = %host, error = %e, "hip-5 handler failed");
                    last_err = Some(ResolveError::Handler(e.to_string()));
                }
            }
        }

        Err(last_err.unwrap_or(ResolveError::Hip5NotSupported))
    }

    /// Flattens handler output: chases CNAMEs, follows delegations, and
    /// returns leaf records with the accumulated Secure bit.
    fn flatten(
        &self,
        records: Vec<ResourceRecord>,
        extra: Vec<ResourceRecord>,
        secure: bool,
        qname: Name,
        qtype: RecordType,
        depth: usize,
    ) -> BoxFuture<'_, Result<(Vec<ResourceRecord>, bool)>> {
        async move {
            if depth > MAX_FLATTEN_DEPTH {
                return Err(ResolveError::MaxDepthReached);
            }

            let mut cnames = Vec::new();
            let mut ns_set = Vec::new();
            let mut ds_set = Vec::new();
            for rr in &records {
                match rr.rdata() {
                    RData::CNAME(_) => cnames.push(rr.clone()),
                    RData::NS(_) => ns_set.push(rr.clone()),
                    RData::DS(_) => ds_set.push(rr.clone()),
                    _ => {}
                }
            }

            // DS records from an unverified source prove nothing.
            if !secure {
                ds_set.clear();
            }

            if !cnames.is_empty() {
                return self.resolve_cname(&cnames, &qname, qtype, depth).await;
            }
            if !ns_set.is_empty() {
                return self
                    .resolve_ns(&ns_set, &ds_set, &extra, &qname, qtype, depth)
                    .await;
            }
            if !ds_set.is_empty() {
                return Err(ResolveError::BadDelegation(
                    "DS records with no delegation".to_string(),
                ));
            }

            Ok((records, secure))
        }
        .boxed()
    }

    /// Chases CNAMEs by re-entering the pipeline; the first target that
    /// resolves wins.
    async fn resolve_cname(
        &self,
        cnames: &[ResourceRecord],
        qname: &Name,
        qtype: RecordType,
        depth: usize,
    ) -> Result<(Vec<ResourceRecord>, bool)> {
        let mut last_err: Option<ResolveError> = None;

        for rr in cnames {
            let Some(target) = rr.rdata().as_cname() else {
                continue;
            };
            let target = target.to_lowercase();
            if &target == qname {
                return Err(ResolveError::BadCnameTarget);
            }

            match self.query_internal(target, qtype, depth + 1).await {
                Ok(result) => return Ok((result.records, result.secure)),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or(ResolveError::BadCnameTarget))
    }

    /// Follows an inline delegation: queries the delegated nameservers over
    /// the wire, establishes a trusted key set when DS records are present,
    /// and recurses into the sub-response.
    async fn resolve_ns(
        &self,
        ns_set: &[ResourceRecord],
        ds_set: &[ResourceRecord],
        extra: &[ResourceRecord],
        qname: &Name,
        qtype: RecordType,
        depth: usize,
    ) -> Result<(Vec<ResourceRecord>, bool)> {
        let delegated = delegated_name(ns_set, ds_set, qname)?;

        let mut response = None;
        let mut ns_ips: Vec<IpAddr> = Vec::new();
        for rr in ns_set {
            let Some(host) = rr.rdata().as_ns() else {
                continue;
            };
            let ips = match self.lookup_ns_addr(host, extra).await {
                Ok(ips) => ips,
                Err(e) => {
                    debug!(host = %host, error = %e, "failed to resolve delegated NS host");
                    continue;
                }
            };
            match self.exchange_ns(&ips, qname.clone(), qtype).await {
                Ok(msg) => {
                    ns_ips = ips;
                    response = Some(msg);
                    break;
                }
                Err(e) => {
                    debug!(host = %host, error = %e, "delegated NS exchange failed");
                    ns_ips = ips;
                }
            }
        }

        let Some(mut msg) = response else {
            return Err(ResolveError::BadDelegation(
                "no delegated nameserver produced a response".to_string(),
            ));
        };

        let mut keys = TrustedKeys::default();
        if !ds_set.is_empty() {
            keys = self.query_dnskeys(&ns_ips, ds_set, &delegated).await?;
        }

        let mut secure = false;
        if !keys.is_empty() {
            secure = quill_dnssec::verify(
                &mut msg,
                &delegated,
                qname,
                qtype,
                &keys,
                unix_now(),
                self.min_rsa_bits,
            )?;
        }

        let depth = depth + 1;
        if !msg.answers().is_empty() {
            let answers = msg.answers().to_vec();
            self.flatten(answers, Vec::new(), secure, qname.clone(), qtype, depth)
                .await
        } else {
            let authority = msg.authority().to_vec();
            let additional = msg.additional().to_vec();
            self.flatten(authority, additional, secure, qname.clone(), qtype, depth)
                .await
        }
    }

    /// Resolves a delegated nameserver host: glue from the handler's extra
    /// records first, then the stub.
    async fn lookup_ns_addr(
        &self,
        host: &Name,
        extra: &[ResourceRecord],
    ) -> Result<Vec<IpAddr>> {
        let mut ips = Vec::new();
        for glue in extra {
            if glue.name() != host {
                continue;
            }
            match glue.rdata() {
                RData::A(a) => ips.push(IpAddr::V4(*a)),
                RData::AAAA(a) => ips.push(IpAddr::V6(*a)),
                _ => {}
            }
        }
        if !ips.is_empty() {
            return Ok(ips);
        }

        self.stub.lookup_ip(host).await
    }

    /// Exchanges one question with the delegated nameservers, trying each
    /// address until one answers untruncated. RD=0, CD=1, DO=1.
    async fn exchange_ns(
        &self,
        ips: &[IpAddr],
        qname: Name,
        qtype: RecordType,
    ) -> Result<Message> {
        let mut query = Message::query_dnssec(Question::internet(qname, qtype));
        query.header_mut().set_recursion_desired(false);
        query.header_mut().set_checking_disabled(true);

        let mut last_err: Option<TransportError> = None;
        for ip in ips {
            let addr = SocketAddr::new(*ip, 53);
            match self.ns_exchange.exchange(&query, addr).await {
                Ok(response) => {
                    if response.is_truncated() {
                        last_err = Some(TransportError::Truncated);
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| TransportError::Io("no nameserver addresses".to_string()))
            .into())
    }

    /// Fetches and verifies the delegated zone's DNSKEY rrset against the
    /// DS set, yielding the trusted keys for sub-validation.
    async fn query_dnskeys(
        &self,
        ips: &[IpAddr],
        ds_set: &[ResourceRecord],
        delegated: &Name,
    ) -> Result<TrustedKeys> {
        let mut msg = self
            .exchange_ns(ips, delegated.clone(), RecordType::DNSKEY)
            .await?;
        let keys = quill_dnssec::verify_dnskeys(
            delegated,
            &mut msg,
            ds_set,
            unix_now(),
            self.min_rsa_bits,
        )?;
        Ok(keys)
    }
}

#[async_trait]
impl StubResolver for Hip5Resolver {
    async fn query(&self, name: &Name, qtype: RecordType) -> Result<DnsResult> {
        Hip5Resolver::query(self, name, qtype).await
    }
}

/// Validates that a delegation's records agree on one owner and that the
/// query belongs under it.
fn delegated_name(
    ns_set: &[ResourceRecord],
    ds_set: &[ResourceRecord],
    qname: &Name,
) -> Result<Name> {
    let mut zone: Option<Name> = None;
    for rr in ns_set {
        match &zone {
            None => zone = Some(rr.name().to_lowercase()),
            Some(z) => {
                if rr.name() != z {
                    return Err(ResolveError::BadDelegation(format!(
                        "NS owner {} does not match {}",
                        rr.name(),
                        z
                    )));
                }
            }
        }
    }

    let zone = zone
        .ok_or_else(|| ResolveError::BadDelegation("delegation with no NS records".to_string()))?;

    if !qname.is_subdomain_of(&zone) {
        return Err(ResolveError::BadDelegation(format!(
            "{qname} is not a child of {zone}"
        )));
    }

    for rr in ds_set {
        if rr.name() != &zone {
            return Err(ResolveError::BadDelegation(format!(
                "DS owner {} does not match {}",
                rr.name(),
                zone
            )));
        }
    }

    Ok(zone)
}

/// Keeps only the records matching the queried type.
fn filter_type(records: Vec<ResourceRecord>, qtype: RecordType) -> Vec<ResourceRecord> {
    records.into_iter().filter(|rr| rr.rtype() == qtype).collect()
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    #[test]
    fn delegated_name_agreement() {
        let ns = vec![
            ResourceRecord::ns(name("sub.forever."), 300, name("ns1.test.")),
            ResourceRecord::ns(name("SUB.forever."), 300, name("ns2.test.")),
        ];
        let zone = delegated_name(&ns, &[], &name("www.sub.forever.")).unwrap();
        assert_eq!(zone, name("sub.forever."));

        // qname outside the delegation.
        assert!(delegated_name(&ns, &[], &name("www.other.forever.")).is_err());

        // Disagreeing NS owners.
        let mixed = vec![
            ResourceRecord::ns(name("a.forever."), 300, name("ns1.test.")),
            ResourceRecord::ns(name("b.forever."), 300, name("ns1.test.")),
        ];
        assert!(delegated_name(&mixed, &[], &name("www.a.forever.")).is_err());

        // DS owner disagreeing with the NS owner.
        let ds = vec![ResourceRecord::new(
            name("other.forever."),
            RecordType::DS,
            quill_proto::RecordClass::IN,
            300,
            RData::DS(quill_proto::Ds::new(1, 15, 2, vec![0; 32])),
        )];
        assert!(delegated_name(&ns, &ds, &name("www.sub.forever.")).is_err());
    }

    #[test]
    fn filter_type_keeps_only_qtype() {
        let records = vec![
            ResourceRecord::a(name("x.test."), 60, "10.0.0.1".parse().unwrap()),
            ResourceRecord::cname(name("x.test."), 60, name("y.test.")),
        ];
        let filtered = filter_type(records, RecordType::A);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].rtype(), RecordType::A);
    }
}
