//! Extension handler registry.
//!
//! HIP-5 extensions are selected by the final label of a delegation's
//! pseudo-host: an NS record pointing at `<payload>._eth.` selects the
//! handler registered under `_eth`, with the leading labels carrying the
//! handler's configuration payload (for `_eth`, a registry contract
//! address).
//!
//! The registry is built once at startup and read-only afterwards; handlers
//! must therefore be safe for concurrent calls.

use async_trait::async_trait;
use quill_proto::{Name, RecordType, ResourceRecord};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

/// Opaque error type returned by extension handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A pluggable resolution backend for one extension tag.
#[async_trait]
pub trait Hip5Handler: Send + Sync {
    /// Synthesizes records for `(qname, qtype)`.
    ///
    /// `ns` is the NS record that selected this handler, passed through
    /// unchanged so the handler can read its payload labels.
    async fn resolve(
        &self,
        qname: &Name,
        qtype: RecordType,
        ns: &ResourceRecord,
    ) -> std::result::Result<Vec<ResourceRecord>, HandlerError>;
}

/// Builder for the handler table. Consumed by [`RegistryBuilder::build`];
/// there is deliberately no way to mutate a built registry.
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, Arc<dyn Hip5Handler>>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under an extension tag (e.g. `_eth`).
    pub fn register(mut self, tag: &str, handler: Arc<dyn Hip5Handler>) -> Self {
        self.handlers.insert(tag.to_ascii_lowercase(), handler);
        self
    }

    /// Finalizes the registry.
    pub fn build(self) -> Hip5Registry {
        Hip5Registry {
            handlers: self.handlers,
        }
    }
}

/// The immutable extension-tag → handler table.
#[derive(Default)]
pub struct Hip5Registry {
    handlers: HashMap<String, Arc<dyn Hip5Handler>>,
}

impl Hip5Registry {
    /// Looks up the handler for a tag.
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Hip5Handler>> {
        self.handlers.get(&tag.to_ascii_lowercase())
    }

    /// Returns true if a handler is registered under `tag`.
    pub fn is_registered(&self, tag: &str) -> bool {
        self.handlers.contains_key(&tag.to_ascii_lowercase())
    }

    /// Returns true if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// The TLD whose delegation is hardwired rather than fetched from the root.
pub(crate) const RESERVED_ETH_TLD: &str = "eth";

/// The ENS registry pseudo-host: the first label is the registry contract
/// address, the final `_eth` label selects the handler.
pub const ETH_REGISTRY_HOST: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e._eth.";

/// The synthetic `eth.` NS rrset handed to `_eth` handlers.
///
/// The `eth` TLD never appears in the root zone, so its delegation is
/// synthesized instead of queried.
pub fn eth_ns_rrset() -> Vec<ResourceRecord> {
    let owner = Name::from_str("eth.").expect("static name");
    let host = Name::from_str(ETH_REGISTRY_HOST).expect("static name");
    vec![ResourceRecord::ns(owner, 86400, host)]
}
