//! Stub forwarder to upstream recursive resolvers.

use crate::{DnsClient, DnsResult, Exchanger, ResolveError, Result, StubResolver, TransportError};
use async_trait::async_trait;
use quill_proto::{Message, Name, Question, RecordType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default per-exchange timeout for stub queries.
const STUB_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of passes over the upstream list.
const STUB_RETRIES: u32 = 2;

/// A stub resolver that forwards every query to upstream recursive
/// resolvers over UDP with DNSSEC OK set.
///
/// The Secure bit of a forwarded answer is the upstream's AD flag, so this
/// stub is only as trustworthy as the configured upstreams. A SERVFAIL from
/// every upstream surfaces as [`ResolveError::ServFail`], which is what lets
/// the extension pipeline treat the name as a HIP-5 candidate.
pub struct ForwardStub {
    client: Arc<DnsClient>,
    upstreams: Vec<SocketAddr>,
    retries: u32,
}

impl ForwardStub {
    /// Creates a forwarder over the given upstreams.
    pub fn new(upstreams: Vec<SocketAddr>) -> Self {
        Self {
            client: Arc::new(DnsClient::new(STUB_TIMEOUT)),
            upstreams,
            retries: STUB_RETRIES,
        }
    }

    /// Overrides the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }
}

#[async_trait]
impl StubResolver for ForwardStub {
    async fn query(&self, name: &Name, qtype: RecordType) -> Result<DnsResult> {
        if self.upstreams.is_empty() {
            return Err(TransportError::Io("no upstream resolvers".to_string()).into());
        }

        let query = Message::query_dnssec(Question::internet(name.clone(), qtype));
        let mut last_err = ResolveError::ServFail;

        for attempt in 0..self.retries {
            for upstream in &self.upstreams {
                match self.client.exchange(&query, *upstream).await {
                    Ok(response) => {
                        if response.is_truncated() {
                            last_err = TransportError::Truncated.into();
                            continue;
                        }
                        if response.is_servfail() {
                            last_err = ResolveError::ServFail;
                            continue;
                        }
                        return Ok(DnsResult::new(
                            response.answers().to_vec(),
                            response.authentic_data(),
                        ));
                    }
                    Err(e) => {
                        debug!(attempt, %upstream, error = %e, "stub upstream failed");
                        last_err = e.into();
                    }
                }
            }
        }

        Err(last_err)
    }
}
