//! UDP exchange client with single-in-flight coalescing.

use crate::{Exchanger, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use quill_proto::{Message, Name};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::trace;

type ExchangeOutcome = std::result::Result<Message, TransportError>;
type InflightKey = (SocketAddr, Name, u16);

/// A UDP DNS client.
///
/// Each exchange uses a fresh ephemeral socket and a random message id.
/// Identical concurrent questions to the same server collapse to a single
/// wire exchange whose outcome is broadcast to every waiter; the transport
/// itself never retries, callers iterate server addresses.
pub struct DnsClient {
    timeout: Duration,
    inflight: Mutex<HashMap<InflightKey, broadcast::Sender<ExchangeOutcome>>>,
    exchanges: AtomicU64,
}

impl DnsClient {
    /// Creates a client with the given per-exchange timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inflight: Mutex::new(HashMap::new()),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Number of wire exchanges performed so far.
    ///
    /// Coalesced queries do not increment this; tests use it to assert that
    /// identical concurrent questions collapse.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    fn inflight_key(query: &Message, addr: SocketAddr) -> Option<InflightKey> {
        let question = query.question()?;
        Some((addr, question.qname.to_lowercase(), question.qtype.to_u16()))
    }

    async fn exchange_once(&self, query: &Message, addr: SocketAddr) -> ExchangeOutcome {
        self.exchanges.fetch_add(1, Ordering::Relaxed);

        let mut query = query.clone();
        query.set_id(rand::random());
        let wire = query.to_wire();

        let bind_addr = if addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        socket
            .send(&wire)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let mut buf = vec![0u8; 65535];
        let len = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Io(e.to_string()))?;

        let response =
            Message::parse(&buf[..len]).map_err(|e| TransportError::Proto(e.to_string()))?;
        if response.id() != query.id() {
            return Err(TransportError::IdMismatch);
        }

        Ok(response)
    }
}

#[async_trait]
impl Exchanger for DnsClient {
    async fn exchange(&self, query: &Message, addr: SocketAddr) -> ExchangeOutcome {
        let Some(key) = Self::inflight_key(query, addr) else {
            return self.exchange_once(query, addr).await;
        };

        // Join an in-flight exchange for the same question, or become its
        // leader.
        enum Role {
            Follower(broadcast::Receiver<ExchangeOutcome>),
            Leader(broadcast::Sender<ExchangeOutcome>),
        }

        let role = {
            let mut inflight = self.inflight.lock();
            if let Some(tx) = inflight.get(&key) {
                Role::Follower(tx.subscribe())
            } else {
                let (tx, _rx) = broadcast::channel(1);
                inflight.insert(key.clone(), tx.clone());
                Role::Leader(tx)
            }
        };

        let leader = match role {
            Role::Follower(mut rx) => {
                trace!(?addr, "joining in-flight exchange");
                return match rx.recv().await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(TransportError::Proto(
                        "coalesced exchange dropped".to_string(),
                    )),
                };
            }
            Role::Leader(tx) => tx,
        };

        let outcome = self.exchange_once(query, addr).await;

        self.inflight.lock().remove(&key);
        let _ = leader.send(outcome.clone());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_proto::{Question, RecordType};
    use std::str::FromStr;
    use std::sync::Arc;

    /// A loopback DNS responder that answers every query after a delay.
    async fn spawn_responder(delay: Duration) -> (SocketAddr, Arc<AtomicU64>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let hits = Arc::new(AtomicU64::new(0));
        let hits_clone = hits.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                hits_clone.fetch_add(1, Ordering::SeqCst);
                let Ok(query) = Message::parse(&buf[..len]) else {
                    continue;
                };
                tokio::time::sleep(delay).await;
                let response = Message::response_from(&query);
                let _ = socket.send_to(&response.to_wire(), peer).await;
            }
        });

        (addr, hits)
    }

    fn a_query(name: &str) -> Message {
        Message::query(Question::internet(
            Name::from_str(name).unwrap(),
            RecordType::A,
        ))
    }

    #[tokio::test]
    async fn exchange_round_trip() {
        let (addr, hits) = spawn_responder(Duration::ZERO).await;
        let client = DnsClient::new(Duration::from_secs(2));

        let response = client.exchange(&a_query("example.com."), addr).await.unwrap();
        assert!(response.header().is_response());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(client.exchange_count(), 1);
    }

    #[tokio::test]
    async fn identical_concurrent_questions_coalesce() {
        let (addr, hits) = spawn_responder(Duration::from_millis(150)).await;
        let client = Arc::new(DnsClient::new(Duration::from_secs(2)));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let client = client.clone();
            tasks.push(tokio::spawn(async move {
                client.exchange(&a_query("coalesce.example."), addr).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // All eight callers shared one wire exchange.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(client.exchange_count(), 1);
    }

    #[tokio::test]
    async fn distinct_questions_do_not_coalesce() {
        let (addr, hits) = spawn_responder(Duration::from_millis(50)).await;
        let client = Arc::new(DnsClient::new(Duration::from_secs(2)));

        let first = {
            let client = client.clone();
            tokio::spawn(async move { client.exchange(&a_query("one.example."), addr).await })
        };
        let second = {
            let client = client.clone();
            tokio::spawn(async move { client.exchange(&a_query("two.example."), addr).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        // Bind a socket that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let client = DnsClient::new(Duration::from_millis(50));
        let err = client.exchange(&a_query("slow.example."), addr).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }
}
