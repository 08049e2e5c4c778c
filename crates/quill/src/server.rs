//! UDP front end serving the resolver.

use quill_proto::{Message, ResponseCode};
use quill_resolver::{Hip5Resolver, ResolveError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, trace};

/// A UDP DNS listener answering through the extension-aware resolver.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    resolver: Arc<Hip5Resolver>,
    local_addr: SocketAddr,
}

impl UdpServer {
    /// Binds a listener.
    pub async fn bind(addr: SocketAddr, resolver: Arc<Hip5Resolver>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, "UDP listener bound");
        Ok(Self {
            socket: Arc::new(socket),
            resolver,
            local_addr,
        })
    }

    /// The bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves queries until the task is cancelled.
    pub async fn run(&self) {
        let mut buf = vec![0u8; 65535];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => {
                    let data = buf[..len].to_vec();
                    let socket = self.socket.clone();
                    let resolver = self.resolver.clone();
                    tokio::spawn(async move {
                        process_query(socket, resolver, data, src).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "UDP receive failed");
                }
            }
        }
    }
}

async fn process_query(
    socket: Arc<UdpSocket>,
    resolver: Arc<Hip5Resolver>,
    data: Vec<u8>,
    src: SocketAddr,
) {
    let Ok(query) = Message::parse(&data) else {
        // Malformed datagrams are dropped, not answered.
        trace!(client = %src, "dropping unparseable query");
        return;
    };

    let mut response = Message::response_from(&query);
    match query.question() {
        None => response.set_rcode(ResponseCode::FormErr),
        Some(question) => {
            match resolver.query(&question.qname, question.qtype).await {
                Ok(result) => {
                    response.header_mut().set_authentic_data(result.secure);
                    for rr in result.records {
                        response.add_answer(rr);
                    }
                }
                Err(ResolveError::Hip5NotSupported) => {
                    response.set_rcode(ResponseCode::NXDomain);
                }
                Err(e) => {
                    debug!(client = %src, qname = %question.qname, error = %e, "query failed");
                    response.set_rcode(ResponseCode::ServFail);
                }
            }
        }
    }

    if let Err(e) = socket.send_to(&response.to_wire(), src).await {
        debug!(client = %src, error = %e, "failed to send response");
    }
}
