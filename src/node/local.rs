use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::constants::TRANSACTION_TTL;
use crate::id::{InfoHash, NodeId};
use crate::krpc::{
    generate_transaction_id, AnnouncePeerQuery, AnnouncePeerResponse, FindNodeQuery,
    FindNodeResponse, Found, GetPeersQuery, GetPeersResponse, Message, NodeRecord, Payload,
    PingQuery, PingResponse, Query, QueryKind, Response, TransactionId,
};

use super::error::NodeError;
use super::events::{emit, register, Events, Inbound};

struct PendingQuery {
    kind: QueryKind,
    sent_at: Instant,
}

/// This participant: identifier, address, socket, dispatch.
///
/// Queries go out fire-and-forget; UDP gives no delivery guarantee and the
/// node does not retry. Each sent query parks its transaction id in a
/// pending table, and only responses echoing a live id are accepted.
///
/// # Examples
///
/// ```no_run
/// use dht_sonar::node::LocalNode;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let node = LocalNode::bind("0.0.0.0:6881".parse()?).await?;
/// node.on_ping_query(|node, query| {
///     let _ = node.reply_ping(query);
/// });
/// # Ok(())
/// # }
/// ```
pub struct LocalNode {
    id: NodeId,
    addr: SocketAddr,
    socket: Arc<UdpSocket>,
    events: Events,
    pending: RwLock<HashMap<TransactionId, PendingQuery>>,
}

impl LocalNode {
    pub async fn bind(addr: SocketAddr) -> Result<Self, NodeError> {
        let socket = UdpSocket::bind(addr).await?;
        let addr = socket.local_addr()?;
        let id = NodeId::generate();
        info!("node {} listening on {}", id, addr);

        Ok(Self {
            id,
            addr,
            socket: Arc::new(socket),
            events: Events::default(),
            pending: RwLock::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Waits for the next datagram. Intake is the engine's job; the node
    /// only lends out the socket.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), NodeError> {
        Ok(self.socket.recv_from(buf).await?)
    }

    /// Serializes and ships `message`, then fires the sent handlers.
    /// Non-blocking; an unwritable socket surfaces as [`NodeError::Io`].
    pub fn send(&self, message: &Message, target: SocketAddr) -> Result<(), NodeError> {
        let data = message.to_bytes();
        self.socket.try_send_to(&data, target)?;
        self.events.emit_sent(self, message, target);
        debug!("sent to {}: {}", target, message);
        Ok(())
    }

    /// Decodes one inbound datagram and runs its handler chain.
    ///
    /// Decode failures propagate. Responses are gated through the pending
    /// table: an id nobody is waiting on means the message is dropped with
    /// [`NodeError::UnmatchedResponse`]. Handlers run before this returns,
    /// generic "received" first, then the kind-specific registrations in
    /// registration order.
    pub fn receive(&self, data: &[u8], origin: SocketAddr) -> Result<Message, NodeError> {
        let mut message = Message::from_bytes(data, origin)?;

        if matches!(message.payload, Payload::Response(_)) {
            let kind = self
                .take_pending(&message.transaction_id)
                .ok_or(NodeError::UnmatchedResponse)?;
            message.correlate(kind);
        }

        debug!("received from {}: {}", origin, message);
        self.events.emit_received(self, &message);
        self.dispatch(&message);
        Ok(message)
    }

    fn dispatch(&self, message: &Message) {
        match &message.payload {
            Payload::Query(query) => match query {
                Query::Ping(q) => emit(&self.events.ping_query, self, Inbound::new(message, q)),
                Query::FindNode(q) => {
                    emit(&self.events.find_node_query, self, Inbound::new(message, q))
                }
                Query::GetPeers(q) => {
                    emit(&self.events.get_peers_query, self, Inbound::new(message, q))
                }
                Query::AnnouncePeer(q) => emit(
                    &self.events.announce_peer_query,
                    self,
                    Inbound::new(message, q),
                ),
            },
            Payload::Response(response) => match response {
                Response::Ping(r) => emit(&self.events.ping_response, self, Inbound::new(message, r)),
                Response::FindNode(r) => {
                    emit(&self.events.find_node_response, self, Inbound::new(message, r))
                }
                Response::GetPeers(r) => {
                    emit(&self.events.get_peers_response, self, Inbound::new(message, r))
                }
                Response::AnnouncePeer(r) => emit(
                    &self.events.announce_peer_response,
                    self,
                    Inbound::new(message, r),
                ),
            },
            // Error messages stay observable through the generic received
            // surface.
            Payload::Error(_) => {}
        }
    }

    // ---- outbound queries ----

    pub fn ping(&self, target: &NodeRecord) -> Result<TransactionId, NodeError> {
        self.issue(Query::Ping(PingQuery { id: self.id }), target.addr)
    }

    pub fn find_node(&self, target: NodeId, ask: &NodeRecord) -> Result<TransactionId, NodeError> {
        self.issue(
            Query::FindNode(FindNodeQuery {
                id: self.id,
                target,
            }),
            ask.addr,
        )
    }

    pub fn get_peers(
        &self,
        info_hash: InfoHash,
        ask: &NodeRecord,
    ) -> Result<TransactionId, NodeError> {
        self.issue(
            Query::GetPeers(GetPeersQuery {
                id: self.id,
                info_hash,
            }),
            ask.addr,
        )
    }

    fn issue(&self, query: Query, target: SocketAddr) -> Result<TransactionId, NodeError> {
        let tid = generate_transaction_id();
        let kind = query.kind();
        let message = Message::query(tid.clone(), self.addr, query);

        self.pending.write().insert(
            tid.clone(),
            PendingQuery {
                kind,
                sent_at: Instant::now(),
            },
        );

        if let Err(e) = self.send(&message, target) {
            self.pending.write().remove(&tid);
            return Err(e);
        }
        Ok(tid)
    }

    // ---- replies ----

    pub fn reply_ping(&self, query: Inbound<'_, PingQuery>) -> Result<(), NodeError> {
        let response = Response::Ping(PingResponse { id: self.id });
        self.respond(query.transaction_id.clone(), query.origin, response)
    }

    /// Answers with the relay identifier toward the requested target, so
    /// the asker files us next to whatever it is looking for.
    pub fn reply_find_node(
        &self,
        query: Inbound<'_, FindNodeQuery>,
        nodes: Vec<NodeRecord>,
    ) -> Result<(), NodeError> {
        let response = Response::FindNode(FindNodeResponse {
            id: self.id.relay(&query.body.target),
            nodes,
        });
        self.respond(query.transaction_id.clone(), query.origin, response)
    }

    pub fn reply_get_peers(
        &self,
        query: Inbound<'_, GetPeersQuery>,
        token: Bytes,
        found: Found,
    ) -> Result<(), NodeError> {
        let response = Response::GetPeers(GetPeersResponse {
            id: self.id.relay(&query.body.info_hash),
            token,
            found,
        });
        self.respond(query.transaction_id.clone(), query.origin, response)
    }

    pub fn reply_announce_peer(
        &self,
        query: Inbound<'_, AnnouncePeerQuery>,
    ) -> Result<(), NodeError> {
        let response = Response::AnnouncePeer(AnnouncePeerResponse { id: self.id });
        self.respond(query.transaction_id.clone(), query.origin, response)
    }

    pub fn send_error(
        &self,
        transaction_id: TransactionId,
        target: SocketAddr,
        code: i64,
        text: impl Into<String>,
    ) -> Result<(), NodeError> {
        self.send(&Message::error(transaction_id, self.addr, code, text), target)
    }

    fn respond(
        &self,
        transaction_id: TransactionId,
        target: SocketAddr,
        response: Response,
    ) -> Result<(), NodeError> {
        self.send(&Message::response(transaction_id, self.addr, response), target)
    }

    // ---- transaction table ----

    fn take_pending(&self, tid: &TransactionId) -> Option<QueryKind> {
        let entry = self.pending.write().remove(tid)?;
        // An expired id is as good as one never issued.
        if entry.sent_at.elapsed() > TRANSACTION_TTL {
            return None;
        }
        Some(entry.kind)
    }

    /// Drops transaction ids whose queries will never be answered now.
    pub fn sweep_pending(&self) {
        let mut pending = self.pending.write();
        let before = pending.len();
        pending.retain(|_, entry| entry.sent_at.elapsed() <= TRANSACTION_TTL);
        let evicted = before - pending.len();
        if evicted > 0 {
            debug!("swept {} expired transaction ids", evicted);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().len()
    }

    // ---- subscriptions ----

    pub fn on_message_sent<F>(&self, callback: F)
    where
        F: Fn(&LocalNode, &Message, SocketAddr) + Send + Sync + 'static,
    {
        self.events.message_sent.write().push(Box::new(callback));
    }

    pub fn on_message_received<F>(&self, callback: F)
    where
        F: Fn(&LocalNode, &Message) + Send + Sync + 'static,
    {
        self.events.message_received.write().push(Box::new(callback));
    }

    pub fn on_ping_query<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, PingQuery>) + Send + Sync + 'static,
    {
        register(&self.events.ping_query, callback);
    }

    pub fn on_ping_response<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, PingResponse>) + Send + Sync + 'static,
    {
        register(&self.events.ping_response, callback);
    }

    pub fn on_find_node_query<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, FindNodeQuery>) + Send + Sync + 'static,
    {
        register(&self.events.find_node_query, callback);
    }

    pub fn on_find_node_response<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, FindNodeResponse>) + Send + Sync + 'static,
    {
        register(&self.events.find_node_response, callback);
    }

    pub fn on_get_peers_query<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, GetPeersQuery>) + Send + Sync + 'static,
    {
        register(&self.events.get_peers_query, callback);
    }

    pub fn on_get_peers_response<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, GetPeersResponse>) + Send + Sync + 'static,
    {
        register(&self.events.get_peers_response, callback);
    }

    pub fn on_announce_peer_query<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, AnnouncePeerQuery>) + Send + Sync + 'static,
    {
        register(&self.events.announce_peer_query, callback);
    }

    pub fn on_announce_peer_response<F>(&self, callback: F)
    where
        F: for<'a> Fn(&LocalNode, Inbound<'a, AnnouncePeerResponse>) + Send + Sync + 'static,
    {
        register(&self.events.announce_peer_response, callback);
    }
}
