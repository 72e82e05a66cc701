use std::net::SocketAddr;

use parking_lot::RwLock;

use crate::krpc::{
    AnnouncePeerQuery, AnnouncePeerResponse, FindNodeQuery, FindNodeResponse, GetPeersQuery,
    GetPeersResponse, Message, PingQuery, PingResponse, TransactionId,
};

use super::local::LocalNode;

/// A received message body, typed, plus the envelope a handler needs in
/// order to reply: the transaction id to echo and the datagram source.
pub struct Inbound<'a, T> {
    pub transaction_id: &'a TransactionId,
    pub origin: SocketAddr,
    pub body: &'a T,
}

impl<'a, T> Inbound<'a, T> {
    pub(crate) fn new(message: &'a Message, body: &'a T) -> Self {
        Self {
            transaction_id: &message.transaction_id,
            origin: message.origin,
            body,
        }
    }
}

impl<T> Clone for Inbound<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Inbound<'_, T> {}

type Callbacks<T> = RwLock<Vec<Box<dyn for<'a> Fn(&LocalNode, Inbound<'a, T>) + Send + Sync>>>;

/// Per-kind handler registries. Handlers run synchronously in registration
/// order; registering from inside a handler of the same kind would
/// deadlock on the registry lock.
#[derive(Default)]
pub(crate) struct Events {
    pub(crate) message_sent:
        RwLock<Vec<Box<dyn Fn(&LocalNode, &Message, SocketAddr) + Send + Sync>>>,
    pub(crate) message_received: RwLock<Vec<Box<dyn Fn(&LocalNode, &Message) + Send + Sync>>>,
    pub(crate) ping_query: Callbacks<PingQuery>,
    pub(crate) ping_response: Callbacks<PingResponse>,
    pub(crate) find_node_query: Callbacks<FindNodeQuery>,
    pub(crate) find_node_response: Callbacks<FindNodeResponse>,
    pub(crate) get_peers_query: Callbacks<GetPeersQuery>,
    pub(crate) get_peers_response: Callbacks<GetPeersResponse>,
    pub(crate) announce_peer_query: Callbacks<AnnouncePeerQuery>,
    pub(crate) announce_peer_response: Callbacks<AnnouncePeerResponse>,
}

impl Events {
    pub(crate) fn emit_sent(&self, node: &LocalNode, message: &Message, target: SocketAddr) {
        for callback in self.message_sent.read().iter() {
            callback(node, message, target);
        }
    }

    pub(crate) fn emit_received(&self, node: &LocalNode, message: &Message) {
        for callback in self.message_received.read().iter() {
            callback(node, message);
        }
    }
}

pub(crate) fn emit<T>(registry: &Callbacks<T>, node: &LocalNode, inbound: Inbound<'_, T>) {
    for callback in registry.read().iter() {
        callback(node, inbound);
    }
}

pub(crate) fn register<T, F>(registry: &Callbacks<T>, callback: F)
where
    F: for<'a> Fn(&LocalNode, Inbound<'a, T>) + Send + Sync + 'static,
{
    registry.write().push(Box::new(callback));
}
