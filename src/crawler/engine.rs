use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::lookup_host;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::constants::{
    BOOTSTRAP_NODES, RECV_BUFFER_SIZE, TOKEN_ROTATE_INTERVAL, TRANSACTION_SWEEP_INTERVAL,
};
use crate::id::{InfoHash, NodeId};
use crate::krpc::{ErrorMessage, Found, NodeRecord, PeerRecord};
use crate::node::{LocalNode, NodeError};
use crate::routing::RoutingStore;

use super::token::TokenRotator;

const INFO_HASH_CHANNEL_CAPACITY: usize = 64;

/// The crawl engine: a [`LocalNode`] wired to a [`RoutingStore`] and a
/// [`TokenRotator`], plus the handler set that keeps the crawl expanding.
///
/// # Examples
///
/// ```no_run
/// use dht_sonar::crawler::Crawler;
/// use dht_sonar::id::NodeId;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut crawler = Crawler::bind("0.0.0.0:6881".parse()?).await?;
/// crawler.bootstrap_from_defaults().await;
///
/// let mut observed = crawler.observed_info_hashes();
/// tokio::spawn(async move {
///     while let Ok(info_hash) = observed.recv().await {
///         println!("{}", info_hash);
///     }
/// });
///
/// let target = NodeId::from_hex("90289fd34dfc1cf8f316a268add8354c85334458")?;
/// crawler.start(target);
/// crawler.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    node: Arc<LocalNode>,
    store: Arc<RoutingStore>,
    token: Arc<TokenRotator>,
    bootstrap: Vec<NodeRecord>,
    info_hashes: broadcast::Sender<InfoHash>,
}

impl Crawler {
    pub async fn bind(addr: SocketAddr) -> Result<Self, NodeError> {
        let node = Arc::new(LocalNode::bind(addr).await?);
        let (info_hashes, _) = broadcast::channel(INFO_HASH_CHANNEL_CAPACITY);

        Ok(Self {
            node,
            store: Arc::new(RoutingStore::new()),
            token: Arc::new(TokenRotator::new()),
            bootstrap: Vec::new(),
            info_hashes,
        })
    }

    pub fn node(&self) -> &Arc<LocalNode> {
        &self.node
    }

    pub fn store(&self) -> &RoutingStore {
        &self.store
    }

    pub fn token(&self) -> &TokenRotator {
        &self.token
    }

    pub fn set_bootstrap_nodes(&mut self, nodes: Vec<NodeRecord>) {
        self.bootstrap = nodes;
    }

    /// Resolves the well-known routers into bootstrap records. Routers do
    /// not tell us their ids up front; a random one works for the first
    /// round of queries.
    pub async fn bootstrap_from_defaults(&mut self) {
        let mut nodes = Vec::new();
        for host in BOOTSTRAP_NODES {
            match lookup_host(host).await {
                Ok(mut addrs) => {
                    if let Some(addr) = addrs.find(|a| a.is_ipv4()) {
                        nodes.push(NodeRecord::new(NodeId::generate(), addr));
                    }
                }
                Err(e) => warn!("failed to resolve bootstrap node {}: {}", host, e),
            }
        }
        self.bootstrap = nodes;
    }

    /// Info-hashes seen in get_peers and announce_peer traffic — the
    /// signal a peer-discovery consumer subscribes to.
    pub fn observed_info_hashes(&self) -> broadcast::Receiver<InfoHash> {
        self.info_hashes.subscribe()
    }

    /// Starts an open-ended crawl toward a random identifier, harvesting
    /// whatever info-hashes the network volunteers.
    pub fn sonar(&self) {
        self.start(NodeId::generate());
    }

    /// Registers the handler set and queries every bootstrap node for
    /// nodes near us and for peers of `info_hash`.
    pub fn start(&self, info_hash: InfoHash) {
        self.register_handlers(info_hash);

        info!(
            "crawl toward {} starting from {} bootstrap nodes",
            info_hash,
            self.bootstrap.len()
        );
        for record in &self.bootstrap {
            follow(&self.node, record, info_hash);
        }
    }

    /// Drives the crawl: datagram intake, token rotation, transaction
    /// sweeping. Returns only when the socket fails.
    pub async fn run(&self) -> Result<(), NodeError> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut rotate = interval(TOKEN_ROTATE_INTERVAL);
        let mut sweep = interval(TRANSACTION_SWEEP_INTERVAL);
        rotate.set_missed_tick_behavior(MissedTickBehavior::Skip);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        rotate.tick().await;
        sweep.tick().await;

        loop {
            tokio::select! {
                result = self.node.recv_from(&mut buf) => {
                    let (n, origin) = result?;
                    if let Err(e) = self.node.receive(&buf[..n], origin) {
                        debug!("dropping datagram from {}: {}", origin, e);
                    }
                }
                _ = rotate.tick() => self.token.rotate(),
                _ = sweep.tick() => self.node.sweep_pending(),
            }
        }
    }

    fn register_handlers(&self, info_hash: InfoHash) {
        let node = &self.node;

        // Ping query: remember the sender, answer with our identifier.
        let store = Arc::clone(&self.store);
        node.on_ping_query(move |node, query| {
            store.add_nodes([NodeRecord::new(query.body.id, query.origin)]);
            if let Err(e) = node.reply_ping(query) {
                warn!("ping reply to {} failed: {}", query.origin, e);
            }
        });

        // Find-node query: remember the sender, answer from the store.
        let store = Arc::clone(&self.store);
        node.on_find_node_query(move |node, query| {
            store.add_nodes([NodeRecord::new(query.body.id, query.origin)]);
            let nearest = store.nearest_nodes(&query.body.target);
            if let Err(e) = node.reply_find_node(query, nearest) {
                warn!("find_node reply to {} failed: {}", query.origin, e);
            }
        });

        // Find-node response: keep everything it taught us, then ask each
        // new node in turn. This recursion is what covers the network.
        let store = Arc::clone(&self.store);
        node.on_find_node_response(move |node, response| {
            store.add_nodes(response.body.nodes.iter().copied());
            for record in &response.body.nodes {
                follow(node, record, info_hash);
            }
        });

        // Get-peers query: hand out the current token and surface the
        // info-hash the asker is after.
        let store = Arc::clone(&self.store);
        let token = Arc::clone(&self.token);
        let observed = self.info_hashes.clone();
        node.on_get_peers_query(move |node, query| {
            store.add_nodes([NodeRecord::new(query.body.id, query.origin)]);
            let _ = observed.send(query.body.info_hash);
            let nearest = store.nearest_nodes(&query.body.id);
            if let Err(e) = node.reply_get_peers(query, token.current(), Found::Nodes(nearest)) {
                warn!("get_peers reply to {} failed: {}", query.origin, e);
            }
        });

        // Get-peers response: peers end the branch, nodes keep it going.
        let store = Arc::clone(&self.store);
        node.on_get_peers_response(move |node, response| match &response.body.found {
            Found::Peers(peers) => store.add_peers(peers.iter().copied()),
            Found::Nodes(nodes) => {
                store.add_nodes(nodes.iter().copied());
                for record in nodes {
                    follow(node, record, info_hash);
                }
            }
        });

        // Announce-peer query: token-gated peer intake.
        let store = Arc::clone(&self.store);
        let token = Arc::clone(&self.token);
        let observed = self.info_hashes.clone();
        node.on_announce_peer_query(move |node, query| {
            if !token.is_valid(&query.body.token) {
                debug!("rejecting announce from {}: stale token", query.origin);
                if let Err(e) = node.send_error(
                    query.transaction_id.clone(),
                    query.origin,
                    ErrorMessage::PROTOCOL,
                    "invalid token",
                ) {
                    warn!("announce rejection to {} failed: {}", query.origin, e);
                }
                return;
            }

            let port = if query.body.implied_port {
                query.origin.port()
            } else {
                query.body.port
            };
            store.add_peers([PeerRecord::new(SocketAddr::new(query.origin.ip(), port))]);
            let _ = observed.send(query.body.info_hash);
            if let Err(e) = node.reply_announce_peer(query) {
                warn!("announce reply to {} failed: {}", query.origin, e);
            }
        });
    }
}

/// One fan-out step: ask a node for participants near us and for peers of
/// the crawl target.
fn follow(node: &LocalNode, record: &NodeRecord, info_hash: InfoHash) {
    if let Err(e) = node.find_node(*node.id(), record) {
        warn!("find_node to {} failed: {}", record.addr, e);
        return;
    }
    if let Err(e) = node.get_peers(info_hash, record) {
        warn!("get_peers to {} failed: {}", record.addr, e);
    }
}
