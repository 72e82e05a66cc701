use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::bencode::{decode, encode, Value};
use crate::id::{InfoHash, NodeId};

use super::compact::{NodeRecord, PeerRecord};
use super::error::KrpcError;

/// Correlates a response or error to the query that triggered it. Two
/// bytes, chosen uniformly at random on the query side, echoed verbatim by
/// the remote. The only session state the protocol has.
pub type TransactionId = Bytes;

pub fn generate_transaction_id() -> TransactionId {
    let id: [u8; 2] = rand::random();
    Bytes::copy_from_slice(&id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Ping,
    FindNode,
    GetPeers,
    AnnouncePeer,
}

impl QueryKind {
    pub fn name(&self) -> &'static str {
        match self {
            QueryKind::Ping => "ping",
            QueryKind::FindNode => "find_node",
            QueryKind::GetPeers => "get_peers",
            QueryKind::AnnouncePeer => "announce_peer",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(QueryKind::Ping),
            "find_node" => Some(QueryKind::FindNode),
            "get_peers" => Some(QueryKind::GetPeers),
            "announce_peer" => Some(QueryKind::AnnouncePeer),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingQuery {
    pub id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNodeQuery {
    pub id: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPeersQuery {
    pub id: NodeId,
    pub info_hash: InfoHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncePeerQuery {
    pub id: NodeId,
    pub info_hash: InfoHash,
    pub port: u16,
    pub implied_port: bool,
    pub token: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Ping(PingQuery),
    FindNode(FindNodeQuery),
    GetPeers(GetPeersQuery),
    AnnouncePeer(AnnouncePeerQuery),
}

impl Query {
    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Ping(_) => QueryKind::Ping,
            Query::FindNode(_) => QueryKind::FindNode,
            Query::GetPeers(_) => QueryKind::GetPeers,
            Query::AnnouncePeer(_) => QueryKind::AnnouncePeer,
        }
    }

    /// The querying node's identifier.
    pub fn sender_id(&self) -> NodeId {
        match self {
            Query::Ping(q) => q.id,
            Query::FindNode(q) => q.id,
            Query::GetPeers(q) => q.id,
            Query::AnnouncePeer(q) => q.id,
        }
    }

    fn arguments(&self) -> BTreeMap<Bytes, Value> {
        let mut args = BTreeMap::new();
        args.insert(Bytes::from_static(b"id"), id_value(&self.sender_id()));
        match self {
            Query::Ping(_) => {}
            Query::FindNode(q) => {
                args.insert(Bytes::from_static(b"target"), id_value(&q.target));
            }
            Query::GetPeers(q) => {
                args.insert(Bytes::from_static(b"info_hash"), id_value(&q.info_hash));
            }
            Query::AnnouncePeer(q) => {
                args.insert(Bytes::from_static(b"info_hash"), id_value(&q.info_hash));
                args.insert(
                    Bytes::from_static(b"implied_port"),
                    Value::Int(i64::from(q.implied_port)),
                );
                args.insert(Bytes::from_static(b"port"), Value::Int(i64::from(q.port)));
                args.insert(Bytes::from_static(b"token"), Value::Bytes(q.token.clone()));
            }
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    pub id: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNodeResponse {
    pub id: NodeId,
    pub nodes: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetPeersResponse {
    pub id: NodeId,
    pub token: Bytes,
    pub found: Found,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncePeerResponse {
    pub id: NodeId,
}

/// What a get_peers response carries: closer nodes to keep walking, or the
/// peers themselves. Exactly one of the two, by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found {
    Nodes(Vec<NodeRecord>),
    Peers(Vec<PeerRecord>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ping(PingResponse),
    FindNode(FindNodeResponse),
    GetPeers(GetPeersResponse),
    AnnouncePeer(AnnouncePeerResponse),
}

impl Response {
    fn body(&self) -> BTreeMap<Bytes, Value> {
        let mut body = BTreeMap::new();
        match self {
            Response::Ping(r) => {
                body.insert(Bytes::from_static(b"id"), id_value(&r.id));
            }
            Response::FindNode(r) => {
                body.insert(Bytes::from_static(b"id"), id_value(&r.id));
                body.insert(
                    Bytes::from_static(b"nodes"),
                    Value::bytes(NodeRecord::encode_list(&r.nodes)),
                );
            }
            Response::GetPeers(r) => {
                body.insert(Bytes::from_static(b"id"), id_value(&r.id));
                body.insert(Bytes::from_static(b"token"), Value::Bytes(r.token.clone()));
                match &r.found {
                    Found::Nodes(nodes) => {
                        body.insert(
                            Bytes::from_static(b"nodes"),
                            Value::bytes(NodeRecord::encode_list(nodes)),
                        );
                    }
                    Found::Peers(peers) => {
                        let values = peers
                            .iter()
                            .filter_map(PeerRecord::to_compact)
                            .map(|compact| Value::bytes(compact.to_vec()))
                            .collect();
                        body.insert(Bytes::from_static(b"values"), Value::List(values));
                    }
                }
            }
            Response::AnnouncePeer(r) => {
                body.insert(Bytes::from_static(b"id"), id_value(&r.id));
            }
        }
        body
    }
}

/// A KRPC error reply: numeric code plus human-readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub code: i64,
    pub message: String,
}

impl ErrorMessage {
    pub const GENERIC: i64 = 201;
    pub const SERVER: i64 = 202;
    pub const PROTOCOL: i64 = 203;
    pub const METHOD_UNKNOWN: i64 = 204;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Query(Query),
    Response(Response),
    Error(ErrorMessage),
}

/// One KRPC message, typed.
///
/// `origin` is the observed datagram source for received messages and the
/// local node's own address for messages built locally; it is bookkeeping,
/// never part of the wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub transaction_id: TransactionId,
    pub origin: SocketAddr,
    pub payload: Payload,
}

impl Message {
    pub fn query(transaction_id: TransactionId, origin: SocketAddr, query: Query) -> Self {
        Self {
            transaction_id,
            origin,
            payload: Payload::Query(query),
        }
    }

    pub fn response(
        transaction_id: TransactionId,
        origin: SocketAddr,
        response: Response,
    ) -> Self {
        Self {
            transaction_id,
            origin,
            payload: Payload::Response(response),
        }
    }

    pub fn error(
        transaction_id: TransactionId,
        origin: SocketAddr,
        code: i64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id,
            origin,
            payload: Payload::Error(ErrorMessage {
                code,
                message: message.into(),
            }),
        }
    }

    /// The bencoded wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut root = BTreeMap::new();
        root.insert(
            Bytes::from_static(b"t"),
            Value::Bytes(self.transaction_id.clone()),
        );
        match &self.payload {
            Payload::Query(query) => {
                root.insert(Bytes::from_static(b"y"), Value::text("q"));
                root.insert(Bytes::from_static(b"q"), Value::text(query.kind().name()));
                root.insert(Bytes::from_static(b"a"), Value::Dict(query.arguments()));
            }
            Payload::Response(response) => {
                root.insert(Bytes::from_static(b"y"), Value::text("r"));
                root.insert(Bytes::from_static(b"r"), Value::Dict(response.body()));
            }
            Payload::Error(err) => {
                root.insert(Bytes::from_static(b"y"), Value::text("e"));
                root.insert(
                    Bytes::from_static(b"e"),
                    Value::List(vec![Value::Int(err.code), Value::text(&err.message)]),
                );
            }
        }
        encode(&Value::Dict(root))
    }

    /// Decodes a datagram received from `origin`.
    pub fn from_bytes(data: &[u8], origin: SocketAddr) -> Result<Self, KrpcError> {
        let root = decode(data)?
            .into_dict()
            .ok_or(KrpcError::Malformed("top level is not a dictionary"))?;

        let transaction_id = root
            .get(b"t".as_slice())
            .and_then(Value::as_bytes)
            .cloned()
            .ok_or(KrpcError::Malformed("missing transaction id"))?;

        let message_type = root
            .get(b"y".as_slice())
            .and_then(Value::as_str)
            .ok_or(KrpcError::Malformed("missing message type"))?;

        let payload = match message_type {
            "q" => Payload::Query(parse_query(&root)?),
            "r" => Payload::Response(parse_response(&root)?),
            // Anything that is neither query nor response is read as an
            // error message, like the original protocol does.
            _ => Payload::Error(parse_error(&root)?),
        };

        Ok(Self {
            transaction_id,
            origin,
            payload,
        })
    }

    /// Re-tags a bare `{id}` response using the kind of the query this
    /// transaction id belonged to.
    ///
    /// Ping and announce_peer responses are indistinguishable on the wire;
    /// only the side that issued the query knows which one it is looking
    /// at.
    pub fn correlate(&mut self, kind: QueryKind) {
        if kind != QueryKind::AnnouncePeer {
            return;
        }
        if let Payload::Response(Response::Ping(PingResponse { id })) = &self.payload {
            let id = *id;
            self.payload = Payload::Response(Response::AnnouncePeer(AnnouncePeerResponse { id }));
        }
    }
}

fn id_value(id: &NodeId) -> Value {
    Value::bytes(id.as_bytes().to_vec())
}

fn parse_query(root: &BTreeMap<Bytes, Value>) -> Result<Query, KrpcError> {
    let name = root
        .get(b"q".as_slice())
        .and_then(Value::as_str)
        .ok_or(KrpcError::Malformed("missing query name"))?;
    let args = root
        .get(b"a".as_slice())
        .and_then(Value::as_dict)
        .ok_or(KrpcError::Malformed("missing query arguments"))?;

    let kind =
        QueryKind::from_name(name).ok_or_else(|| KrpcError::UnknownQuery(name.to_string()))?;
    let id = required_id(args, b"id")?;

    let query = match kind {
        QueryKind::Ping => Query::Ping(PingQuery { id }),
        QueryKind::FindNode => Query::FindNode(FindNodeQuery {
            id,
            target: required_id(args, b"target")?,
        }),
        QueryKind::GetPeers => Query::GetPeers(GetPeersQuery {
            id,
            info_hash: required_id(args, b"info_hash")?,
        }),
        QueryKind::AnnouncePeer => {
            let port = args
                .get(b"port".as_slice())
                .and_then(Value::as_int)
                .ok_or(KrpcError::Malformed("missing port"))? as u16;
            let token = args
                .get(b"token".as_slice())
                .and_then(Value::as_bytes)
                .cloned()
                .ok_or(KrpcError::Malformed("missing token"))?;
            let implied_port = args
                .get(b"implied_port".as_slice())
                .and_then(Value::as_int)
                .map(|v| v == 1)
                .unwrap_or(false);
            Query::AnnouncePeer(AnnouncePeerQuery {
                id,
                info_hash: required_id(args, b"info_hash")?,
                port,
                implied_port,
                token,
            })
        }
    };
    Ok(query)
}

/// Classifies a response dictionary by shape: `values` or a `token` mean
/// get_peers, bare `nodes` means find_node, a lone `id` reads as ping until
/// [`Message::correlate`] says otherwise.
fn parse_response(root: &BTreeMap<Bytes, Value>) -> Result<Response, KrpcError> {
    let body = root
        .get(b"r".as_slice())
        .and_then(Value::as_dict)
        .ok_or(KrpcError::Malformed("missing response body"))?;

    let id = required_id(body, b"id")?;

    let nodes = body
        .get(b"nodes".as_slice())
        .and_then(Value::as_bytes)
        .map(|blob| NodeRecord::decode_list(blob));

    let peers = body.get(b"values".as_slice()).and_then(Value::as_list).map(
        |items: &[Value]| -> Vec<PeerRecord> {
            items
                .iter()
                .filter_map(Value::as_bytes)
                .filter_map(|b| PeerRecord::from_compact(b))
                .collect()
        },
    );

    let token = body
        .get(b"token".as_slice())
        .and_then(Value::as_bytes)
        .cloned();

    let response = if let Some(peers) = peers {
        Response::GetPeers(GetPeersResponse {
            id,
            token: token.unwrap_or_default(),
            found: Found::Peers(peers),
        })
    } else if let Some(token) = token {
        Response::GetPeers(GetPeersResponse {
            id,
            token,
            found: Found::Nodes(nodes.unwrap_or_default()),
        })
    } else if let Some(nodes) = nodes {
        Response::FindNode(FindNodeResponse { id, nodes })
    } else {
        Response::Ping(PingResponse { id })
    };
    Ok(response)
}

fn parse_error(root: &BTreeMap<Bytes, Value>) -> Result<ErrorMessage, KrpcError> {
    let list = root
        .get(b"e".as_slice())
        .and_then(Value::as_list)
        .ok_or(KrpcError::Malformed("missing error list"))?;

    let code = list.first().and_then(Value::as_int).unwrap_or(0);
    let message = list
        .get(1)
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    Ok(ErrorMessage { code, message })
}

fn required_id(dict: &BTreeMap<Bytes, Value>, key: &'static [u8]) -> Result<NodeId, KrpcError> {
    let raw = dict
        .get(key)
        .and_then(Value::as_bytes)
        .ok_or(KrpcError::Malformed("missing identifier field"))?;
    NodeId::from_bytes(raw).map_err(|_| KrpcError::Malformed("identifier is not 20 bytes"))
}

// ---- loggable form ----

struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Compact JSON-like rendering for log output, identifiers in hex.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"t\":\"{}\"", Hex(&self.transaction_id))?;
        match &self.payload {
            Payload::Query(query) => {
                write!(f, ",\"y\":\"q\",\"q\":\"{}\",\"a\":{{", query.kind())?;
                match query {
                    Query::Ping(q) => write!(f, "\"id\":\"{}\"", q.id)?,
                    Query::FindNode(q) => {
                        write!(f, "\"id\":\"{}\",\"target\":\"{}\"", q.id, q.target)?
                    }
                    Query::GetPeers(q) => {
                        write!(f, "\"id\":\"{}\",\"info_hash\":\"{}\"", q.id, q.info_hash)?
                    }
                    Query::AnnouncePeer(q) => write!(
                        f,
                        "\"id\":\"{}\",\"info_hash\":\"{}\",\"port\":{},\"implied_port\":{},\"token\":\"{}\"",
                        q.id,
                        q.info_hash,
                        q.port,
                        i64::from(q.implied_port),
                        Hex(&q.token),
                    )?,
                }
                write!(f, "}}")?;
            }
            Payload::Response(response) => {
                write!(f, ",\"y\":\"r\",\"r\":{{")?;
                match response {
                    Response::Ping(r) => write!(f, "\"id\":\"{}\"", r.id)?,
                    Response::FindNode(r) => {
                        write!(f, "\"id\":\"{}\",", r.id)?;
                        write_nodes(f, &r.nodes)?;
                    }
                    Response::GetPeers(r) => {
                        write!(f, "\"id\":\"{}\",\"token\":\"{}\",", r.id, Hex(&r.token))?;
                        match &r.found {
                            Found::Nodes(nodes) => write_nodes(f, nodes)?,
                            Found::Peers(peers) => {
                                write!(f, "\"values\":[")?;
                                for (i, peer) in peers.iter().enumerate() {
                                    if i > 0 {
                                        write!(f, ",")?;
                                    }
                                    write!(f, "\"{}\"", peer.addr)?;
                                }
                                write!(f, "]")?;
                            }
                        }
                    }
                    Response::AnnouncePeer(r) => write!(f, "\"id\":\"{}\"", r.id)?,
                }
                write!(f, "}}")?;
            }
            Payload::Error(err) => {
                write!(f, ",\"y\":\"e\",\"e\":[{},{:?}]", err.code, err.message)?;
            }
        }
        write!(f, "}}")
    }
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[NodeRecord]) -> fmt::Result {
    write!(f, "\"nodes\":[")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "\"{}@{}\"", node.id, node.addr)?;
    }
    write!(f, "]")
}
