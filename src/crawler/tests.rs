use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::id::NodeId;
use crate::krpc::{
    AnnouncePeerQuery, FindNodeQuery, FindNodeResponse, Found, GetPeersQuery, Message, NodeRecord,
    Payload, PingQuery, Query, Response,
};

use super::*;

fn id(seed: u8) -> NodeId {
    NodeId::from_bytes(&[seed; 20]).unwrap()
}

async fn test_crawler() -> Crawler {
    Crawler::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
}

async fn remote_socket() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

async fn recv_message(socket: &UdpSocket) -> Message {
    let mut buf = [0u8; 1500];
    let (n, from) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    Message::from_bytes(&buf[..n], from).unwrap()
}

#[test]
fn test_token_rotation_window() {
    let token = TokenRotator::new();
    let first = token.current();
    assert_eq!(first.len(), 8);
    assert!(token.is_valid(&first));

    // One rotation back is still good.
    token.rotate();
    assert!(token.is_valid(&first));
    assert!(token.is_valid(&token.current()));
    assert_ne!(token.current(), first);

    // Two rotations back is not.
    token.rotate();
    assert!(!token.is_valid(&first));
}

#[tokio::test]
async fn test_ping_query_recorded_and_answered() {
    let crawler = test_crawler().await;
    crawler.start(id(99));

    let remote = remote_socket().await;
    let remote_addr = remote.local_addr().unwrap();
    let query = Message::query(
        Bytes::from_static(b"aa"),
        remote_addr,
        Query::Ping(PingQuery { id: id(1) }),
    );
    crawler.node().receive(&query.to_bytes(), remote_addr).unwrap();

    assert_eq!(crawler.store().stats().node_count, 1);

    let reply = recv_message(&remote).await;
    assert_eq!(reply.transaction_id, Bytes::from_static(b"aa"));
    let Payload::Response(Response::Ping(body)) = reply.payload else {
        panic!("expected ping response");
    };
    assert_eq!(body.id, *crawler.node().id());
}

#[tokio::test]
async fn test_find_node_query_answered_from_store() {
    let crawler = test_crawler().await;
    crawler.start(id(99));

    let known = NodeRecord::new(id(5), "10.0.0.5:6881".parse().unwrap());
    crawler.store().add_nodes([known]);

    let remote = remote_socket().await;
    let remote_addr = remote.local_addr().unwrap();
    let target = id(9);
    let query = Message::query(
        Bytes::from_static(b"fb"),
        remote_addr,
        Query::FindNode(FindNodeQuery { id: id(1), target }),
    );
    crawler.node().receive(&query.to_bytes(), remote_addr).unwrap();

    let reply = recv_message(&remote).await;
    let Payload::Response(Response::FindNode(body)) = reply.payload else {
        panic!("expected find_node response");
    };
    // Replies present the relay identifier toward the requested target.
    assert_eq!(body.id, crawler.node().id().relay(&target));
    assert!(body.nodes.contains(&known));
}

#[tokio::test]
async fn test_get_peers_query_yields_token_and_surfaces_info_hash() {
    let crawler = test_crawler().await;
    crawler.start(id(99));
    let mut observed = crawler.observed_info_hashes();

    let remote = remote_socket().await;
    let remote_addr = remote.local_addr().unwrap();
    let info_hash = id(42);
    let query = Message::query(
        Bytes::from_static(b"gp"),
        remote_addr,
        Query::GetPeers(GetPeersQuery {
            id: id(1),
            info_hash,
        }),
    );
    crawler.node().receive(&query.to_bytes(), remote_addr).unwrap();

    // Handler chains run synchronously, so the broadcast already happened.
    assert_eq!(observed.try_recv().unwrap(), info_hash);
    assert_eq!(crawler.store().stats().node_count, 1);

    let reply = recv_message(&remote).await;
    let Payload::Response(Response::GetPeers(body)) = reply.payload else {
        panic!("expected get_peers response");
    };
    assert_eq!(body.token, crawler.token().current());
    assert!(matches!(body.found, Found::Nodes(_)));
}

#[tokio::test]
async fn test_announce_peer_gated_on_token() {
    let crawler = test_crawler().await;
    crawler.start(id(99));
    let mut observed = crawler.observed_info_hashes();

    let remote = remote_socket().await;
    let remote_addr = remote.local_addr().unwrap();

    // A token we never issued is turned away with a protocol error.
    let bogus = Message::query(
        Bytes::from_static(b"a1"),
        remote_addr,
        Query::AnnouncePeer(AnnouncePeerQuery {
            id: id(1),
            info_hash: id(42),
            port: 7000,
            implied_port: false,
            token: Bytes::from_static(b"bogus"),
        }),
    );
    crawler.node().receive(&bogus.to_bytes(), remote_addr).unwrap();
    assert_eq!(crawler.store().stats().peer_count, 0);
    assert!(observed.try_recv().is_err());

    let rejection = recv_message(&remote).await;
    let Payload::Error(err) = rejection.payload else {
        panic!("expected error reply");
    };
    assert_eq!(err.code, 203);

    // The token we actually handed out gets the peer recorded.
    let valid = Message::query(
        Bytes::from_static(b"a2"),
        remote_addr,
        Query::AnnouncePeer(AnnouncePeerQuery {
            id: id(1),
            info_hash: id(42),
            port: 7000,
            implied_port: false,
            token: crawler.token().current(),
        }),
    );
    crawler.node().receive(&valid.to_bytes(), remote_addr).unwrap();

    assert_eq!(crawler.store().stats().peer_count, 1);
    assert_eq!(observed.try_recv().unwrap(), id(42));
    let peer = crawler.store().peers()[0];
    assert_eq!(peer.addr.ip(), remote_addr.ip());
    assert_eq!(peer.addr.port(), 7000);

    let ack = recv_message(&remote).await;
    assert!(matches!(ack.payload, Payload::Response(_)));
}

#[tokio::test]
async fn test_announce_peer_implied_port_uses_origin() {
    let crawler = test_crawler().await;
    crawler.start(id(99));

    let remote = remote_socket().await;
    let remote_addr = remote.local_addr().unwrap();
    let announce = Message::query(
        Bytes::from_static(b"a3"),
        remote_addr,
        Query::AnnouncePeer(AnnouncePeerQuery {
            id: id(1),
            info_hash: id(42),
            port: 7000,
            implied_port: true,
            token: crawler.token().current(),
        }),
    );
    crawler
        .node()
        .receive(&announce.to_bytes(), remote_addr)
        .unwrap();

    let peer = crawler.store().peers()[0];
    assert_eq!(peer.addr.port(), remote_addr.port());
}

#[tokio::test]
async fn test_start_queries_each_bootstrap_node() {
    let remote = remote_socket().await;
    let record = NodeRecord::new(id(2), remote.local_addr().unwrap());

    let mut crawler = test_crawler().await;
    crawler.set_bootstrap_nodes(vec![record]);
    let info_hash = id(42);
    crawler.start(info_hash);

    let first = recv_message(&remote).await;
    let Payload::Query(Query::FindNode(find_node)) = first.payload else {
        panic!("expected find_node query");
    };
    assert_eq!(find_node.target, *crawler.node().id());

    let second = recv_message(&remote).await;
    let Payload::Query(Query::GetPeers(get_peers)) = second.payload else {
        panic!("expected get_peers query");
    };
    assert_eq!(get_peers.info_hash, info_hash);
}

#[tokio::test]
async fn test_find_node_response_fans_out() {
    let crawler = test_crawler().await;
    let info_hash = id(42);
    crawler.start(info_hash);

    let first_hop = remote_socket().await;
    let first_record = NodeRecord::new(id(2), first_hop.local_addr().unwrap());
    let tid = crawler
        .node()
        .find_node(*crawler.node().id(), &first_record)
        .unwrap();
    recv_message(&first_hop).await;

    // The response names a node we have never seen.
    let second_hop = remote_socket().await;
    let discovered = NodeRecord::new(id(3), second_hop.local_addr().unwrap());
    let response = Message::response(
        tid,
        first_record.addr,
        Response::FindNode(FindNodeResponse {
            id: id(2),
            nodes: vec![discovered],
        }),
    );
    crawler
        .node()
        .receive(&response.to_bytes(), first_record.addr)
        .unwrap();

    assert_eq!(crawler.store().stats().node_count, 1);

    // The discovered node immediately gets both follow-up queries.
    let first = recv_message(&second_hop).await;
    assert!(matches!(first.payload, Payload::Query(Query::FindNode(_))));
    let second = recv_message(&second_hop).await;
    let Payload::Query(Query::GetPeers(get_peers)) = second.payload else {
        panic!("expected get_peers query");
    };
    assert_eq!(get_peers.info_hash, info_hash);
}

#[tokio::test]
async fn test_get_peers_response_with_peers_is_terminal() {
    let crawler = test_crawler().await;
    crawler.start(id(42));

    let remote = remote_socket().await;
    let record = NodeRecord::new(id(2), remote.local_addr().unwrap());
    let tid = crawler.node().get_peers(id(42), &record).unwrap();
    recv_message(&remote).await;

    let response = Message::response(
        tid,
        record.addr,
        Response::GetPeers(crate::krpc::GetPeersResponse {
            id: id(2),
            token: Bytes::from_static(b"tok"),
            found: Found::Peers(vec![crate::krpc::PeerRecord::new(
                "10.0.0.9:51413".parse().unwrap(),
            )]),
        }),
    );
    crawler
        .node()
        .receive(&response.to_bytes(), record.addr)
        .unwrap();

    let stats = crawler.store().stats();
    assert_eq!(stats.peer_count, 1);
    // Terminal branch: nothing new to query, so no new nodes either.
    assert_eq!(stats.node_count, 0);
    assert_eq!(crawler.node().pending_count(), 0);
}
