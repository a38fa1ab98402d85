//! TCP Publisher Tests
//!
//! Connects real sockets to `TcpRoadmapPublisher` and checks the framing a
//! client sees: 4-byte big-endian length, then a `Roadmap` Protobuf.
//! Clients that connect between publications get the last roadmap on accept.
//!
//! Run with: `cargo test --test tcp_publisher`

use std::io::Read;
use std::net::TcpStream;
use std::time::Duration;

use crossbeam_channel::bounded;
use prost::Message;

use roadmap_server::io::proto;
use roadmap_server::io::wire::FrameReader;
use roadmap_server::{
    Edge, IngestionMode, Pose2D, PublisherConfig, RoadmapServer, RoadmapSink, RoadmapSnapshot,
    ServerConfig, SkeletonConfig, TcpRoadmapPublisher, create_shared_skeleton,
};

fn snapshot(timestamp_us: u64, n: usize) -> RoadmapSnapshot {
    RoadmapSnapshot {
        timestamp_us,
        nodes: (0..n).map(|i| Pose2D::new(i as f64, 0.0, 0.0)).collect(),
        edges: (1..n).map(|i| Edge::new(i - 1, i)).collect(),
        localization: n.checked_sub(1),
        revision: n as u64,
    }
}

fn connect(publisher: &mut TcpRoadmapPublisher) -> TcpStream {
    let addr = publisher.local_addr().unwrap();
    let stream = TcpStream::connect(addr).unwrap();
    assert!(publisher.wait_for_client(Duration::from_secs(2)));
    stream
}

#[test]
fn test_client_receives_framed_roadmap() {
    let mut publisher = TcpRoadmapPublisher::bind("127.0.0.1:0").unwrap();
    let mut stream = connect(&mut publisher);

    publisher.publish(&snapshot(1_000, 3)).unwrap();

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).unwrap();

    let roadmap = proto::Roadmap::decode(payload.as_slice()).unwrap();
    assert_eq!(roadmap.timestamp_us, 1_000);
    assert_eq!(roadmap.nodes.len(), 3);
    assert_eq!(roadmap.nodes[2].x, 2.0);
    assert_eq!(
        roadmap.edges,
        vec![proto::Edge { a: 0, b: 1 }, proto::Edge { a: 1, b: 2 }]
    );
    assert_eq!(roadmap.localization, 2.0);
}

#[test]
fn test_every_client_gets_every_snapshot() {
    let mut publisher = TcpRoadmapPublisher::bind("127.0.0.1:0").unwrap();
    let a = connect(&mut publisher);
    let b = TcpStream::connect(publisher.local_addr().unwrap()).unwrap();
    // Second client is accepted on the next publish
    std::thread::sleep(Duration::from_millis(50));

    publisher.publish(&snapshot(1, 0)).unwrap();
    publisher.publish(&snapshot(2, 2)).unwrap();
    assert_eq!(publisher.client_count(), 2);

    for stream in [a, b] {
        let mut reader = FrameReader::new(stream);
        let timeout = Duration::from_secs(2);
        let first: proto::Roadmap = reader.recv_timeout(timeout).unwrap().unwrap();
        let second: proto::Roadmap = reader.recv_timeout(timeout).unwrap().unwrap();
        assert_eq!(first.timestamp_us, 1);
        assert!(first.nodes.is_empty());
        assert_eq!(first.localization, 0.0);
        assert_eq!(second.timestamp_us, 2);
        assert_eq!(second.nodes.len(), 2);
    }
}

#[test]
fn test_disconnected_client_is_dropped() {
    let mut publisher = TcpRoadmapPublisher::bind("127.0.0.1:0").unwrap();
    let stream = connect(&mut publisher);
    drop(stream);

    // The first writes after a close may still succeed; the peer reset
    // surfaces within a few frames
    let big = snapshot(1, 2_000);
    for i in 0..50 {
        publisher.publish(&big).unwrap();
        if publisher.client_count() == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10 + i));
    }
    assert_eq!(publisher.client_count(), 0);
}

#[test]
fn test_publish_without_clients_is_ok() {
    let mut publisher = TcpRoadmapPublisher::bind("127.0.0.1:0").unwrap();
    publisher.publish(&snapshot(1, 1)).unwrap();
    assert_eq!(publisher.client_count(), 0);
}

#[test]
fn test_late_client_gets_last_frame_on_accept() {
    let mut publisher = TcpRoadmapPublisher::bind("127.0.0.1:0").unwrap();
    publisher.publish(&snapshot(7, 2)).unwrap();

    let stream = TcpStream::connect(publisher.local_addr().unwrap()).unwrap();
    assert!(publisher.wait_for_client(Duration::from_secs(2)));

    let mut reader = FrameReader::new(stream);
    let roadmap: proto::Roadmap = reader
        .recv_timeout(Duration::from_secs(2))
        .unwrap()
        .unwrap();
    assert_eq!(roadmap.timestamp_us, 7);
    assert_eq!(roadmap.nodes.len(), 2);
}

#[test]
fn test_client_connecting_after_start_sees_initial_map() {
    let publisher = TcpRoadmapPublisher::bind("127.0.0.1:0").unwrap();
    let addr = publisher.local_addr().unwrap();
    let mut server = RoadmapServer::new(
        &ServerConfig::default(),
        &PublisherConfig::default(),
        IngestionMode::Threshold,
        create_shared_skeleton(SkeletonConfig::default()),
        Box::new(publisher),
    );

    let start_us = 1_000_000;
    server.start(start_us, || Ok(bounded(1).1)).unwrap();

    let stream = TcpStream::connect(addr).unwrap();
    std::thread::sleep(Duration::from_millis(50));

    // Nothing changed and the heartbeat is not due yet
    assert_eq!(server.tick(start_us + 1_000_000).unwrap(), None);

    let mut reader = FrameReader::new(stream);
    let roadmap: proto::Roadmap = reader
        .recv_timeout(Duration::from_secs(2))
        .unwrap()
        .unwrap();
    assert_eq!(roadmap.timestamp_us, start_us);
    assert!(roadmap.nodes.is_empty());
    assert!(roadmap.edges.is_empty());
    assert_eq!(roadmap.localization, 0.0);
}
