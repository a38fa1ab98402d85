//! Server Integration Tests
//!
//! Drives a full `RoadmapServer` (adapter, odometry, skeleton, publisher)
//! through its public API with an in-process channel sink:
//! - initial empty snapshot before any input
//! - threshold mode on the three-sample walk
//! - keyframe mode with a scripted odometer
//! - run loop with heartbeat and shutdown
//!
//! Run with: `cargo test --test server_integration`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use crossbeam_channel::{Receiver, bounded};

use roadmap_server::sensors::{CameraInfo, LocalizedPose, MonoImage, StereoPair};
use roadmap_server::{
    ChannelSink, Edge, IngestionMode, OdometryScript, PublishReason, PublisherConfig,
    RoadmapServer, RoadmapSnapshot, SensorMessage, ServerConfig, ServerThread, SkeletonConfig,
    VisualOdometerConfig, create_shared_skeleton,
};
use roadmap_server::utils::now_us;

const SEC: u64 = 1_000_000;

// ============================================================================
// Helpers
// ============================================================================

fn pose_msg(x: f64, y: f64, yaw: f64, timestamp_us: u64) -> SensorMessage {
    let half = yaw / 2.0;
    SensorMessage::Pose(LocalizedPose {
        timestamp_us,
        position: [x, y, 0.0],
        orientation: [0.0, 0.0, half.sin(), half.cos()],
    })
}

fn stereo_msg(timestamp_us: u64) -> SensorMessage {
    let info = |baseline: f64| CameraInfo {
        width: 4,
        height: 2,
        fx: 389.0,
        fy: 389.0,
        cx: 2.0,
        cy: 1.0,
        baseline,
    };
    let image = MonoImage {
        width: 4,
        height: 2,
        data: vec![128; 8],
    };
    SensorMessage::Stereo(StereoPair {
        timestamp_us,
        left_info: info(0.0),
        right_info: info(0.089),
        left: image.clone(),
        right: image,
    })
}

fn server(mode: IngestionMode, publisher: PublisherConfig) -> (RoadmapServer, Receiver<RoadmapSnapshot>) {
    let (sink, rx) = ChannelSink::new(256);
    let server = RoadmapServer::new(
        &ServerConfig {
            poll_interval_ms: 10,
            ..Default::default()
        },
        &publisher,
        mode,
        create_shared_skeleton(SkeletonConfig::default()),
        Box::new(sink),
    );
    (server, rx)
}

fn drain(rx: &Receiver<RoadmapSnapshot>) -> Vec<RoadmapSnapshot> {
    rx.try_iter().collect()
}

// ============================================================================
// Threshold mode
// ============================================================================

#[test]
fn test_exactly_one_empty_snapshot_before_input() {
    let (mut server, rx) = server(IngestionMode::Threshold, PublisherConfig::default());
    let _input = server.start(0, || Ok(bounded(1).1)).unwrap();

    let sent = drain(&rx);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].nodes.is_empty());
    assert!(sent[0].edges.is_empty());
    assert_eq!(sent[0].localization, None);
}

#[test]
fn test_three_sample_walk() {
    let (mut server, rx) = server(IngestionMode::Threshold, PublisherConfig::default());
    server.start(0, || Ok(bounded(1).1)).unwrap();
    drain(&rx);

    server.process(pose_msg(0.0, 0.0, 0.0, 1), SEC).unwrap();
    server.process(pose_msg(0.5, 0.0, 0.0, 2), 2 * SEC).unwrap();
    server.process(pose_msg(2.0, 0.0, 0.0, 3), 3 * SEC).unwrap();

    let sent = drain(&rx);
    assert_eq!(sent.len(), 2);
    let last = sent.last().unwrap();
    assert_eq!(last.nodes.len(), 2);
    assert_relative_eq!(last.nodes[1].x, 2.0);
    assert!(last.edges.is_empty());
    assert_eq!(last.localization, Some(1));
}

#[test]
fn test_heading_from_quaternion_drives_admission() {
    let (mut server, rx) = server(IngestionMode::Threshold, PublisherConfig::default());
    server.start(0, || Ok(bounded(1).1)).unwrap();
    drain(&rx);

    server.process(pose_msg(0.0, 0.0, 0.0, 1), SEC).unwrap();
    // 1° turn in place: suppressed
    assert_eq!(
        server
            .process(pose_msg(0.0, 0.0, 1.0_f64.to_radians(), 2), SEC + 1)
            .unwrap(),
        None
    );
    // 3° turn in place: admitted and linked to the node it sits on
    assert_eq!(
        server
            .process(pose_msg(0.0, 0.0, 3.0_f64.to_radians(), 3), SEC + 2)
            .unwrap(),
        Some(PublishReason::Changed)
    );

    let last = drain(&rx).pop().unwrap();
    assert_eq!(last.nodes.len(), 2);
    assert_relative_eq!(last.nodes[1].theta, 3.0_f64.to_radians(), epsilon = 1e-9);
    assert_eq!(last.edges, vec![Edge::new(1, 0)]);
}

#[test]
fn test_heartbeat_repeats_content_with_newer_timestamp() {
    let (mut server, rx) = server(IngestionMode::Threshold, PublisherConfig::default());
    server.start(0, || Ok(bounded(1).1)).unwrap();
    drain(&rx);

    server.process(pose_msg(1.0, 1.0, 0.0, 1), 10 * SEC).unwrap();
    assert_eq!(server.tick(12 * SEC).unwrap(), None);
    assert_eq!(server.tick(15 * SEC).unwrap(), Some(PublishReason::Heartbeat));

    let sent = drain(&rx);
    assert_eq!(sent.len(), 2);
    assert!(sent[1].same_content(&sent[0]));
    assert_eq!(sent[0].timestamp_us, 10 * SEC);
    assert_eq!(sent[1].timestamp_us, 15 * SEC);
}

// ============================================================================
// Keyframe mode
// ============================================================================

#[test]
fn test_keyframe_mode_chains_keyframes() {
    let script: OdometryScript = serde_yaml::from_str(
        r#"
steps:
  - { kind: keyframe }
  - { kind: tracking, confidence: 0.9 }
  - { kind: keyframe, z: 0.5 }
  - { kind: lost }
  - { kind: keyframe, z: 1.0, x: 0.2 }
"#,
    )
    .unwrap();
    let odometer = script
        .into_odometer(VisualOdometerConfig::default())
        .unwrap();

    let (mut server, rx) = server(IngestionMode::Keyframe(odometer), PublisherConfig::default());
    server.start(0, || Ok(bounded(1).1)).unwrap();
    drain(&rx);

    // Pose samples are not for this mode
    server.process(pose_msg(5.0, 5.0, 0.0, 0), 1).unwrap();
    for i in 0..5u64 {
        server.process(stereo_msg(i), 10 + i).unwrap();
    }

    let stats = server.stats();
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.keyframes, 3);
    assert_eq!(stats.odometry_lost, 1);

    let sent = drain(&rx);
    assert_eq!(sent.len(), 3);
    let last = sent.last().unwrap();
    assert_eq!(last.nodes.len(), 3);
    assert_eq!(last.edges, vec![Edge::new(0, 1), Edge::new(1, 2)]);
    assert_eq!(last.localization, Some(2));
    // Camera frame: forward z → x, right x → -y
    assert_relative_eq!(last.nodes[2].x, 1.0);
    assert_relative_eq!(last.nodes[2].y, -0.2);
}

#[test]
fn test_malformed_stereo_dropped_before_odometry() {
    let script: OdometryScript = serde_yaml::from_str("steps:\n  - { kind: keyframe }\n").unwrap();
    let odometer = script
        .into_odometer(VisualOdometerConfig::default())
        .unwrap();
    let (mut server, rx) = server(IngestionMode::Keyframe(odometer), PublisherConfig::default());
    server.start(0, || Ok(bounded(1).1)).unwrap();
    drain(&rx);

    let SensorMessage::Stereo(mut pair) = stereo_msg(1) else {
        unreachable!()
    };
    pair.left.data.truncate(3);
    server.process(SensorMessage::Stereo(pair), 1).unwrap();

    assert_eq!(server.adapter_stats().counts().frames_dropped, 1);
    assert!(drain(&rx).is_empty());

    // The script step was not consumed by the dropped frame
    server.process(stereo_msg(2), 2).unwrap();
    assert_eq!(drain(&rx).pop().unwrap().nodes.len(), 1);
}

// ============================================================================
// Run loop
// ============================================================================

#[test]
fn test_run_loop_serves_until_shutdown() {
    let publisher = PublisherConfig {
        heartbeat_window_s: 0.05,
    };
    let (mut server, rx) = server(IngestionMode::Threshold, publisher);
    let skeleton = server.skeleton().clone();

    let (tx, input) = bounded(16);
    let input = server.start(now_us(), move || Ok(input)).unwrap();
    let running = Arc::new(AtomicBool::new(true));
    let thread = ServerThread::spawn(server, input, running.clone());

    tx.send(pose_msg(0.0, 0.0, 0.0, 1)).unwrap();
    tx.send(pose_msg(3.0, 0.0, 0.0, 2)).unwrap();

    // Changes plus at least one idle heartbeat
    thread::sleep(Duration::from_millis(300));
    running.store(false, Ordering::SeqCst);
    thread.join().unwrap();

    assert_eq!(skeleton.read().unwrap().len(), 2);
    let sent = drain(&rx);
    assert!(sent.len() >= 4, "only {} snapshots", sent.len());
    assert_eq!(sent.last().unwrap().nodes.len(), 2);
    for pair in sent.windows(2) {
        assert!(pair[1].timestamp_us >= pair[0].timestamp_us);
    }
}

#[test]
fn test_run_loop_exits_when_source_closes() {
    let (mut server, _rx) = server(IngestionMode::Threshold, PublisherConfig::default());
    let (tx, input) = bounded::<SensorMessage>(1);
    let input = server.start(now_us(), move || Ok(input)).unwrap();
    drop(tx);

    let running = Arc::new(AtomicBool::new(true));
    server.run(input, running.clone()).unwrap();
    assert!(running.load(Ordering::SeqCst));
}
