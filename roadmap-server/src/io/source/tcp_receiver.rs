//! TCP receiver for the sensor/pose source.
//!
//! Connects to the source, decodes length-prefixed `SensorEnvelope`s and
//! hands them to the server thread over a bounded crossbeam channel. When
//! the channel is full the newest message is dropped, so the server never
//! works on a growing backlog of stale frames. Lost connections are retried
//! until shutdown.

use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::error::Result;
use crate::io::proto::SensorEnvelope;
use crate::io::wire::FrameReader;
use crate::sensors::SensorMessage;

/// Receiver configuration.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Source address, `"host:port"`.
    pub address: String,
    /// Sensor channel capacity.
    pub channel_capacity: usize,
    /// Delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5570".to_string(),
            channel_capacity: 4,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Receiver counters.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub received: AtomicU64,
    pub decode_errors: AtomicU64,
    pub dropped_full: AtomicU64,
}

/// Poll interval for the shutdown flag while waiting on the socket.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Background thread reading the sensor source.
pub struct TcpSensorReceiver {
    handle: JoinHandle<()>,
    stats: Arc<ReceiverStats>,
}

impl TcpSensorReceiver {
    /// Spawn the receiver; returns the thread handle and the sensor channel.
    pub fn spawn(
        config: ReceiverConfig,
        running: Arc<AtomicBool>,
    ) -> (Self, Receiver<SensorMessage>) {
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        let stats = Arc::new(ReceiverStats::default());
        let thread_stats = stats.clone();

        let handle = thread::Builder::new()
            .name("sensor-receiver".into())
            .spawn(move || run_receiver(config, tx, thread_stats, running))
            .expect("Failed to spawn sensor receiver thread");

        (Self { handle, stats }, rx)
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        self.stats.clone()
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run_receiver(
    config: ReceiverConfig,
    tx: Sender<SensorMessage>,
    stats: Arc<ReceiverStats>,
    running: Arc<AtomicBool>,
) {
    log::info!("Sensor receiver started, source {}", config.address);

    while running.load(Ordering::Relaxed) {
        let stream = match TcpStream::connect(&config.address) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Sensor source {} unavailable: {}", config.address, e);
                sleep_while_running(config.reconnect_delay, &running);
                continue;
            }
        };
        log::info!("Connected to sensor source {}", config.address);

        match receive_loop(stream, &tx, &stats, &running) {
            Ok(ReceiveEnd::Shutdown) => break,
            Ok(ReceiveEnd::ConsumerGone) => {
                log::info!("Sensor channel closed, receiver exiting");
                break;
            }
            Err(e) => {
                log::warn!("Sensor source connection lost: {}", e);
                sleep_while_running(config.reconnect_delay, &running);
            }
        }
    }

    log::info!(
        "Sensor receiver stopped ({} received, {} undecodable, {} dropped)",
        stats.received.load(Ordering::Relaxed),
        stats.decode_errors.load(Ordering::Relaxed),
        stats.dropped_full.load(Ordering::Relaxed)
    );
}

enum ReceiveEnd {
    Shutdown,
    ConsumerGone,
}

fn receive_loop(
    stream: TcpStream,
    tx: &Sender<SensorMessage>,
    stats: &ReceiverStats,
    running: &AtomicBool,
) -> Result<ReceiveEnd> {
    let mut reader = FrameReader::new(stream);

    while running.load(Ordering::Relaxed) {
        let envelope = match reader.recv_timeout::<SensorEnvelope>(POLL_TIMEOUT) {
            Ok(Some(envelope)) => envelope,
            Ok(None) => continue,
            Err(crate::error::RoadmapError::Decode(e)) => {
                stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Failed to decode sensor envelope: {}", e);
                continue;
            }
            Err(e) => return Err(e),
        };

        let message = match SensorMessage::try_from(envelope) {
            Ok(m) => m,
            Err(e) => {
                stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Malformed sensor envelope: {}", e);
                continue;
            }
        };
        stats.received.fetch_add(1, Ordering::Relaxed);

        match tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                stats.dropped_full.fetch_add(1, Ordering::Relaxed);
                log::debug!("Sensor channel full, dropped {} message", m.kind());
            }
            Err(TrySendError::Disconnected(_)) => return Ok(ReceiveEnd::ConsumerGone),
        }
    }

    Ok(ReceiveEnd::Shutdown)
}

fn sleep_while_running(total: Duration, running: &AtomicBool) {
    let step = Duration::from_millis(50);
    let mut slept = Duration::ZERO;
    while slept < total && running.load(Ordering::Relaxed) {
        thread::sleep(step);
        slept += step;
    }
}
