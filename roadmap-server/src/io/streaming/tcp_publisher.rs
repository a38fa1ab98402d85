//! TCP roadmap publisher.
//!
//! Accepts any number of clients on a non-blocking listener. Each snapshot
//! is encoded once and written to every client as a length-prefixed
//! `Roadmap` message. A client that cannot take a frame right now skips it;
//! a client whose socket fails is dropped.
//!
//! The last frame is kept so a client connecting between publications is
//! sent the current roadmap as soon as it is accepted.

use std::io::{ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use crate::engine::{RoadmapSink, RoadmapSnapshot};
use crate::error::{Result, RoadmapError};
use crate::io::proto::Roadmap;
use crate::io::wire::encode_frame;

enum WriteOutcome {
    Sent,
    Skipped,
    Failed,
}

struct Client {
    stream: TcpStream,
    addr: SocketAddr,
}

impl Client {
    fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        stream.set_nonblocking(true).ok();
        stream.set_nodelay(true).ok();
        Self { stream, addr }
    }

    /// Write a whole frame. A frame that could not start is skipped; one that
    /// stalls midway would desynchronize the stream, so the client is failed.
    fn try_write(&mut self, data: &[u8]) -> WriteOutcome {
        let mut written = 0;
        while written < data.len() {
            match self.stream.write(&data[written..]) {
                Ok(0) => return WriteOutcome::Failed,
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    return if written == 0 {
                        WriteOutcome::Skipped
                    } else {
                        WriteOutcome::Failed
                    };
                }
                Err(_) => return WriteOutcome::Failed,
            }
        }
        WriteOutcome::Sent
    }
}

/// Publishes roadmap snapshots to TCP clients.
pub struct TcpRoadmapPublisher {
    listener: TcpListener,
    clients: Vec<Client>,
    last_frame: Option<Vec<u8>>,
}

impl TcpRoadmapPublisher {
    /// Bind the listener, e.g. `"0.0.0.0:5560"`.
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| RoadmapError::Transport(format!("failed to bind {}: {}", addr, e)))?;
        listener.set_nonblocking(true)?;
        log::info!("Roadmap publisher listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            clients: Vec::new(),
            last_frame: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accept all pending connections and send them the last frame.
    pub fn accept_pending(&mut self) {
        for mut client in self.accept_new() {
            if let Some(frame) = &self.last_frame
                && let WriteOutcome::Failed = client.try_write(frame)
            {
                log::info!("Roadmap client disconnected: {}", client.addr);
                continue;
            }
            self.clients.push(client);
        }
    }

    fn accept_new(&mut self) -> Vec<Client> {
        let mut accepted = Vec::new();
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    log::info!("Roadmap client connected: {}", addr);
                    accepted.push(Client::new(stream, addr));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::warn!("Roadmap accept failed: {}", e);
                    break;
                }
            }
        }
        accepted
    }

    /// Wait up to `timeout` for at least one client, accepting as they come.
    pub fn wait_for_client(&mut self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            self.accept_pending();
            if !self.clients.is_empty() {
                return true;
            }
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

impl RoadmapSink for TcpRoadmapPublisher {
    fn publish(&mut self, snapshot: &RoadmapSnapshot) -> Result<()> {
        let frame = encode_frame(&Roadmap::try_from(snapshot)?);

        let accepted = self.accept_new();
        self.clients.extend(accepted);
        self.clients.retain_mut(|client| match client.try_write(&frame) {
            WriteOutcome::Sent => true,
            WriteOutcome::Skipped => {
                log::debug!("Roadmap client {} slow, frame skipped", client.addr);
                true
            }
            WriteOutcome::Failed => {
                log::info!("Roadmap client disconnected: {}", client.addr);
                false
            }
        });

        self.last_frame = Some(frame);
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        self.accept_pending();
        Ok(())
    }
}
