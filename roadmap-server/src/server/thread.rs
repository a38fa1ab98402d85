//! Named thread running the roadmap server loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;

use super::RoadmapServer;
use crate::sensors::SensorMessage;

/// Server thread handle.
pub struct ServerThread {
    handle: JoinHandle<()>,
}

impl ServerThread {
    /// Spawn the server loop. A fatal server error clears `running` so the
    /// rest of the process shuts down with it.
    pub fn spawn(
        mut server: RoadmapServer,
        receiver: Receiver<SensorMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let handle = thread::Builder::new()
            .name("roadmap-server".into())
            .spawn(move || {
                if let Err(e) = server.run(receiver, running.clone()) {
                    log::error!("Roadmap server failed: {}", e);
                    running.store(false, Ordering::SeqCst);
                }
            })
            .expect("Failed to spawn roadmap server thread");

        Self { handle }
    }

    /// Wait for thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}
