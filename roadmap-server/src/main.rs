//! Roadmap server daemon.
//!
//! Subscribes to a sensor/pose source, grows the roadmap skeleton and
//! publishes it to TCP clients as length-prefixed Protobuf.
//!
//! # Usage
//!
//! ```bash
//! # Threshold mode with defaults
//! cargo run --release
//!
//! # Keyframe mode, continuing a saved roadmap
//! cargo run --release -- --config roadmap-server.toml --mode keyframe --load roadmap.yaml
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;

use roadmap_server::config::RoadmapConfig;
use roadmap_server::engine::{NoopRelaxer, YamlGraphStore};
use roadmap_server::io::source::TcpSensorReceiver;
use roadmap_server::io::streaming::TcpRoadmapPublisher;
use roadmap_server::odometry::{LOADED_GRAPH_FIRST_FRAME, OdometryScript};
use roadmap_server::server::{IngestionMode, ModeKind, RoadmapServer, ServerThread};
use roadmap_server::state::create_shared_skeleton;
use roadmap_server::utils::{now_us, setup_ctrl_c_handler};
use roadmap_server::{Result, RoadmapError};

#[derive(Parser, Debug)]
#[command(name = "roadmap-server")]
#[command(about = "Build and publish a topological roadmap from a sensor stream")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ingestion mode: keyframe or threshold
    #[arg(long)]
    mode: Option<ModeKind>,

    /// Load a saved roadmap at startup
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save the roadmap on shutdown
    #[arg(long)]
    save: Option<PathBuf>,

    /// Sensor source address (host:port)
    #[arg(long)]
    source: Option<String>,

    /// Roadmap publisher port
    #[arg(long)]
    port: Option<u16>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    let config = build_config(&args);

    log::info!("roadmap-server starting");

    if let Err(e) = run(config) {
        log::error!("{}", e);
        std::process::exit(1);
    }

    log::info!("roadmap-server stopped");
}

fn build_config(args: &Args) -> RoadmapConfig {
    let mut config = RoadmapConfig::load_or_default(args.config.as_deref());

    if let Some(mode) = args.mode {
        config.server.mode = mode;
    }
    if let Some(path) = &args.load {
        config.persistence.load = Some(path.clone());
    }
    if let Some(path) = &args.save {
        config.persistence.save = Some(path.clone());
    }
    if let Some(source) = &args.source {
        config.source.address = source.clone();
    }
    if let Some(port) = args.port {
        config.output.bind_port = port;
    }
    config
}

fn run(config: RoadmapConfig) -> Result<()> {
    config.validate()?;

    log::info!("  Mode: {}", config.server.mode);
    log::info!("  Source: {}", config.source.address);
    log::info!("  Roadmap port: {}", config.output.bind_port);
    log::info!(
        "  Admission: {:.2} m / {:.2}°, proximity {:.2} m",
        config.skeleton.admit_distance,
        config.skeleton.admit_angle.to_degrees(),
        config.skeleton.proximity_distance
    );

    let running = setup_ctrl_c_handler()?;
    let skeleton = create_shared_skeleton(config.skeleton.clone());
    let store = YamlGraphStore;

    let loaded = match &config.persistence.load {
        Some(path) => {
            let mut skel = skeleton.write()?;
            skel.load(&store, path)?;
            skel.optimize(&mut NoopRelaxer)?;
            true
        }
        None => false,
    };

    let mode = match config.server.mode {
        ModeKind::Keyframe => {
            let path = config.odometry.script.as_ref().ok_or_else(|| {
                RoadmapError::Config("keyframe mode needs odometry.script".to_string())
            })?;
            let first_frame_id = if loaded { LOADED_GRAPH_FIRST_FRAME } else { 0 };
            let script = OdometryScript::load(path)?;
            log::info!("  Odometry script: {:?}", path);
            IngestionMode::Keyframe(
                script.into_odometer(config.odometry.visual_config(first_frame_id))?,
            )
        }
        ModeKind::Threshold => IngestionMode::Threshold,
    };

    let sink = TcpRoadmapPublisher::bind(&format!("0.0.0.0:{}", config.output.bind_port))?;
    let mut server = RoadmapServer::new(
        &config.server,
        &config.publisher,
        mode,
        skeleton.clone(),
        Box::new(sink),
    );

    let mut receiver = None;
    let sensor_rx = server.start(now_us(), || {
        let (handle, rx) = TcpSensorReceiver::spawn(config.receiver_config(), running.clone());
        receiver = Some(handle);
        Ok(rx)
    })?;

    let server_thread = ServerThread::spawn(server, sensor_rx, running.clone());
    log::info!("Roadmap server running");

    wait_for_shutdown(&running);
    log::info!("Shutting down...");

    if let Err(e) = server_thread.join() {
        log::error!("Roadmap server thread panicked: {:?}", e);
    }
    if let Some(receiver) = receiver
        && let Err(e) = receiver.join()
    {
        log::error!("Sensor receiver thread panicked: {:?}", e);
    }

    if let Some(path) = &config.persistence.save
        && let Err(e) = skeleton.read().and_then(|skel| skel.save(&store, path))
    {
        log::error!("Failed to save roadmap: {}", e);
    }

    Ok(())
}

fn wait_for_shutdown(running: &Arc<AtomicBool>) {
    while running.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }
}
