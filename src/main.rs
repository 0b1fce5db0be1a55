//! Irislink - VR Eye Tracking Bridge
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use irislink::{
    camera::{CameraWorker, SharedSource, FRAME_QUEUE_DEPTH},
    config::Config,
    osc::{receiver::OscCommandReceiver, sender::OscOutputWorker, OscClient},
    pipeline::{EstimatorBridge, StaticEstimator},
    sync::{CancellationToken, CaptureSignal},
};

/// Irislink - VR Eye Tracking Bridge
#[derive(Parser, Debug)]
#[command(name = "irislink", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Capture source: MJPEG stream URL or camera index (overrides config)
    #[arg(short, long)]
    source: Option<String>,

    /// OSC output host (overrides config)
    #[arg(long)]
    osc_address: Option<String>,

    /// OSC output port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the OSC command receiver
    #[arg(long)]
    no_receiver: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", irislink::NAME, irislink::VERSION);

    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if args.source.is_some() {
        config.capture.source = args.source.clone();
    }
    if let Some(ref address) = args.osc_address {
        config.osc.address = address.clone();
    }
    if let Some(port) = args.port {
        config.osc.port = port;
    }
    if args.no_receiver {
        config.osc.receiver_enabled = false;
    }

    config.validate()?;

    info!(
        "Capture source: {}",
        config.capture.source.as_deref().unwrap_or("(unset)")
    );
    info!("Tracked eye: {:?}", config.capture.eye);
    info!("OSC output: {}:{}", config.osc.address, config.osc.port);
    info!("OSC command receiver: {}", config.osc.receiver_enabled);

    // Shared state and channels between the workers
    let source: SharedSource = Arc::new(RwLock::new(config.capture.source.clone()));
    let capture_signal = CaptureSignal::new();
    let cancellation = CancellationToken::new();

    let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
    let (status_tx, status_rx) = crossbeam_channel::unbounded();
    let (result_tx, result_rx) = crossbeam_channel::bounded(32);
    let (command_tx, command_rx) = crossbeam_channel::unbounded();

    let mut handles = Vec::new();

    // Capture worker
    let mut camera = CameraWorker::new(
        Arc::clone(&source),
        Box::new(irislink::camera::device::NativeOpener),
        frame_tx,
        status_tx,
        capture_signal.clone(),
        cancellation.clone(),
    )?;
    handles.push(
        thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || camera.run())?,
    );

    // Estimator bridge
    let mut bridge = EstimatorBridge::new(
        frame_rx,
        result_tx,
        capture_signal,
        cancellation.clone(),
        Box::new(StaticEstimator::new(config.capture.eye)),
    );
    handles.push(
        thread::Builder::new()
            .name("estimator".into())
            .spawn(move || bridge.run())?,
    );

    // OSC output worker
    let client = OscClient::new(&config.osc.address, config.osc.port)?;
    let mut output = OscOutputWorker::new(client, result_rx, cancellation.clone());
    handles.push(
        thread::Builder::new()
            .name("osc-output".into())
            .spawn(move || output.run())?,
    );

    // OSC command receiver
    if config.osc.receiver_enabled {
        let mut receiver = OscCommandReceiver::bind(
            config.osc.receiver_port,
            &config.osc.recenter_address,
            &config.osc.recalibrate_address,
            command_tx,
            cancellation.clone(),
        )?;
        handles.push(
            thread::Builder::new()
                .name("osc-receiver".into())
                .spawn(move || receiver.run())?,
        );
    } else {
        drop(command_tx);
    }

    // Log camera state transitions and incoming avatar commands
    handles.push(thread::Builder::new().name("status-log".into()).spawn(
        move || {
            while let Ok(state) = status_rx.recv() {
                info!("Camera {:?}", state);
            }
        },
    )?);
    handles.push(thread::Builder::new().name("command-log".into()).spawn(
        move || {
            while let Ok(command) = command_rx.recv() {
                info!("Avatar command: {:?}", command);
            }
        },
    )?);

    // Wait for Ctrl+C / SIGTERM, then cancel and join the workers
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(shutdown_signal());

    info!("Shutdown signal received");
    cancellation.cancel();

    for handle in handles {
        let name = handle.thread().name().unwrap_or("worker").to_string();
        if handle.join().is_err() {
            error!("Thread {} panicked during shutdown", name);
        } else {
            debug!("Thread {} stopped", name);
        }
    }

    info!("Irislink stopped");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
