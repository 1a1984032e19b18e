#![forbid(unsafe_code)]

use anyhow::Context as _;
use clap::Parser;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

use overlayd::config::OverlayConfig;
use overlayd::daemon::{Command, OverlayDaemon};
use overlayd::ipc::{self, ControlRequest, ControlServer, PeerId, PeerRegistry};
use overlayd::platform::Platform;
use overlayd::x11::{AppContext, CachedAtoms};

#[derive(Parser, Debug)]
#[command(name = "overlayd", about = "Always-on-top overlay window daemon", version)]
struct Args {
    /// Control socket path (defaults to $XDG_RUNTIME_DIR/overlayd/control.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,

    /// Override the detected platform API level
    #[arg(long)]
    api_level: Option<u32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args
        .log_level
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let (conn, screen_num) = x11rb::connect(None)?;
    let conn = Arc::new(conn);
    let screen = conn.setup().roots[screen_num].clone();
    info!(
        screen = screen_num,
        width = screen.width_in_pixels,
        height = screen.height_in_pixels,
        "Connected to X11"
    );

    let platform = Platform::detect(&conn, &screen, args.api_level);
    let atoms = Arc::new(CachedAtoms::new(&conn)?);
    let ctx = AppContext {
        conn: Arc::clone(&conn),
        screen,
        atoms,
        platform,
    };

    let overlay_config = OverlayConfig::load();
    info!(config = ?overlay_config, "Loaded overlay config");

    let (tx, rx) = mpsc::channel();
    let registry = PeerRegistry::new();

    let server = match args.socket {
        Some(path) => ControlServer::bind_to(path)?,
        None => ControlServer::bind()?,
    };
    info!(socket = %server.path().display(), "Listening for control connections");
    spawn_accept_loop(server, registry.clone(), tx.clone());

    // X events are read on their own thread; the loop below is the only
    // place the window is ever touched
    spawn_x_reader(Arc::clone(&conn), tx.clone());

    let term = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&term))
            .context("Failed to register signal handler")?;
    }

    let mut daemon = OverlayDaemon::new(ctx, overlay_config, registry, tx);
    loop {
        if term.load(Ordering::Relaxed) {
            info!("Received termination signal");
            break;
        }
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(command) => daemon.handle_command(command),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
        if daemon.shutdown_requested() {
            break;
        }
    }

    daemon.close();
    info!("Overlay daemon stopped");
    Ok(())
}

fn spawn_accept_loop(server: ControlServer, registry: PeerRegistry, tx: Sender<Command>) {
    thread::spawn(move || {
        let mut next_peer: PeerId = 0;
        loop {
            match server.accept() {
                Ok(stream) => {
                    next_peer += 1;
                    spawn_peer(next_peer, stream, registry.clone(), tx.clone());
                }
                Err(e) => {
                    error!(error = %e, "Control accept failed");
                    break;
                }
            }
        }
    });
}

fn spawn_peer(peer: PeerId, stream: UnixStream, registry: PeerRegistry, tx: Sender<Command>) {
    thread::spawn(move || {
        let mut reader = match stream.try_clone() {
            Ok(reader) => reader,
            Err(e) => {
                error!(peer, error = %e, "Failed to split control connection");
                return;
            }
        };
        let writer = Arc::new(Mutex::new(stream));
        registry.register(peer, Arc::clone(&writer));
        info!(peer, "Control connection established");

        loop {
            match ipc::read_message::<ControlRequest>(&mut reader) {
                Ok(request) => {
                    let command = Command::Control {
                        peer,
                        request,
                        writer: Arc::clone(&writer),
                    };
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(peer, error = %e, "Control connection closed");
                    break;
                }
            }
        }
        registry.remove(peer);
    });
}

fn spawn_x_reader(conn: Arc<RustConnection>, tx: Sender<Command>) {
    thread::spawn(move || {
        loop {
            match conn.wait_for_event() {
                Ok(event) => {
                    if tx.send(Command::X11(event)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "X11 connection lost");
                    break;
                }
            }
        }
    });
}
