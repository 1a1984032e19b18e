//! Control surface IPC via Unix sockets
//!
//! Message-based communication between host applications, the overlay
//! surface and the daemon. Uses length-prefixed JSON over Unix domain
//! sockets; the same framing carries request/response pairs and unsolicited
//! pushes (relayed messages, permission results).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

mod messages;
pub use messages::{ControlRequest, ControlResponse, Endpoint, ShowRequest};

use crate::constants::ipc as ipc_const;

/// Identifier of one accepted connection
pub type PeerId = u64;

/// Shared writer half of a peer connection
///
/// Replies from the daemon loop and pushes from the relay can race on the
/// same socket, so every write goes through this lock to keep frames whole.
pub type PeerWriter = Arc<Mutex<UnixStream>>;

/// Get default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ipc_const::SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir)
            .join(ipc_const::APP_DIR)
            .join(ipc_const::SOCKET_FILE));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(ipc_const::APP_DIR).join(ipc_const::SOCKET_FILE))
}

/// Client connection to the daemon (used by hosts, overlays and tests)
pub struct ControlClient {
    stream: UnixStream,
}

impl ControlClient {
    pub fn connect() -> Result<Self> {
        let path = default_socket_path()?;
        Self::connect_to(&path)
    }

    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .context(format!("Failed to connect to overlay daemon at {}", path.display()))?;
        Ok(Self { stream })
    }

    pub fn send(&mut self, request: &ControlRequest) -> Result<()> {
        write_message(&mut self.stream, request)
    }

    /// Receive the next frame from the daemon (blocking); this may be a
    /// reply or an unsolicited push
    pub fn recv(&mut self) -> Result<ControlResponse> {
        read_message(&mut self.stream)
    }

    /// Send a request and wait for the next frame
    pub fn request(&mut self, request: ControlRequest) -> Result<ControlResponse> {
        self.send(&request)?;
        self.recv()
    }
}

/// Listening socket for the daemon
pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl ControlServer {
    pub fn bind() -> Result<Self> {
        let socket_path = default_socket_path()?;
        Self::bind_to(socket_path)
    }

    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Remove stale socket if exists
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner-only: the control surface can move and close the overlay
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept an incoming connection (blocking)
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .context("Failed to accept control connection")?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

struct Peer {
    endpoint: Option<Endpoint>,
    writer: PeerWriter,
}

/// Registry of live connections, shared between the connection threads and
/// the daemon loop
///
/// Carries the message duct: a relayed payload goes to every peer on the
/// other side of its sender, in send order (per-sender FIFO follows from
/// each sender being a single thread).
#[derive(Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<Mutex<HashMap<PeerId, Peer>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: PeerId, writer: PeerWriter) {
        self.peers
            .lock()
            .expect("peer registry poisoned")
            .insert(id, Peer { endpoint: None, writer });
    }

    pub fn remove(&self, id: PeerId) {
        self.peers.lock().expect("peer registry poisoned").remove(&id);
    }

    pub fn set_endpoint(&self, id: PeerId, endpoint: Endpoint) {
        if let Some(peer) = self
            .peers
            .lock()
            .expect("peer registry poisoned")
            .get_mut(&id)
        {
            peer.endpoint = Some(endpoint);
        }
    }

    fn endpoint_of(&self, id: PeerId) -> Endpoint {
        self.peers
            .lock()
            .expect("peer registry poisoned")
            .get(&id)
            .and_then(|peer| peer.endpoint)
            .unwrap_or(Endpoint::Host)
    }

    /// Relay an opaque payload from `sender` to every peer on the other side
    pub fn relay_from(&self, sender: PeerId, payload: serde_json::Value) {
        let to = self.endpoint_of(sender).other();
        debug!(sender, ?to, "Relaying message");
        self.push_to(to, &ControlResponse::Message { payload });
    }

    /// Push an unsolicited frame to every peer declared as `endpoint`
    pub fn push_to(&self, endpoint: Endpoint, response: &ControlResponse) {
        let writers: Vec<(PeerId, PeerWriter)> = {
            let peers = self.peers.lock().expect("peer registry poisoned");
            peers
                .iter()
                .filter(|(_, peer)| peer.endpoint == Some(endpoint))
                .map(|(id, peer)| (*id, Arc::clone(&peer.writer)))
                .collect()
        };

        for (id, writer) in writers {
            if let Err(e) = write_response(&writer, response) {
                warn!(peer = id, error = %e, "Dropping unreachable peer");
                self.remove(id);
            }
        }
    }
}

/// Write one frame through a shared peer writer
pub fn write_response(writer: &PeerWriter, response: &ControlResponse) -> Result<()> {
    let mut stream = writer.lock().expect("peer writer poisoned");
    write_message(&mut stream, response)
}

/// Write length-prefixed message to stream
pub fn write_message<T: Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;

    // Length prefix (u32 little-endian), then the JSON payload
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .context("Failed to write message payload")?;
    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
pub fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut UnixStream) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > ipc_const::MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, ipc_const::MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}
