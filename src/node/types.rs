use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Identity of one framed connection (client session or peer link).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// What the far end of a connection is. Connections start out `Unknown` and
/// are classified by their first recognized command: a login makes a client,
/// a server-link frame makes a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClass {
    Unknown,
    Client,
    Peer,
}

/// One outbound frame: numeric tag plus argument text. Per-connection writer
/// tasks drain these; the dispatcher never blocks on a send.
pub type OutFrame = (u16, String);

/// Everything the transport delivers into the dispatcher task.
#[derive(Debug)]
pub enum Event {
    Frame {
        conn: ConnectionId,
        tag: u16,
        payload: String,
    },
    Disconnected {
        conn: ConnectionId,
    },
}

/// Node-wide settings, populated from the command line.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub server_name: String,
    /// Server-wide search result cap; 0 disables the cap.
    pub max_results: usize,
    /// Per-user share cap; 0 disables the cap.
    pub max_shared: usize,
    /// Maintain the content-hash posting table.
    pub index_hashes: bool,
    pub gc_interval: Duration,
    pub stats_interval: Duration,
    pub library_flush_interval: Duration,
    /// Optional share-library snapshot reapplied when users log back in.
    pub library: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_name: "directory".to_string(),
            max_results: 100,
            max_shared: 5000,
            index_hashes: true,
            gc_interval: Duration::from_secs(60),
            stats_interval: Duration::from_secs(30),
            library_flush_interval: Duration::from_secs(30),
            library: None,
        }
    }
}
