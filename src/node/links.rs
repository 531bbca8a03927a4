use super::types::{ConnectionId, LinkClass, OutFrame};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// One registered connection: its class, remote address and outbound queue.
pub struct Link {
    pub class: LinkClass,
    pub addr: SocketAddr,
    pub tx: UnboundedSender<OutFrame>,
}

/// Registry of every open connection, shared between the accept loop, the
/// per-connection writer tasks and the dispatcher. Only outbound routing
/// lives here; all catalogue state belongs to the dispatcher task alone.
#[derive(Clone, Default)]
pub struct Links {
    inner: Arc<DashMap<ConnectionId, Link>>,
}

impl Links {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        conn: ConnectionId,
        class: LinkClass,
        addr: SocketAddr,
        tx: UnboundedSender<OutFrame>,
    ) {
        self.inner.insert(conn, Link { class, addr, tx });
    }

    pub fn unregister(&self, conn: &ConnectionId) {
        self.inner.remove(conn);
    }

    pub fn class_of(&self, conn: &ConnectionId) -> LinkClass {
        self.inner
            .get(conn)
            .map(|link| link.class)
            .unwrap_or(LinkClass::Unknown)
    }

    pub fn set_class(&self, conn: &ConnectionId, class: LinkClass) {
        if let Some(mut link) = self.inner.get_mut(conn) {
            link.class = class;
        }
    }

    pub fn addr_of(&self, conn: &ConnectionId) -> Option<SocketAddr> {
        self.inner.get(conn).map(|link| link.addr)
    }

    /// Queue one frame for a connection. A connection that disappeared mid-
    /// dispatch is logged and skipped; teardown is handled by its reader.
    pub fn send(&self, conn: &ConnectionId, tag: u16, text: String) {
        match self.inner.get(conn) {
            Some(link) => {
                if link.tx.send((tag, text)).is_err() {
                    tracing::debug!("connection {} closed its outbound queue", conn.0);
                }
            }
            None => tracing::debug!("send to unknown connection {}", conn.0),
        }
    }

    /// Queue one frame for every peer link except `except`.
    pub fn broadcast_peers(&self, except: Option<&ConnectionId>, tag: u16, text: &str) {
        for entry in self.inner.iter() {
            if entry.value().class != LinkClass::Peer {
                continue;
            }
            if except.is_some_and(|skip| skip == entry.key()) {
                continue;
            }
            if entry.value().tx.send((tag, text.to_string())).is_err() {
                tracing::debug!("peer {} closed its outbound queue", entry.key().0);
            }
        }
    }

    pub fn peer_count(&self) -> usize {
        self.inner
            .iter()
            .filter(|entry| entry.value().class == LinkClass::Peer)
            .count()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
