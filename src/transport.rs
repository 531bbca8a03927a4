//! TCP transport for the directory protocol.
//!
//! Implements the frame layer (2-byte little-endian length, 2-byte
//! little-endian tag, then the argument text) on top of plain TCP. Each
//! connection gets a reader task that decodes frames into dispatcher events
//! and a writer task that drains the connection's outbound queue, so the
//! dispatcher never blocks on a socket. Peer links are dialed once at
//! startup and classified with a server-link frame.

use crate::node::dispatch::DirectoryNode;
use crate::node::links::Links;
use crate::node::types::{ConnectionId, Event, LinkClass, NodeConfig, OutFrame};
use crate::protocol::{self, HEADER_LEN, MSG_SERVER_LINK};
use anyhow::Result;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Payloads past this size are treated as a protocol violation and drop the
/// connection.
const MAX_PAYLOAD: usize = 16 * 1024;

/// Run one directory node until shutdown: bind the listener, dial the
/// configured peers, then drive the dispatcher loop.
pub async fn run(config: NodeConfig, bind: SocketAddr, peers: Vec<SocketAddr>) -> Result<()> {
    let links = Links::new();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let listener = TcpListener::bind(bind).await?;
    tracing::info!("listening on {}", bind);

    for addr in peers {
        match TcpStream::connect(addr).await {
            Ok(socket) => {
                let conn = spawn_connection(socket, addr, LinkClass::Peer, &links, &events_tx);
                links.send(&conn, MSG_SERVER_LINK, config.server_name.clone());
                tracing::info!("dialed peer {}", addr);
            }
            Err(e) => tracing::warn!("could not reach peer {}: {}", addr, e),
        }
    }

    {
        let links = links.clone();
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            accept_loop(listener, links, events_tx).await;
        });
    }

    dispatch_loop(config, links, events_rx).await;
    Ok(())
}

async fn accept_loop(listener: TcpListener, links: Links, events: UnboundedSender<Event>) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                tracing::debug!("accepted connection from {}", addr);
                spawn_connection(socket, addr, LinkClass::Unknown, &links, &events);
            }
            Err(e) => {
                tracing::error!("accept failed: {}", e);
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

/// The single-writer core: all catalogue state lives in this task.
async fn dispatch_loop(
    config: NodeConfig,
    links: Links,
    mut events: UnboundedReceiver<Event>,
) {
    let mut gc = tokio::time::interval(config.gc_interval);
    let mut stats = tokio::time::interval(config.stats_interval);
    let mut flush = tokio::time::interval(config.library_flush_interval);
    let mut node = DirectoryNode::new(config, links);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => node.handle_event(event),
                None => break,
            },
            _ = gc.tick() => node.periodic_gc(),
            _ = stats.tick() => node.log_stats(),
            _ = flush.tick() => node.flush_library(),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                node.flush_library();
                break;
            }
        }
    }
}

fn spawn_connection(
    socket: TcpStream,
    addr: SocketAddr,
    class: LinkClass,
    links: &Links,
    events: &UnboundedSender<Event>,
) -> ConnectionId {
    let conn = ConnectionId::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    links.register(conn.clone(), class, addr, outbound_tx);

    let (read_half, write_half) = socket.into_split();

    tokio::spawn(write_loop(write_half, outbound_rx));
    {
        let conn = conn.clone();
        let events = events.clone();
        tokio::spawn(async move {
            read_loop(read_half, &conn, &events).await;
            let _ = events.send(Event::Disconnected { conn });
        });
    }
    conn
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    conn: &ConnectionId,
    events: &UnboundedSender<Event>,
) {
    let mut header = [0u8; HEADER_LEN];
    loop {
        if let Err(e) = read_half.read_exact(&mut header).await {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                tracing::debug!("read error on {}: {}", conn.0, e);
            }
            return;
        }
        let (len, tag) = protocol::decode_header(header);
        if len > MAX_PAYLOAD {
            tracing::warn!("oversized frame ({} bytes) on {}", len, conn.0);
            return;
        }
        let mut body = vec![0u8; len];
        if let Err(e) = read_half.read_exact(&mut body).await {
            tracing::debug!("truncated frame on {}: {}", conn.0, e);
            return;
        }
        let payload = String::from_utf8_lossy(&body)
            .trim_end_matches('\0')
            .to_string();
        if events
            .send(Event::Frame {
                conn: conn.clone(),
                tag,
                payload,
            })
            .is_err()
        {
            return;
        }
    }
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut outbound: UnboundedReceiver<OutFrame>) {
    while let Some((tag, text)) = outbound.recv().await {
        let frame = protocol::encode_frame(tag, &text);
        if let Err(e) = write_half.write_all(&frame).await {
            tracing::debug!("write error: {}", e);
            return;
        }
    }
}
