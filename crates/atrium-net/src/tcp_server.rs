//! Accepting side of the room transport.
//!
//! [`ServerTransport`] runs the accept loop. Each accepted stream is split:
//! a reader task decodes frames and forwards them as [`ServerEvent`]s on
//! one shared channel, and a writer task drains that connection's outbound
//! queue. Fan-out goes through [`ConnectionMap`], which only pushes into
//! per-connection queues, so one slow peer never stalls a broadcast.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info, warn};

use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::platform::{SocketConfig, configure_stream, create_listener, ipv4_bind_address};

/// Default room server port.
pub const DEFAULT_PORT: u16 = 2567;

// ---------------------------------------------------------------------------
// Connection identity
// ---------------------------------------------------------------------------

/// Unique identifier for one TCP connection within a server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a new generator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique [`ConnectionId`].
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// What the transport reports to the application.
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection was accepted and registered.
    Connected {
        connection: ConnectionId,
        addr: SocketAddr,
    },
    /// A complete non-empty frame arrived.
    Message {
        connection: ConnectionId,
        payload: Vec<u8>,
    },
    /// The connection is gone, whether by close, error, or shutdown.
    Disconnected { connection: ConnectionId },
}

// ---------------------------------------------------------------------------
// Connection map
// ---------------------------------------------------------------------------

/// Error returned when the connection map is at capacity.
#[derive(Debug)]
pub struct ConnectionLimitReached;

/// Outbound registry: connection id to that connection's send queue.
///
/// Dropping an entry closes the queue, which ends the writer task and
/// FIN-closes the stream.
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>>,
    max_connections: usize,
}

impl ConnectionMap {
    /// Create a new map with the given capacity limit.
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Register a connection's send queue. Returns `Err` at capacity.
    pub async fn insert(
        &self,
        id: ConnectionId,
        tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(id, tx);
        Ok(())
    }

    /// Remove a connection, closing its send queue.
    pub async fn remove(&self, id: &ConnectionId) {
        self.inner.write().await.remove(id);
    }

    /// Remove every connection, closing all send queues.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Queue a payload for one connection. Returns false if the connection
    /// is not registered or its writer already ended.
    pub async fn send_to(&self, id: ConnectionId, payload: Vec<u8>) -> bool {
        match self.inner.read().await.get(&id) {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Queue a payload for every connection.
    pub async fn broadcast(&self, payload: &[u8]) {
        for tx in self.inner.read().await.values() {
            let _ = tx.send(payload.to_vec());
        }
    }

    /// Queue a payload for every connection except `skip`.
    pub async fn broadcast_except(&self, skip: ConnectionId, payload: &[u8]) {
        for (id, tx) in self.inner.read().await.iter() {
            if *id != skip {
                let _ = tx.send(payload.to_vec());
            }
        }
    }

    /// Return the number of registered connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Return whether the map is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Server transport
// ---------------------------------------------------------------------------

/// Configuration for [`ServerTransport`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:2567`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Rooms are small; default: 64.
    pub max_connections: usize,
    /// Framing limits applied to every stream.
    pub frame: FrameConfig,
    /// Socket options applied to every stream.
    pub socket: SocketConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ipv4_bind_address(DEFAULT_PORT),
            max_connections: 64,
            frame: FrameConfig::default(),
            socket: SocketConfig::default(),
        }
    }
}

/// Accept loop plus per-connection reader/writer tasks.
pub struct ServerTransport {
    config: ServerConfig,
    connections: Arc<ConnectionMap>,
    id_gen: IdGenerator,
    events_tx: mpsc::UnboundedSender<ServerEvent>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ServerTransport {
    /// Create a transport. The returned receiver carries every
    /// [`ServerEvent`] in arrival order.
    pub fn new(config: ServerConfig) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transport = Self {
            connections: Arc::new(ConnectionMap::new(config.max_connections)),
            id_gen: IdGenerator::new(),
            config,
            events_tx,
            shutdown_tx,
            shutdown_rx,
        };
        (transport, events_rx)
    }

    /// Outbound registry, for fan-out by the application.
    pub fn connections(&self) -> &Arc<ConnectionMap> {
        &self.connections
    }

    /// Bind the configured address and run the accept loop until shutdown.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = create_listener(self.config.bind_addr, &self.config.socket).await?;
        info!(addr = %self.config.bind_addr, "room transport listening");
        self.run_with_listener(listener).await
    }

    /// Run the accept loop with a pre-bound listener (useful for tests).
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = result?;
                    if let Err(e) = configure_stream(&stream, &self.config.socket) {
                        warn!(peer = %peer_addr, error = %e, "failed to configure socket, rejecting");
                        continue;
                    }
                    self.spawn_connection(stream, peer_addr).await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("room transport shutting down");
                        break;
                    }
                }
            }
        }

        // Closing every send queue ends the writer tasks, which FIN-closes
        // the streams; reader tasks exit via the shutdown watch.
        self.connections.clear().await;
        Ok(())
    }

    /// Signal the accept loop and all connection tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn spawn_connection(&self, stream: tokio::net::TcpStream, peer_addr: SocketAddr) {
        let id = self.id_gen.next_id();
        let (reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        if self.connections.insert(id, out_tx).await.is_err() {
            warn!(peer = %peer_addr, "connection limit reached, rejecting");
            return;
        }

        info!(connection = id.0, peer = %peer_addr, "connection accepted");
        let _ = self.events_tx.send(ServerEvent::Connected {
            connection: id,
            addr: peer_addr,
        });

        let frame = self.config.frame.clone();
        tokio::spawn(write_loop(id, writer, out_rx, frame));

        let frame = self.config.frame.clone();
        let events_tx = self.events_tx.clone();
        let connections = Arc::clone(&self.connections);
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::spawn(async move {
            read_loop(id, reader, &events_tx, &frame, &mut shutdown_rx).await;
            connections.remove(&id).await;
            let _ = events_tx.send(ServerEvent::Disconnected { connection: id });
            info!(connection = id.0, "connection closed");
        });
    }
}

/// Decode frames off one connection until it closes or shutdown fires.
/// Empty frames are keepalives and produce no event.
async fn read_loop(
    id: ConnectionId,
    mut reader: OwnedReadHalf,
    events_tx: &mpsc::UnboundedSender<ServerEvent>,
    config: &FrameConfig,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = read_frame(&mut reader, config) => {
                match result {
                    Ok(payload) if payload.is_empty() => {}
                    Ok(payload) => {
                        let event = ServerEvent::Message {
                            connection: id,
                            payload,
                        };
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(FrameError::ConnectionClosed) => break,
                    Err(e) => {
                        debug!(connection = id.0, error = %e, "read failed");
                        break;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}

/// Drain one connection's outbound queue. Ends when the queue closes
/// (connection removed) or a write fails.
async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    config: FrameConfig,
) {
    while let Some(payload) = out_rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &payload, &config).await {
            debug!(connection = id.0, error = %e, "write failed, dropping connection");
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
