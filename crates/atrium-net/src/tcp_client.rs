//! Connecting side of the room transport.
//!
//! [`RoomConnection`] owns one framed TCP connection to a room server.
//! Background tasks handle the socket; the game loop talks to them through
//! plain channels, so sending and polling never block a frame. State
//! changes are published on a [`watch`] channel for any number of
//! observers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::platform::{SocketConfig, configure_stream};

/// How often an idle connection writes an empty keepalive frame. Keeps
/// NAT bindings warm; receivers discard these without surfacing them.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a TCP connection.
    Connecting,
    /// Connection established, frames flowing.
    Connected,
    /// Connection lost or deliberately closed.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.tx.send(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }
}

// ---------------------------------------------------------------------------
// RoomConnection
// ---------------------------------------------------------------------------

/// Socket and framing options for an outgoing connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectConfig {
    pub socket: SocketConfig,
    pub frame: FrameConfig,
}

/// Handle to one connection to a room server.
///
/// Created by [`RoomConnection::connect`]. Payloads go out through
/// [`send`](Self::send) and come back through
/// [`poll_message`](Self::poll_message); both are synchronous, so a frame
/// loop can drive them without touching the runtime.
pub struct RoomConnection {
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<ConnectionStateWatch>,
    shutdown_tx: watch::Sender<bool>,
}

impl RoomConnection {
    /// Connect to the server at `addr`.
    ///
    /// Applies socket options, splits the stream, and spawns the reader and
    /// writer tasks. Returns once the TCP handshake completes.
    pub async fn connect(addr: SocketAddr, config: ConnectConfig) -> std::io::Result<Self> {
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let stream = TcpStream::connect(addr).await?;
        configure_stream(&stream, &config.socket)?;
        state.set(ConnectionState::Connected);

        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(read_task(
            reader,
            inbound_tx,
            Arc::clone(&state),
            config.frame.clone(),
            shutdown_rx.clone(),
        ));
        tokio::spawn(write_task(
            writer,
            outbound_rx,
            Arc::clone(&state),
            config.frame,
            shutdown_rx,
        ));

        Ok(Self {
            outbound_tx,
            inbound_rx,
            state,
            shutdown_tx,
        })
    }

    /// Queue a payload for sending. Returns false once the connection is
    /// torn down.
    pub fn send(&self, payload: Vec<u8>) -> bool {
        self.outbound_tx.send(payload).is_ok()
    }

    /// Take the next received payload, if any arrived since the last poll.
    pub fn poll_message(&mut self) -> Option<Vec<u8>> {
        self.inbound_rx.try_recv().ok()
    }

    /// Return the connection state watch.
    pub fn state(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Convenience check against the state watch.
    pub fn is_connected(&self) -> bool {
        self.state.current() == ConnectionState::Connected
    }

    /// Close the connection. Background tasks exit and the state
    /// transitions to [`ConnectionState::Disconnected`] immediately.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        self.state.set(ConnectionState::Disconnected);
    }
}

/// Decode inbound frames until the server goes away or shutdown fires.
/// Keepalive frames are dropped here.
async fn read_task(
    mut reader: OwnedReadHalf,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    state: Arc<ConnectionStateWatch>,
    config: FrameConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            result = read_frame(&mut reader, &config) => {
                match result {
                    Ok(payload) if payload.is_empty() => {}
                    Ok(payload) => {
                        if inbound_tx.send(payload).is_err() {
                            break;
                        }
                    }
                    Err(FrameError::ConnectionClosed) => {
                        state.set(ConnectionState::Disconnected);
                        break;
                    }
                    Err(e) => {
                        debug!(error = %e, "receive failed");
                        state.set(ConnectionState::Disconnected);
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

/// Drain the outbound queue, interleaving keepalive frames while idle.
async fn write_task(
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    state: Arc<ConnectionStateWatch>,
    config: FrameConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let start = tokio::time::Instant::now() + KEEPALIVE_INTERVAL;
    let mut keepalive = tokio::time::interval_at(start, KEEPALIVE_INTERVAL);

    loop {
        tokio::select! {
            maybe = outbound_rx.recv() => {
                match maybe {
                    Some(payload) => {
                        if let Err(e) = write_frame(&mut writer, &payload, &config).await {
                            debug!(error = %e, "send failed");
                            state.set(ConnectionState::Disconnected);
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = keepalive.tick() => {
                if write_frame(&mut writer, &[], &config).await.is_err() {
                    state.set(ConnectionState::Disconnected);
                    break;
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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// Accept one connection and echo every non-empty frame back.
    async fn frame_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let config = FrameConfig::default();
            loop {
                match read_frame(&mut stream, &config).await {
                    Ok(payload) if payload.is_empty() => {}
                    Ok(payload) => {
                        if write_frame(&mut stream, &payload, &config).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        addr
    }

    async fn poll_until_message(conn: &mut RoomConnection) -> Vec<u8> {
        timeout(Duration::from_secs(2), async {
            loop {
                if let Some(payload) = conn.poll_message() {
                    return payload;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for message")
    }

    #[tokio::test]
    async fn test_connect_reaches_connected_state() {
        let addr = frame_echo_server().await;
        let conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_send_and_poll_roundtrip() {
        let addr = frame_echo_server().await;
        let mut conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();

        assert!(conn.send(b"hello".to_vec()));
        assert_eq!(poll_until_message(&mut conn).await, b"hello");
    }

    #[tokio::test]
    async fn test_empty_frames_from_server_never_surface() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let config = FrameConfig::default();
            write_frame(&mut stream, &[], &config).await.unwrap();
            write_frame(&mut stream, b"real", &config).await.unwrap();
            // Hold the stream open while the client reads.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let mut conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();
        assert_eq!(poll_until_message(&mut conn).await, b"real");
    }

    #[tokio::test]
    async fn test_poll_returns_none_when_idle() {
        let addr = frame_echo_server().await;
        let mut conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();
        assert!(conn.poll_message().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_is_immediate() {
        let addr = frame_echo_server().await;
        let conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();

        conn.disconnect();
        assert_eq!(conn.state().current(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_server_close_is_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();
        let mut rx = conn.state().subscribe();
        timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| *s == ConnectionState::Disconnected),
        )
        .await
        .expect("timed out waiting for disconnect")
        .unwrap();
    }

    #[tokio::test]
    async fn test_state_watch_notifies_subscribers() {
        let addr = frame_echo_server().await;
        let conn = RoomConnection::connect(addr, ConnectConfig::default())
            .await
            .unwrap();
        let mut rx = conn.state().subscribe();
        assert_eq!(*rx.borrow(), ConnectionState::Connected);

        conn.disconnect();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_state_watch_starts_disconnected() {
        let watch = ConnectionStateWatch::new();
        assert_eq!(watch.current(), ConnectionState::Disconnected);
    }
}
