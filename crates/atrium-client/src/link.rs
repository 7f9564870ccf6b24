//! Message transport between the frame loop and the room server.
//!
//! The frame loop is synchronous, so [`ServerLink`] exposes a sync
//! queue-and-poll surface over whatever transport the host wired up.
//! [`TcpLink`] is the production implementation over a framed TCP
//! connection; tests substitute a recording fake.

use std::net::SocketAddr;

use atrium_net::{ConnectConfig, ReconnectConfig, ReconnectError, RoomConnection, reconnect_loop};
use atrium_room::{ClientMessage, ServerMessage, deserialize_message, serialize_message};
use tracing::warn;

// ---------------------------------------------------------------------------
// ServerLink
// ---------------------------------------------------------------------------

/// Typed message channel to the room server.
pub trait ServerLink {
    /// Queue a message for the server. Returns false when the transport
    /// is down and the message was dropped.
    fn send_message(&mut self, message: &ClientMessage) -> bool;

    /// Next decoded server message, if one has arrived.
    fn poll_message(&mut self) -> Option<ServerMessage>;

    /// Whether the underlying transport is currently up.
    fn is_connected(&self) -> bool;
}

// ---------------------------------------------------------------------------
// TcpLink
// ---------------------------------------------------------------------------

/// [`ServerLink`] over a framed TCP connection. Construction is async;
/// everything after that is channel traffic and never blocks a frame.
pub struct TcpLink {
    connection: RoomConnection,
}

impl TcpLink {
    /// Connect once, failing fast.
    pub async fn connect(addr: SocketAddr, config: ConnectConfig) -> std::io::Result<Self> {
        let connection = RoomConnection::connect(addr, config).await?;
        Ok(Self { connection })
    }

    /// Connect with backoff, for re-establishing the transport after an
    /// abrupt drop while the server still holds the session in grace.
    pub async fn reconnect(
        addr: SocketAddr,
        reconnect: ReconnectConfig,
        connect: ConnectConfig,
    ) -> Result<Self, ReconnectError> {
        let connection = reconnect_loop(addr, reconnect, connect).await?;
        Ok(Self { connection })
    }
}

impl ServerLink for TcpLink {
    fn send_message(&mut self, message: &ClientMessage) -> bool {
        match serialize_message(message) {
            Ok(bytes) => self.connection.send(bytes),
            Err(error) => {
                warn!(%error, "failed to encode outbound message");
                false
            }
        }
    }

    fn poll_message(&mut self) -> Option<ServerMessage> {
        // Undecodable frames are dropped rather than stalling the feed.
        loop {
            let payload = self.connection.poll_message()?;
            match deserialize_message(&payload) {
                Ok(message) => return Some(message),
                Err(error) => warn!(%error, "dropping undecodable server frame"),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
