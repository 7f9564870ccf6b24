//! TCP transport for room traffic: length-prefixed framing, the accepting
//! side with per-connection reader/writer tasks, the client connection, and
//! reconnection backoff.
//!
//! This crate moves opaque payloads. Message encoding lives with the room
//! rules so that both ends share one schema; the transport never inspects
//! what it carries.

pub mod framing;
pub mod platform;
pub mod reconnection;
pub mod tcp_client;
pub mod tcp_server;

pub use framing::{FrameConfig, FrameError, read_frame, write_frame};
pub use platform::{
    SocketConfig, configure_stream, create_listener, default_bind_address, ipv4_bind_address,
};
pub use reconnection::{ReconnectConfig, ReconnectError, ReconnectState, reconnect_loop};
pub use tcp_client::{ConnectConfig, ConnectionState, ConnectionStateWatch, RoomConnection};
pub use tcp_server::{
    ConnectionId, ConnectionLimitReached, ConnectionMap, DEFAULT_PORT, IdGenerator, ServerConfig,
    ServerEvent, ServerTransport,
};
