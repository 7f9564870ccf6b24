//! Authoritative room state, session lifecycle, and wire protocol.
//!
//! The server owns the canonical room state. Clients send
//! [`protocol::ClientMessage`] values describing what they want to do;
//! [`authority::RoomServer`] validates and applies them and answers with
//! [`authority::Outbound`] delivery instructions. The rules are plain
//! synchronous state transitions with all clocks injected, so the whole
//! join/move/chat/leave/reconnect surface is testable without sockets.

pub mod authority;
pub mod protocol;
pub mod state;

pub use authority::{Outbound, RoomServer, SessionPhase};
pub use protocol::{
    ClientMessage, MessageError, MoveUpdate, PROTOCOL_VERSION, ServerMessage, deserialize_message,
    serialize_message,
};
pub use state::{
    DEFAULT_ENV_KEY, KNOWN_ENV_KEYS, PlayerState, RECONNECT_GRACE, RoomState, SessionId,
    WORLD_BOUND,
};
