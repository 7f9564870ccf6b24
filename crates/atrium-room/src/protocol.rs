//! Wire message types and serialization.
//!
//! Both directions are serialized with [`postcard`] and prefixed with a
//! protocol version byte. Use [`serialize_message`] and
//! [`deserialize_message`] for encoding/decoding; framing (length
//! prefixes) is the transport's job.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::state::{PlayerState, SessionId};

/// Current wire-protocol version. Prepended to every serialized message.
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// MoveUpdate
// ---------------------------------------------------------------------------

/// Partial position/yaw update. Absent fields leave the server's prior
/// value untouched; so do non-finite ones, per-field, once validated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MoveUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub z: Option<f32>,
    pub ry: Option<f32>,
}

impl MoveUpdate {
    /// True when no field is present at all.
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none() && self.ry.is_none()
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Messages a client sends over its connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// First message on a fresh connection: identity plus the
    /// environment the client would like the room to use.
    Join {
        name: String,
        avatar_key: String,
        env_key: String,
    },
    /// First message on a reconnect: claim a prior session inside the
    /// grace window.
    Resume { session_id: SessionId },
    /// Position/yaw delta for the sender's own player.
    Move(MoveUpdate),
    /// Chat line.
    Chat { text: String },
    /// Emote trigger, e.g. "wave".
    Emote { emote: String },
    /// Deliberate goodbye; the player is removed immediately.
    Leave,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Messages the server sends to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ServerMessage {
    /// Join/resume reply: assigned session plus the full current state.
    Welcome {
        session_id: SessionId,
        env_key: String,
        players: Vec<PlayerState>,
    },
    /// A new player entered; sent to everyone already present.
    PlayerJoined { player: PlayerState },
    /// Accepted fields of another player's move.
    PlayerDelta { id: SessionId, update: MoveUpdate },
    /// A player is gone (left, or grace expired).
    PlayerLeft { id: SessionId },
    /// Validated chat line, server-stamped.
    Chat {
        id: SessionId,
        name: String,
        text: String,
        timestamp_ms: u64,
    },
    /// Emote rebroadcast, sender included.
    Emote { id: SessionId, emote: String },
    /// The claimed session no longer exists; join anew.
    ResumeExpired,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during message deserialization.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload was empty (no version byte).
    #[error("empty payload, no version byte")]
    EmptyPayload,

    /// The version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard deserialization failed.
    #[error("deserialization error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Serialize a message into a versioned binary payload.
///
/// Wire format: `[version: u8] [postcard-encoded message]`
pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_allocvec(msg)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Deserialize a versioned binary payload.
///
/// Returns an error if the version is unsupported or the payload is
/// malformed.
pub fn deserialize_message<T: DeserializeOwned>(data: &[u8]) -> Result<T, MessageError> {
    if data.is_empty() {
        return Err(MessageError::EmptyPayload);
    }

    let version = data[0];
    if version != PROTOCOL_VERSION {
        return Err(MessageError::UnsupportedVersion(version));
    }

    let msg = postcard::from_bytes(&data[1..])?;
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
