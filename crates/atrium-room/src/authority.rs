//! Authoritative room rules.
//!
//! [`RoomServer`] owns the canonical [`RoomState`] and applies every
//! inbound message, returning the outbound events the transport should
//! deliver. It never reads the clock and never touches a socket; callers
//! inject time, which keeps the rules deterministic under test.

use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::protocol::{MoveUpdate, ServerMessage};
use crate::state::{
    sanitize_name, PlayerState, RoomState, SessionId, RECONNECT_GRACE, WORLD_BOUND,
};

/// Longest chat line the server will rebroadcast, in characters.
pub const MAX_CHAT_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Delivery instruction paired with a message. The rules decide who
/// hears what; the transport resolves the fan-out to live connections.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// To the connection the handled message arrived on. Used where no
    /// session is bound to the connection yet (join replies, rejected
    /// resumes).
    Reply(ServerMessage),
    /// To every session with a live connection except the named one,
    /// normally the sender.
    BroadcastExcept(SessionId, ServerMessage),
    /// To every session with a live connection.
    Broadcast(ServerMessage),
}

// ---------------------------------------------------------------------------
// Session phases
// ---------------------------------------------------------------------------

/// Lifecycle phase of a session known to the room.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionPhase {
    /// A live connection is bound to this session.
    Connected,
    /// The connection dropped without a leave; the player is retained
    /// until `since + RECONNECT_GRACE`.
    Grace { since: Instant },
}

// ---------------------------------------------------------------------------
// RoomServer
// ---------------------------------------------------------------------------

/// The authoritative side of one room.
pub struct RoomServer {
    state: RoomState,
    sessions: FxHashMap<SessionId, SessionPhase>,
    next_session_id: u64,
}

impl RoomServer {
    pub fn new() -> Self {
        Self {
            state: RoomState::new(),
            sessions: FxHashMap::default(),
            next_session_id: 1,
        }
    }

    // -- joining ------------------------------------------------------------

    /// Admit a new player. The first joiner's `requested_env` decides the
    /// room's environment; later requests are ignored.
    pub fn join(
        &mut self,
        name: &str,
        avatar_key: &str,
        requested_env: &str,
    ) -> (SessionId, Vec<Outbound>) {
        let id = SessionId(self.next_session_id);
        self.next_session_id += 1;

        let env_key = self.state.adopt_env(requested_env).to_string();
        let name = sanitize_name(name);
        let player = PlayerState::spawn(id, name.clone(), avatar_key.to_string());

        self.state.players.insert(id, player.clone());
        self.sessions.insert(id, SessionPhase::Connected);

        info!(
            session = %id,
            name = %name,
            env = %env_key,
            players = self.state.players.len(),
            "player joined"
        );

        let events = vec![
            Outbound::Reply(self.welcome(id)),
            Outbound::BroadcastExcept(id, ServerMessage::PlayerJoined { player }),
        ];
        (id, events)
    }

    /// Handle a reconnect claiming a prior session. Succeeds while the
    /// session still exists (connected or in grace); otherwise the client
    /// is told to join anew.
    pub fn resume(&mut self, session_id: SessionId) -> Vec<Outbound> {
        match self.sessions.get_mut(&session_id) {
            Some(phase) => {
                *phase = SessionPhase::Connected;
                info!(session = %session_id, "session resumed");
                vec![Outbound::Reply(self.welcome(session_id))]
            }
            None => {
                debug!(session = %session_id, "resume rejected, session expired");
                vec![Outbound::Reply(ServerMessage::ResumeExpired)]
            }
        }
    }

    // -- movement -----------------------------------------------------------

    /// Apply a partial move. Fields are validated independently: absent
    /// or non-finite values leave the prior coordinate, finite positions
    /// are clamped to the world bound, and yaw passes through unclamped.
    pub fn on_move(&mut self, id: SessionId, update: MoveUpdate) -> Vec<Outbound> {
        let Some(player) = self.state.players.get_mut(&id) else {
            debug!(session = %id, "move for unknown session dropped");
            return Vec::new();
        };

        let accepted = MoveUpdate {
            x: accept_coord(update.x),
            y: accept_coord(update.y),
            z: accept_coord(update.z),
            ry: update.ry.filter(|v| v.is_finite()),
        };
        if accepted.is_empty() {
            return Vec::new();
        }

        if let Some(x) = accepted.x {
            player.x = x;
        }
        if let Some(y) = accepted.y {
            player.y = y;
        }
        if let Some(z) = accepted.z {
            player.z = z;
        }
        if let Some(ry) = accepted.ry {
            player.ry = ry;
        }

        vec![Outbound::BroadcastExcept(
            id,
            ServerMessage::PlayerDelta { id, update: accepted },
        )]
    }

    // -- chat and emotes ----------------------------------------------------

    /// Validate and stamp a chat line. Whitespace is trimmed first; an
    /// empty result is dropped, an overlong one truncated. The sender
    /// hears the echo too.
    pub fn on_chat(&mut self, id: SessionId, text: &str, timestamp_ms: u64) -> Vec<Outbound> {
        let Some(player) = self.state.players.get(&id) else {
            debug!(session = %id, "chat for unknown session dropped");
            return Vec::new();
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!(session = %id, "empty chat dropped");
            return Vec::new();
        }
        let text: String = trimmed.chars().take(MAX_CHAT_CHARS).collect();

        vec![Outbound::Broadcast(ServerMessage::Chat {
            id,
            name: player.name.clone(),
            text,
            timestamp_ms,
        })]
    }

    /// Rebroadcast an emote to the whole room, sender included.
    pub fn on_emote(&mut self, id: SessionId, emote: &str) -> Vec<Outbound> {
        if !self.state.players.contains_key(&id) {
            debug!(session = %id, "emote for unknown session dropped");
            return Vec::new();
        }

        let emote = emote.trim();
        if emote.is_empty() {
            return Vec::new();
        }

        vec![Outbound::Broadcast(ServerMessage::Emote {
            id,
            emote: emote.to_string(),
        })]
    }

    // -- leaving ------------------------------------------------------------

    /// Handle a session's connection going away. A consented leave
    /// removes the player at once; an abrupt drop parks the session in
    /// grace so a quick reconnect can resume it.
    pub fn on_leave(&mut self, id: SessionId, consented: bool, now: Instant) -> Vec<Outbound> {
        if !self.sessions.contains_key(&id) {
            return Vec::new();
        }

        if consented {
            info!(session = %id, "player left");
            self.remove(id);
            vec![Outbound::Broadcast(ServerMessage::PlayerLeft { id })]
        } else {
            debug!(session = %id, "connection lost, grace period started");
            self.sessions.insert(id, SessionPhase::Grace { since: now });
            Vec::new()
        }
    }

    /// Remove every session whose grace window has elapsed. Called on a
    /// periodic tick; expirations land within one tick of the deadline.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<Outbound> {
        let mut expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter_map(|(id, phase)| match phase {
                SessionPhase::Grace { since }
                    if now.duration_since(*since) >= RECONNECT_GRACE =>
                {
                    Some(*id)
                }
                _ => None,
            })
            .collect();
        expired.sort();

        let mut events = Vec::with_capacity(expired.len());
        for id in expired {
            info!(session = %id, "grace period expired, removing player");
            self.remove(id);
            events.push(Outbound::Broadcast(ServerMessage::PlayerLeft { id }));
        }
        events
    }

    // -- accessors ----------------------------------------------------------

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn player(&self, id: SessionId) -> Option<&PlayerState> {
        self.state.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }

    pub fn env_key(&self) -> &str {
        self.state.env_key()
    }

    // -- internals ----------------------------------------------------------

    fn welcome(&self, session_id: SessionId) -> ServerMessage {
        ServerMessage::Welcome {
            session_id,
            env_key: self.state.env_key().to_string(),
            players: self.state.snapshot(),
        }
    }

    fn remove(&mut self, id: SessionId) {
        self.state.players.remove(&id);
        self.sessions.remove(&id);
    }
}

impl Default for RoomServer {
    fn default() -> Self {
        Self::new()
    }
}

fn accept_coord(field: Option<f32>) -> Option<f32> {
    field
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(-WORLD_BOUND, WORLD_BOUND))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
