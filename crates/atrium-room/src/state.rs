//! The replicated data model: one [`PlayerState`] per connected session
//! plus the room's environment key.

use std::fmt;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Positions are clamped to the cube [-WORLD_BOUND, WORLD_BOUND] on each
/// axis. Yaw is never clamped.
pub const WORLD_BOUND: f32 = 50.0;

/// How long a dropped session may resume with its player intact.
pub const RECONNECT_GRACE: Duration = Duration::from_secs(5);

/// Environment adopted when a join requests an unknown key, and the
/// room default.
pub const DEFAULT_ENV_KEY: &str = "whitespace";

/// Environments clients may request at join.
pub const KNOWN_ENV_KEYS: &[&str] = &["whitespace", "office"];

/// Maximum stored display-name length in characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Where new players appear, slightly off the origin and facing it.
pub const SPAWN_POSITION: [f32; 3] = [0.0, 0.0, 3.0];
pub const SPAWN_YAW: f32 = std::f32::consts::PI;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Identifier assigned to a session at join and kept across a
/// reconnect inside the grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

/// Server-side canonical state for one connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Owning session.
    pub id: SessionId,
    /// Display name, sanitized at join.
    pub name: String,
    /// Asset key of the avatar model the client picked.
    pub avatar_key: String,
    /// World position, clamped to [`WORLD_BOUND`].
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Facing yaw in radians, unclamped.
    pub ry: f32,
}

impl PlayerState {
    /// A fresh player at the fixed spawn point.
    pub fn spawn(id: SessionId, name: String, avatar_key: String) -> Self {
        let [x, y, z] = SPAWN_POSITION;
        Self {
            id,
            name,
            avatar_key,
            x,
            y,
            z,
            ry: SPAWN_YAW,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomState
// ---------------------------------------------------------------------------

/// The replicated room: players keyed by session, plus the environment
/// key. `env_key` is assigned by the first join and never changes for
/// the lifetime of the room, even if it empties out later.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    pub players: FxHashMap<SessionId, PlayerState>,
    env_key: Option<String>,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The adopted environment key, or the default before first join.
    pub fn env_key(&self) -> &str {
        self.env_key.as_deref().unwrap_or(DEFAULT_ENV_KEY)
    }

    /// Whether an environment has been adopted yet.
    pub fn env_assigned(&self) -> bool {
        self.env_key.is_some()
    }

    /// Adopts an environment key. Only the first call takes effect;
    /// later calls are ignored regardless of occupancy.
    pub fn adopt_env(&mut self, requested: &str) -> &str {
        if self.env_key.is_none() {
            let resolved = if KNOWN_ENV_KEYS.contains(&requested) {
                requested
            } else {
                DEFAULT_ENV_KEY
            };
            self.env_key = Some(resolved.to_string());
        }
        self.env_key()
    }

    /// All players sorted by session id, for snapshot delivery.
    pub fn snapshot(&self) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self.players.values().cloned().collect();
        players.sort_by_key(|p| p.id);
        players
    }
}

/// Trims, truncates to [`MAX_NAME_CHARS`], and falls back to "guest"
/// for names that end up empty.
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "guest".to_string();
    }
    trimmed.chars().take(MAX_NAME_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_defaults_before_assignment() {
        let room = RoomState::new();
        assert_eq!(room.env_key(), DEFAULT_ENV_KEY);
        assert!(!room.env_assigned());
    }

    #[test]
    fn test_adopt_env_first_wins() {
        let mut room = RoomState::new();
        assert_eq!(room.adopt_env("office"), "office");
        assert_eq!(room.adopt_env("whitespace"), "office");
        assert_eq!(room.env_key(), "office");
    }

    #[test]
    fn test_adopt_env_unknown_falls_back() {
        let mut room = RoomState::new();
        assert_eq!(room.adopt_env("volcano-lair"), DEFAULT_ENV_KEY);
        assert!(room.env_assigned());
    }

    #[test]
    fn test_snapshot_sorted_by_session() {
        let mut room = RoomState::new();
        for id in [3u64, 1, 2] {
            let sid = SessionId(id);
            room.players.insert(
                sid,
                PlayerState::spawn(sid, format!("p{id}"), "robot".into()),
            );
        }
        let snap = room.snapshot();
        let ids: Vec<u64> = snap.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Ada  "), "Ada");
        assert_eq!(sanitize_name(""), "guest");
        assert_eq!(sanitize_name("   "), "guest");
        let long = "x".repeat(100);
        assert_eq!(sanitize_name(&long).chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn test_spawn_uses_fixed_offset() {
        let p = PlayerState::spawn(SessionId(9), "Ada".into(), "robot".into());
        assert_eq!([p.x, p.y, p.z], SPAWN_POSITION);
        assert_eq!(p.ry, SPAWN_YAW);
    }
}
