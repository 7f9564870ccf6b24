//! Remote avatar rigs: scene nodes, interpolation, and animation.
//!
//! Each remote player owns a [`ClientRig`]: its scene node, its
//! animation state machine, and a pose target fed by server deltas. The
//! rendered pose glides toward the target with time-normalized
//! smoothing, so remote avatars move at the same perceived speed on a
//! 30 Hz laptop and a 144 Hz desktop.

use atrium_animation::{AnimState, AnimationStateMachine};
use atrium_math::{smooth_angle, smooth_vec3};
use atrium_room::{MoveUpdate, PlayerState, SessionId};
use glam::Vec3;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::scene::{NodeAnimator, NodeId, SceneApi};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Per-second decay rate for remote pose smoothing. At 60 fps this
/// closes roughly 18% of the remaining gap per frame.
pub const REMOTE_SMOOTH_RATE: f32 = 12.0;

/// A rig further than this from its target (in meters) counts as
/// traveling and plays the walk loop.
pub const WALK_ANIM_THRESHOLD: f32 = 0.05;

// ---------------------------------------------------------------------------
// ClientRig
// ---------------------------------------------------------------------------

/// One remote player's presence in the scene.
#[derive(Debug)]
pub struct ClientRig {
    node: NodeId,
    animation: AnimationStateMachine,
    position: Vec3,
    yaw: f32,
    target_position: Vec3,
    target_yaw: f32,
}

impl ClientRig {
    /// Scene node backing this rig.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Currently rendered position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Currently rendered yaw in radians.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pose the rig is gliding toward.
    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }
}

// ---------------------------------------------------------------------------
// RigRegistry
// ---------------------------------------------------------------------------

/// All remote rigs, keyed by session.
#[derive(Default)]
pub struct RigRegistry {
    rigs: FxHashMap<SessionId, ClientRig>,
}

impl RigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rig for a newly visible player. An existing rig for the
    /// same session is torn down first so nodes never leak.
    pub fn spawn(&mut self, scene: &mut dyn SceneApi, player: &PlayerState) {
        if self.rigs.contains_key(&player.id) {
            debug!(id = %player.id, "respawning rig that already exists");
            self.remove(scene, player.id);
        }

        let node = scene.create_avatar(&player.avatar_key, &player.name);
        let position = Vec3::new(player.x, player.y, player.z);

        let mut animation = AnimationStateMachine::new();
        animation.begin(&mut NodeAnimator {
            scene: &mut *scene,
            node,
        });
        scene.set_transform(node, position, player.ry);

        self.rigs.insert(
            player.id,
            ClientRig {
                node,
                animation,
                position,
                yaw: player.ry,
                target_position: position,
                target_yaw: player.ry,
            },
        );
    }

    /// Tear down a departed player's rig. Quiet no-op for unknown ids.
    pub fn remove(&mut self, scene: &mut dyn SceneApi, id: SessionId) -> bool {
        match self.rigs.remove(&id) {
            Some(rig) => {
                scene.destroy_node(rig.node);
                true
            }
            None => false,
        }
    }

    /// Tear down every rig. Used when the session is lost and the room
    /// will be re-entered from scratch.
    pub fn clear(&mut self, scene: &mut dyn SceneApi) {
        for (_, rig) in self.rigs.drain() {
            scene.destroy_node(rig.node);
        }
    }

    /// Reconcile the registry against an authoritative roster, spawning
    /// missing rigs, removing stale ones, and retargeting the rest. The
    /// local player never gets a remote rig.
    pub fn sync_roster(&mut self, scene: &mut dyn SceneApi, players: &[PlayerState], local: SessionId) {
        let stale: Vec<SessionId> = self
            .rigs
            .keys()
            .filter(|id| !players.iter().any(|p| p.id == **id))
            .copied()
            .collect();
        for id in stale {
            self.remove(scene, id);
        }

        for player in players {
            if player.id == local {
                continue;
            }
            match self.rigs.get_mut(&player.id) {
                Some(rig) => {
                    rig.target_position = Vec3::new(player.x, player.y, player.z);
                    rig.target_yaw = player.ry;
                }
                None => self.spawn(scene, player),
            }
        }
    }

    /// Feed a movement delta into a rig's interpolation target. Fields
    /// absent from the delta keep their current target.
    pub fn apply_delta(&mut self, id: SessionId, update: &MoveUpdate) -> bool {
        let Some(rig) = self.rigs.get_mut(&id) else {
            debug!(id = %id, "movement delta for unknown rig");
            return false;
        };
        if let Some(x) = update.x {
            rig.target_position.x = x;
        }
        if let Some(y) = update.y {
            rig.target_position.y = y;
        }
        if let Some(z) = update.z {
            rig.target_position.z = z;
        }
        if let Some(ry) = update.ry {
            rig.target_yaw = ry;
        }
        true
    }

    /// Play the wave one-shot on a rig.
    pub fn trigger_wave(&mut self, scene: &mut dyn SceneApi, id: SessionId) {
        if let Some(rig) = self.rigs.get_mut(&id) {
            let node = rig.node;
            rig.animation.trigger_wave(&mut NodeAnimator {
                scene: &mut *scene,
                node,
            });
        }
    }

    /// Route a clip completion report to a rig's state machine.
    pub fn clip_finished(&mut self, scene: &mut dyn SceneApi, id: SessionId, state: AnimState) {
        if let Some(rig) = self.rigs.get_mut(&id) {
            let node = rig.node;
            rig.animation.clip_finished(
                state,
                &mut NodeAnimator {
                    scene: &mut *scene,
                    node,
                },
            );
        }
    }

    /// Advance every rig one frame: walk/idle from remaining travel,
    /// then pose smoothing, then the scene transform.
    pub fn update(&mut self, scene: &mut dyn SceneApi, dt: f32) {
        for rig in self.rigs.values_mut() {
            let node = rig.node;
            let traveling = rig.position.distance_squared(rig.target_position)
                > WALK_ANIM_THRESHOLD * WALK_ANIM_THRESHOLD;
            rig.animation.set_moving(
                traveling,
                &mut NodeAnimator {
                    scene: &mut *scene,
                    node,
                },
            );

            rig.position = smooth_vec3(rig.position, rig.target_position, REMOTE_SMOOTH_RATE, dt);
            rig.yaw = smooth_angle(rig.yaw, rig.target_yaw, REMOTE_SMOOTH_RATE, dt);
            scene.set_transform(node, rig.position, rig.yaw);
        }
    }

    /// Look up a rig by session.
    pub fn rig(&self, id: SessionId) -> Option<&ClientRig> {
        self.rigs.get(&id)
    }

    /// Which session owns a scene node, for routing host callbacks.
    pub fn session_for_node(&self, node: NodeId) -> Option<SessionId> {
        self.rigs
            .iter()
            .find(|(_, rig)| rig.node == node)
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.rigs.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
