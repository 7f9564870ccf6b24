//! The client sync context: everything one frame needs, in one object.
//!
//! [`ClientContext`] owns the server link, the scene handles, the
//! collision index, the remote rigs, the cameras, and the outbound send
//! schedule. The host feeds it input events and calls
//! [`advance_frame`](ClientContext::advance_frame) once per render
//! frame; everything else happens through explicit method calls, so two
//! contexts can coexist in one process (tests do exactly that).

use std::sync::Arc;

use atrium_animation::{AnimState, AnimationStateMachine};
use atrium_collision::{CollisionIndex, GROUND_HEIGHT};
use atrium_input::{Key, KeyboardState, PointerState};
use atrium_room::{ClientMessage, DEFAULT_ENV_KEY, PlayerState, ServerMessage, SessionId};
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::camera::{CameraMode, CameraRig};
use crate::environment::{AssetCatalog, EnvironmentLoader};
use crate::link::ServerLink;
use crate::movement::{WALK_SPEED, facing_from_direction, movement_direction};
use crate::rig::RigRegistry;
use crate::scene::{NodeAnimator, NodeId, SceneApi};
use crate::send_schedule::SendSchedule;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Longest frame delta fed to simulation. Longer stalls (debugger,
/// background tab) are clamped so the avatar cannot teleport through
/// collision volumes on the first frame back.
pub const MAX_FRAME_DT: f32 = 0.25;

/// The one emote every avatar asset currently ships a clip for.
const WAVE_EMOTE: &str = "wave";

// ---------------------------------------------------------------------------
// PlayerProfile
// ---------------------------------------------------------------------------

/// Identity the local user joins with.
#[derive(Debug, Clone)]
pub struct PlayerProfile {
    pub name: String,
    /// Asset key of the avatar model to spawn.
    pub avatar_key: String,
    /// Environment to propose at join. The room's first joiner decides;
    /// later joiners get the room's choice back in the welcome.
    pub env_key: String,
}

impl PlayerProfile {
    pub fn new(name: impl Into<String>, avatar_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            avatar_key: avatar_key.into(),
            env_key: DEFAULT_ENV_KEY.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatLine
// ---------------------------------------------------------------------------

/// A chat message ready for the host UI, server-stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub sender: SessionId,
    pub name: String,
    pub text: String,
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// ClientContext
// ---------------------------------------------------------------------------

struct LocalAvatar {
    node: NodeId,
    position: Vec3,
    yaw: f32,
    animation: AnimationStateMachine,
}

/// Owns the per-client sync state and advances it frame by frame.
pub struct ClientContext {
    link: Box<dyn ServerLink>,
    scene: Box<dyn SceneApi>,
    loader: EnvironmentLoader,
    collision: CollisionIndex,
    rigs: RigRegistry,
    /// Host-fed input state, cleared at the end of each frame.
    pub keyboard: KeyboardState,
    pub pointer: PointerState,
    pub camera: CameraRig,
    schedule: SendSchedule,
    profile: PlayerProfile,
    session_id: Option<SessionId>,
    /// Latest environment requested or mounted. Rolled back on a failed
    /// load so the same key can be requested again.
    env_key: Option<String>,
    mounted_env: Option<String>,
    local: Option<LocalAvatar>,
    chat_log: Vec<ChatLine>,
}

impl ClientContext {
    /// Build the context and queue the join request. The welcome that
    /// arrives over the next frames spawns the avatar.
    pub fn new(
        link: Box<dyn ServerLink>,
        scene: Box<dyn SceneApi>,
        catalog: Arc<dyn AssetCatalog>,
        profile: PlayerProfile,
    ) -> Self {
        let mut context = Self {
            link,
            scene,
            loader: EnvironmentLoader::new(catalog),
            collision: CollisionIndex::empty(),
            rigs: RigRegistry::new(),
            keyboard: KeyboardState::new(),
            pointer: PointerState::new(),
            camera: CameraRig::new(),
            schedule: SendSchedule::new(),
            profile,
            session_id: None,
            env_key: None,
            mounted_env: None,
            local: None,
            chat_log: Vec::new(),
        };
        context.send_join();
        context
    }

    /// Advance one render frame. `dt` is seconds since the previous
    /// call, clamped to [`MAX_FRAME_DT`].
    pub fn advance_frame(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, MAX_FRAME_DT);

        self.pump_network();
        self.pump_environment();
        self.handle_local_input(dt);
        self.rigs.update(self.scene.as_mut(), dt);
        self.update_camera(dt);

        self.keyboard.clear_transients();
        self.pointer.clear_transients();
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    fn pump_network(&mut self) {
        while let Some(message) = self.link.poll_message() {
            self.handle_server_message(message);
        }
    }

    fn handle_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Welcome {
                session_id,
                env_key,
                players,
            } => self.on_welcome(session_id, env_key, players),
            ServerMessage::PlayerJoined { player } => {
                if Some(player.id) != self.session_id {
                    info!(id = %player.id, name = %player.name, "player joined");
                    self.rigs.spawn(self.scene.as_mut(), &player);
                }
            }
            ServerMessage::PlayerDelta { id, update } => {
                // The local pose is client-owned; deltas only drive rigs.
                if Some(id) != self.session_id {
                    self.rigs.apply_delta(id, &update);
                }
            }
            ServerMessage::PlayerLeft { id } => {
                info!(id = %id, "player left");
                self.rigs.remove(self.scene.as_mut(), id);
            }
            ServerMessage::Chat {
                id,
                name,
                text,
                timestamp_ms,
            } => self.chat_log.push(ChatLine {
                sender: id,
                name,
                text,
                timestamp_ms,
            }),
            ServerMessage::Emote { id, emote } => self.on_emote(id, &emote),
            ServerMessage::ResumeExpired => self.on_resume_expired(),
        }
    }

    fn on_welcome(&mut self, session_id: SessionId, env_key: String, players: Vec<PlayerState>) {
        info!(%session_id, env_key, players = players.len(), "entered room");
        self.session_id = Some(session_id);

        if self.env_key.as_deref() != Some(env_key.as_str()) {
            self.loader.request(&env_key);
            self.env_key = Some(env_key);
        }

        match players.iter().find(|p| p.id == session_id) {
            Some(me) => self.adopt_local_pose(me),
            None => warn!("welcome roster is missing the local player"),
        }

        self.rigs.sync_roster(self.scene.as_mut(), &players, session_id);
        self.schedule.reset();
    }

    /// Take the server's word for our own pose. On a fresh join this
    /// spawns the avatar at the room's spawn point; on a resume it snaps
    /// at most one send interval of drift.
    fn adopt_local_pose(&mut self, state: &PlayerState) {
        let position = Vec3::new(state.x, state.y, state.z);
        match &mut self.local {
            Some(local) => {
                local.position = position;
                local.yaw = state.ry;
                self.scene.set_transform(local.node, position, state.ry);
            }
            None => {
                let node = self.scene.create_avatar(&state.avatar_key, &state.name);
                let mut animation = AnimationStateMachine::new();
                animation.begin(&mut NodeAnimator {
                    scene: self.scene.as_mut(),
                    node,
                });
                self.scene.set_transform(node, position, state.ry);
                self.scene
                    .set_visible(node, !self.camera.is_first_person());
                self.camera.orbit.snap_to(position);
                self.local = Some(LocalAvatar {
                    node,
                    position,
                    yaw: state.ry,
                    animation,
                });
            }
        }
    }

    fn on_emote(&mut self, id: SessionId, emote: &str) {
        if emote != WAVE_EMOTE {
            debug!(emote, "ignoring unknown emote");
            return;
        }
        if Some(id) == self.session_id {
            // Our own emote echoed back. The one-shot guard makes this a
            // no-op while the optimistic wave is still playing.
            self.wave_local();
        } else {
            self.rigs.trigger_wave(self.scene.as_mut(), id);
        }
    }

    fn on_resume_expired(&mut self) {
        info!("session expired during reconnect, rejoining fresh");
        self.session_id = None;
        self.rigs.clear(self.scene.as_mut());
        self.send_join();
    }

    // -----------------------------------------------------------------
    // Environment
    // -----------------------------------------------------------------

    fn pump_environment(&mut self) {
        let Some(load) = self.loader.drain() else {
            return;
        };
        match load.result {
            Ok(index) => {
                info!(env_key = %load.env_key, boxes = index.len(), "environment ready");
                self.collision = index;
                self.scene.set_environment(&load.env_key);
                self.mounted_env = Some(load.env_key);
            }
            Err(error) => {
                // The previous environment stays mounted. Rolling the key
                // back lets a later request for the same key retry.
                warn!(env_key = %load.env_key, %error, "environment load failed");
                self.env_key = self.mounted_env.clone();
            }
        }
    }

    /// Load and mount a different environment locally. Joining a room
    /// still adopts the room's environment when the welcome arrives.
    pub fn switch_environment(&mut self, env_key: &str) {
        if self.env_key.as_deref() == Some(env_key) {
            return;
        }
        self.env_key = Some(env_key.to_owned());
        self.loader.request(env_key);
    }

    // -----------------------------------------------------------------
    // Local avatar
    // -----------------------------------------------------------------

    fn handle_local_input(&mut self, dt: f32) {
        if self.keyboard.just_pressed(Key::KeyE) {
            self.trigger_emote(WAVE_EMOTE);
        }

        let Some(local) = self.local.as_mut() else {
            return;
        };

        let direction = movement_direction(&self.keyboard, self.camera.view_yaw());
        let mut moved = false;
        if direction != Vec3::ZERO {
            let mut proposed = local.position + direction * WALK_SPEED * dt;
            proposed.y = GROUND_HEIGHT;
            if self.collision.is_blocked(proposed) {
                debug!("move blocked by collision");
            } else {
                local.position = proposed;
                local.yaw = facing_from_direction(direction);
                moved = true;
            }
        }
        local.position.y = GROUND_HEIGHT;

        let node = local.node;
        local.animation.set_moving(
            moved,
            &mut NodeAnimator {
                scene: self.scene.as_mut(),
                node,
            },
        );
        self.scene.set_transform(node, local.position, local.yaw);

        if self.session_id.is_some() {
            if let Some(update) = self.schedule.poll(dt, local.position, local.yaw) {
                self.link.send_message(&ClientMessage::Move(update));
            }
        }
    }

    fn update_camera(&mut self, dt: f32) {
        match self.camera.mode {
            CameraMode::Orbit => {
                self.camera.orbit.apply_pointer(&self.pointer);
                if let Some(local) = &self.local {
                    self.camera.orbit.update(local.position, dt);
                }
            }
            CameraMode::FirstPerson => {
                self.camera.first_person.apply_pointer(&self.pointer);
            }
        }
    }

    fn wave_local(&mut self) {
        if let Some(local) = self.local.as_mut() {
            let node = local.node;
            local.animation.trigger_wave(&mut NodeAnimator {
                scene: self.scene.as_mut(),
                node,
            });
        }
    }

    // -----------------------------------------------------------------
    // Host-facing operations
    // -----------------------------------------------------------------

    /// Send an emote and play it locally right away. The server echoes
    /// it back to everyone including us; the one-shot guard absorbs the
    /// echo so the gesture plays exactly once.
    pub fn trigger_emote(&mut self, emote: &str) {
        if self.session_id.is_some() {
            self.link.send_message(&ClientMessage::Emote {
                emote: emote.to_owned(),
            });
        }
        if emote == WAVE_EMOTE {
            self.wave_local();
        }
    }

    /// Queue a chat message. The server validates and broadcasts it; our
    /// own copy arrives in the chat log like everyone else's.
    pub fn send_chat(&mut self, text: &str) {
        if self.session_id.is_none() {
            return;
        }
        self.link.send_message(&ClientMessage::Chat {
            text: text.to_owned(),
        });
    }

    /// Chat received since the last call, oldest first.
    pub fn drain_chat(&mut self) -> Vec<ChatLine> {
        std::mem::take(&mut self.chat_log)
    }

    /// Tell the server we are leaving on purpose, so it removes us
    /// immediately instead of holding the session in grace.
    pub fn leave(&mut self) {
        if self.session_id.take().is_some() {
            self.link.send_message(&ClientMessage::Leave);
        }
    }

    /// Flip between orbit and first person, hiding the local rig and its
    /// label while the camera sits inside it.
    pub fn toggle_camera(&mut self) -> CameraMode {
        let mode = self.camera.toggle_mode();
        if let Some(local) = &self.local {
            self.scene
                .set_visible(local.node, mode != CameraMode::FirstPerson);
        }
        mode
    }

    /// Install a fresh transport after a drop: resume when the old
    /// session may still be inside the grace window, join anew otherwise.
    pub fn set_link(&mut self, link: Box<dyn ServerLink>) {
        self.link = link;
        match self.session_id {
            Some(session_id) => {
                info!(%session_id, "attempting session resume");
                self.link
                    .send_message(&ClientMessage::Resume { session_id });
                self.schedule.reset();
            }
            None => self.send_join(),
        }
    }

    /// Host callback when a node's animation clip finishes.
    pub fn notify_clip_finished(&mut self, node: NodeId, clip: &str) {
        let Some(state) = AnimState::from_clip(clip) else {
            debug!(clip, "completion report for unknown clip");
            return;
        };
        if let Some(local) = self.local.as_mut() {
            if local.node == node {
                local.animation.clip_finished(
                    state,
                    &mut NodeAnimator {
                        scene: self.scene.as_mut(),
                        node,
                    },
                );
                return;
            }
        }
        if let Some(id) = self.rigs.session_for_node(node) {
            self.rigs.clip_finished(self.scene.as_mut(), id, state);
        }
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn env_key(&self) -> Option<&str> {
        self.env_key.as_deref()
    }

    pub fn local_node(&self) -> Option<NodeId> {
        self.local.as_ref().map(|l| l.node)
    }

    pub fn local_position(&self) -> Option<Vec3> {
        self.local.as_ref().map(|l| l.position)
    }

    pub fn local_yaw(&self) -> Option<f32> {
        self.local.as_ref().map(|l| l.yaw)
    }

    pub fn rigs(&self) -> &RigRegistry {
        &self.rigs
    }

    pub fn collision(&self) -> &CollisionIndex {
        &self.collision
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    // -----------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------

    fn send_join(&mut self) {
        let message = ClientMessage::Join {
            name: self.profile.name.clone(),
            avatar_key: self.profile.avatar_key.clone(),
            env_key: self.profile.env_key.clone(),
        };
        if !self.link.send_message(&message) {
            warn!("join request dropped, transport down");
        }
        self.schedule.reset();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
