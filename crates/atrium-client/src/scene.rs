//! Trait seam between the sync core and the host scene engine.
//!
//! The context never touches renderer types directly. Everything visual
//! goes through [`SceneApi`], which a host implements over its real
//! engine and tests implement with a recording fake. Handles are opaque;
//! the core only stores them and passes them back.

use atrium_animation::{AnimState, AnimationDriver};
use glam::Vec3;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Opaque handle to a scene node owned by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

// ---------------------------------------------------------------------------
// SceneApi
// ---------------------------------------------------------------------------

/// Commands the sync core issues to the host's scene graph.
///
/// Hosts report animation clip completions back through
/// [`ClientContext::notify_clip_finished`](crate::ClientContext::notify_clip_finished)
/// so one-shot clips can exit their state.
pub trait SceneApi {
    /// Instantiate an avatar rig for `avatar_key` with a floating name
    /// label, returning the handle for the new node.
    fn create_avatar(&mut self, avatar_key: &str, name: &str) -> NodeId;

    /// Remove a node and its label from the scene.
    fn destroy_node(&mut self, node: NodeId);

    /// Place a node at `position`, facing `yaw` radians about +Y.
    fn set_transform(&mut self, node: NodeId, position: Vec3, yaw: f32);

    /// Show or hide a node together with its label.
    fn set_visible(&mut self, node: NodeId, visible: bool);

    /// Cross-fade the node's animation to `clip` over `fade_seconds`.
    /// When `clamp_end` is set a finished one-shot holds its final pose.
    fn play_clip(
        &mut self,
        node: NodeId,
        clip: &str,
        fade_seconds: f32,
        looped: bool,
        clamp_end: bool,
    );

    /// Swap the mounted environment visuals to `env_key`.
    fn set_environment(&mut self, env_key: &str);
}

// ---------------------------------------------------------------------------
// NodeAnimator
// ---------------------------------------------------------------------------

/// Routes one rig's state machine commands to its scene node.
pub(crate) struct NodeAnimator<'a> {
    pub scene: &'a mut dyn SceneApi,
    pub node: NodeId,
}

impl AnimationDriver for NodeAnimator<'_> {
    fn crossfade(&mut self, state: AnimState, fade_seconds: f32, looped: bool, clamp_end: bool) {
        self.scene
            .play_clip(self.node, state.clip_name(), fade_seconds, looped, clamp_end);
    }
}
