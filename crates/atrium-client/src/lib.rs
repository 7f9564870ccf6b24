//! Client-side room synchronization.
//!
//! The host engine owns the window, the renderer, and the assets; this
//! crate owns everything between the server socket and the scene graph.
//! [`context::ClientContext`] is the entry point: the host builds one
//! per session, feeds it raw input events and a frame delta, and
//! implements [`scene::SceneApi`] to let the sync loop drive avatars.
//! All engine access goes through that trait, so the full loop runs in
//! tests against a recording fake.

pub mod camera;
pub mod context;
pub mod environment;
pub mod link;
pub mod movement;
pub mod rig;
pub mod scene;
pub mod send_schedule;

pub use camera::{CameraMode, CameraRig, FirstPersonCamera, OrbitCamera};
pub use context::{ChatLine, ClientContext, MAX_FRAME_DT, PlayerProfile};
pub use environment::{AssetCatalog, EnvLoadError, EnvironmentLoad, EnvironmentLoader};
pub use link::{ServerLink, TcpLink};
pub use movement::{WALK_SPEED, facing_from_direction, forward_from_yaw, movement_direction};
pub use rig::{ClientRig, REMOTE_SMOOTH_RATE, RigRegistry, WALK_ANIM_THRESHOLD};
pub use scene::{NodeId, SceneApi};
pub use send_schedule::{SEND_RATE_HZ, SendSchedule};
