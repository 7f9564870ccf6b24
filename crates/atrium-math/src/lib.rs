//! World-space bounding boxes and frame-rate-independent smoothing
//! primitives shared by the collision and client crates.

mod aabb;
mod smoothing;

pub use aabb::Aabb;
pub use smoothing::{
    decay_blend, shortest_arc, smooth_angle, smooth_f32, smooth_vec3, wrap_angle,
};
