use atrium_math::Aabb;
use glam::Vec3;
use tracing::{debug, warn};

use crate::proxy::ProxyVolume;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Y coordinate of the walkable floor. Avatars are pinned here.
pub const GROUND_HEIGHT: f32 = 0.0;

/// Vertical offset above the ground at which movement is probed. Roughly
/// waist height, so floor slabs don't block and overhangs above head
/// height don't either.
pub const PROBE_HEIGHT_OFFSET: f32 = 0.9;

/// Horizontal radius of an avatar for blocking purposes.
pub const ENTITY_RADIUS: f32 = 0.4;

/// Horizontal inset applied to every proxy box at build time so that
/// abutting meshes sharing a face don't block at the seam.
pub const EDGE_MARGIN: f32 = 0.05;

// ---------------------------------------------------------------------------
// CollisionIndex
// ---------------------------------------------------------------------------

/// World-space blocking volumes for one environment.
///
/// Built once per environment activation and replaced wholesale on
/// switch; immutable in between. Queries are a linear scan, which is
/// fine for the box counts proxy assets produce (tens, not thousands).
#[derive(Debug, Clone, Default)]
pub struct CollisionIndex {
    boxes: Vec<Aabb>,
}

impl CollisionIndex {
    /// An index with no volumes; nothing blocks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Flattens proxy volumes into world boxes. Volumes with non-finite
    /// extents are discarded, as are boxes thinner than twice the edge
    /// margin (the inset would turn them inside out).
    pub fn build(volumes: &[ProxyVolume]) -> Self {
        let mut boxes = Vec::with_capacity(volumes.len());
        for (i, volume) in volumes.iter().enumerate() {
            let Some(world) = volume.world_box() else {
                warn!(index = i, "discarding collision proxy with non-finite bounds");
                continue;
            };
            let inset = world.inset_xz(EDGE_MARGIN);
            if inset.is_degenerate() {
                debug!(index = i, "discarding degenerate collision box after inset");
                continue;
            }
            boxes.push(inset);
        }
        debug!(
            kept = boxes.len(),
            dropped = volumes.len() - boxes.len(),
            "collision index built"
        );
        Self { boxes }
    }

    /// True if a probe at the proposed horizontal position hits any box.
    ///
    /// The probe ignores the caller's own y and always tests at
    /// `GROUND_HEIGHT + PROBE_HEIGHT_OFFSET`; boxes are expanded by
    /// `ENTITY_RADIUS` so the test behaves like a body of that radius,
    /// not an infinitely thin point.
    pub fn is_blocked(&self, proposed: Vec3) -> bool {
        let probe = Vec3::new(proposed.x, GROUND_HEIGHT + PROBE_HEIGHT_OFFSET, proposed.z);
        self.boxes
            .iter()
            .any(|b| b.expand_by(ENTITY_RADIUS).contains_point(probe))
    }

    pub fn boxes(&self) -> &[Aabb] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
