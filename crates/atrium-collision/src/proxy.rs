use atrium_math::Aabb;
use glam::{Affine3A, Vec3};

/// One mesh from a collision-proxy asset: its resolved world transform
/// plus the local-space bounds of its geometry.
#[derive(Clone, Copy, Debug)]
pub struct ProxyVolume {
    pub transform: Affine3A,
    pub local_min: Vec3,
    pub local_max: Vec3,
}

impl ProxyVolume {
    pub fn new(transform: Affine3A, local_min: Vec3, local_max: Vec3) -> Self {
        Self {
            transform,
            local_min,
            local_max,
        }
    }

    /// World-space AABB enclosing all eight transformed corners of the
    /// local bounds. Returns `None` if any transformed corner is
    /// non-finite (NaN scales and the like slip into exported assets).
    pub fn world_box(&self) -> Option<Aabb> {
        let (lo, hi) = (self.local_min, self.local_max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];
        let mut world = [Vec3::ZERO; 8];
        for (slot, corner) in world.iter_mut().zip(corners) {
            let p = self.transform.transform_point3(corner);
            if !p.is_finite() {
                return None;
            }
            *slot = p;
        }
        Aabb::from_points(world)
    }
}
