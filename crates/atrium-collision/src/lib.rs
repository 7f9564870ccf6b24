//! Client-side static collision for environment geometry.
//!
//! Each environment ships a parallel, invisible collision-proxy asset.
//! At activation the proxy meshes are flattened into world-space
//! axis-aligned boxes held by a [`CollisionIndex`]; per-frame movement
//! proposals are gated by a single point probe against those boxes.
//! The server never sees any of this; collision is purely a client
//! concern.

mod index;
mod proxy;

pub use index::{CollisionIndex, EDGE_MARGIN, ENTITY_RADIUS, GROUND_HEIGHT, PROBE_HEIGHT_OFFSET};
pub use proxy::ProxyVolume;
