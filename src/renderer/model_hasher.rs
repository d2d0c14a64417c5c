//! Content hash used to batch identical transient models

use std::hash::Hasher;

use rustc_hash::FxHasher;

use super::model::ModelGeometry;

/// Content hash used to batch identical transient models within a frame.
///
/// Covers positions, colours and UVs. Normals are derived from positions so they are left out.
pub fn batch_hash(geometry: &ModelGeometry) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write_usize(geometry.vertices.len());
    hasher.write(bytemuck::cast_slice(&geometry.vertices));
    hasher.write_usize(geometry.uvs.len());
    hasher.write(bytemuck::cast_slice(&geometry.uvs));
    hasher.finish()
}
