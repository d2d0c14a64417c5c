//! Face ordering reference
//!
//! Host-side version of the compute passes in shaders/face_sort.wgsl. Each descriptor's faces
//! are rotated by the model orientation, translated to the world position and written
//! back-to-front (farthest face first) into the descriptor's reserved output range. Ties keep
//! source order. The unordered tier copies faces in source order.

use crate::constants::camera_constants::FIXED_SHIFT;
use crate::memory::{PackedNormal, PackedUv, PackedVertex};

use super::tiers::ComputeTier;
use super::visibility::{fixed_cos, fixed_sin, ANGLE_UNIT_RADIANS};
use super::work_descriptor::WorkDescriptor;

/// Read-only source channels for one dispatch
#[derive(Clone, Copy)]
pub struct GeometrySources<'a> {
    pub scene_vertices: &'a [PackedVertex],
    pub scene_uvs: &'a [PackedUv],
    pub scene_normals: &'a [PackedNormal],
    pub temp_vertices: &'a [PackedVertex],
    pub temp_uvs: &'a [PackedUv],
    pub temp_normals: &'a [PackedNormal],
}

/// Output channels, indexed by output vertex
pub struct GeometryOutputs<'a> {
    pub vertices: &'a mut [PackedVertex],
    pub uvs: &'a mut [PackedUv],
    pub normals: &'a mut [PackedNormal],
}

/// Rotate a vertex about the y axis by an orientation in angle units
pub fn rotate_vertex(vertex: PackedVertex, orientation: i32) -> PackedVertex {
    let sin = fixed_sin(orientation) as i64;
    let cos = fixed_cos(orientation) as i64;
    let (x, z) = (vertex[0] as i64, vertex[2] as i64);
    [
        ((z * sin + x * cos) >> FIXED_SHIFT) as i32,
        vertex[1],
        ((z * cos - x * sin) >> FIXED_SHIFT) as i32,
        vertex[3],
    ]
}

pub fn rotate_normal(normal: PackedNormal, orientation: i32) -> PackedNormal {
    let angle = orientation as f32 * ANGLE_UNIT_RADIANS;
    let (sin, cos) = angle.sin_cos();
    let (x, z) = (normal[0], normal[2]);
    [z * sin + x * cos, normal[1], z * cos - x * sin, normal[3]]
}

/// Camera rotation used to measure face depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceOrderer {
    yaw_sin: i64,
    yaw_cos: i64,
    pitch_sin: i64,
    pitch_cos: i64,
}

impl FaceOrderer {
    pub fn new(yaw: i32, pitch: i32) -> Self {
        Self {
            yaw_sin: fixed_sin(yaw) as i64,
            yaw_cos: fixed_cos(yaw) as i64,
            pitch_sin: fixed_sin(pitch) as i64,
            pitch_cos: fixed_cos(pitch) as i64,
        }
    }

    fn vertex_depth(&self, vertex: &PackedVertex) -> i64 {
        let (x, y, z) = (vertex[0] as i64, vertex[1] as i64, vertex[2] as i64);
        let rotated_z = (z * self.yaw_cos - x * self.yaw_sin) >> FIXED_SHIFT;
        (y * self.pitch_sin + rotated_z * self.pitch_cos) >> FIXED_SHIFT
    }

    /// View depth of a face; larger is farther from the camera
    pub fn face_depth(&self, face: &[PackedVertex; 3]) -> i64 {
        face.iter().map(|vertex| self.vertex_depth(vertex)).sum()
    }

    /// Output position of every face: farthest first, ties in source order
    pub fn ranks(depths: &[i64]) -> Vec<usize> {
        depths
            .iter()
            .enumerate()
            .map(|(i, &depth)| {
                depths
                    .iter()
                    .enumerate()
                    .filter(|&(j, &other)| other > depth || (other == depth && j < i))
                    .count()
            })
            .collect()
    }

    /// Run one descriptor the way its compute pass would
    pub fn process(
        &self,
        tier: ComputeTier,
        descriptor: &WorkDescriptor,
        sources: &GeometrySources<'_>,
        outputs: &mut GeometryOutputs<'_>,
    ) {
        let flags = descriptor.flags();
        let (vertices, uvs, normals) = if flags.scene_buffer {
            (sources.scene_vertices, sources.scene_uvs, sources.scene_normals)
        } else {
            (sources.temp_vertices, sources.temp_uvs, sources.temp_normals)
        };

        let orientation = flags.orientation as i32;
        let world = [descriptor.world_x, descriptor.world_y, descriptor.world_z];
        let face_count = descriptor.triangle_count as usize;

        let faces: Vec<[PackedVertex; 3]> = (0..face_count)
            .map(|face| {
                let base = descriptor.source_vertex_offset as i64 + face as i64 * 3;
                [0, 1, 2].map(|k| rotate_vertex(read(vertices, base + k), orientation))
            })
            .collect();

        let ranks: Vec<usize> = match tier {
            ComputeTier::Unordered => (0..face_count).collect(),
            ComputeTier::Small | ComputeTier::Large => {
                let depths: Vec<i64> = faces.iter().map(|face| self.face_depth(face)).collect();
                Self::ranks(&depths)
            }
        };

        for (face, rank) in ranks.into_iter().enumerate() {
            for k in 0..3 {
                let source = face * 3 + k;
                let target = descriptor.destination_offset as usize + rank * 3 + k;
                if target >= outputs.vertices.len() {
                    continue;
                }

                let vertex = faces[face][k];
                outputs.vertices[target] = [
                    vertex[0].wrapping_add(world[0]),
                    vertex[1].wrapping_add(world[1]),
                    vertex[2].wrapping_add(world[2]),
                    vertex[3],
                ];

                let normal_index = descriptor.source_vertex_offset as i64 + source as i64;
                if let Some(slot) = outputs.normals.get_mut(target) {
                    *slot = rotate_normal(read(normals, normal_index), orientation);
                }

                if let Some(slot) = outputs.uvs.get_mut(target) {
                    *slot = if descriptor.source_uv_offset < 0 {
                        [0.0; 4]
                    } else {
                        read(uvs, descriptor.source_uv_offset as i64 + source as i64)
                    };
                }
            }
        }
    }
}

/// Out-of-range reads yield zero, matching robust buffer access on the device
fn read<T: Copy + Default>(channel: &[T], index: i64) -> T {
    usize::try_from(index)
        .ok()
        .and_then(|index| channel.get(index).copied())
        .unwrap_or_default()
}
