//! Per-frame geometry and work accumulation
//!
//! Transient geometry is appended to the temp channels and every drawable turns into one
//! [`WorkDescriptor`] in the buffer of its compute tier. Destination ranges are handed out
//! in emission order, so they are monotonically increasing and never overlap.

use crate::constants::triangles::VERTICES_PER_TRIANGLE;
use crate::memory::{GrowableBuffer, NormalBuffer, UvBuffer, VertexBuffer};

use super::model::ModelGeometry;
use super::tiers::{ComputeTier, TierCounts};
use super::work_descriptor::WorkDescriptor;

/// Frame counters owned by the accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameAccumulatorState {
    /// Next free output vertex
    pub destination_offset: u32,

    /// Next free temp vertex
    pub temp_vertex_offset: i32,

    /// Next free temp UV
    pub temp_uv_offset: i32,

    pub tier_counts: TierCounts,

    /// Models whose geometry exceeded the triangle cap this frame
    pub truncated_models: u32,
}

/// Where a transient push landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushedGeometry {
    pub vertex_offset: i32,
    /// `-1` when no UVs were pushed
    pub uv_offset: i32,
    pub vertex_count: u32,
    pub uv_count: u32,
    pub triangle_count: u32,
    pub truncated: bool,
}

pub struct FrameAccumulator {
    vertices: VertexBuffer,
    uvs: UvBuffer,
    normals: NormalBuffer,

    /// Indexed by `ComputeTier::index`
    descriptors: [GrowableBuffer<WorkDescriptor>; 3],

    state: FrameAccumulatorState,
}

impl FrameAccumulator {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            vertices: VertexBuffer::with_capacity("temp vertices", initial_capacity),
            uvs: UvBuffer::with_capacity("temp uvs", initial_capacity),
            normals: NormalBuffer::with_capacity("temp normals", initial_capacity),
            descriptors: [
                GrowableBuffer::with_capacity("unordered descriptors", initial_capacity),
                GrowableBuffer::with_capacity("small descriptors", initial_capacity),
                GrowableBuffer::with_capacity("large descriptors", initial_capacity),
            ],
            state: FrameAccumulatorState::default(),
        }
    }

    /// Reset every buffer and counter for a new frame
    pub fn begin_frame(&mut self) {
        self.vertices.clear();
        self.uvs.clear();
        self.normals.clear();
        for buffer in &mut self.descriptors {
            buffer.clear();
        }
        self.state = FrameAccumulatorState::default();
    }

    /// Append transient geometry, truncated to `max_triangles` faces
    pub fn push_geometry(&mut self, geometry: &ModelGeometry, max_triangles: u32) -> PushedGeometry {
        let face_count = geometry.face_count();
        let triangle_count = face_count.min(max_triangles);
        let truncated = triangle_count < face_count;
        let vertex_count = (triangle_count * VERTICES_PER_TRIANGLE) as usize;

        if truncated {
            self.state.truncated_models += 1;
            log::debug!(
                "[FrameAccumulator::push_geometry] Truncated model from {} to {} triangles",
                face_count,
                triangle_count
            );
        }

        let vertex_offset = self.state.temp_vertex_offset;
        self.vertices.write(&geometry.vertices[..vertex_count]);

        let normals = &geometry.normals[..geometry.normals.len().min(vertex_count)];
        self.normals.write(normals);
        for _ in normals.len()..vertex_count {
            self.normals.put([0.0; 4]);
        }

        let (uv_offset, uv_count) = if geometry.has_uvs() {
            let uvs = &geometry.uvs[..geometry.uvs.len().min(vertex_count)];
            self.uvs.write(uvs);
            for _ in uvs.len()..vertex_count {
                self.uvs.put([0.0; 4]);
            }
            (self.state.temp_uv_offset, vertex_count as u32)
        } else {
            (-1, 0)
        };

        self.state.temp_vertex_offset += vertex_count as i32;
        self.state.temp_uv_offset += uv_count as i32;

        PushedGeometry {
            vertex_offset,
            uv_offset,
            vertex_count: vertex_count as u32,
            uv_count,
            triangle_count,
            truncated,
        }
    }

    /// Reserve the destination range for `descriptor` and append it to `tier`
    pub fn emit(&mut self, tier: ComputeTier, mut descriptor: WorkDescriptor) -> WorkDescriptor {
        descriptor.destination_offset = self.state.destination_offset;
        self.state.destination_offset += descriptor.destination_len();
        self.state.tier_counts.increment(tier);

        self.descriptors[tier.index()].put(descriptor);
        descriptor
    }

    /// Switch all six buffers to read mode
    pub fn flip(&mut self) {
        self.vertices.flip();
        self.uvs.flip();
        self.normals.flip();
        for buffer in &mut self.descriptors {
            buffer.flip();
        }
    }

    pub fn state(&self) -> &FrameAccumulatorState {
        &self.state
    }

    pub fn descriptors(&self, tier: ComputeTier) -> &GrowableBuffer<WorkDescriptor> {
        &self.descriptors[tier.index()]
    }

    pub fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    pub fn uvs(&self) -> &UvBuffer {
        &self.uvs
    }

    pub fn normals(&self) -> &NormalBuffer {
        &self.normals
    }

    /// Output vertices reserved so far
    pub fn output_vertex_count(&self) -> u32 {
        self.state.destination_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn faces(count: usize) -> ModelGeometry {
        ModelGeometry::from_vertices(vec![[1, 2, 3, 4]; count * 3])
    }

    #[test]
    fn test_push_advances_temp_offsets() {
        let mut accumulator = FrameAccumulator::new(8);
        accumulator.begin_frame();

        let first = accumulator.push_geometry(&faces(2), 6144);
        let second = accumulator.push_geometry(&faces(1).with_uvs(vec![[0.5; 4]; 3]), 6144);

        assert_eq!(first.vertex_offset, 0);
        assert_eq!(first.uv_offset, -1);
        assert_eq!(second.vertex_offset, 6);
        assert_eq!(second.uv_offset, 0);
        assert_eq!(accumulator.state().temp_vertex_offset, 9);
        assert_eq!(accumulator.state().temp_uv_offset, 3);
        assert_eq!(accumulator.normals().len(), 9);
    }

    #[test]
    fn test_push_truncates_to_cap() {
        let mut accumulator = FrameAccumulator::new(8);
        let pushed = accumulator.push_geometry(&faces(10), 4);

        assert!(pushed.truncated);
        assert_eq!(pushed.triangle_count, 4);
        assert_eq!(accumulator.vertices().len(), 12);
        assert_eq!(accumulator.state().truncated_models, 1);
    }

    #[test]
    fn test_emit_reserves_disjoint_ranges() {
        let mut accumulator = FrameAccumulator::new(8);
        let first = accumulator.emit(
            ComputeTier::Small,
            WorkDescriptor {
                triangle_count: 10,
                ..Default::default()
            },
        );
        let second = accumulator.emit(
            ComputeTier::Large,
            WorkDescriptor {
                triangle_count: 600,
                ..Default::default()
            },
        );

        assert_eq!(first.destination_range(), 0..30);
        assert_eq!(second.destination_range(), 30..1830);
        assert_eq!(accumulator.output_vertex_count(), 1830);
        assert_eq!(accumulator.state().tier_counts.small, 1);
        assert_eq!(accumulator.descriptors(ComputeTier::Large).len(), 1);
    }

    #[test]
    fn test_begin_frame_resets_state() {
        let mut accumulator = FrameAccumulator::new(8);
        accumulator.push_geometry(&faces(3), 6144);
        accumulator.emit(
            ComputeTier::Unordered,
            WorkDescriptor {
                triangle_count: 3,
                ..Default::default()
            },
        );
        accumulator.flip();

        accumulator.begin_frame();
        assert_eq!(*accumulator.state(), FrameAccumulatorState::default());
        assert!(accumulator.vertices().is_empty());
        assert!(accumulator.descriptors(ComputeTier::Unordered).is_empty());
    }
}
