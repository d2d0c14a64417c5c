//! Frame upload and tier dispatch
//!
//! Moves the flipped accumulator onto a [`ComputeBackend`] and issues the three passes in
//! fixed order: unordered, small, large. Empty tiers are skipped. The barrier at the end
//! makes the output visible to the consumer.

use crate::constants::buffers::{DEPTH_SCRATCH_STRIDE, OUTPUT_VERTEX_STRIDE};
use crate::constants::triangles::VERTICES_PER_TRIANGLE;
use crate::error::PipelineResult;
use crate::renderer::{ComputeTier, FrameAccumulator, SceneBuffer, TierCounts};

use super::backend::{BufferSlot, ComputeBackend, ComputeUniforms, DispatchPass};

/// What one dispatch produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub vertex_count: u32,

    /// Exactly `vertex_count * 16`; the allocation behind it may be larger
    pub byte_len: u64,

    pub tier_counts: TierCounts,
    pub passes: u32,
}

#[derive(Debug, Default)]
pub struct ComputeDispatcher {
    frames_dispatched: u64,
}

impl ComputeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload the three scene channels
    pub fn upload_scene(&self, backend: &mut dyn ComputeBackend, scene: &SceneBuffer) -> PipelineResult<()> {
        backend.upload(BufferSlot::SceneVertices, scene.vertices().as_bytes())?;
        backend.upload(BufferSlot::SceneUvs, scene.uvs().as_bytes())?;
        backend.upload(BufferSlot::SceneNormals, scene.normals().as_bytes())?;
        backend.barrier()?;

        log::debug!(
            "[ComputeDispatcher::upload_scene] Uploaded {} scene vertices to {}",
            scene.vertices().len(),
            backend.name()
        );
        Ok(())
    }

    pub fn upload_uniforms(
        &self,
        backend: &mut dyn ComputeBackend,
        uniforms: &ComputeUniforms,
    ) -> PipelineResult<()> {
        backend.upload(BufferSlot::Uniforms, bytemuck::bytes_of(uniforms))
    }

    /// Upload a flipped accumulator and run the tier passes
    pub fn dispatch(
        &mut self,
        backend: &mut dyn ComputeBackend,
        accumulator: &FrameAccumulator,
    ) -> PipelineResult<DispatchSummary> {
        backend.upload(BufferSlot::TempVertices, accumulator.vertices().as_bytes())?;
        backend.upload(BufferSlot::TempUvs, accumulator.uvs().as_bytes())?;
        backend.upload(BufferSlot::TempNormals, accumulator.normals().as_bytes())?;
        for tier in ComputeTier::ALL {
            backend.upload(BufferSlot::Descriptors(tier), accumulator.descriptors(tier).as_bytes())?;
        }

        let vertex_count = accumulator.output_vertex_count();
        let byte_len = vertex_count as u64 * OUTPUT_VERTEX_STRIDE;
        for slot in [BufferSlot::OutVertices, BufferSlot::OutUvs, BufferSlot::OutNormals] {
            backend.reserve(slot, byte_len)?;
        }
        let triangles = (vertex_count / VERTICES_PER_TRIANGLE) as u64;
        backend.reserve(BufferSlot::DepthScratch, triangles * DEPTH_SCRATCH_STRIDE)?;

        let mut passes = 0;
        for tier in ComputeTier::ALL {
            let workgroups = accumulator.descriptors(tier).len() as u32;
            if workgroups == 0 {
                continue;
            }
            backend.dispatch(DispatchPass { tier, workgroups })?;
            passes += 1;
        }

        backend.barrier()?;
        self.frames_dispatched += 1;

        let summary = DispatchSummary {
            vertex_count,
            byte_len,
            tier_counts: accumulator.state().tier_counts,
            passes,
        };

        log::debug!(
            "[ComputeDispatcher::dispatch] {} vertices in {} passes ({} unordered, {} small, {} large)",
            summary.vertex_count,
            summary.passes,
            summary.tier_counts.unordered,
            summary.tier_counts.small,
            summary.tier_counts.large
        );

        Ok(summary)
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched
    }
}
