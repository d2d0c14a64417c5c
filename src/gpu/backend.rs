//! Compute backend seam
//!
//! The pipeline only talks to a backend through named buffer slots, tier dispatches and a
//! barrier. `wgpu_backend` runs the WGSL passes on a device, `cpu_backend` runs the same
//! ordering on the host.

use bytemuck::{Pod, Zeroable};

use crate::config::BackendConfig;
use crate::error::PipelineResult;
use crate::memory::{PackedNormal, PackedUv, PackedVertex};
use crate::renderer::{CameraState, ComputeTier};

use super::buffer_manager::BufferAllocations;

/// Every buffer a backend manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    SceneVertices,
    SceneUvs,
    SceneNormals,
    TempVertices,
    TempUvs,
    TempNormals,
    Descriptors(ComputeTier),
    OutVertices,
    OutUvs,
    OutNormals,
    Uniforms,

    /// Per-face depths cached by the large pass, one word per output triangle
    DepthScratch,
}

impl BufferSlot {
    pub const ALL: [BufferSlot; 14] = [
        BufferSlot::Descriptors(ComputeTier::Unordered),
        BufferSlot::Descriptors(ComputeTier::Small),
        BufferSlot::Descriptors(ComputeTier::Large),
        BufferSlot::SceneVertices,
        BufferSlot::TempVertices,
        BufferSlot::OutVertices,
        BufferSlot::OutUvs,
        BufferSlot::SceneUvs,
        BufferSlot::TempUvs,
        BufferSlot::OutNormals,
        BufferSlot::SceneNormals,
        BufferSlot::TempNormals,
        BufferSlot::Uniforms,
        BufferSlot::DepthScratch,
    ];

    /// Shader binding of the slot; all descriptor slots share binding 0
    pub fn binding(self) -> u32 {
        match self {
            BufferSlot::Descriptors(_) => 0,
            BufferSlot::SceneVertices => 1,
            BufferSlot::TempVertices => 2,
            BufferSlot::OutVertices => 3,
            BufferSlot::OutUvs => 4,
            BufferSlot::SceneUvs => 5,
            BufferSlot::TempUvs => 6,
            BufferSlot::OutNormals => 7,
            BufferSlot::SceneNormals => 8,
            BufferSlot::TempNormals => 9,
            BufferSlot::Uniforms => 10,
            BufferSlot::DepthScratch => 11,
        }
    }

    pub fn is_output(self) -> bool {
        matches!(
            self,
            BufferSlot::OutVertices | BufferSlot::OutUvs | BufferSlot::OutNormals
        )
    }

    /// Slots the compute passes write to
    pub fn is_writable(self) -> bool {
        self.is_output() || self == BufferSlot::DepthScratch
    }

    pub fn label(self) -> &'static str {
        match self {
            BufferSlot::SceneVertices => "Scene Vertex Buffer",
            BufferSlot::SceneUvs => "Scene UV Buffer",
            BufferSlot::SceneNormals => "Scene Normal Buffer",
            BufferSlot::TempVertices => "Temp Vertex Buffer",
            BufferSlot::TempUvs => "Temp UV Buffer",
            BufferSlot::TempNormals => "Temp Normal Buffer",
            BufferSlot::Descriptors(ComputeTier::Unordered) => "Unordered Descriptor Buffer",
            BufferSlot::Descriptors(ComputeTier::Small) => "Small Descriptor Buffer",
            BufferSlot::Descriptors(ComputeTier::Large) => "Large Descriptor Buffer",
            BufferSlot::OutVertices => "Output Vertex Buffer",
            BufferSlot::OutUvs => "Output UV Buffer",
            BufferSlot::OutNormals => "Output Normal Buffer",
            BufferSlot::Uniforms => "Compute Uniform Buffer",
            BufferSlot::DepthScratch => "Face Depth Scratch Buffer",
        }
    }
}

/// Uniform block shared by the three passes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ComputeUniforms {
    pub yaw: i32,
    pub pitch: i32,
    pub center_x: i32,
    pub center_y: i32,
    pub zoom: i32,
    pub camera_x: i32,
    pub camera_y: i32,
    pub camera_z: i32,
}

impl ComputeUniforms {
    pub fn from_camera(camera: &CameraState) -> Self {
        Self {
            yaw: camera.yaw,
            pitch: camera.pitch,
            center_x: camera.clip.center_x(),
            center_y: camera.clip.center_y(),
            zoom: camera.zoom,
            camera_x: camera.position.x,
            camera_y: camera.position.y,
            camera_z: camera.position.z,
        }
    }
}

/// One tier dispatch: a workgroup per descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPass {
    pub tier: ComputeTier,
    pub workgroups: u32,
}

/// Output geometry read back from a backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputGeometry {
    pub vertices: Vec<PackedVertex>,
    pub uvs: Vec<PackedUv>,
    pub normals: Vec<PackedNormal>,
}

/// Executes the face ordering passes
pub trait ComputeBackend {
    fn name(&self) -> &str;

    /// Make `slot` hold at least `size` bytes. Allocations only grow.
    fn reserve(&mut self, slot: BufferSlot, size: u64) -> PipelineResult<()>;

    /// Write `bytes` at the start of `slot`, growing it first if needed
    fn upload(&mut self, slot: BufferSlot, bytes: &[u8]) -> PipelineResult<()>;

    /// Queue one tier pass
    fn dispatch(&mut self, pass: DispatchPass) -> PipelineResult<()>;

    /// Complete all queued work and make the output visible
    fn barrier(&mut self) -> PipelineResult<()>;

    /// Copy the first `vertex_count` output vertices back to the host
    fn read_output(&mut self, vertex_count: u32) -> PipelineResult<OutputGeometry>;

    fn allocations(&self) -> &BufferAllocations;
}

/// Creates backends at startup and again after a teardown
pub trait BackendFactory {
    fn create(&mut self, config: &BackendConfig) -> PipelineResult<Box<dyn ComputeBackend>>;
}

impl<F> BackendFactory for F
where
    F: FnMut(&BackendConfig) -> PipelineResult<Box<dyn ComputeBackend>>,
{
    fn create(&mut self, config: &BackendConfig) -> PipelineResult<Box<dyn ComputeBackend>> {
        self(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_is_eight_words() {
        assert_eq!(std::mem::size_of::<ComputeUniforms>(), 32);
    }

    #[test]
    fn test_bindings_cover_shader_layout() {
        let mut bindings: Vec<u32> = BufferSlot::ALL.iter().map(|slot| slot.binding()).collect();
        bindings.sort_unstable();
        bindings.dedup();
        assert_eq!(bindings, (0..=11).collect::<Vec<_>>());
    }

    #[test]
    fn test_storage_slots_match_binding_budget() {
        let mut storage: Vec<u32> = BufferSlot::ALL
            .iter()
            .filter(|slot| **slot != BufferSlot::Uniforms)
            .map(|slot| slot.binding())
            .collect();
        storage.sort_unstable();
        storage.dedup();
        assert_eq!(storage.len() as u32, crate::constants::compute::STORAGE_BINDINGS);
        assert!(BufferSlot::DepthScratch.is_writable());
        assert!(!BufferSlot::DepthScratch.is_output());
    }
}
