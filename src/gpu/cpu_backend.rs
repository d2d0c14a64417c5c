//! Host-side compute backend
//!
//! Keeps every slot as a word vector and runs queued passes through [`FaceOrderer`] at the
//! barrier. Used for headless runs and tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{BackendError, PipelineResult};
use crate::renderer::{FaceOrderer, GeometryOutputs, GeometrySources, WorkDescriptor};

use crate::config::BackendConfig;

use super::backend::{
    BackendFactory, BufferSlot, ComputeBackend, ComputeUniforms, DispatchPass, OutputGeometry,
};
use super::buffer_manager::BufferAllocations;

/// Largest slot the host backend will allocate
pub const CPU_MAX_BUFFER_SIZE: u64 = 1 << 31;

/// Shared handle that makes upcoming backend operations fail
#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    pending: Arc<Mutex<u32>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `operations` dispatches
    pub fn fail_next(&self, operations: u32) {
        *self.pending.lock() = operations;
    }

    pub fn pending(&self) -> u32 {
        *self.pending.lock()
    }

    fn take(&self) -> bool {
        let mut pending = self.pending.lock();
        if *pending == 0 {
            return false;
        }
        *pending -= 1;
        true
    }
}

pub struct CpuComputeBackend {
    slots: FxHashMap<BufferSlot, Vec<u32>>,
    allocations: BufferAllocations,
    queued: Vec<DispatchPass>,
    faults: FaultInjector,
}

impl CpuComputeBackend {
    pub fn new() -> Self {
        Self::with_faults(FaultInjector::new())
    }

    pub fn with_faults(faults: FaultInjector) -> Self {
        Self {
            slots: FxHashMap::default(),
            allocations: BufferAllocations::new(CPU_MAX_BUFFER_SIZE),
            queued: Vec::new(),
            faults,
        }
    }

    /// Factory handing out a fresh host backend on every (re)start, all sharing `faults`
    pub fn factory(faults: FaultInjector) -> Box<dyn BackendFactory> {
        Box::new(move |_config: &BackendConfig| -> PipelineResult<Box<dyn ComputeBackend>> {
            Ok(Box::new(CpuComputeBackend::with_faults(faults.clone())))
        })
    }

    fn words(&self, slot: BufferSlot) -> &[u32] {
        self.slots.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }

    fn run_pass(&mut self, pass: DispatchPass) {
        let uniforms = view::<ComputeUniforms>(self.words(BufferSlot::Uniforms))
            .first()
            .copied()
            .unwrap_or_default();
        let orderer = FaceOrderer::new(uniforms.yaw, uniforms.pitch);

        let descriptors: Vec<WorkDescriptor> =
            view::<WorkDescriptor>(self.words(BufferSlot::Descriptors(pass.tier)))
                .iter()
                .take(pass.workgroups as usize)
                .copied()
                .collect();

        let mut out_vertices = self.slots.remove(&BufferSlot::OutVertices).unwrap_or_default();
        let mut out_uvs = self.slots.remove(&BufferSlot::OutUvs).unwrap_or_default();
        let mut out_normals = self.slots.remove(&BufferSlot::OutNormals).unwrap_or_default();

        {
            let sources = GeometrySources {
                scene_vertices: view(self.words(BufferSlot::SceneVertices)),
                scene_uvs: view(self.words(BufferSlot::SceneUvs)),
                scene_normals: view(self.words(BufferSlot::SceneNormals)),
                temp_vertices: view(self.words(BufferSlot::TempVertices)),
                temp_uvs: view(self.words(BufferSlot::TempUvs)),
                temp_normals: view(self.words(BufferSlot::TempNormals)),
            };
            let mut outputs = GeometryOutputs {
                vertices: view_mut(&mut out_vertices),
                uvs: view_mut(&mut out_uvs),
                normals: view_mut(&mut out_normals),
            };

            for descriptor in &descriptors {
                orderer.process(pass.tier, descriptor, &sources, &mut outputs);
            }
        }

        self.slots.insert(BufferSlot::OutVertices, out_vertices);
        self.slots.insert(BufferSlot::OutUvs, out_uvs);
        self.slots.insert(BufferSlot::OutNormals, out_normals);
    }
}

impl Default for CpuComputeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuComputeBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn reserve(&mut self, slot: BufferSlot, size: u64) -> PipelineResult<()> {
        if let Some(size) = self.allocations.grow(slot, size)? {
            self.slots.insert(slot, vec![0; (size / 4) as usize]);
        }
        Ok(())
    }

    fn upload(&mut self, slot: BufferSlot, bytes: &[u8]) -> PipelineResult<()> {
        if bytes.len() % 4 != 0 {
            return Err(BackendError::Misaligned {
                slot,
                len: bytes.len(),
            }
            .into());
        }

        self.reserve(slot, bytes.len() as u64)?;
        if let Some(words) = self.slots.get_mut(&slot) {
            let target: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());
            target[..bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }

    fn dispatch(&mut self, pass: DispatchPass) -> PipelineResult<()> {
        if self.faults.take() {
            log::error!("[CpuComputeBackend::dispatch] Injected failure on {} pass", pass.tier.label());
            return Err(BackendError::Injected("dispatch").into());
        }

        self.queued.push(pass);
        Ok(())
    }

    fn barrier(&mut self) -> PipelineResult<()> {
        for pass in std::mem::take(&mut self.queued) {
            self.run_pass(pass);
        }
        Ok(())
    }

    fn read_output(&mut self, vertex_count: u32) -> PipelineResult<OutputGeometry> {
        let count = vertex_count as usize;
        Ok(OutputGeometry {
            vertices: prefix(view(self.words(BufferSlot::OutVertices)), count),
            uvs: prefix(view(self.words(BufferSlot::OutUvs)), count),
            normals: prefix(view(self.words(BufferSlot::OutNormals)), count),
        })
    }

    fn allocations(&self) -> &BufferAllocations {
        &self.allocations
    }
}

/// Whole elements of `T` stored in a word vector
fn view<T: bytemuck::Pod>(words: &[u32]) -> &[T] {
    let per_element = std::mem::size_of::<T>() / 4;
    let whole = words.len() / per_element * per_element;
    bytemuck::cast_slice(&words[..whole])
}

fn view_mut<T: bytemuck::Pod>(words: &mut [u32]) -> &mut [T] {
    let per_element = std::mem::size_of::<T>() / 4;
    let whole = words.len() / per_element * per_element;
    bytemuck::cast_slice_mut(&mut words[..whole])
}

fn prefix<T: Copy>(elements: &[T], count: usize) -> Vec<T> {
    elements[..count.min(elements.len())].to_vec()
}
