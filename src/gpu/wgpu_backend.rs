//! wgpu compute backend
//!
//! Runs the three passes of `face_sort.wgsl` on a headless device. Every slot is a storage
//! buffer recreated only when it has to grow; passes are recorded into one encoder and
//! submitted at the barrier. Every operation runs inside its own pair of error scopes, so a
//! device error is reported by the call that caused it.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::config::BackendConfig;
use crate::constants::compute::STORAGE_BINDINGS;
use crate::error::{backend_init_error, BackendError, PipelineResult};
use crate::renderer::{ComputeTier, FACE_SORT_SHADER};

use super::backend::{BackendFactory, BufferSlot, ComputeBackend, DispatchPass, OutputGeometry};
use super::buffer_manager::BufferAllocations;

pub struct WgpuComputeBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,

    bind_group_layout: wgpu::BindGroupLayout,

    /// Indexed by `ComputeTier::index`
    pipelines: [wgpu::ComputePipeline; 3],

    buffers: FxHashMap<BufferSlot, wgpu::Buffer>,
    allocations: BufferAllocations,

    /// Passes recorded since the last barrier
    encoder: Option<wgpu::CommandEncoder>,

    max_workgroups: u32,
}

impl WgpuComputeBackend {
    /// Create a headless device and the compute pipelines
    pub fn request(config: &BackendConfig) -> PipelineResult<Self> {
        pollster::block_on(Self::request_async(config))
    }

    pub async fn request_async(config: &BackendConfig) -> PipelineResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.to_wgpu(),
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .ok_or_else(|| backend_init_error("No GPU adapter available"))?;

        let info = adapter.get_info();
        log::info!(
            "[WgpuComputeBackend::request] Adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(backend_init_error(format!(
                "Adapter '{}' does not support compute shaders",
                info.name
            )));
        }

        let adapter_limits = adapter.limits();
        if adapter_limits.max_storage_buffers_per_shader_stage < STORAGE_BINDINGS {
            return Err(backend_init_error(format!(
                "Adapter '{}' supports {} storage buffers per stage, {} required",
                info.name, adapter_limits.max_storage_buffers_per_shader_stage, STORAGE_BINDINGS
            )));
        }

        let limits = wgpu::Limits {
            max_storage_buffers_per_shader_stage: STORAGE_BINDINGS,
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::downlevel_defaults()
        };

        log::info!(
            "[WgpuComputeBackend::request] max_buffer_size: {} MB, max_storage_binding: {} MB",
            limits.max_buffer_size / 1024 / 1024,
            limits.max_storage_buffer_binding_size / 1024 / 1024
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Scene Geometry Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                },
                None,
            )
            .await
            .map_err(|e| backend_init_error(format!("Device request failed: {}", e)))?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("[WgpuComputeBackend] Uncaptured device error: {}", error);
        }));

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let max_buffer_size = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);

        Ok(Self::with_device(
            device,
            queue,
            info.name,
            max_buffer_size,
            limits.max_compute_workgroups_per_dimension,
        ))
    }

    /// Factory requesting a new device on every (re)start
    pub fn factory() -> Box<dyn BackendFactory> {
        Box::new(|config: &BackendConfig| -> PipelineResult<Box<dyn ComputeBackend>> {
            Ok(Box::new(WgpuComputeBackend::request(config)?))
        })
    }

    fn with_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        adapter_name: String,
        max_buffer_size: u64,
        max_workgroups: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Face Sort Shader"),
            source: wgpu::ShaderSource::Wgsl(FACE_SORT_SHADER.into()),
        });

        // Storage bindings plus the uniform block
        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..=STORAGE_BINDINGS)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: binding_type(binding),
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Face Sort Bind Group Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Face Sort Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipelines = ComputeTier::ALL.map(|tier| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(tier.entry_point()),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: tier.entry_point(),
            })
        });

        Self {
            device,
            queue,
            adapter_name,
            bind_group_layout,
            pipelines,
            buffers: FxHashMap::default(),
            allocations: BufferAllocations::new(max_buffer_size),
            encoder: None,
            max_workgroups,
        }
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Output buffer for a slot, for callers that render straight from device memory
    pub fn buffer(&self, slot: BufferSlot) -> Option<&wgpu::Buffer> {
        self.buffers.get(&slot)
    }

    /// Run `operation` between a push and a pop of the validation and out-of-memory scopes
    fn scoped<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let result = operation(self);

        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());
        let value = result?;
        match out_of_memory.or(validation) {
            Some(error) => Err(BackendError::Device(error.to_string()).into()),
            None => Ok(value),
        }
    }

    /// Recreate `slot` if it has to grow; the caller owns the error scope
    fn ensure_slot(&mut self, slot: BufferSlot, size: u64) -> PipelineResult<()> {
        if let Some(size) = self.allocations.grow(slot, size)? {
            let usage = match slot {
                BufferSlot::Uniforms => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                _ => {
                    wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_DST
                        | wgpu::BufferUsages::COPY_SRC
                }
            };

            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(slot.label()),
                size,
                usage,
                mapped_at_creation: false,
            });
            self.buffers.insert(slot, buffer);
        }
        Ok(())
    }

    fn bind_group(&mut self, tier: ComputeTier) -> PipelineResult<wgpu::BindGroup> {
        for slot in BufferSlot::ALL {
            self.ensure_slot(slot, 0)?;
        }

        let mut entries = Vec::with_capacity(BufferSlot::ALL.len());
        for slot in BufferSlot::ALL {
            if matches!(slot, BufferSlot::Descriptors(other) if other != tier) {
                continue;
            }
            if let Some(buffer) = self.buffers.get(&slot) {
                entries.push(wgpu::BindGroupEntry {
                    binding: slot.binding(),
                    resource: buffer.as_entire_binding(),
                });
            }
        }

        Ok(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(tier.label()),
            layout: &self.bind_group_layout,
            entries: &entries,
        }))
    }

    fn read_slot(&self, slot: BufferSlot, size: u64) -> Result<Vec<u8>, BackendError> {
        let Some(source) = self.buffers.get(&slot) else {
            return Ok(Vec::new());
        };
        let size = size.min(self.allocations.size(slot));
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Output Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Output Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            if tx.send(result).is_err() {
                log::error!("[WgpuComputeBackend] Failed to send map_async result - receiver dropped");
            }
        });

        self.device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(rx) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(BackendError::Map {
                    slot,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(BackendError::Map {
                    slot,
                    reason: "map callback dropped".to_string(),
                })
            }
        }

        let data = buffer_slice.get_mapped_range();
        let bytes = data.to_vec();
        drop(data);
        staging.unmap();

        Ok(bytes)
    }
}

impl ComputeBackend for WgpuComputeBackend {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn reserve(&mut self, slot: BufferSlot, size: u64) -> PipelineResult<()> {
        self.scoped(|backend| backend.ensure_slot(slot, size))
    }

    fn upload(&mut self, slot: BufferSlot, bytes: &[u8]) -> PipelineResult<()> {
        if bytes.len() % 4 != 0 {
            return Err(BackendError::Misaligned {
                slot,
                len: bytes.len(),
            }
            .into());
        }

        self.scoped(|backend| {
            backend.ensure_slot(slot, bytes.len() as u64)?;
            if bytes.is_empty() {
                return Ok(());
            }
            if let Some(buffer) = backend.buffers.get(&slot) {
                backend.queue.write_buffer(buffer, 0, bytes);
            }
            Ok(())
        })
    }

    fn dispatch(&mut self, pass: DispatchPass) -> PipelineResult<()> {
        if pass.workgroups == 0 {
            return Ok(());
        }
        if pass.workgroups > self.max_workgroups {
            return Err(BackendError::Device(format!(
                "{} pass needs {} workgroups, device allows {}",
                pass.tier.label(),
                pass.workgroups,
                self.max_workgroups
            ))
            .into());
        }

        let bind_group = self.scoped(|backend| backend.bind_group(pass.tier))?;

        let device = Arc::clone(&self.device);
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Face Sort Encoder"),
            })
        });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(pass.tier.label()),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipelines[pass.tier.index()]);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(pass.workgroups, 1, 1);
        }

        Ok(())
    }

    fn barrier(&mut self) -> PipelineResult<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        self.scoped(|backend| {
            backend.queue.submit(std::iter::once(encoder.finish()));
            Ok(())
        })
    }

    fn read_output(&mut self, vertex_count: u32) -> PipelineResult<OutputGeometry> {
        let size = vertex_count as u64 * crate::constants::buffers::OUTPUT_VERTEX_STRIDE;

        let vertices = self.read_slot(BufferSlot::OutVertices, size)?;
        let uvs = self.read_slot(BufferSlot::OutUvs, size)?;
        let normals = self.read_slot(BufferSlot::OutNormals, size)?;

        Ok(OutputGeometry {
            vertices: bytemuck::pod_collect_to_vec(&vertices),
            uvs: bytemuck::pod_collect_to_vec(&uvs),
            normals: bytemuck::pod_collect_to_vec(&normals),
        })
    }

    fn allocations(&self) -> &BufferAllocations {
        &self.allocations
    }
}

impl Drop for WgpuComputeBackend {
    fn drop(&mut self) {
        log::debug!(
            "[WgpuComputeBackend] Releasing {} buffers ({} bytes)",
            self.buffers.len(),
            self.allocations.total_bytes()
        );
        for buffer in self.buffers.values() {
            buffer.destroy();
        }
    }
}

/// Read-only storage for inputs, read-write for what the passes write, uniform for the camera
fn binding_type(binding: u32) -> wgpu::BufferBindingType {
    let slot = BufferSlot::ALL.into_iter().find(|slot| slot.binding() == binding);
    match slot {
        Some(BufferSlot::Uniforms) => wgpu::BufferBindingType::Uniform,
        Some(slot) if slot.is_writable() => wgpu::BufferBindingType::Storage { read_only: false },
        _ => wgpu::BufferBindingType::Storage { read_only: true },
    }
}
