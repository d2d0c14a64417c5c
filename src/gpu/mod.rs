//! Compute backends and dispatch
//!
//! The pipeline submits frame geometry through the [`ComputeBackend`] trait. A wgpu
//! implementation runs the WGSL passes on a device; the CPU implementation runs the same
//! face ordering on the host for headless runs and tests.

pub mod backend;
pub mod buffer_manager;
pub mod cpu_backend;
pub mod dispatcher;
pub mod recovery;
pub mod wgpu_backend;

pub use backend::{
    BackendFactory, BufferSlot, ComputeBackend, ComputeUniforms, DispatchPass, OutputGeometry,
};
pub use buffer_manager::BufferAllocations;
pub use cpu_backend::{CpuComputeBackend, FaultInjector};
pub use dispatcher::{ComputeDispatcher, DispatchSummary};
pub use recovery::{FrameWatchdog, GpuHealthMonitor};
pub use wgpu_backend::WgpuComputeBackend;
