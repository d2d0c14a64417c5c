//! Scene geometry pipeline
//!
//! Collects per-frame geometry for a tile-based world renderer, routes each drawable to the
//! persistent scene buffer or the per-frame temp buffers, shares pushes between identical
//! dynamic models and hands the work to three compute passes that order faces on the device.

pub mod config;
pub mod constants;
pub mod error;
pub mod gpu;
pub mod memory;
pub mod pipeline;
pub mod renderer;

pub use config::{BackendConfig, PipelineConfig, PowerPreference};
pub use error::{BackendError, ConfigError, PipelineError, PipelineResult};
pub use gpu::{
    BackendFactory, ComputeBackend, CpuComputeBackend, FaultInjector, OutputGeometry,
    WgpuComputeBackend,
};
pub use memory::GrowableBuffer;
pub use pipeline::{FrameOutput, FramePipeline, FrameState, FrameStats, ReloadSignal};
pub use renderer::{
    CameraState, Classification, ClickTargetSink, ClipRect, ComposedRenderable, ComputeTier,
    DrawParams, EmptyScene, Model, ModelGeometry, Renderable, SceneBuffer, SceneSource, TileDraw,
    WorkDescriptor,
};
