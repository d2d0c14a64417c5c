//! Frame geometry renderer core
//!
//! Everything between the scene traversal and the compute backend: drawable models, the
//! visibility test, per-frame accumulation, batching of identical transient models and
//! routing of work descriptors into compute tiers.

pub mod classifier;
pub mod face_sort;
pub mod frame_accumulator;
pub mod model;
pub mod model_cache;
pub mod model_hasher;
pub mod scene_buffer;
pub mod tiers;
pub mod visibility;
pub mod work_descriptor;

pub use classifier::{Classification, ClickTargetSink, FrameContext, ModelClassifier};
pub use face_sort::{FaceOrderer, GeometryOutputs, GeometrySources};
pub use frame_accumulator::{FrameAccumulator, FrameAccumulatorState, PushedGeometry};
pub use model::{
    ComposedRenderable, DrawParams, Model, ModelGeometry, Renderable, ScenePlacement, TileDraw,
};
pub use model_cache::{CacheLookup, CacheStats, CachedPush, DynamicModelCache};
pub use model_hasher::batch_hash;
pub use scene_buffer::{EmptyScene, SceneBuffer, SceneSource};
pub use tiers::{ComputeTier, TierCounts};
pub use visibility::{BoundsCylinder, CameraState, ClipRect};
pub use work_descriptor::{DescriptorFlags, WorkDescriptor};

/// WGSL source of the three face ordering passes
pub const FACE_SORT_SHADER: &str = include_str!("shaders/face_sort.wgsl");
