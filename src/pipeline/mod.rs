//! Frame lifecycle
//!
//! [`FramePipeline`] drives accumulation and dispatch for every frame, applies deferred scene
//! reloads and restarts the compute backend after failures or a host suspension.

pub mod frame_pipeline;
pub mod frame_state;
pub mod reload;
pub mod stats;

pub use frame_pipeline::{FrameOutput, FramePipeline};
pub use frame_state::FrameState;
pub use reload::ReloadSignal;
pub use stats::FrameStats;
