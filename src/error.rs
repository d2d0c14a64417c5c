//! Pipeline error handling
//!
//! Error types shared by the accumulation, dispatch and backend layers, plus helper
//! constructors so call sites never have to hand-build error strings.

use std::path::PathBuf;
use thiserror::Error;

use crate::gpu::BufferSlot;
use crate::pipeline::FrameState;

/// Errors surfaced by the frame-geometry pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Compute backend initialization failed: {reason}")]
    BackendInit { reason: String },

    #[error("Compute backend operation '{operation}' failed: {error}")]
    BackendOperation { operation: String, error: String },

    #[error("Compute backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Frame lifecycle violation during {operation}: expected {expected:?}, found {actual:?}")]
    FrameState {
        operation: &'static str,
        expected: FrameState,
        actual: FrameState,
    },

    #[error("Pipeline disabled after {attempts} failed recovery attempts")]
    Disabled { attempts: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by a compute backend while managing buffers or running passes
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Buffer {slot:?} needs {requested} bytes, device limit is {limit}")]
    BufferTooLarge {
        slot: BufferSlot,
        requested: u64,
        limit: u64,
    },

    #[error("Upload of {len} bytes to {slot:?} is not 4-byte aligned")]
    Misaligned { slot: BufferSlot, len: usize },

    #[error("Device reported an error: {0}")]
    Device(String),

    #[error("Failed to map {slot:?} for reading: {reason}")]
    Map { slot: BufferSlot, reason: String },

    #[error("Injected fault during {0}")]
    Injected(&'static str),
}

/// Errors raised while loading or validating a [`crate::PipelineConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Type alias for pipeline operation results
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Helper trait for attaching backend context to foreign errors
pub trait PipelineErrorContext<T> {
    fn backend_context(self, operation: &str) -> PipelineResult<T>;
}

impl<T, E> PipelineErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn backend_context(self, operation: &str) -> PipelineResult<T> {
        self.map_err(|e| backend_error(operation, e))
    }
}

/// Create a backend operation error
pub fn backend_error(operation: &str, error: impl std::fmt::Display) -> PipelineError {
    PipelineError::BackendOperation {
        operation: operation.to_string(),
        error: error.to_string(),
    }
}

/// Create a backend initialization error
pub fn backend_init_error(reason: impl std::fmt::Display) -> PipelineError {
    PipelineError::BackendInit {
        reason: reason.to_string(),
    }
}

/// Create a config validation error
pub fn invalid_config(field: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_context_wraps_display() {
        let result: Result<(), &str> = Err("device lost");
        let err = result.backend_context("dispatch").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Compute backend operation 'dispatch' failed: device lost"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: PipelineError = invalid_config("max_triangles", "must be non-zero").into();
        assert!(matches!(err, PipelineError::Config(ConfigError::Invalid { .. })));
    }
}
