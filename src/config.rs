//! Pipeline configuration
//!
//! Loaded once at startup from TOML. Every field has a default so partial files are valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{buffers, frame, triangles};
use crate::error::{invalid_config, ConfigError};

/// Adapter power preference, mirrored from `wgpu::PowerPreference` so it can live in TOML
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    LowPower,
    #[default]
    HighPerformance,
    None,
}

impl PowerPreference {
    pub fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::None => wgpu::PowerPreference::None,
        }
    }
}

/// Settings for the wgpu compute backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub power_preference: PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            power_preference: PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

/// Frame-geometry pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Initial element capacity of every growable buffer
    pub initial_capacity: usize,

    /// Per-model triangle cap; geometry beyond it is truncated and counted
    pub max_triangles: u32,

    /// Upper bound (inclusive) of the small compute tier
    pub small_triangle_count: u32,

    /// Share one push between identical transient models within a frame
    pub model_batching: bool,

    /// Shadows are rendered this frame
    pub shadows_enabled: bool,

    /// Widen visibility for shadow casters outside the view (halves the zoom)
    pub expand_shadow_draw: bool,

    /// Frame gap treated as a host suspension
    pub suspend_threshold_secs: u64,

    /// Restarts allowed before the pipeline disables itself
    pub max_recovery_attempts: usize,

    pub backend: BackendConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            initial_capacity: buffers::INITIAL_CAPACITY,
            max_triangles: triangles::MAX_TRIANGLE,
            small_triangle_count: triangles::SMALL_TRIANGLE_COUNT,
            model_batching: true,
            shadows_enabled: false,
            expand_shadow_draw: false,
            suspend_threshold_secs: frame::SUSPEND_THRESHOLD_SECS,
            max_recovery_attempts: frame::MAX_RECOVERY_ATTEMPTS,
            backend: BackendConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("[PipelineConfig::load] Loaded config from {:?}", path);
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(invalid_config("initial_capacity", "must be non-zero"));
        }
        if self.max_triangles == 0 {
            return Err(invalid_config("max_triangles", "must be non-zero"));
        }
        if self.small_triangle_count > self.max_triangles {
            return Err(invalid_config(
                "small_triangle_count",
                format!(
                    "{} exceeds max_triangles ({})",
                    self.small_triangle_count, self.max_triangles
                ),
            ));
        }
        if self.small_triangle_count > triangles::SMALL_TRIANGLE_COUNT {
            return Err(invalid_config(
                "small_triangle_count",
                format!(
                    "{} exceeds the workgroup sort capacity ({})",
                    self.small_triangle_count,
                    triangles::SMALL_TRIANGLE_COUNT
                ),
            ));
        }
        if self.suspend_threshold_secs == 0 {
            return Err(invalid_config("suspend_threshold_secs", "must be non-zero"));
        }
        Ok(())
    }

    pub fn suspend_threshold(&self) -> Duration {
        Duration::from_secs(self.suspend_threshold_secs)
    }

    /// Zoom adjustment applied to the visibility test
    pub fn expands_shadow_draw(&self) -> bool {
        self.shadows_enabled && self.expand_shadow_draw
    }
}
