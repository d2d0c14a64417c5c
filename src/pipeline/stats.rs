//! Per-frame classification counters

use crate::renderer::{CacheStats, Classification};

/// Statistics for one frame of accumulation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Drawables handed to `draw`
    pub drawables_submitted: u32,

    /// No model or zero faces
    pub empty: u32,

    /// Rejected by the bounding cylinder test
    pub culled: u32,

    /// Carried the skip marker
    pub skipped: u32,

    /// Drawn from the scene buffer
    pub scene_drawn: u32,

    /// Geometry pushed into the temp buffers
    pub pushed: u32,

    /// Reused a push from earlier in the frame
    pub cache_reused: u32,

    /// Pushes that hit the triangle cap
    pub truncated: u32,

    pub tiles_submitted: u32,
    pub tile_descriptors: u32,

    pub cache: CacheStats,
}

impl FrameStats {
    pub fn record(&mut self, classification: Classification) {
        self.drawables_submitted += 1;
        match classification {
            Classification::Empty => self.empty += 1,
            Classification::Culled => self.culled += 1,
            Classification::Skipped => self.skipped += 1,
            Classification::Scene { .. } => self.scene_drawn += 1,
            Classification::Pushed { truncated, .. } => {
                self.pushed += 1;
                if truncated {
                    self.truncated += 1;
                }
            }
            Classification::Cached { .. } => self.cache_reused += 1,
        }
    }

    pub fn record_tile(&mut self, descriptors: u32) {
        self.tiles_submitted += 1;
        self.tile_descriptors += descriptors;
    }

    /// Drawables that produced a descriptor
    pub fn drawn(&self) -> u32 {
        self.scene_drawn + self.pushed + self.cache_reused
    }
}
