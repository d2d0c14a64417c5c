/// Compute pass a descriptor is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeTier {
    /// Terrain tiles, copied without ordering
    Unordered,
    /// Models up to the small triangle limit, sorted in workgroup memory
    Small,
    /// Everything larger, sorted from storage
    Large,
}

impl ComputeTier {
    /// Dispatch order
    pub const ALL: [ComputeTier; 3] = [ComputeTier::Unordered, ComputeTier::Small, ComputeTier::Large];

    /// Tier for a model (never `Unordered`)
    pub fn for_triangles(triangle_count: u32, small_limit: u32) -> Self {
        if triangle_count <= small_limit {
            ComputeTier::Small
        } else {
            ComputeTier::Large
        }
    }

    pub fn index(self) -> usize {
        match self {
            ComputeTier::Unordered => 0,
            ComputeTier::Small => 1,
            ComputeTier::Large => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComputeTier::Unordered => "unordered",
            ComputeTier::Small => "small",
            ComputeTier::Large => "large",
        }
    }

    /// WGSL entry point of the pass
    pub fn entry_point(self) -> &'static str {
        match self {
            ComputeTier::Unordered => "unordered_main",
            ComputeTier::Small => "small_main",
            ComputeTier::Large => "large_main",
        }
    }
}

/// Descriptor count per tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierCounts {
    pub unordered: u32,
    pub small: u32,
    pub large: u32,
}

impl TierCounts {
    pub fn get(&self, tier: ComputeTier) -> u32 {
        match tier {
            ComputeTier::Unordered => self.unordered,
            ComputeTier::Small => self.small,
            ComputeTier::Large => self.large,
        }
    }

    pub fn increment(&mut self, tier: ComputeTier) {
        match tier {
            ComputeTier::Unordered => self.unordered += 1,
            ComputeTier::Small => self.small += 1,
            ComputeTier::Large => self.large += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.unordered + self.small + self.large
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_limit_is_inclusive() {
        assert_eq!(ComputeTier::for_triangles(512, 512), ComputeTier::Small);
        assert_eq!(ComputeTier::for_triangles(513, 512), ComputeTier::Large);
        assert_eq!(ComputeTier::for_triangles(1, 512), ComputeTier::Small);
    }

    #[test]
    fn test_dispatch_order() {
        let order: Vec<_> = ComputeTier::ALL.iter().map(|tier| tier.index()).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
