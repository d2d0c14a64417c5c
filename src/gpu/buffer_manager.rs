//! Grow-only buffer allocation tracking
//!
//! Backends ask the tracker whether a slot must be recreated before every write. A slot is
//! reallocated only when the requested size exceeds what it already holds; shrinking never
//! happens, so a steady workload settles into zero reallocations per frame.

use rustc_hash::FxHashMap;

use crate::constants::buffers::MIN_GPU_ALLOCATION;
use crate::error::BackendError;

use super::backend::BufferSlot;

#[derive(Debug, Clone)]
pub struct BufferAllocations {
    sizes: FxHashMap<BufferSlot, u64>,

    /// Largest single allocation the device accepts
    max_buffer_size: u64,

    reallocations: u64,
}

impl BufferAllocations {
    pub fn new(max_buffer_size: u64) -> Self {
        Self {
            sizes: FxHashMap::default(),
            max_buffer_size,
            reallocations: 0,
        }
    }

    /// Current allocation of `slot` in bytes, 0 when never allocated
    pub fn size(&self, slot: BufferSlot) -> u64 {
        self.sizes.get(&slot).copied().unwrap_or(0)
    }

    /// Returns the new size when `slot` has to be (re)created to hold `required` bytes
    pub fn grow(&mut self, slot: BufferSlot, required: u64) -> Result<Option<u64>, BackendError> {
        let required = align_to_word(required).max(MIN_GPU_ALLOCATION);
        let current = self.size(slot);
        if required <= current {
            return Ok(None);
        }

        if required > self.max_buffer_size {
            return Err(BackendError::BufferTooLarge {
                slot,
                requested: required,
                limit: self.max_buffer_size,
            });
        }

        log::trace!(
            "[BufferAllocations::grow] {} {} -> {} bytes",
            slot.label(),
            current,
            required
        );

        self.sizes.insert(slot, required);
        self.reallocations += 1;
        Ok(Some(required))
    }

    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    pub fn total_bytes(&self) -> u64 {
        self.sizes.values().sum()
    }

    pub fn max_buffer_size(&self) -> u64 {
        self.max_buffer_size
    }
}

fn align_to_word(size: u64) -> u64 {
    (size + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_only() {
        let mut allocations = BufferAllocations::new(1 << 20);

        assert_eq!(allocations.grow(BufferSlot::OutVertices, 160).unwrap(), Some(160));
        assert_eq!(allocations.grow(BufferSlot::OutVertices, 64).unwrap(), None);
        assert_eq!(allocations.grow(BufferSlot::OutVertices, 160).unwrap(), None);
        assert_eq!(allocations.grow(BufferSlot::OutVertices, 320).unwrap(), Some(320));

        assert_eq!(allocations.size(BufferSlot::OutVertices), 320);
        assert_eq!(allocations.reallocations(), 2);
    }

    #[test]
    fn test_empty_slot_gets_minimum_allocation() {
        let mut allocations = BufferAllocations::new(1 << 20);
        assert_eq!(
            allocations.grow(BufferSlot::TempUvs, 0).unwrap(),
            Some(MIN_GPU_ALLOCATION)
        );
    }

    #[test]
    fn test_over_limit_is_rejected() {
        let mut allocations = BufferAllocations::new(1024);
        let err = allocations.grow(BufferSlot::SceneVertices, 4096).unwrap_err();
        assert!(matches!(err, BackendError::BufferTooLarge { limit: 1024, .. }));
        assert_eq!(allocations.size(BufferSlot::SceneVertices), 0);
    }
}
