//! Growable native buffers
//!
//! A contiguous, zero-initialised element array with a write cursor. Capacity only ever
//! doubles; clearing keeps the allocation so steady-state frames never reallocate.
//! Any slice borrowed from a buffer is tied to that borrow, so a growth (which swaps the
//! backing allocation) cannot leave a stale view behind.

use bytemuck::Pod;

use crate::constants::buffers::INITIAL_CAPACITY;

/// Whether the buffer is being filled or has been flipped for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    Write,
    Read,
}

/// Auto-doubling buffer of plain-old-data elements
pub struct GrowableBuffer<T: Pod> {
    /// Backing storage; `storage.len()` is the capacity
    storage: Vec<T>,

    /// Write cursor, always `<= storage.len()`
    position: usize,

    mode: BufferMode,

    /// Number of reallocations since creation
    growth_count: u32,

    /// Name used in diagnostics
    label: &'static str,
}

impl<T: Pod> GrowableBuffer<T> {
    /// Create a buffer with the default initial capacity
    pub fn new(label: &'static str) -> Self {
        Self::with_capacity(label, INITIAL_CAPACITY)
    }

    /// Create a buffer with an explicit initial capacity (at least one element)
    pub fn with_capacity(label: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: allocate_zeroed(label, capacity),
            position: 0,
            mode: BufferMode::Write,
            growth_count: 0,
            label,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of written elements
    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    pub fn growth_count(&self) -> u32 {
        self.growth_count
    }

    /// Guarantee room for `additional` more elements, doubling capacity as often as needed
    pub fn ensure_capacity(&mut self, additional: usize) -> &mut Self {
        let Some(required) = self.position.checked_add(additional) else {
            abort_on_exhaustion(self.label, usize::MAX);
        };

        if required > self.capacity() {
            let mut capacity = self.capacity();
            while capacity < required {
                capacity = match capacity.checked_mul(2) {
                    Some(doubled) => doubled,
                    None => abort_on_exhaustion(self.label, required),
                };
            }
            self.reallocate(capacity);
        }

        self
    }

    /// Append elements, growing if needed
    pub fn write(&mut self, elements: &[T]) -> &mut Self {
        self.reopen_if_flipped();
        self.ensure_capacity(elements.len());

        let end = self.position + elements.len();
        self.storage[self.position..end].copy_from_slice(elements);
        self.position = end;
        self
    }

    /// Append a single element
    pub fn put(&mut self, element: T) -> &mut Self {
        self.reopen_if_flipped();
        self.ensure_capacity(1);

        self.storage[self.position] = element;
        self.position += 1;
        self
    }

    /// Switch to read mode; the readable region is `[0, position)`
    pub fn flip(&mut self) {
        self.mode = BufferMode::Read;
    }

    /// Reset the cursor for a new frame. Capacity is kept.
    pub fn clear(&mut self) {
        self.position = 0;
        self.mode = BufferMode::Write;
    }

    /// Written elements
    pub fn as_slice(&self) -> &[T] {
        &self.storage[..self.position]
    }

    /// Written elements as raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    /// Size of the written region in bytes
    pub fn byte_len(&self) -> u64 {
        (self.position * std::mem::size_of::<T>()) as u64
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    fn reopen_if_flipped(&mut self) {
        if self.mode == BufferMode::Read {
            log::warn!(
                "[GrowableBuffer::write] '{}' written after flip; appending after {} elements",
                self.label,
                self.position
            );
            self.mode = BufferMode::Write;
        }
    }

    fn reallocate(&mut self, capacity: usize) {
        let mut grown = allocate_zeroed::<T>(self.label, capacity);
        grown[..self.position].copy_from_slice(&self.storage[..self.position]);

        log::trace!(
            "[GrowableBuffer::reallocate] '{}' {} -> {} elements",
            self.label,
            self.storage.len(),
            capacity
        );

        self.storage = grown;
        self.growth_count += 1;
    }
}

impl<T: Pod> std::fmt::Debug for GrowableBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowableBuffer")
            .field("label", &self.label)
            .field("position", &self.position)
            .field("capacity", &self.capacity())
            .field("mode", &self.mode)
            .finish()
    }
}

fn allocate_zeroed<T: Pod>(label: &'static str, capacity: usize) -> Vec<T> {
    let mut storage = Vec::new();
    if storage.try_reserve_exact(capacity).is_err() {
        abort_on_exhaustion(label, capacity);
    }
    storage.resize(capacity, T::zeroed());
    storage
}

/// Host memory exhaustion is not recoverable for a frame pipeline
fn abort_on_exhaustion(label: &'static str, requested: usize) -> ! {
    log::error!(
        "[GrowableBuffer] Failed to allocate {} elements for '{}'; aborting",
        requested,
        label
    );
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_preserves_data() {
        let mut buffer = GrowableBuffer::<i32>::with_capacity("test", 4);
        let expected: Vec<i32> = (0..37).collect();

        for chunk in expected.chunks(5) {
            buffer.write(chunk);
        }

        assert_eq!(buffer.as_slice(), expected.as_slice());
        assert_eq!(buffer.capacity(), 64);
        assert_eq!(buffer.growth_count(), 4);
    }

    #[test]
    fn test_ensure_capacity_doubles_to_smallest_fit() {
        let mut buffer = GrowableBuffer::<f32>::with_capacity("test", 16);
        buffer.write(&[1.0; 10]);

        buffer.ensure_capacity(7);
        assert_eq!(buffer.capacity(), 32);

        buffer.ensure_capacity(100);
        assert_eq!(buffer.capacity(), 128);
        assert!(buffer.capacity() >= buffer.position() + 100);
        assert_eq!(buffer.position(), 10);
    }

    #[test]
    fn test_ensure_capacity_without_growth_is_noop() {
        let mut buffer = GrowableBuffer::<i32>::with_capacity("test", 8);
        buffer.ensure_capacity(8);
        assert_eq!(buffer.capacity(), 8);
        assert_eq!(buffer.growth_count(), 0);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = GrowableBuffer::<i32>::with_capacity("test", 2);
        buffer.write(&[1, 2, 3, 4, 5]);
        let capacity = buffer.capacity();

        buffer.clear();
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.capacity(), capacity);
    }

    #[test]
    fn test_clear_then_flip_is_empty() {
        let mut buffer = GrowableBuffer::<i32>::new("test");
        buffer.clear();
        buffer.flip();

        assert_eq!(buffer.mode(), BufferMode::Read);
        assert!(buffer.as_slice().is_empty());
        assert_eq!(buffer.byte_len(), 0);
    }

    #[test]
    fn test_write_after_flip_appends() {
        let mut buffer = GrowableBuffer::<i32>::new("test");
        buffer.write(&[1, 2]);
        buffer.flip();
        buffer.put(3);

        assert_eq!(buffer.mode(), BufferMode::Write);
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_array_elements_as_bytes() {
        let mut buffer = GrowableBuffer::<[i32; 4]>::with_capacity("vertices", 1);
        buffer.put([1, 2, 3, 4]).put([5, 6, 7, 8]);

        assert_eq!(buffer.as_bytes().len(), 32);
        assert_eq!(buffer.byte_len(), 32);
        assert_eq!(buffer.get(1), Some(&[5, 6, 7, 8]));
    }
}
