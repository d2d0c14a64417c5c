//! Host-side memory for frame geometry
//!
//! Growable buffers that collect vertex, UV, normal and work-descriptor data before it is
//! handed to a compute backend.

pub mod growable_buffer;

pub use growable_buffer::{BufferMode, GrowableBuffer};

/// Packed position channel element: x, y, z, colour
pub type PackedVertex = [i32; 4];

/// Packed texture channel element: material, u, v, pad
pub type PackedUv = [f32; 4];

/// Packed normal channel element: nx, ny, nz, pad
pub type PackedNormal = [f32; 4];

/// Position channel buffer
pub type VertexBuffer = GrowableBuffer<PackedVertex>;

/// Texture coordinate channel buffer
pub type UvBuffer = GrowableBuffer<PackedUv>;

/// Normal channel buffer
pub type NormalBuffer = GrowableBuffer<PackedNormal>;
