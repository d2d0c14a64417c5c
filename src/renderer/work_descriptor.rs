//! Work descriptors consumed by the compute passes
//!
//! Layout must match `ModelInfo` in shaders/face_sort.wgsl.

use bytemuck::{Pod, Zeroable};

use crate::constants::camera_constants::ANGLE_UNITS;
use crate::constants::descriptor_flags::{ORIENTATION_MASK, RADIUS_MASK, RADIUS_SHIFT, SCENE_BUFFER};

/// One unit of compute work: order `triangle_count` faces from a source range into a
/// reserved destination range
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WorkDescriptor {
    /// First source vertex (scene or temp buffer, see flags)
    pub source_vertex_offset: i32,

    /// First source UV, `-1` for untextured geometry
    pub source_uv_offset: i32,

    pub triangle_count: u32,

    /// First output vertex; the descriptor owns `triangle_count * 3` slots from here
    pub destination_offset: u32,

    pub flags: u32,

    /// World position added to every output vertex
    pub world_x: i32,
    pub world_y: i32,
    pub world_z: i32,
}

impl WorkDescriptor {
    pub fn flags(&self) -> DescriptorFlags {
        DescriptorFlags::unpack(self.flags)
    }

    /// Output vertex slots reserved by this descriptor
    pub fn destination_len(&self) -> u32 {
        self.triangle_count * 3
    }

    pub fn destination_range(&self) -> std::ops::Range<u32> {
        self.destination_offset..self.destination_offset + self.destination_len()
    }
}

/// Unpacked form of `WorkDescriptor::flags`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DescriptorFlags {
    pub scene_buffer: bool,
    pub radius: u32,
    pub orientation: u32,
}

impl DescriptorFlags {
    /// Radius saturates at the widest packable value; orientation wraps onto the circle
    pub fn scene(radius: i32, orientation: i32) -> Self {
        Self {
            scene_buffer: true,
            radius: (radius.max(0) as u32).min(RADIUS_MASK),
            orientation: orientation.rem_euclid(ANGLE_UNITS) as u32,
        }
    }

    pub fn temp(radius: i32, orientation: i32) -> Self {
        Self {
            scene_buffer: false,
            ..Self::scene(radius, orientation)
        }
    }

    pub fn pack(&self) -> u32 {
        let scene = if self.scene_buffer { SCENE_BUFFER } else { 0 };
        scene
            | (self.radius.min(RADIUS_MASK) << RADIUS_SHIFT)
            | (self.orientation & ORIENTATION_MASK)
    }

    pub fn unpack(flags: u32) -> Self {
        Self {
            scene_buffer: flags & SCENE_BUFFER != 0,
            radius: (flags >> RADIUS_SHIFT) & RADIUS_MASK,
            orientation: flags & ORIENTATION_MASK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_is_eight_words() {
        assert_eq!(std::mem::size_of::<WorkDescriptor>(), 32);
    }

    #[test]
    fn test_flag_layout() {
        let flags = DescriptorFlags::scene(100, 1536).pack();
        assert_eq!(flags, 0x8000_0000 | (100 << 12) | 1536);

        let unpacked = DescriptorFlags::unpack(flags);
        assert!(unpacked.scene_buffer);
        assert_eq!(unpacked.radius, 100);
        assert_eq!(unpacked.orientation, 1536);

        assert_eq!(DescriptorFlags::temp(1, 2).pack() & 0x8000_0000, 0);
    }

    #[test]
    fn test_out_of_range_fields_wrap_or_saturate() {
        let flags = DescriptorFlags::temp(0x10_0000, -256);
        assert_eq!(flags.radius, RADIUS_MASK);
        assert_eq!(flags.orientation, 1792);
        assert_eq!(DescriptorFlags::scene(-5, 2048 + 3).orientation, 3);

        let unpacked = DescriptorFlags::unpack(flags.pack());
        assert_eq!(unpacked.radius, RADIUS_MASK);
        assert_eq!(unpacked.orientation, 1792);
        assert!(!unpacked.scene_buffer);
    }

    #[test]
    fn test_destination_range() {
        let descriptor = WorkDescriptor {
            triangle_count: 10,
            destination_offset: 30,
            ..Default::default()
        };
        assert_eq!(descriptor.destination_range(), 30..60);
    }
}
