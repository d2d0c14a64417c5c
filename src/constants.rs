// Scene Geometry Constants - SINGLE SOURCE OF TRUTH
//
// Constants shared by the CPU accumulation code and the WGSL compute passes.
// The WGSL side mirrors these values in renderer/shaders/face_sort.wgsl; a unit test in
// renderer/mod.rs checks that both agree.

/// Growable buffer sizing
pub mod buffers {
    /// Initial element capacity of every growable buffer
    pub const INITIAL_CAPACITY: usize = 65_536;

    /// Bytes per output vertex (each output element is an ivec4 or vec4)
    pub const OUTPUT_VERTEX_STRIDE: u64 = 16;

    /// Bytes of depth scratch per output triangle
    pub const DEPTH_SCRATCH_STRIDE: u64 = 4;

    /// Smallest allocation handed to a backend; zero-sized storage bindings are invalid
    pub const MIN_GPU_ALLOCATION: u64 = 16;
}

/// Triangle limits used for tiering
pub mod triangles {
    /// Maximum number of triangles the compute passes order per model
    pub const MAX_TRIANGLE: u32 = 6144;

    /// Models with at most this many triangles go to the small pass
    pub const SMALL_TRIANGLE_COUNT: u32 = 512;

    /// Vertices per triangle
    pub const VERTICES_PER_TRIANGLE: u32 = 3;
}

/// Work descriptor flag layout
pub mod descriptor_flags {
    /// Source geometry lives in the persistent scene buffer
    pub const SCENE_BUFFER: u32 = 0x8000_0000;

    /// Bit position of the packed model radius
    pub const RADIUS_SHIFT: u32 = 12;

    /// Mask of the radius bits once shifted down
    pub const RADIUS_MASK: u32 = 0x7_FFFF;

    /// Orientation occupies the low bits (0..2047 angle units)
    pub const ORIENTATION_MASK: u32 = 0x7FF;

    /// `buffer_offset & SKIP_MARKER == SKIP_MARKER` marks a model that must not be drawn
    pub const SKIP_MARKER: i32 = 0b11;

    /// Scene buffer offsets are stored shifted left by this amount
    pub const OFFSET_SHIFT: i32 = 2;

    /// Source UV offset used when a model has no texture coordinates
    pub const NO_UVS: i32 = -1;
}

/// Fixed-point camera math (16.16) and the 2048-unit angle circle
pub mod camera_constants {
    /// Fixed-point shift used by the projection math
    pub const FIXED_SHIFT: u32 = 16;

    /// 1.0 in 16.16 fixed point
    pub const FIXED_ONE: i32 = 1 << FIXED_SHIFT;

    /// Angle units in a full turn
    pub const ANGLE_UNITS: i32 = 2048;

    /// Models whose projected depth is not beyond this are never visible
    pub const MIN_VISIBLE_DEPTH: i64 = 50;
}

/// Scene/tile geometry
pub mod scene {
    /// Local units per terrain tile edge
    pub const LOCAL_TILE_SIZE: i32 = 128;
}

/// Frame lifecycle timing
pub mod frame {
    /// Gap after which the host is assumed to have been suspended
    pub const SUSPEND_THRESHOLD_SECS: u64 = 60;

    /// Restart attempts before the pipeline disables itself
    pub const MAX_RECOVERY_ATTEMPTS: usize = 3;
}

/// Compute pass shapes
pub mod compute {
    /// Threads per workgroup for the unordered pass
    pub const UNORDERED_WORKGROUP_SIZE: u32 = 64;

    /// Threads per workgroup for the small and large sorting passes
    pub const SORT_WORKGROUP_SIZE: u32 = 256;

    /// Storage buffers bound by every pass; the uniform block takes one more binding
    pub const STORAGE_BINDINGS: u32 = 11;
}
