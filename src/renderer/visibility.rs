//! Camera state and bounding-cylinder visibility
//!
//! All projection math runs in 16.16 fixed point on a 2048-unit angle circle. The test is
//! conservative: a model is culled only when its bounding cylinder cannot overlap the clip
//! rectangle.

use glam::IVec3;

use crate::constants::camera_constants::{ANGLE_UNITS, FIXED_ONE, FIXED_SHIFT, MIN_VISIBLE_DEPTH};
use crate::memory::PackedVertex;

/// Radians per angle unit
pub const ANGLE_UNIT_RADIANS: f32 = std::f32::consts::PI / 1024.0;

/// 16.16 sine of an angle in 2048-unit space
pub fn fixed_sin(angle: i32) -> i32 {
    let angle = angle.rem_euclid(ANGLE_UNITS);
    (FIXED_ONE as f32 * (angle as f32 * ANGLE_UNIT_RADIANS).sin()) as i32
}

/// 16.16 cosine of an angle in 2048-unit space
pub fn fixed_cos(angle: i32) -> i32 {
    let angle = angle.rem_euclid(ANGLE_UNITS);
    (FIXED_ONE as f32 * (angle as f32 * ANGLE_UNIT_RADIANS).cos()) as i32
}

/// Vertical bounding cylinder of a model in model space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundsCylinder {
    /// Largest horizontal (XZ) distance from the model origin
    pub radius: i32,

    /// Largest y (models grow towards negative y)
    pub bottom_y: i32,

    /// Negated smallest y
    pub model_height: i32,

    /// Distance from the origin to the cylinder rim at full height
    pub xyz_mag: i32,
}

impl BoundsCylinder {
    /// Compute bounds from face-expanded vertices
    pub fn from_vertices(vertices: &[PackedVertex]) -> Self {
        let mut radius_squared: i64 = 0;
        let mut bottom_y = 0;
        let mut top_y = 0;

        for vertex in vertices {
            let (x, y, z) = (vertex[0] as i64, vertex[1], vertex[2] as i64);
            radius_squared = radius_squared.max(x * x + z * z);
            bottom_y = bottom_y.max(y);
            top_y = top_y.min(y);
        }

        let radius = (radius_squared as f64).sqrt().ceil() as i32;
        let model_height = -top_y;
        let xyz_mag = ((radius as f64).powi(2) + (model_height as f64).powi(2))
            .sqrt()
            .ceil() as i32;

        Self {
            radius,
            bottom_y,
            model_height,
            xyz_mag,
        }
    }
}

/// Screen-space clip rectangle expressed relative to the projection centre
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub mid_x2: i32,
    pub negative_mid_x: i32,
    pub negative_mid_y: i32,
    pub mid_y2: i32,
}

impl ClipRect {
    /// Clip rectangle of a viewport projected around its centre
    pub fn centered(width: u32, height: u32) -> Self {
        let center_x = (width / 2) as i32;
        let center_y = (height / 2) as i32;
        Self {
            mid_x2: width as i32 - center_x,
            negative_mid_x: -center_x,
            negative_mid_y: -center_y,
            mid_y2: height as i32 - center_y,
        }
    }

    pub fn center_x(&self) -> i32 {
        -self.negative_mid_x
    }

    pub fn center_y(&self) -> i32 {
        -self.negative_mid_y
    }
}

/// Per-frame camera snapshot consumed by the classifier and the compute passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    /// Yaw in angle units
    pub yaw: i32,

    /// Pitch in angle units
    pub pitch: i32,

    /// Projection scale
    pub zoom: i32,

    pub yaw_sin: i32,
    pub yaw_cos: i32,
    pub pitch_sin: i32,
    pub pitch_cos: i32,

    pub clip: ClipRect,

    /// Camera position in world units; descriptors carry `relative + position`
    pub position: IVec3,
}

impl CameraState {
    pub fn from_angles(yaw: i32, pitch: i32, zoom: i32, clip: ClipRect, position: IVec3) -> Self {
        Self {
            yaw,
            pitch,
            zoom,
            yaw_sin: fixed_sin(yaw),
            yaw_cos: fixed_cos(yaw),
            pitch_sin: fixed_sin(pitch),
            pitch_cos: fixed_cos(pitch),
            clip,
            position,
        }
    }

    /// Level camera at the origin with an empty viewport
    pub fn origin() -> Self {
        Self::from_angles(0, 0, 0, ClipRect::centered(0, 0), IVec3::ZERO)
    }

    /// Bounding-cylinder test for a model at a camera-relative position.
    ///
    /// `halve_zoom` widens acceptance for shadow casters outside the view.
    pub fn is_visible(&self, bounds: &BoundsCylinder, relative: IVec3, halve_zoom: bool) -> bool {
        let zoom = if halve_zoom { self.zoom / 2 } else { self.zoom } as i64;
        let (x, y, z) = (relative.x as i64, relative.y as i64, relative.z as i64);
        let (yaw_sin, yaw_cos) = (self.yaw_sin as i64, self.yaw_cos as i64);
        let (pitch_sin, pitch_cos) = (self.pitch_sin as i64, self.pitch_cos as i64);
        let xyz_mag = bounds.xyz_mag as i64;

        let rotated_z = (yaw_cos * z - yaw_sin * x) >> FIXED_SHIFT;
        let center_depth = (pitch_sin * y + pitch_cos * rotated_z) >> FIXED_SHIFT;
        let depth = center_depth + ((pitch_cos * xyz_mag) >> FIXED_SHIFT);
        if depth <= MIN_VISIBLE_DEPTH {
            return false;
        }

        let clip = &self.clip;
        let rx = (z * yaw_sin + yaw_cos * x) >> FIXED_SHIFT;
        if (rx - xyz_mag) * zoom / depth >= clip.mid_x2 as i64 {
            return false;
        }
        if (rx + xyz_mag) * zoom / depth <= clip.negative_mid_x as i64 {
            return false;
        }

        let ry = (pitch_cos * y - rotated_z * pitch_sin) >> FIXED_SHIFT;
        let y_extent = (pitch_sin * xyz_mag) >> FIXED_SHIFT;
        let y_bottom = ((pitch_cos * bounds.bottom_y as i64) >> FIXED_SHIFT) + y_extent;
        if (ry + y_bottom) * zoom / depth <= clip.negative_mid_y as i64 {
            return false;
        }

        let y_top = ((pitch_cos * bounds.model_height as i64) >> FIXED_SHIFT) + y_extent;
        (ry - y_top) * zoom / depth < clip.mid_y2 as i64
    }
}
