//! Drawable geometry handed to the classifier

use std::borrow::Cow;

use crate::constants::descriptor_flags::{NO_UVS, OFFSET_SHIFT, SKIP_MARKER};
use crate::constants::triangles::VERTICES_PER_TRIANGLE;
use crate::memory::{PackedNormal, PackedUv, PackedVertex};

use super::visibility::BoundsCylinder;

/// Face-expanded geometry: three consecutive vertices per face.
///
/// `uvs` is either empty (untextured) or parallel to `vertices`. `normals` is always
/// parallel to `vertices`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelGeometry {
    pub vertices: Vec<PackedVertex>,
    pub uvs: Vec<PackedUv>,
    pub normals: Vec<PackedNormal>,
}

impl ModelGeometry {
    /// Build geometry from positions only; normals are zeroed and there are no UVs
    pub fn from_vertices(vertices: Vec<PackedVertex>) -> Self {
        let normals = vec![[0.0; 4]; vertices.len()];
        Self {
            vertices,
            uvs: Vec::new(),
            normals,
        }
    }

    pub fn with_uvs(mut self, uvs: Vec<PackedUv>) -> Self {
        self.uvs = uvs;
        self
    }

    pub fn with_normals(mut self, normals: Vec<PackedNormal>) -> Self {
        self.normals = normals;
        self
    }

    pub fn face_count(&self) -> u32 {
        self.vertices.len() as u32 / VERTICES_PER_TRIANGLE
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    /// Append another geometry, keeping the channels parallel
    pub fn append(&mut self, other: &ModelGeometry) {
        if self.has_uvs() || other.has_uvs() {
            self.uvs.resize(self.vertices.len(), [0.0; 4]);
            self.uvs.extend_from_slice(&other.uvs);
            self.uvs.resize(self.vertices.len() + other.vertices.len(), [0.0; 4]);
        }
        self.normals.resize(self.vertices.len(), [0.0; 4]);
        self.normals.extend_from_slice(&other.normals);
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.resize(self.vertices.len(), [0.0; 4]);
    }
}

/// Where a model's geometry landed in the scene buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenePlacement {
    pub scene_id: u32,
    pub vertex_offset: i32,
    /// `-1` when the model has no UVs
    pub uv_offset: i32,
}

/// A drawable model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    geometry: ModelGeometry,
    bounds: BoundsCylinder,

    /// Scene the geometry was uploaded into, if any
    scene_id: Option<u32>,

    /// `vertex_offset << 2`, low two bits are the skip marker
    buffer_offset: i32,

    uv_buffer_offset: i32,
}

impl Model {
    /// A model drawn from the per-frame buffers
    pub fn transient(geometry: ModelGeometry) -> Self {
        let bounds = BoundsCylinder::from_vertices(&geometry.vertices);
        Self {
            geometry,
            bounds,
            scene_id: None,
            buffer_offset: 0,
            uv_buffer_offset: NO_UVS,
        }
    }

    /// A model whose geometry already lives in the scene buffer
    pub fn scene_resident(geometry: ModelGeometry, placement: ScenePlacement) -> Self {
        let mut model = Self::transient(geometry);
        model.place_in_scene(placement);
        model
    }

    pub fn place_in_scene(&mut self, placement: ScenePlacement) {
        self.scene_id = Some(placement.scene_id);
        self.buffer_offset = placement.vertex_offset << OFFSET_SHIFT;
        self.uv_buffer_offset = placement.uv_offset;
    }

    /// Mark the model so the classifier drops it without emitting work
    pub fn mark_skipped(&mut self) {
        self.buffer_offset |= SKIP_MARKER;
    }

    pub fn is_marked_skipped(&self) -> bool {
        self.buffer_offset & SKIP_MARKER == SKIP_MARKER
    }

    pub fn geometry(&self) -> &ModelGeometry {
        &self.geometry
    }

    pub fn bounds(&self) -> &BoundsCylinder {
        &self.bounds
    }

    pub fn face_count(&self) -> u32 {
        self.geometry.face_count()
    }

    pub fn scene_id(&self) -> Option<u32> {
        self.scene_id
    }

    pub fn buffer_offset(&self) -> i32 {
        self.buffer_offset
    }

    /// Scene buffer vertex offset
    pub fn scene_vertex_offset(&self) -> i32 {
        self.buffer_offset >> OFFSET_SHIFT
    }

    pub fn uv_buffer_offset(&self) -> i32 {
        self.uv_buffer_offset
    }

    pub fn model_height(&self) -> i32 {
        self.bounds.model_height
    }
}

/// Several models drawn as one (an actor made of body parts, for example)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposedRenderable {
    pub parts: Vec<Model>,

    /// Updated from the merged model whenever it is resolved for drawing
    pub model_height: i32,
}

impl ComposedRenderable {
    pub fn new(parts: Vec<Model>) -> Self {
        Self {
            parts,
            model_height: 0,
        }
    }

    /// Merge all parts into one transient model
    pub fn merged_model(&self) -> Option<Model> {
        let mut geometry = ModelGeometry::default();
        for part in &self.parts {
            geometry.append(part.geometry());
        }

        if geometry.vertices.is_empty() {
            return None;
        }
        Some(Model::transient(geometry))
    }
}

/// Anything the scene traversal can ask to draw
#[derive(Debug, Clone, PartialEq)]
pub enum Renderable {
    Model(Model),
    Composed(ComposedRenderable),
}

impl Renderable {
    /// Resolve to the model that will actually be drawn.
    ///
    /// Composed renderables take the merged model's height.
    pub fn resolve_model(&mut self) -> Option<Cow<'_, Model>> {
        match self {
            Renderable::Model(model) => Some(Cow::Borrowed(model)),
            Renderable::Composed(composed) => {
                let merged = composed.merged_model()?;
                composed.model_height = merged.model_height();
                Some(Cow::Owned(merged))
            }
        }
    }
}

impl From<Model> for Renderable {
    fn from(model: Model) -> Self {
        Renderable::Model(model)
    }
}

/// Per-draw placement supplied by the scene traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawParams {
    /// Model yaw in angle units (0..2047)
    pub orientation: i32,

    /// Camera-relative position
    pub x: i32,
    pub y: i32,
    pub z: i32,

    /// Opaque click-target hash forwarded to the click sink
    pub hash: u64,
}

impl DrawParams {
    pub fn at(x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    pub fn with_orientation(mut self, orientation: i32) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn relative(&self) -> glam::IVec3 {
        glam::IVec3::new(self.x, self.y, self.z)
    }
}

/// A terrain tile stored in the scene buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDraw {
    /// Scene buffer vertex offset (not shifted)
    pub buffer_offset: i32,
    pub uv_buffer_offset: i32,

    /// `(vertex_len << 1) | underwater`; an underwater tile's length covers both copies
    pub packed_len: i32,

    pub tile_x: i32,
    pub tile_z: i32,
}

impl TileDraw {
    pub fn is_underwater(&self) -> bool {
        self.packed_len & 1 == 1
    }

    /// Vertex count of one copy of the tile
    pub fn vertex_len(&self) -> i32 {
        let len = self.packed_len >> 1;
        if self.is_underwater() {
            len / 2
        } else {
            len
        }
    }
}
