//! Persistent scene geometry
//!
//! Filled once per scene (re)load by a [`SceneSource`], then read-only while frames render.
//! Every upload gets a fresh scene id so models placed by an older upload fall back to the
//! transient path instead of reading stale offsets.

use crate::constants::descriptor_flags::NO_UVS;
use crate::memory::{NormalBuffer, UvBuffer, VertexBuffer};

use super::model::{Model, ModelGeometry, ScenePlacement, TileDraw};

/// Supplies static scene geometry whenever the scene is (re)loaded
pub trait SceneSource {
    /// Push every static model and terrain tile into `scene`
    fn upload(&mut self, scene: &mut SceneBuffer);
}

/// A scene with nothing in it
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyScene;

impl SceneSource for EmptyScene {
    fn upload(&mut self, _scene: &mut SceneBuffer) {}
}

pub struct SceneBuffer {
    vertices: VertexBuffer,
    uvs: UvBuffer,
    normals: NormalBuffer,

    /// Id of the loaded scene, `None` when invalidated
    scene_id: Option<u32>,

    /// Id handed to the next upload
    next_scene_id: u32,
}

impl SceneBuffer {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            vertices: VertexBuffer::with_capacity("scene vertices", initial_capacity),
            uvs: UvBuffer::with_capacity("scene uvs", initial_capacity),
            normals: NormalBuffer::with_capacity("scene normals", initial_capacity),
            scene_id: None,
            next_scene_id: 1,
        }
    }

    /// Clear all channels and assign a new scene id
    pub fn begin_upload(&mut self) -> u32 {
        self.vertices.clear();
        self.uvs.clear();
        self.normals.clear();

        let scene_id = self.next_scene_id;
        self.next_scene_id = self.next_scene_id.wrapping_add(1).max(1);
        self.scene_id = Some(scene_id);
        scene_id
    }

    /// Flip all channels for upload to the backend
    pub fn finish_upload(&mut self) {
        self.vertices.flip();
        self.uvs.flip();
        self.normals.flip();

        log::info!(
            "[SceneBuffer::finish_upload] Scene {:?}: {} vertices, {} uvs",
            self.scene_id,
            self.vertices.len(),
            self.uvs.len()
        );
    }

    /// Forget the loaded scene
    pub fn invalidate(&mut self) {
        self.vertices.clear();
        self.uvs.clear();
        self.normals.clear();
        self.scene_id = None;
    }

    pub fn scene_id(&self) -> Option<u32> {
        self.scene_id
    }

    /// Append a model's geometry and mark the model as resident in this scene
    pub fn push_model(&mut self, model: &mut Model) -> ScenePlacement {
        let placement = self.push_geometry(model.geometry(), false);
        model.place_in_scene(placement);
        placement
    }

    /// Append a terrain tile. An underwater copy must match the surface vertex count and is
    /// stored directly after it.
    pub fn push_tile(
        &mut self,
        tile_x: i32,
        tile_z: i32,
        surface: &ModelGeometry,
        underwater: Option<&ModelGeometry>,
    ) -> TileDraw {
        let underwater = underwater.filter(|copy| {
            let matches = copy.vertices.len() == surface.vertices.len();
            if !matches {
                log::warn!(
                    "[SceneBuffer::push_tile] Tile ({}, {}) underwater copy has {} vertices, surface has {}; dropped",
                    tile_x,
                    tile_z,
                    copy.vertices.len(),
                    surface.vertices.len()
                );
            }
            matches
        });

        let placement = self.push_geometry(surface, true);
        let mut total_len = surface.vertices.len() as i32;
        if let Some(copy) = underwater {
            self.push_geometry(copy, true);
            total_len *= 2;
        }

        TileDraw {
            buffer_offset: placement.vertex_offset,
            uv_buffer_offset: placement.uv_offset,
            packed_len: (total_len << 1) | i32::from(underwater.is_some()),
            tile_x,
            tile_z,
        }
    }

    fn push_geometry(&mut self, geometry: &ModelGeometry, parallel_uvs: bool) -> ScenePlacement {
        let vertex_offset = self.vertices.position() as i32;
        let vertex_count = geometry.vertices.len();

        self.vertices.write(&geometry.vertices);
        self.normals.write(&geometry.normals[..geometry.normals.len().min(vertex_count)]);
        while self.normals.position() < self.vertices.position() {
            self.normals.put([0.0; 4]);
        }

        let uv_offset = if geometry.has_uvs() || parallel_uvs {
            let offset = self.uvs.position() as i32;
            let written = geometry.uvs.len().min(vertex_count);
            self.uvs.write(&geometry.uvs[..written]);
            for _ in written..vertex_count {
                self.uvs.put([0.0; 4]);
            }
            offset
        } else {
            NO_UVS
        };

        ScenePlacement {
            scene_id: self.scene_id.unwrap_or(0),
            vertex_offset,
            uv_offset,
        }
    }

    pub fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    pub fn uvs(&self) -> &UvBuffer {
        &self.uvs
    }

    pub fn normals(&self) -> &NormalBuffer {
        &self.normals
    }
}
