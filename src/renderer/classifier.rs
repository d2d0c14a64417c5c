//! Per-drawable classification
//!
//! Every drawable ends up in exactly one of these states: dropped (empty, culled, skipped),
//! drawn from the scene buffer, pushed into the temp buffers, or drawn from a push made
//! earlier in the same frame.

use glam::IVec3;

use crate::config::PipelineConfig;
use crate::constants::descriptor_flags::NO_UVS;
use crate::constants::scene::LOCAL_TILE_SIZE;

use super::frame_accumulator::FrameAccumulator;
use super::model::{DrawParams, Model, Renderable, TileDraw};
use super::model_cache::{CacheLookup, DynamicModelCache};
use super::model_hasher::batch_hash;
use super::tiers::ComputeTier;
use super::visibility::CameraState;
use super::work_descriptor::{DescriptorFlags, WorkDescriptor};

/// Receives every drawable that survived culling, for mouse picking
pub trait ClickTargetSink {
    fn register(&mut self, model: &Model, params: &DrawParams, camera: &CameraState);
}

impl ClickTargetSink for () {
    fn register(&mut self, _model: &Model, _params: &DrawParams, _camera: &CameraState) {}
}

/// Outcome of classifying one drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No model or zero faces
    Empty,
    /// Bounding cylinder outside the view
    Culled,
    /// Carries the skip marker
    Skipped,
    /// Drawn from the scene buffer
    Scene { tier: ComputeTier },
    /// Geometry pushed into the temp buffers
    Pushed { tier: ComputeTier, truncated: bool },
    /// Reused a push from earlier in the frame
    Cached { tier: ComputeTier },
}

impl Classification {
    /// Tier of the emitted descriptor, if one was emitted
    pub fn tier(&self) -> Option<ComputeTier> {
        match *self {
            Classification::Scene { tier }
            | Classification::Pushed { tier, .. }
            | Classification::Cached { tier } => Some(tier),
            _ => None,
        }
    }
}

/// Mutable frame state a classification writes into
pub struct FrameContext<'a> {
    pub camera: &'a CameraState,
    /// Id of the loaded scene
    pub scene_id: Option<u32>,
    pub accumulator: &'a mut FrameAccumulator,
    pub cache: &'a mut DynamicModelCache,
    pub clicks: &'a mut dyn ClickTargetSink,
}

#[derive(Debug, Clone)]
pub struct ModelClassifier {
    max_triangles: u32,
    small_triangle_count: u32,
    model_batching: bool,
    halve_zoom: bool,
}

impl ModelClassifier {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            max_triangles: config.max_triangles,
            small_triangle_count: config.small_triangle_count,
            model_batching: config.model_batching,
            halve_zoom: config.expands_shadow_draw(),
        }
    }

    pub fn classify(
        &self,
        renderable: &mut Renderable,
        params: &DrawParams,
        frame: &mut FrameContext<'_>,
    ) -> Classification {
        let model = match renderable.resolve_model() {
            Some(model) if model.face_count() > 0 => model,
            _ => return Classification::Empty,
        };

        if !frame
            .camera
            .is_visible(model.bounds(), params.relative(), self.halve_zoom)
        {
            return Classification::Culled;
        }

        if model.is_marked_skipped() {
            return Classification::Skipped;
        }

        frame.clicks.register(&model, params, frame.camera);

        let world = params.relative() + frame.camera.position;
        let resident = model.scene_id().is_some() && model.scene_id() == frame.scene_id;
        if resident {
            self.emit_scene_model(&model, params, world, frame)
        } else {
            self.emit_transient_model(&model, params, world, frame)
        }
    }

    fn emit_scene_model(
        &self,
        model: &Model,
        params: &DrawParams,
        world: IVec3,
        frame: &mut FrameContext<'_>,
    ) -> Classification {
        let triangle_count = model.face_count().min(self.max_triangles);
        let tier = ComputeTier::for_triangles(triangle_count, self.small_triangle_count);

        frame.accumulator.emit(
            tier,
            WorkDescriptor {
                source_vertex_offset: model.scene_vertex_offset(),
                source_uv_offset: model.uv_buffer_offset(),
                triangle_count,
                destination_offset: 0,
                flags: DescriptorFlags::scene(model.bounds().radius, params.orientation).pack(),
                world_x: world.x,
                world_y: world.y,
                world_z: world.z,
            },
        );

        Classification::Scene { tier }
    }

    fn emit_transient_model(
        &self,
        model: &Model,
        params: &DrawParams,
        world: IVec3,
        frame: &mut FrameContext<'_>,
    ) -> Classification {
        let capped = model.face_count().min(self.max_triangles);
        let hash = batch_hash(model.geometry());

        let cached = if self.model_batching {
            match frame.cache.lookup(hash, capped) {
                CacheLookup::Hit(entry) => Some(entry),
                CacheLookup::Stale(entry) => {
                    log::trace!(
                        "[ModelClassifier::classify] Stale batch entry ({} vs {} triangles), pushing again",
                        entry.triangle_count,
                        capped
                    );
                    None
                }
                CacheLookup::Miss => None,
            }
        } else {
            None
        };

        let (source_vertex_offset, source_uv_offset, triangle_count, outcome) = match cached {
            Some(entry) => {
                let tier = ComputeTier::for_triangles(entry.triangle_count, self.small_triangle_count);
                (
                    entry.temp_vertex_offset,
                    entry.temp_uv_offset,
                    entry.triangle_count,
                    Classification::Cached { tier },
                )
            }
            None => {
                let pushed = frame.accumulator.push_geometry(model.geometry(), self.max_triangles);
                if self.model_batching {
                    frame.cache.insert(
                        hash,
                        pushed.vertex_offset,
                        pushed.uv_offset,
                        pushed.triangle_count,
                    );
                }
                let tier = ComputeTier::for_triangles(pushed.triangle_count, self.small_triangle_count);
                (
                    pushed.vertex_offset,
                    pushed.uv_offset,
                    pushed.triangle_count,
                    Classification::Pushed {
                        tier,
                        truncated: pushed.truncated,
                    },
                )
            }
        };

        if let Some(tier) = outcome.tier() {
            frame.accumulator.emit(
                tier,
                WorkDescriptor {
                    source_vertex_offset,
                    source_uv_offset,
                    triangle_count,
                    destination_offset: 0,
                    flags: DescriptorFlags::temp(model.bounds().radius, params.orientation).pack(),
                    world_x: world.x,
                    world_y: world.y,
                    world_z: world.z,
                },
            );
        }

        outcome
    }

    /// Emit the unordered descriptors for a terrain tile; returns how many were emitted.
    ///
    /// An underwater tile draws its underwater copy first.
    pub fn classify_tile(&self, tile: &TileDraw, accumulator: &mut FrameAccumulator) -> u32 {
        if tile.packed_len <= 0 {
            return 0;
        }

        let vertex_len = tile.vertex_len();
        let triangle_count = (vertex_len / 3) as u32;
        if triangle_count == 0 {
            return 0;
        }

        let tile_descriptor = |vertex_offset: i32, uv_offset: i32| WorkDescriptor {
            source_vertex_offset: vertex_offset,
            source_uv_offset: uv_offset,
            triangle_count,
            destination_offset: 0,
            flags: DescriptorFlags::scene(0, 0).pack(),
            world_x: tile.tile_x * LOCAL_TILE_SIZE,
            world_y: 0,
            world_z: tile.tile_z * LOCAL_TILE_SIZE,
        };

        let mut emitted = 0;
        if tile.is_underwater() {
            let uv_offset = if tile.uv_buffer_offset == NO_UVS {
                NO_UVS
            } else {
                tile.uv_buffer_offset + vertex_len
            };
            accumulator.emit(
                ComputeTier::Unordered,
                tile_descriptor(tile.buffer_offset + vertex_len, uv_offset),
            );
            emitted += 1;
        }

        accumulator.emit(
            ComputeTier::Unordered,
            tile_descriptor(tile.buffer_offset, tile.uv_buffer_offset),
        );
        emitted + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::model::{ModelGeometry, ScenePlacement};
    use crate::renderer::visibility::ClipRect;

    fn camera() -> CameraState {
        CameraState::from_angles(0, 0, 512, ClipRect::centered(800, 600), IVec3::new(1000, 0, 2000))
    }

    fn faces(count: usize, colour: i32) -> ModelGeometry {
        let mut vertices = Vec::with_capacity(count * 3);
        for i in 0..count as i32 {
            vertices.push([0, -(i % 50), 0, colour]);
            vertices.push([20, -(i % 50), 0, colour]);
            vertices.push([0, -(i % 50), 20, colour]);
        }
        ModelGeometry::from_vertices(vertices)
    }

    struct Harness {
        camera: CameraState,
        accumulator: FrameAccumulator,
        cache: DynamicModelCache,
        clicks: Vec<u64>,
    }

    impl ClickTargetSink for Vec<u64> {
        fn register(&mut self, _model: &Model, params: &DrawParams, _camera: &CameraState) {
            self.push(params.hash);
        }
    }

    impl Harness {
        fn new() -> Self {
            let mut cache = DynamicModelCache::new();
            cache.begin_frame(1);
            Self {
                camera: camera(),
                accumulator: FrameAccumulator::new(64),
                cache,
                clicks: Vec::new(),
            }
        }

        fn classify(
            &mut self,
            classifier: &ModelClassifier,
            renderable: &mut Renderable,
            params: DrawParams,
            scene_id: Option<u32>,
        ) -> Classification {
            let mut frame = FrameContext {
                camera: &self.camera,
                scene_id,
                accumulator: &mut self.accumulator,
                cache: &mut self.cache,
                clicks: &mut self.clicks,
            };
            classifier.classify(renderable, &params, &mut frame)
        }
    }

    fn in_front() -> DrawParams {
        DrawParams {
            hash: 9,
            ..DrawParams::at(0, 0, 800)
        }
    }

    #[test]
    fn test_empty_model_is_ignored() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut harness = Harness::new();
        let mut renderable = Renderable::Model(Model::transient(ModelGeometry::default()));

        let outcome = harness.classify(&classifier, &mut renderable, in_front(), None);
        assert_eq!(outcome, Classification::Empty);
        assert!(harness.clicks.is_empty());
    }

    #[test]
    fn test_culled_before_skip_and_click() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut harness = Harness::new();
        let mut model = Model::transient(faces(4, 1));
        model.mark_skipped();
        let mut renderable = Renderable::Model(model);

        let behind = DrawParams::at(0, 0, -800);
        assert_eq!(
            harness.classify(&classifier, &mut renderable, behind, None),
            Classification::Culled
        );
        assert_eq!(
            harness.classify(&classifier, &mut renderable, in_front(), None),
            Classification::Skipped
        );
        assert!(harness.clicks.is_empty());
        assert_eq!(harness.accumulator.output_vertex_count(), 0);
    }

    #[test]
    fn test_scene_model_descriptor() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut harness = Harness::new();
        let model = Model::scene_resident(
            faces(10, 1),
            ScenePlacement {
                scene_id: 4,
                vertex_offset: 120,
                uv_offset: 60,
            },
        );
        let radius = model.bounds().radius;
        let mut renderable = Renderable::Model(model);

        let params = in_front().with_orientation(256);
        let outcome = harness.classify(&classifier, &mut renderable, params, Some(4));
        assert_eq!(outcome, Classification::Scene { tier: ComputeTier::Small });
        assert_eq!(harness.clicks, vec![9]);

        let descriptor = harness.accumulator.descriptors(ComputeTier::Small).as_slice()[0];
        assert_eq!(descriptor.source_vertex_offset, 120);
        assert_eq!(descriptor.source_uv_offset, 60);
        assert_eq!(descriptor.triangle_count, 10);
        assert_eq!(descriptor.flags, DescriptorFlags::scene(radius, 256).pack());
        assert_eq!(
            (descriptor.world_x, descriptor.world_y, descriptor.world_z),
            (1000, 0, 2800)
        );
    }

    #[test]
    fn test_model_from_old_scene_is_transient() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut harness = Harness::new();
        let mut renderable = Renderable::Model(Model::scene_resident(
            faces(10, 1),
            ScenePlacement {
                scene_id: 3,
                vertex_offset: 0,
                uv_offset: -1,
            },
        ));

        let outcome = harness.classify(&classifier, &mut renderable, in_front(), Some(4));
        assert!(matches!(outcome, Classification::Pushed { .. }));
        assert_eq!(harness.accumulator.vertices().len(), 30);
    }

    #[test]
    fn test_identical_transients_share_one_push() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut harness = Harness::new();
        let mut first = Renderable::Model(Model::transient(faces(600, 5)));
        let mut second = first.clone();

        let a = harness.classify(&classifier, &mut first, in_front(), None);
        let b = harness.classify(&classifier, &mut second, in_front(), None);

        assert_eq!(
            a,
            Classification::Pushed {
                tier: ComputeTier::Large,
                truncated: false
            }
        );
        assert_eq!(b, Classification::Cached { tier: ComputeTier::Large });
        assert_eq!(harness.accumulator.vertices().len(), 1800);

        let large = harness.accumulator.descriptors(ComputeTier::Large).as_slice();
        assert_eq!(large[0].source_vertex_offset, large[1].source_vertex_offset);
        assert_eq!(large[0].destination_offset, 0);
        assert_eq!(large[1].destination_offset, 1800);
    }

    #[test]
    fn test_batching_disabled_pushes_every_copy() {
        let config = PipelineConfig {
            model_batching: false,
            ..Default::default()
        };
        let classifier = ModelClassifier::new(&config);
        let mut harness = Harness::new();
        let mut renderable = Renderable::Model(Model::transient(faces(4, 5)));

        harness.classify(&classifier, &mut renderable, in_front(), None);
        let second = harness.classify(&classifier, &mut renderable, in_front(), None);

        assert!(matches!(second, Classification::Pushed { .. }));
        assert_eq!(harness.accumulator.vertices().len(), 24);
        assert!(harness.cache.is_empty());
    }

    #[test]
    fn test_oversized_model_is_truncated() {
        let config = PipelineConfig {
            max_triangles: 700,
            ..Default::default()
        };
        let classifier = ModelClassifier::new(&config);
        let mut harness = Harness::new();
        let mut renderable = Renderable::Model(Model::transient(faces(800, 5)));

        let outcome = harness.classify(&classifier, &mut renderable, in_front(), None);
        assert_eq!(
            outcome,
            Classification::Pushed {
                tier: ComputeTier::Large,
                truncated: true
            }
        );
        assert_eq!(harness.accumulator.output_vertex_count(), 2100);
        assert_eq!(harness.accumulator.state().truncated_models, 1);
    }

    #[test]
    fn test_tiles_are_unordered_and_underwater_first() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut accumulator = FrameAccumulator::new(8);
        let tile = TileDraw {
            buffer_offset: 100,
            uv_buffer_offset: 40,
            packed_len: (12 << 1) | 1,
            tile_x: 3,
            tile_z: 5,
        };

        assert_eq!(classifier.classify_tile(&tile, &mut accumulator), 2);

        let unordered = accumulator.descriptors(ComputeTier::Unordered).as_slice();
        assert_eq!(unordered[0].source_vertex_offset, 106);
        assert_eq!(unordered[0].source_uv_offset, 46);
        assert_eq!(unordered[1].source_vertex_offset, 100);
        assert_eq!(unordered[1].triangle_count, 2);
        assert_eq!(unordered[1].flags, 0x8000_0000);
        assert_eq!((unordered[1].world_x, unordered[1].world_z), (384, 640));
        assert_eq!(accumulator.output_vertex_count(), 12);
    }

    #[test]
    fn test_large_tile_is_not_capped() {
        let config = PipelineConfig {
            max_triangles: 10,
            small_triangle_count: 5,
            ..Default::default()
        };
        let classifier = ModelClassifier::new(&config);
        let mut accumulator = FrameAccumulator::new(8);
        let tile = TileDraw {
            buffer_offset: 0,
            uv_buffer_offset: 0,
            packed_len: 300 << 1,
            tile_x: 0,
            tile_z: 0,
        };

        assert_eq!(classifier.classify_tile(&tile, &mut accumulator), 1);
        assert_eq!(
            accumulator.descriptors(ComputeTier::Unordered).as_slice()[0].triangle_count,
            100
        );
    }

    #[test]
    fn test_empty_tile_emits_nothing() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut accumulator = FrameAccumulator::new(8);
        let tile = TileDraw {
            buffer_offset: 0,
            uv_buffer_offset: 0,
            packed_len: 0,
            tile_x: 0,
            tile_z: 0,
        };
        assert_eq!(classifier.classify_tile(&tile, &mut accumulator), 0);
    }

    #[test]
    fn test_stale_entry_is_pushed_again_and_replaced() {
        let classifier = ModelClassifier::new(&PipelineConfig::default());
        let mut harness = Harness::new();
        let model = Model::transient(faces(10, 1));
        let hash = batch_hash(model.geometry());

        // An earlier push of the same content recorded a different triangle count
        let earlier = harness.accumulator.push_geometry(&faces(5, 2), 6144);
        harness
            .cache
            .insert(hash, earlier.vertex_offset, earlier.uv_offset, 7);

        let mut renderable = Renderable::Model(model);
        let outcome = harness.classify(&classifier, &mut renderable, in_front(), None);
        assert_eq!(
            outcome,
            Classification::Pushed {
                tier: ComputeTier::Small,
                truncated: false,
            }
        );
        assert_eq!(harness.cache.stats().stale, 1);
        assert_eq!(harness.accumulator.state().temp_vertex_offset, 45);

        let descriptor = harness.accumulator.descriptors(ComputeTier::Small).as_slice()[0];
        assert_eq!(descriptor.source_vertex_offset, 15);
        assert_eq!(descriptor.triangle_count, 10);

        match harness.cache.lookup(hash, 10) {
            CacheLookup::Hit(entry) => {
                assert_eq!(entry.temp_vertex_offset, 15);
                assert_eq!(entry.triangle_count, 10);
            }
            other => panic!("expected the replaced entry, got {:?}", other),
        }
    }
}
