//! Runs the frame pipeline over a synthetic tiled scene
//!
//! Usage: frame_pipeline_demo [config.toml] [frames]

use std::path::PathBuf;

use anyhow::Context;
use glam::IVec3;

use scene_geometry::{
    BackendFactory, CameraState, ClipRect, CpuComputeBackend, DrawParams, FaultInjector,
    FramePipeline, Model, ModelGeometry, PipelineConfig, Renderable, SceneBuffer, SceneSource,
    TileDraw, WgpuComputeBackend,
};

const GRID: i32 = 16;

/// Flat terrain grid with a ring of static props
struct TiledScene {
    tiles: Vec<TileDraw>,
    props: Vec<(Model, DrawParams)>,
}

impl TiledScene {
    fn new() -> Self {
        let props = (0..8)
            .map(|i| {
                let model = Model::transient(pyramid(40 + i * 8));
                let params = DrawParams::at(i * 96 - 384, 0, 1200).with_orientation(i * 256);
                (model, params)
            })
            .collect();

        Self {
            tiles: Vec::new(),
            props,
        }
    }
}

impl SceneSource for TiledScene {
    fn upload(&mut self, scene: &mut SceneBuffer) {
        self.tiles.clear();
        for tile_z in 0..GRID {
            for tile_x in 0..GRID {
                let surface = tile_quad(0);
                let underwater = (tile_x + tile_z) % 5 == 0;
                let water = tile_quad(-32);
                let tile = scene.push_tile(tile_x, tile_z, &surface, underwater.then_some(&water));
                self.tiles.push(tile);
            }
        }

        for (model, _) in &mut self.props {
            scene.push_model(model);
        }
    }
}

/// Two triangles covering one tile
fn tile_quad(height: i32) -> ModelGeometry {
    let colour = 0x3a_7d_44;
    let vertices = vec![
        [0, height, 0, colour],
        [128, height, 0, colour],
        [128, height, 128, colour],
        [0, height, 0, colour],
        [128, height, 128, colour],
        [0, height, 128, colour],
    ];
    let uvs = vec![[1.0, 0.0, 0.0, 0.0]; vertices.len()];
    ModelGeometry::from_vertices(vertices).with_uvs(uvs)
}

/// Four-sided pyramid of the given half-width
fn pyramid(size: i32) -> ModelGeometry {
    let apex = [0, -size * 2, 0, 0xff_ff_ff];
    let corners = [
        [-size, 0, -size, 0x80_80_80],
        [size, 0, -size, 0x80_80_80],
        [size, 0, size, 0x80_80_80],
        [-size, 0, size, 0x80_80_80],
    ];

    let mut vertices = Vec::with_capacity(12);
    for i in 0..4 {
        vertices.push(corners[i]);
        vertices.push(corners[(i + 1) % 4]);
        vertices.push(apex);
    }
    ModelGeometry::from_vertices(vertices)
}

fn backend_factory(config: &PipelineConfig) -> Box<dyn BackendFactory> {
    match WgpuComputeBackend::request(&config.backend) {
        Ok(backend) => {
            log::info!("Compute device available; using wgpu backend");
            drop(backend);
            WgpuComputeBackend::factory()
        }
        Err(e) => {
            log::warn!("No usable compute device ({}); falling back to the CPU backend", e);
            CpuComputeBackend::factory(FaultInjector::new())
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let path = PathBuf::from(path);
            PipelineConfig::load(&path).with_context(|| format!("loading {:?}", path))?
        }
        None => PipelineConfig::default(),
    };
    let frames: u32 = match args.next() {
        Some(raw) => raw.parse().context("frame count")?,
        None => 10,
    };

    let factory = backend_factory(&config);
    let mut pipeline = FramePipeline::new(config, factory, TiledScene::new())?;
    let clip = ClipRect::centered(1280, 720);

    for frame in 0..frames {
        let yaw = (frame as i32 * 16) % 2048;
        let camera = CameraState::from_angles(yaw, 128, 512, clip, IVec3::new(GRID * 64, 0, 0));

        // Animated crowd: identical geometry so every copy after the first reuses one push
        let mut drawables: Vec<(Renderable, DrawParams)> = (0..24)
            .map(|i| {
                let params = DrawParams::at((i % 6) * 128 - 320, 0, 800 + (i / 6) * 128)
                    .with_orientation((frame as i32 * 32 + i * 64) % 2048);
                (Renderable::from(Model::transient(pyramid(24))), params)
            })
            .collect();

        drawables.extend(
            pipeline
                .scene_source()
                .props
                .iter()
                .map(|(model, params)| (Renderable::from(model.clone()), *params)),
        );

        let tiles = pipeline.scene_source().tiles.clone();
        let output = pipeline.render_frame(camera, &mut drawables, &tiles, &mut ())?;

        log::info!(
            "frame {}: {} vertices ({} bytes), tiers {}/{}/{}, {} drawn, {} culled, {} cache hits{}",
            frame,
            output.vertex_count,
            output.byte_len,
            output.tier_counts.unordered,
            output.tier_counts.small,
            output.tier_counts.large,
            output.stats.drawn(),
            output.stats.culled,
            output.stats.cache.hits,
            if output.best_effort { " (best effort)" } else { "" }
        );
    }

    log::info!(
        "Done: {} frames ({} fully dispatched), {} backend errors, {} restarts, {} reloads",
        pipeline.frame_number(),
        pipeline.frames_dispatched(),
        pipeline.health().error_count(),
        pipeline.restarts(),
        pipeline.reloads()
    );
    Ok(())
}
