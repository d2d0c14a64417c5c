// Frame accumulation benchmarks
//
// Measures the host side of a frame: classification, dedup-cache lookups, growable buffer
// pushes and the CPU backend passes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::IVec3;

use scene_geometry::renderer::{
    batch_hash, DynamicModelCache, FrameAccumulator, FrameContext, ModelClassifier,
};
use scene_geometry::{
    CameraState, ClipRect, CpuComputeBackend, DrawParams, EmptyScene, FaultInjector,
    FramePipeline, Model, ModelGeometry, PipelineConfig, Renderable,
};

const DRAWABLE_COUNTS: &[usize] = &[100, 1000, 5000];

fn geometry(faces: usize, seed: i32) -> ModelGeometry {
    let vertices = (0..faces as i32)
        .flat_map(|face| {
            let z = (face * 31 + seed) % 63 - 31;
            [[-3, 0, z, seed], [3, 0, z, seed], [0, -5, z, seed]]
        })
        .collect();
    ModelGeometry::from_vertices(vertices)
}

fn camera() -> CameraState {
    CameraState::from_angles(0, 128, 512, ClipRect::centered(1280, 720), IVec3::ZERO)
}

/// `distinct` unique models repeated until `count` drawables
fn drawables(count: usize, distinct: usize) -> Vec<(Renderable, DrawParams)> {
    (0..count)
        .map(|i| {
            let model = Model::transient(geometry(64, (i % distinct) as i32));
            let params = DrawParams::at((i % 40) as i32 * 16 - 320, 0, 1500 + (i / 40) as i32 * 8);
            (Renderable::from(model), params)
        })
        .collect()
}

fn bench_classification(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let classifier = ModelClassifier::new(&config);
    let camera = camera();

    let mut group = c.benchmark_group("classify_transient");
    for &count in DRAWABLE_COUNTS {
        for distinct in [1, count] {
            let mut models = drawables(count, distinct);
            group.bench_with_input(
                BenchmarkId::new(format!("distinct_{}", if distinct == 1 { "one" } else { "all" }), count),
                &count,
                |b, _| {
                    let mut accumulator = FrameAccumulator::new(config.initial_capacity);
                    let mut cache = DynamicModelCache::new();
                    let mut frame_number = 0;
                    b.iter(|| {
                        frame_number += 1;
                        accumulator.begin_frame();
                        cache.begin_frame(frame_number);
                        let mut frame = FrameContext {
                            camera: &camera,
                            scene_id: None,
                            accumulator: &mut accumulator,
                            cache: &mut cache,
                            clicks: &mut (),
                        };
                        for (renderable, params) in models.iter_mut() {
                            black_box(classifier.classify(renderable, params, &mut frame));
                        }
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_batch_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_hash");
    for faces in [64usize, 512, 6144] {
        let model = geometry(faces, 7);
        group.bench_with_input(BenchmarkId::from_parameter(faces), &model, |b, model| {
            b.iter(|| black_box(batch_hash(model)));
        });
    }
    group.finish();
}

fn bench_cpu_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpu_backend_frame");
    group.sample_size(20);
    for &count in &DRAWABLE_COUNTS[..2] {
        let mut models = drawables(count, count / 10);
        let mut pipeline = match FramePipeline::new(
            PipelineConfig::default(),
            CpuComputeBackend::factory(FaultInjector::new()),
            EmptyScene,
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => panic!("pipeline setup failed: {}", e),
        };

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let output = pipeline.render_frame(camera(), &mut models, &[], &mut ());
                black_box(output.map(|o| o.vertex_count).unwrap_or(0))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classification, bench_batch_hash, bench_cpu_frame);
criterion_main!(benches);
