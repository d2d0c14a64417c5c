/// Face Ordering Tests
///
/// Checks the CPU backend output: every descriptor's range is written far-to-near,
/// ranges never overlap, and nothing outside a reserved range is touched.

use glam::IVec3;
use scene_geometry::gpu::{BufferSlot, DispatchPass};
use scene_geometry::renderer::{DescriptorFlags, FaceOrderer};
use scene_geometry::{
    CameraState, ClipRect, ComputeBackend, ComputeTier, CpuComputeBackend, DrawParams,
    FaultInjector, FramePipeline, Model, ModelGeometry, PipelineConfig, Renderable, SceneBuffer,
    SceneSource, WorkDescriptor,
};

struct NoScene;

impl SceneSource for NoScene {
    fn upload(&mut self, _scene: &mut SceneBuffer) {}
}

/// Faces at pseudo-random depths; `seed` keeps models distinct so none share a push
fn scattered_faces(count: usize, seed: i32) -> ModelGeometry {
    let vertices = (0..count as i32)
        .flat_map(|face| {
            let z = (face * 37 + seed * 11) % 97 - 48;
            let x = (face * 5 + seed) % 9 - 4;
            [[x, 0, z, face], [x + 1, -3, z + 1, face], [x - 1, -1, z - 1, face]]
        })
        .collect();
    ModelGeometry::from_vertices(vertices)
}

#[test]
fn test_each_descriptor_written_far_to_near() {
    let mut pipeline = FramePipeline::new(
        PipelineConfig::default(),
        CpuComputeBackend::factory(FaultInjector::new()),
        NoScene,
    )
    .unwrap();
    let camera = CameraState::from_angles(0, 0, 512, ClipRect::centered(800, 600), IVec3::ZERO);

    let sizes = [3usize, 40, 512, 513, 900];
    let mut drawables: Vec<(Renderable, DrawParams)> = sizes
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let model = Model::transient(scattered_faces(count, i as i32));
            (Renderable::from(model), DrawParams::at(i as i32 * 50, 0, 3000))
        })
        .collect();

    pipeline.begin_frame(camera).unwrap();
    for (renderable, params) in drawables.iter_mut() {
        pipeline.draw(renderable, params, &mut ()).unwrap();
    }
    pipeline.end_frame().unwrap();

    let mut descriptors: Vec<WorkDescriptor> = ComputeTier::ALL
        .iter()
        .flat_map(|&tier| pipeline.accumulator().descriptors(tier).as_slice().to_vec())
        .collect();
    descriptors.sort_by_key(|d| d.destination_offset);

    // Disjoint, contiguous destination ranges
    let mut next = 0;
    for descriptor in &descriptors {
        assert_eq!(descriptor.destination_offset, next);
        next += descriptor.triangle_count * 3;
    }

    let output = pipeline.dispatch().unwrap();
    assert_eq!(output.vertex_count, next);

    let geometry = pipeline.read_output().unwrap();
    let orderer = FaceOrderer::new(0, 0);
    for descriptor in &descriptors {
        let range = descriptor.destination_range();
        let faces: Vec<[[i32; 4]; 3]> = geometry.vertices[range.start as usize..range.end as usize]
            .chunks_exact(3)
            .map(|face| [face[0], face[1], face[2]])
            .collect();
        assert_eq!(faces.len(), descriptor.triangle_count as usize);

        let depths: Vec<i64> = faces.iter().map(|face| orderer.face_depth(face)).collect();
        assert!(
            depths.windows(2).all(|pair| pair[0] >= pair[1]),
            "descriptor at {} not ordered far-to-near",
            descriptor.destination_offset
        );
    }
}

#[test]
fn test_dispatch_writes_only_reserved_range() {
    let mut backend = CpuComputeBackend::new();
    let vertices: Vec<[i32; 4]> = (0..6).map(|i| [i, i, i + 10, 1]).collect();
    let descriptor = WorkDescriptor {
        source_vertex_offset: 3,
        source_uv_offset: -1,
        triangle_count: 1,
        destination_offset: 4,
        flags: DescriptorFlags::temp(0, 0).pack(),
        world_x: 0,
        world_y: 0,
        world_z: 0,
    };

    backend
        .upload(BufferSlot::TempVertices, bytemuck::cast_slice(&vertices))
        .unwrap();
    backend
        .upload(
            BufferSlot::Descriptors(ComputeTier::Small),
            bytemuck::bytes_of(&descriptor),
        )
        .unwrap();
    for slot in [BufferSlot::OutVertices, BufferSlot::OutUvs, BufferSlot::OutNormals] {
        backend.reserve(slot, 10 * 16).unwrap();
    }

    backend
        .dispatch(DispatchPass {
            tier: ComputeTier::Small,
            workgroups: 1,
        })
        .unwrap();
    backend.barrier().unwrap();

    let output = backend.read_output(10).unwrap();
    for (index, vertex) in output.vertices.iter().enumerate() {
        if (4..7).contains(&index) {
            assert_eq!(vertex[3], 1, "vertex {} should be written", index);
        } else {
            assert_eq!(*vertex, [0; 4], "vertex {} outside the reserved range", index);
        }
    }
    assert!(output.uvs.iter().all(|uv| *uv == [0.0; 4]));
}
