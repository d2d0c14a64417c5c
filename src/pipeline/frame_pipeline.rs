//! Frame-geometry pipeline
//!
//! Owns the scene buffer, the per-frame accumulator and cache, the classifier and the compute
//! backend, and walks every frame through `Idle -> Accumulating -> Flushed -> Dispatched`.
//! Scene reloads and backend restarts are only ever applied while `Idle`.

use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineErrorContext, PipelineResult};
use crate::gpu::{
    BackendFactory, ComputeBackend, ComputeDispatcher, ComputeUniforms, FrameWatchdog,
    GpuHealthMonitor, OutputGeometry,
};
use crate::renderer::{
    CameraState, Classification, ClickTargetSink, DrawParams, DynamicModelCache, FrameAccumulator,
    FrameContext, ModelClassifier, Renderable, SceneBuffer, SceneSource, TierCounts, TileDraw,
};

use super::frame_state::FrameState;
use super::reload::ReloadSignal;
use super::stats::FrameStats;

const NO_BACKEND: &str = "no backend";

/// Result of dispatching one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutput {
    /// Output vertices, three per triangle
    pub vertex_count: u32,

    /// Exactly `vertex_count * 16`
    pub byte_len: u64,

    pub tier_counts: TierCounts,

    /// A backend error hit this frame; output may be incomplete
    pub best_effort: bool,

    pub stats: FrameStats,
}

pub struct FramePipeline<S: SceneSource> {
    config: PipelineConfig,

    factory: Box<dyn BackendFactory>,

    /// `None` after a teardown whose recreation failed
    backend: Option<Box<dyn ComputeBackend>>,

    scene_source: S,
    scene: SceneBuffer,

    accumulator: FrameAccumulator,
    cache: DynamicModelCache,
    classifier: ModelClassifier,
    dispatcher: ComputeDispatcher,

    state: FrameState,
    camera: CameraState,
    frame_number: u64,
    stats: FrameStats,

    /// A backend error hit the current frame
    best_effort: bool,
    restart_pending: bool,
    disabled: bool,

    reload: ReloadSignal,
    watchdog: FrameWatchdog,
    health: GpuHealthMonitor,

    restarts: u64,
    reloads: u64,
}

impl<S: SceneSource> FramePipeline<S> {
    /// Create the backend and upload the initial scene
    pub fn new(
        config: PipelineConfig,
        mut factory: Box<dyn BackendFactory>,
        scene_source: S,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let mut backend = factory.create(&config.backend)?;
        log::info!("[FramePipeline::new] Using compute backend '{}'", backend.name());

        let dispatcher = ComputeDispatcher::new();
        let mut scene_source = scene_source;
        let mut scene = SceneBuffer::new(config.initial_capacity);
        load_scene(&mut scene_source, &mut scene);
        dispatcher.upload_scene(backend.as_mut(), &scene)?;

        Ok(Self {
            factory,
            backend: Some(backend),
            scene_source,
            scene,
            accumulator: FrameAccumulator::new(config.initial_capacity),
            cache: DynamicModelCache::new(),
            classifier: ModelClassifier::new(&config),
            dispatcher,
            state: FrameState::Idle,
            camera: CameraState::origin(),
            frame_number: 0,
            stats: FrameStats::default(),
            best_effort: false,
            restart_pending: false,
            disabled: false,
            reload: ReloadSignal::new(),
            watchdog: FrameWatchdog::new(config.suspend_threshold()),
            health: GpuHealthMonitor::new(config.max_recovery_attempts),
            restarts: 0,
            reloads: 0,
            config,
        })
    }

    pub fn begin_frame(&mut self, camera: CameraState) -> PipelineResult<()> {
        self.begin_frame_at(Instant::now(), camera)
    }

    /// Start accumulating a frame at wall-clock time `now`
    pub fn begin_frame_at(&mut self, now: Instant, camera: CameraState) -> PipelineResult<()> {
        self.expect_state("begin_frame", FrameState::Idle)?;
        if self.disabled {
            return Err(PipelineError::Disabled {
                attempts: self.health.recovery_attempts(),
            });
        }

        if self.watchdog.is_suspended(now) {
            log::warn!(
                "[FramePipeline::begin_frame] No frame for over {:?}; restarting backend",
                self.config.suspend_threshold()
            );
            self.restart_pending = true;
        }
        self.apply_idle_work(now)?;

        self.frame_number += 1;
        self.camera = camera;
        self.stats = FrameStats::default();
        self.best_effort = false;
        self.accumulator.begin_frame();
        self.cache.begin_frame(self.frame_number);

        let uniforms = ComputeUniforms::from_camera(&self.camera);
        let uploaded = self
            .backend
            .as_mut()
            .ok_or(NO_BACKEND)
            .backend_context("upload_uniforms")
            .and_then(|backend| self.dispatcher.upload_uniforms(backend.as_mut(), &uniforms));
        if let Err(e) = uploaded {
            self.record_backend_failure("begin_frame", &e, now);
        }

        self.advance();
        Ok(())
    }

    /// Classify one drawable and emit its descriptor
    pub fn draw(
        &mut self,
        renderable: &mut Renderable,
        params: &DrawParams,
        clicks: &mut dyn ClickTargetSink,
    ) -> PipelineResult<Classification> {
        self.expect_state("draw", FrameState::Accumulating)?;

        let mut frame = FrameContext {
            camera: &self.camera,
            scene_id: self.scene.scene_id(),
            accumulator: &mut self.accumulator,
            cache: &mut self.cache,
            clicks,
        };
        let classification = self.classifier.classify(renderable, params, &mut frame);

        self.stats.record(classification);
        Ok(classification)
    }

    /// Emit the descriptors of one terrain tile; returns how many were emitted
    pub fn draw_tile(&mut self, tile: &TileDraw) -> PipelineResult<u32> {
        self.expect_state("draw_tile", FrameState::Accumulating)?;

        let emitted = self.classifier.classify_tile(tile, &mut self.accumulator);
        self.stats.record_tile(emitted);
        Ok(emitted)
    }

    pub fn end_frame(&mut self) -> PipelineResult<()> {
        self.expect_state("end_frame", FrameState::Accumulating)?;

        self.accumulator.flip();
        self.stats.cache = self.cache.stats();
        self.advance();
        Ok(())
    }

    /// Upload the frame and run the compute passes
    ///
    /// A backend failure does not fail the call: the output is flagged best-effort and the
    /// backend is restarted once the frame completes.
    pub fn dispatch(&mut self) -> PipelineResult<FrameOutput> {
        self.dispatch_at(Instant::now())
    }

    pub fn dispatch_at(&mut self, now: Instant) -> PipelineResult<FrameOutput> {
        self.expect_state("dispatch", FrameState::Flushed)?;

        let result = self
            .backend
            .as_mut()
            .ok_or(NO_BACKEND)
            .backend_context("dispatch")
            .and_then(|backend| self.dispatcher.dispatch(backend.as_mut(), &self.accumulator));

        let mut output = FrameOutput {
            vertex_count: self.accumulator.output_vertex_count(),
            byte_len: self.accumulator.output_vertex_count() as u64
                * crate::constants::buffers::OUTPUT_VERTEX_STRIDE,
            tier_counts: self.accumulator.state().tier_counts,
            best_effort: false,
            stats: self.stats,
        };

        match result {
            Ok(summary) => {
                output.vertex_count = summary.vertex_count;
                output.byte_len = summary.byte_len;
            }
            Err(e) => self.record_backend_failure("dispatch", &e, now),
        }
        output.best_effort = self.best_effort;

        self.advance();
        Ok(output)
    }

    /// Copy the dispatched output back to the host
    pub fn read_output(&mut self) -> PipelineResult<OutputGeometry> {
        self.expect_state("read_output", FrameState::Dispatched)?;

        let vertex_count = self.accumulator.output_vertex_count();
        self.backend
            .as_mut()
            .ok_or(NO_BACKEND)
            .backend_context("read_output")?
            .read_output(vertex_count)
    }

    pub fn complete_frame(&mut self) -> PipelineResult<()> {
        self.complete_frame_at(Instant::now())
    }

    /// Return to `Idle` and apply any deferred reload or restart
    pub fn complete_frame_at(&mut self, now: Instant) -> PipelineResult<()> {
        self.expect_state("complete_frame", FrameState::Dispatched)?;

        if !self.best_effort {
            self.health.record_clean_frame();
        }
        self.watchdog.record_frame(now);
        self.accumulator.begin_frame();
        self.advance();

        self.apply_idle_work(now)
    }

    /// Run `begin_frame` through `complete_frame` with the drawables and tiles of one frame
    pub fn render_frame(
        &mut self,
        camera: CameraState,
        drawables: &mut [(Renderable, DrawParams)],
        tiles: &[TileDraw],
        clicks: &mut dyn ClickTargetSink,
    ) -> PipelineResult<FrameOutput> {
        self.begin_frame(camera)?;
        for tile in tiles {
            self.draw_tile(tile)?;
        }
        for (renderable, params) in drawables.iter_mut() {
            self.draw(renderable, params, clicks)?;
        }
        self.end_frame()?;
        let output = self.dispatch()?;
        self.complete_frame()?;
        Ok(output)
    }

    fn apply_idle_work(&mut self, now: Instant) -> PipelineResult<()> {
        if let Some(requested_at) = self.reload.take() {
            log::info!(
                "[FramePipeline] Applying scene reload requested {:?} ago",
                now.saturating_duration_since(requested_at)
            );
            self.reload_scene(now);
        }

        if self.restart_pending {
            self.restart_backend(now)?;
        }
        Ok(())
    }

    fn reload_scene(&mut self, now: Instant) {
        load_scene(&mut self.scene_source, &mut self.scene);
        self.reloads += 1;

        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = self.dispatcher.upload_scene(backend.as_mut(), &self.scene) {
                self.record_backend_failure("reload_scene", &e, now);
            }
        }
    }

    /// Drop the backend, create a new one and re-upload the scene
    fn restart_backend(&mut self, now: Instant) -> PipelineResult<()> {
        if !self.health.should_attempt_recovery() {
            self.disabled = true;
            return Err(PipelineError::Disabled {
                attempts: self.health.recovery_attempts(),
            });
        }

        self.health.record_recovery_attempt();
        self.restarts += 1;
        if let Some(failed_at) = self.health.last_error_time() {
            log::info!(
                "[FramePipeline::restart_backend] Restarting {:?} after the last backend error ({} total)",
                now.saturating_duration_since(failed_at),
                self.health.error_count()
            );
        }

        if let Some(backend) = self.backend.take() {
            log::info!("[FramePipeline::restart_backend] Tearing down '{}'", backend.name());
        }

        let restarted = self.factory.create(&self.config.backend).and_then(|mut backend| {
            self.dispatcher.upload_scene(backend.as_mut(), &self.scene)?;
            Ok(backend)
        });

        match restarted {
            Ok(backend) => {
                log::info!("[FramePipeline::restart_backend] Backend '{}' ready", backend.name());
                self.backend = Some(backend);
                self.restart_pending = false;
                Ok(())
            }
            Err(e) => {
                log::error!("[FramePipeline::restart_backend] Restart failed: {}", e);
                self.health.record_error(now);
                Err(e)
            }
        }
    }

    fn record_backend_failure(&mut self, operation: &str, error: &PipelineError, now: Instant) {
        log::error!(
            "[FramePipeline::{}] Backend failure, frame is best-effort: {}",
            operation,
            error
        );
        self.health.record_error(now);
        self.best_effort = true;
        if !self.restart_pending {
            log::warn!("[FramePipeline::{}] Backend restart scheduled", operation);
        }
        self.restart_pending = true;
    }

    fn advance(&mut self) {
        self.state = self.state.next();
    }

    fn expect_state(&self, operation: &'static str, expected: FrameState) -> PipelineResult<()> {
        if self.state != expected {
            return Err(PipelineError::FrameState {
                operation,
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Handle for requesting a scene reload from anywhere
    pub fn reload_signal(&self) -> ReloadSignal {
        self.reload.clone()
    }

    pub fn scene(&self) -> &SceneBuffer {
        &self.scene
    }

    pub fn scene_source(&self) -> &S {
        &self.scene_source
    }

    /// The host reaches the models placed by the latest upload through this
    pub fn scene_source_mut(&mut self) -> &mut S {
        &mut self.scene_source
    }

    pub fn accumulator(&self) -> &FrameAccumulator {
        &self.accumulator
    }

    pub fn backend(&self) -> Option<&dyn ComputeBackend> {
        self.backend.as_deref()
    }

    pub fn health(&self) -> &GpuHealthMonitor {
        &self.health
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Frames whose passes all completed; best-effort frames are not counted
    pub fn frames_dispatched(&self) -> u64 {
        self.dispatcher.frames_dispatched()
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart_pending
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }
}

fn load_scene<S: SceneSource>(source: &mut S, scene: &mut SceneBuffer) {
    scene.begin_upload();
    source.upload(scene);
    scene.finish_upload();
}
