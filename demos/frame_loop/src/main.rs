// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Headless frame loop driving the animator from a timer vsync source.
//!
//! The logic thread runs an [`Animator`] whose delegate builds a retained
//! background plus a square that moves every frame. Frames travel through
//! the pipeline to a raster thread that paints them onto a
//! [`RecordingCanvas`]. After the animation ends, one redraw of the last
//! tree is requested.
//!
//! Events from both threads are recorded into a shared
//! [`RecorderSink`]; pass a path as the first argument to export them as a
//! Chrome trace.

use std::fs::File;
use std::io::BufWriter;
use std::sync::{Arc, mpsc};
use std::thread;

use kurbo::{Affine, Rect, Shape, Size};
use parking_lot::Mutex;

use lamina_core::animator::{
    Animator, AnimatorConfig, AnimatorDelegate, AnimatorTask, BeginFrameArgs, FrameBuild,
    FramePipeline,
};
use lamina_core::canvas::{Color, Paint, RecordingCanvas};
use lamina_core::error::LaminaError;
use lamina_core::layer::{Layer, LayerTree};
use lamina_core::rasterizer::{RasterStatus, Rasterizer};
use lamina_core::task::TaskQueue;
use lamina_core::time::{Clock, Duration, HostTime, MonotonicClock};
use lamina_core::timing::FrameTimingsRecorder;
use lamina_core::trace::Tracer;
use lamina_core::vsync::TimerVsyncWaiter;

use lamina_debug::chrome;
use lamina_debug::recorder::RecorderSink;

const FRAME_COUNT: u64 = 60;
/// ≈60 Hz.
const REFRESH_INTERVAL: Duration = Duration::from_micros(16_667);
const FRAME_SIZE: Size = Size::new(800.0, 600.0);

enum RasterTask {
    Draw(Arc<FramePipeline>),
    DrawLast(FrameTimingsRecorder),
    Stop,
}

struct DemoDelegate {
    background: Arc<Layer>,
    previous_mover: Option<Arc<Layer>>,
    frames_built: u64,
    redraws: u64,
    idle_notifications: u64,
    raster: mpsc::Sender<RasterTask>,
}

impl DemoDelegate {
    fn new(raster: mpsc::Sender<RasterTask>) -> Self {
        let background = Layer::container()
            .with_children((0..4_u8).map(|i| {
                let x = f64::from(i) * 200.0;
                Layer::shape(
                    Rect::new(x, 0.0, x + 180.0, 600.0).to_path(0.1),
                    Paint::fill(Color::from_argb(255, 40, 40, 60 + 40 * i)),
                )
                .into_shared()
            }))
            .into_shared();
        Self {
            background,
            previous_mover: None,
            frames_built: 0,
            redraws: 0,
            idle_notifications: 0,
            raster,
        }
    }

    fn send(&self, task: RasterTask) {
        if self.raster.send(task).is_err() {
            tracing::warn!("raster thread is gone");
        }
    }
}

impl AnimatorDelegate for DemoDelegate {
    fn on_animator_begin_frame(&mut self, args: &BeginFrameArgs) -> FrameBuild {
        let step = self.frames_built as f64;
        let square = Layer::shape(
            Rect::new(0.0, 0.0, 64.0, 64.0).to_path(0.1),
            Paint::fill(Color::WHITE),
        )
        .into_shared();
        let mover = Layer::transform(Affine::translate((20.0 + step * 10.0, 268.0)))
            .with_child(square)
            .into_shared();

        let root = Layer::container()
            .with_children([Arc::clone(&self.background), Arc::clone(&mover)])
            .into_shared();
        let mut tree = LayerTree::new(root, FRAME_SIZE, 1.0);
        if let Some(previous) = &self.previous_mover
            && let Err(err) = tree.assign_old_layer(&mover, previous)
        {
            tracing::warn!(%err, "could not link the moving layer");
        }
        self.previous_mover = Some(mover);
        self.frames_built += 1;
        tracing::debug!(frame = args.frame_number, parity = args.parity.as_str(), "built frame");

        let build = FrameBuild::tree(tree);
        if self.frames_built < FRAME_COUNT {
            build.and_request_next_frame()
        } else {
            build
        }
    }

    fn on_animator_notify_idle(&mut self, deadline: HostTime) {
        self.idle_notifications += 1;
        tracing::trace!(?deadline, "idle");
    }

    fn on_animator_draw(&mut self, pipeline: &Arc<FramePipeline>) {
        self.send(RasterTask::Draw(Arc::clone(pipeline)));
    }

    fn on_animator_draw_last_layer_tree(&mut self, timings: FrameTimingsRecorder) {
        self.redraws += 1;
        self.send(RasterTask::DrawLast(timings));
    }
}

fn raster_loop(mut rasterizer: Rasterizer, tasks: &mpsc::Receiver<RasterTask>) -> u64 {
    let mut canvas = RecordingCanvas::new();
    let mut drawn = 0;
    while let Ok(task) = tasks.recv() {
        let status = match task {
            RasterTask::Draw(pipeline) => rasterizer.draw(&pipeline, &mut canvas),
            RasterTask::DrawLast(timings) => rasterizer.draw_last_layer_tree(timings, &mut canvas),
            RasterTask::Stop => break,
        };
        if let RasterStatus::Success { timing, .. } = status {
            drawn += 1;
            tracing::info!(
                frame = timing.frame_number,
                raster_ms = timing.raster_duration().as_millis_f64(),
                ops = canvas.take_calls().len(),
                "rasterized"
            );
        }
    }
    drawn
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_thread_names(true)
        .init();

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let recorder = Arc::new(Mutex::new(RecorderSink::new()));

    // -- raster thread -----------------------------------------------------
    let (raster_tx, raster_rx) = mpsc::channel();
    let raster_thread = {
        let rasterizer =
            Rasterizer::new(Arc::clone(&clock)).with_tracer(Tracer::new(Arc::clone(&recorder)));
        thread::Builder::new()
            .name("lamina-raster".into())
            .spawn(move || raster_loop(rasterizer, &raster_rx))
            .map_err(|source| LaminaError::spawn("lamina-raster", source))?
    };

    // -- logic thread ------------------------------------------------------
    let queue: TaskQueue<AnimatorTask> = TaskQueue::new(Arc::clone(&clock));
    let waiter = TimerVsyncWaiter::new(Arc::clone(&clock), REFRESH_INTERVAL)?;
    let mut animator = Animator::new(
        DemoDelegate::new(raster_tx),
        AnimatorConfig::new(),
        Box::new(waiter),
        queue.sender(),
    )
    .with_tracer(Tracer::new(Arc::clone(&recorder)));

    animator.request_frame(true);
    let give_up = std::time::Instant::now() + std::time::Duration::from_secs(10);
    let mut redraw_requested = false;
    while std::time::Instant::now() < give_up {
        if let Some(task) = queue.next_timeout(std::time::Duration::from_millis(50)) {
            animator.handle_task(task);
        }
        let delegate = animator.delegate();
        if delegate.redraws > 0 {
            break;
        }
        if delegate.frames_built >= FRAME_COUNT
            && !redraw_requested
            && !animator.frame_scheduled()
        {
            animator.request_frame(false);
            redraw_requested = true;
        }
    }

    let delegate = animator.delegate();
    tracing::info!(
        built = delegate.frames_built,
        redraws = delegate.redraws,
        idle = delegate.idle_notifications,
        "animation finished"
    );
    delegate.send(RasterTask::Stop);
    animator.shutdown();
    drop(animator);
    queue.close();

    let drawn = raster_thread
        .join()
        .map_err(|_| "raster thread panicked")?;
    tracing::info!(drawn, "raster thread stopped");

    if let Some(path) = std::env::args().nth(1) {
        let mut out = BufWriter::new(File::create(&path)?);
        chrome::export(recorder.lock().as_bytes(), &mut out)?;
        tracing::info!(%path, "wrote chrome trace");
    }
    Ok(())
}
