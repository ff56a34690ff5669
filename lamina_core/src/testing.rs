// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use kurbo::{Rect, Shape, Size};
use parking_lot::Mutex;

use crate::animator::{
    Animator, AnimatorConfig, AnimatorDelegate, AnimatorTask, BeginFrameArgs, Frame, FrameBuild,
    FramePipeline,
};
use crate::canvas::{Canvas, Color, Paint, Sampling};
use crate::layer::{Layer, LayerTree};
use crate::pipeline::ConsumeResult;
use crate::task::{TaskQueue, TaskSender};
use crate::texture::Texture;
use crate::time::{Clock, Duration, HostTime, ManualClock};
use crate::timing::FrameTimingsRecorder;
use crate::vsync::ManualVsyncWaiter;

/// Sends `tracing` output to the test harness's captured output.
pub(crate) fn init_tracing() {
    // Another test may have installed the subscriber already.
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Textures
// ---------------------------------------------------------------------------

/// One call to [`Texture::paint`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TexturePaint {
    pub(crate) bounds: Rect,
    pub(crate) freeze: bool,
    pub(crate) sampling: Sampling,
}

/// A texture that records how it was painted and draws nothing.
#[derive(Debug)]
pub(crate) struct MockTexture {
    id: i64,
    paints: Mutex<Vec<TexturePaint>>,
    unregistered: AtomicBool,
}

impl MockTexture {
    pub(crate) fn new(id: i64) -> Self {
        Self {
            id,
            paints: Mutex::new(Vec::new()),
            unregistered: AtomicBool::new(false),
        }
    }

    pub(crate) fn paint_calls(&self) -> Vec<TexturePaint> {
        self.paints.lock().clone()
    }

    pub(crate) fn was_unregistered(&self) -> bool {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl Texture for MockTexture {
    fn id(&self) -> i64 {
        self.id
    }

    fn paint(&self, _canvas: &mut dyn Canvas, bounds: Rect, freeze: bool, sampling: Sampling) {
        self.paints.lock().push(TexturePaint {
            bounds,
            freeze,
            sampling,
        });
    }

    fn on_texture_unregistered(&self) {
        self.unregistered.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Animator fixtures
// ---------------------------------------------------------------------------

/// Delegate that records every callback.
///
/// Each built tree is a fresh root container over the same retained
/// content layer, so consecutive frames diff to no damage.
#[derive(Debug)]
pub(crate) struct RecordingDelegate {
    pub(crate) begin_frames: Vec<BeginFrameArgs>,
    pub(crate) draws: usize,
    pub(crate) reused: Vec<FrameTimingsRecorder>,
    pub(crate) idles: Vec<HostTime>,
    pub(crate) produce_tree: bool,
    pub(crate) request_next: bool,
    content: Arc<Layer>,
}

impl Default for RecordingDelegate {
    fn default() -> Self {
        Self {
            begin_frames: Vec::new(),
            draws: 0,
            reused: Vec::new(),
            idles: Vec::new(),
            produce_tree: true,
            request_next: false,
            content: Self::content(),
        }
    }
}

impl RecordingDelegate {
    const FRAME_SIZE: Size = Size::new(100.0, 100.0);

    fn content() -> Arc<Layer> {
        Layer::shape(
            Rect::new(10.0, 10.0, 40.0, 40.0).to_path(0.1),
            Paint::fill(Color::BLACK),
        )
        .into_shared()
    }

    /// A one-layer scene of the given size.
    pub(crate) fn scene(size: Size) -> LayerTree {
        LayerTree::new(
            Layer::container().with_child(Self::content()).into_shared(),
            size,
            1.0,
        )
    }
}

impl AnimatorDelegate for RecordingDelegate {
    fn on_animator_begin_frame(&mut self, args: &BeginFrameArgs) -> FrameBuild {
        self.begin_frames.push(*args);
        let build = if self.produce_tree {
            FrameBuild::tree(LayerTree::new(
                Layer::container()
                    .with_child(Arc::clone(&self.content))
                    .into_shared(),
                Self::FRAME_SIZE,
                1.0,
            ))
        } else {
            FrameBuild::none()
        };
        if self.request_next {
            build.and_request_next_frame()
        } else {
            build
        }
    }

    fn on_animator_notify_idle(&mut self, deadline: HostTime) {
        self.idles.push(deadline);
    }

    fn on_animator_draw(&mut self, _pipeline: &Arc<FramePipeline>) {
        self.draws += 1;
    }

    fn on_animator_draw_last_layer_tree(&mut self, timings: FrameTimingsRecorder) {
        self.reused.push(timings);
    }
}

/// An animator wired to a manual clock, a manual vsync source and a task
/// queue drained by hand.
pub(crate) struct AnimatorHarness {
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) queue: TaskQueue<AnimatorTask>,
    pub(crate) sender: TaskSender<AnimatorTask>,
    pub(crate) vsync: ManualVsyncWaiter,
    pub(crate) animator: Animator<RecordingDelegate>,
}

impl AnimatorHarness {
    pub(crate) fn new(config: AnimatorConfig) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(HostTime(1_000_000)));
        let queue = TaskQueue::new(clock.clone());
        let sender = queue.sender();
        let vsync = ManualVsyncWaiter::new();
        let animator = Animator::new(
            RecordingDelegate::default(),
            config,
            Box::new(vsync.clone()),
            queue.sender(),
        );
        Self {
            clock,
            queue,
            sender,
            vsync,
            animator,
        }
    }

    /// Dispatches every runnable task.
    pub(crate) fn run_tasks(&mut self) {
        while let Some(task) = self.queue.try_next() {
            self.animator.handle_task(task);
        }
    }

    /// Fires a vsync starting now and runs the resulting tasks.
    pub(crate) fn fire_vsync(&mut self, interval: Duration) {
        let now = self.clock.now();
        self.vsync.fire(now, now.saturating_add(interval));
        self.run_tasks();
    }

    /// Takes the oldest ready frame out of the pipeline.
    pub(crate) fn consume_frame(&mut self) -> Option<Frame> {
        let mut frame = None;
        self.animator.pipeline().consume(|f, _| frame = Some(f));
        frame
    }

    /// Consumes and discards one frame.
    pub(crate) fn consume_result(&mut self) -> ConsumeResult {
        self.animator.pipeline().consume(|_, _| {})
    }
}
