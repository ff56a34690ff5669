// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync-driven frame scheduling.
//!
//! The [`Animator`] lives on the logic thread. It turns frame requests into
//! vsync registrations, asks its [`AnimatorDelegate`] to build a layer tree
//! when the vsync arrives, diffs the tree against the previous one, and
//! pushes the result into the frame [`Pipeline`] for the raster stage.
//!
//! # Message passing
//!
//! Nothing outside the logic thread touches the animator. Vsync and
//! secondary callbacks run on the vsync source's thread; they only post an
//! [`AnimatorTask`] to the logic thread's [`TaskQueue`](crate::task::TaskQueue),
//! and the owner feeds each task back through [`Animator::handle_task`].
//! Every task carries the epoch of the animator that created it; after
//! [`Animator::shutdown`] the epoch changes and stale tasks are ignored.
//!
//! # Frame admission
//!
//! Requests are coalesced by a one-permit pending-frame semaphore: the first
//! [`request_frame`](Animator::request_frame) takes the permit and schedules
//! a vsync wait, later requests are no-ops until
//! [`BeginFrame`](AnimatorState::Building) gives the permit back. The
//! pipeline bounds how many built frames may wait for the raster stage;
//! when it is full the frame is rescheduled for the next vsync.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use kurbo::Size;

use crate::diff::{Damage, diff_layer_tree};
use crate::layer::LayerTree;
use crate::pipeline::{Pipeline, ProducerContinuation};
use crate::task::TaskSender;
use crate::time::{Clock, Duration, HostTime};
use crate::timing::{FrameParity, FrameTimingsRecorder};
use crate::trace::{
    FrameRequestEvent, FrameReuseEvent, IdleEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind,
    TraceFlowEndEvent, Tracer, VsyncEvent,
};
use crate::vsync::{SecondaryCallback, VsyncWaiter};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Secondary-callback ids with this bit set belong to the animator.
const INTERNAL_CALLBACK_BIT: u64 = 1 << 63;
const TRACE_FLOW_CALLBACK_ID: u64 = INTERNAL_CALLBACK_BIT;

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the [`Animator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimatorConfig {
    /// Number of built frames that may wait for the raster stage.
    pub pipeline_depth: usize,
    /// How long after a frame with no follow-up the delegate is told the
    /// logic thread is idle.
    pub idle_notification_delay: Duration,
    /// Idle budget handed to the delegate by the delayed idle notification.
    pub idle_deadline: Duration,
    /// Run the diff engine on every new tree.
    pub enable_diffing: bool,
}

impl AnimatorConfig {
    /// Logic and raster stages on separate threads.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pipeline_depth: 2,
            // A bit more than three frames at 60 Hz.
            idle_notification_delay: Duration::from_millis(51),
            idle_deadline: Duration::from_millis(100),
            enable_diffing: true,
        }
    }

    /// Logic and raster stages sharing one thread.
    #[must_use]
    pub const fn for_shared_threads() -> Self {
        Self {
            pipeline_depth: 1,
            ..Self::new()
        }
    }
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Frames and delegate
// ---------------------------------------------------------------------------

/// What travels through the pipeline to the raster stage.
#[derive(Debug)]
pub struct Frame {
    /// The frozen tree.
    pub layer_tree: Arc<LayerTree>,
    /// Damage against the previous frame; `None` when diffing is disabled.
    pub damage: Option<Damage>,
    /// Frame number of `timings`.
    pub frame_number: u64,
    /// Start and end of the diff phase, when it ran.
    pub diff_span: Option<(HostTime, HostTime)>,
    /// Timings with vsync and build recorded; the raster stage adds the
    /// raster stamps.
    pub timings: FrameTimingsRecorder,
}

/// The animator's pipeline type.
pub type FramePipeline = Pipeline<Frame>;

/// Passed to [`AnimatorDelegate::on_animator_begin_frame`].
#[derive(Clone, Copy, Debug)]
pub struct BeginFrameArgs {
    /// Frame number of the frame being built.
    pub frame_number: u64,
    /// Start of the vsync interval.
    pub vsync_start: HostTime,
    /// When the frame is meant to be presented.
    pub target_time: HostTime,
    /// When the build must be done; same as `target_time`.
    pub deadline: HostTime,
    /// Parity of `frame_number`.
    pub parity: FrameParity,
}

/// The delegate's answer to a begin-frame call.
#[derive(Debug, Default)]
pub struct FrameBuild {
    /// The built tree, or `None` to skip rendering this vsync. A skipped
    /// frame keeps its pipeline reservation for the next attempt.
    pub layer_tree: Option<LayerTree>,
    /// Schedule another frame after this one.
    pub request_next_frame: bool,
}

impl FrameBuild {
    /// A built tree.
    #[must_use]
    pub fn tree(layer_tree: LayerTree) -> Self {
        Self {
            layer_tree: Some(layer_tree),
            request_next_frame: false,
        }
    }

    /// Nothing to render.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Also requests the next frame.
    #[must_use]
    pub fn and_request_next_frame(mut self) -> Self {
        self.request_next_frame = true;
        self
    }
}

/// The animator's view of the producer and the raster stage.
pub trait AnimatorDelegate {
    /// Builds the frame targeting `args.target_time`.
    fn on_animator_begin_frame(&mut self, args: &BeginFrameArgs) -> FrameBuild;

    /// The logic thread has nothing to do until `deadline`.
    fn on_animator_notify_idle(&mut self, deadline: HostTime) {
        _ = deadline;
    }

    /// A frame was pushed into `pipeline`; the raster stage should consume
    /// one item.
    fn on_animator_draw(&mut self, pipeline: &Arc<FramePipeline>);

    /// Nothing changed; the raster stage should redraw its last tree with
    /// `timings`.
    fn on_animator_draw_last_layer_tree(&mut self, timings: FrameTimingsRecorder);
}

/// Messages posted to the logic thread on the animator's behalf.
#[derive(Debug)]
pub enum AnimatorTask {
    /// Register for the next vsync.
    AwaitVsync {
        /// Animator epoch.
        epoch: u64,
    },
    /// A vsync arrived.
    Vsync {
        /// Animator epoch.
        epoch: u64,
        /// Timings with the vsync interval recorded.
        timings: FrameTimingsRecorder,
    },
    /// Delayed idle check after a frame.
    NotifyIdle {
        /// Animator epoch.
        epoch: u64,
        /// Idle task id current when the check was posted.
        task_id: u64,
    },
    /// Queue a trace flow id from another thread.
    EnqueueTraceFlowId {
        /// Animator epoch.
        epoch: u64,
        /// Flow id.
        id: u64,
    },
    /// Drop queued trace flow ids if no frame is coming.
    MaybeClearTraceFlowIds {
        /// Animator epoch.
        epoch: u64,
    },
}

impl AnimatorTask {
    /// Epoch of the animator the task belongs to.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        match self {
            Self::AwaitVsync { epoch }
            | Self::Vsync { epoch, .. }
            | Self::NotifyIdle { epoch, .. }
            | Self::EnqueueTraceFlowId { epoch, .. }
            | Self::MaybeClearTraceFlowIds { epoch } => *epoch,
        }
    }
}

/// Why the last frame reached the raster stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    /// The previous tree was redrawn.
    ReusingLastFrame,
    /// A new tree was built.
    NewFrame,
}

/// Where the animator is in its frame cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimatorState {
    /// No frame requested.
    Idle,
    /// A vsync wait is registered or about to be.
    AwaitingVsync,
    /// The delegate is building, or declined to build, a frame.
    Building,
    /// A frame went to the raster stage.
    Rendered(RenderKind),
}

// ---------------------------------------------------------------------------
// Animator
// ---------------------------------------------------------------------------

/// The frame scheduler.
///
/// Owned and driven by the logic thread; see the [module docs](self).
pub struct Animator<D> {
    delegate: D,
    config: AnimatorConfig,
    waiter: Box<dyn VsyncWaiter>,
    tasks: TaskSender<AnimatorTask>,
    clock: Arc<dyn Clock>,
    pipeline: Arc<FramePipeline>,
    continuation: Option<ProducerContinuation<Frame>>,
    timings: Option<FrameTimingsRecorder>,
    last_layer_tree: Option<Arc<LayerTree>>,
    last_frame_size: Option<Size>,
    /// One-permit semaphore coalescing frame requests.
    frame_permit_available: bool,
    paused: bool,
    regenerate_layer_tree: bool,
    frame_scheduled: bool,
    dimension_change_pending: bool,
    notify_idle_task_id: u64,
    frame_deadline: Option<HostTime>,
    trace_flow_ids: VecDeque<u64>,
    epoch: u64,
    shut_down: bool,
    state: AnimatorState,
    tracer: Tracer,
}

impl<D: core::fmt::Debug> core::fmt::Debug for Animator<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Animator")
            .field("delegate", &self.delegate)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("paused", &self.paused)
            .field("frame_scheduled", &self.frame_scheduled)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl<D: AnimatorDelegate> Animator<D> {
    /// Creates an idle animator with its own pipeline.
    ///
    /// # Panics
    ///
    /// Panics if `config.pipeline_depth` is zero.
    pub fn new(
        delegate: D,
        config: AnimatorConfig,
        waiter: Box<dyn VsyncWaiter>,
        tasks: TaskSender<AnimatorTask>,
    ) -> Self {
        let clock = Arc::clone(tasks.clock());
        Self {
            delegate,
            config,
            waiter,
            tasks,
            clock,
            pipeline: Arc::new(Pipeline::new(config.pipeline_depth)),
            continuation: None,
            timings: None,
            last_layer_tree: None,
            last_frame_size: None,
            frame_permit_available: true,
            paused: false,
            regenerate_layer_tree: false,
            frame_scheduled: false,
            dimension_change_pending: false,
            notify_idle_task_id: 0,
            frame_deadline: None,
            trace_flow_ids: VecDeque::new(),
            epoch: next_epoch(),
            shut_down: false,
            state: AnimatorState::Idle,
            tracer: Tracer::none(),
        }
    }

    /// Sends frame-loop events to `tracer`.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    // --- accessors ---

    /// The pipeline frames are pushed into.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<FramePipeline> {
        &self.pipeline
    }

    /// The delegate.
    #[must_use]
    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// The delegate, mutably.
    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> AnimatorState {
        self.state
    }

    /// Whether [`stop`](Self::stop) was called more recently than
    /// [`start`](Self::start).
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether a vsync wait is pending.
    #[must_use]
    pub fn frame_scheduled(&self) -> bool {
        self.frame_scheduled
    }

    /// Whether a frame-size change is waiting to be rendered.
    #[must_use]
    pub fn dimension_change_pending(&self) -> bool {
        self.dimension_change_pending
    }

    /// The most recent tree sent to the raster stage.
    #[must_use]
    pub fn last_layer_tree(&self) -> Option<&Arc<LayerTree>> {
        self.last_layer_tree.as_ref()
    }

    /// Epoch stamped on this animator's tasks.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Parity of the frame being built, or [`FrameParity::Even`] between
    /// frames.
    #[must_use]
    pub fn frame_parity(&self) -> FrameParity {
        self.timings
            .as_ref()
            .map_or(FrameParity::Even, FrameTimingsRecorder::frame_parity)
    }

    // --- control ---

    /// Resumes frame production, requesting a frame if it was paused.
    pub fn start(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        self.request_frame(true);
    }

    /// Pauses frame production. Requests are ignored until
    /// [`start`](Self::start), except while a dimension change is pending.
    pub fn stop(&mut self) {
        self.paused = true;
    }

    /// Lets the next frame through even while paused, so a resized surface
    /// gets content.
    pub fn set_dimension_change_pending(&mut self) {
        self.dimension_change_pending = true;
    }

    /// Requests a frame on the next vsync.
    ///
    /// With `regenerate` the delegate is asked for a new tree; otherwise the
    /// last tree may be redrawn. Requests while one is pending coalesce.
    pub fn request_frame(&mut self, regenerate: bool) {
        if regenerate {
            self.regenerate_layer_tree = true;
        }
        let scheduled = self.try_schedule_vsync();
        self.tracer.frame_request(&FrameRequestEvent {
            timestamp: self.clock.now(),
            regenerate,
            scheduled,
        });
    }

    fn try_schedule_vsync(&mut self) -> bool {
        if self.shut_down || (self.paused && !self.dimension_change_pending) {
            return false;
        }
        if !self.frame_permit_available {
            return false;
        }
        self.frame_permit_available = false;
        // Registration runs from the task queue so that work already queued
        // on the logic thread goes first.
        self.tasks.post(AnimatorTask::AwaitVsync { epoch: self.epoch });
        self.frame_scheduled = true;
        self.state = AnimatorState::AwaitingVsync;
        true
    }

    /// Dispatches a task posted on this animator's behalf. Tasks from
    /// another epoch are dropped.
    pub fn handle_task(&mut self, task: AnimatorTask) {
        if task.epoch() != self.epoch || self.shut_down {
            tracing::trace!(?task, "dropping stale animator task");
            return;
        }
        match task {
            AnimatorTask::AwaitVsync { .. } => self.await_vsync(),
            AnimatorTask::Vsync { timings, .. } => self.on_vsync(timings),
            AnimatorTask::NotifyIdle { task_id, .. } => self.on_idle_check(task_id),
            AnimatorTask::EnqueueTraceFlowId { id, .. } => self.enqueue_trace_flow_id(id),
            AnimatorTask::MaybeClearTraceFlowIds { .. } => self.maybe_clear_trace_flow_ids(),
        }
    }

    fn await_vsync(&mut self) {
        let tasks = self.tasks.clone();
        let epoch = self.epoch;
        self.waiter.async_wait_for_vsync(Box::new(move |timings| {
            tasks.post(AnimatorTask::Vsync { epoch, timings });
        }));
        // Before the first begin-frame there is no deadline to report.
        if let Some(deadline) = self.frame_deadline {
            self.notify_idle(deadline);
        }
    }

    fn on_vsync(&mut self, timings: FrameTimingsRecorder) {
        self.tracer.vsync(&VsyncEvent {
            frame_number: timings.frame_number(),
            vsync_start: timings.vsync_start_time(),
            vsync_target: timings.vsync_target_time(),
        });
        if !self.regenerate_layer_tree && self.last_layer_tree.is_some() {
            self.draw_last_layer_tree(timings);
        } else {
            self.begin_frame(timings);
        }
    }

    fn draw_last_layer_tree(&mut self, mut timings: FrameTimingsRecorder) {
        let _span = tracing::trace_span!("Animator::draw_last_layer_tree").entered();
        self.frame_permit_available = true;
        self.frame_scheduled = false;
        let now = self.clock.now();
        timings.record_build_start(now);
        timings.record_build_end(now);
        self.tracer.frame_reuse(&FrameReuseEvent {
            frame_number: timings.frame_number(),
            timestamp: now,
        });
        self.state = AnimatorState::Rendered(RenderKind::ReusingLastFrame);
        self.delegate.on_animator_draw_last_layer_tree(timings);
    }

    #[tracing::instrument(level = "debug", skip_all, fields(frame = timings.frame_number()))]
    fn begin_frame(&mut self, mut timings: FrameTimingsRecorder) {
        let frame_number = timings.frame_number();
        let now = self.clock.now();
        timings.record_build_start(now);
        self.tracer.phase_begin(&PhaseBeginEvent {
            frame_number,
            phase: PhaseKind::Build,
            timestamp: now,
        });

        while let Some(flow_id) = self.trace_flow_ids.pop_front() {
            self.tracer.trace_flow_end(&TraceFlowEndEvent {
                flow_id,
                frame_number: Some(frame_number),
            });
        }
        self.frame_scheduled = false;
        self.notify_idle_task_id += 1;
        self.regenerate_layer_tree = false;
        self.frame_permit_available = true;
        self.state = AnimatorState::Building;

        if self.continuation.is_none() {
            self.continuation = self.pipeline.produce();
            if self.continuation.is_none() {
                tracing::debug!(frame_number, "pipeline full, retrying next vsync");
                self.timings = None;
                self.request_frame(true);
                return;
            }
        }

        let target_time = timings.vsync_target_time();
        self.frame_deadline = Some(target_time);
        let args = BeginFrameArgs {
            frame_number,
            vsync_start: timings.vsync_start_time(),
            target_time,
            deadline: target_time,
            parity: timings.frame_parity(),
        };
        self.timings = Some(timings);
        let build = self.delegate.on_animator_begin_frame(&args);
        if let Some(layer_tree) = build.layer_tree {
            self.render(layer_tree);
        }
        if build.request_next_frame {
            self.request_frame(true);
        }

        if !self.frame_scheduled {
            self.tasks.post_delayed(
                AnimatorTask::NotifyIdle {
                    epoch: self.epoch,
                    task_id: self.notify_idle_task_id,
                },
                self.config.idle_notification_delay,
            );
        }
    }

    fn on_idle_check(&mut self, task_id: u64) {
        // A newer frame was scheduled since the check was posted.
        if task_id != self.notify_idle_task_id || self.frame_scheduled {
            return;
        }
        let deadline = self.clock.now().saturating_add(self.config.idle_deadline);
        self.notify_idle(deadline);
    }

    fn notify_idle(&mut self, deadline: HostTime) {
        self.tracer.idle(&IdleEvent {
            timestamp: self.clock.now(),
            deadline,
        });
        self.delegate.on_animator_notify_idle(deadline);
    }

    /// Sends a built tree to the raster stage.
    ///
    /// Called internally with the tree returned by the delegate; may also be
    /// called directly, in which case timings are synthesized from the
    /// current time when no frame is in progress.
    pub fn render(&mut self, mut layer_tree: LayerTree) {
        if self.dimension_change_pending
            && self.last_frame_size != Some(layer_tree.frame_size())
        {
            self.dimension_change_pending = false;
        }
        self.last_frame_size = Some(layer_tree.frame_size());

        let mut timings = self.timings.take().unwrap_or_else(|| {
            let now = self.clock.now();
            let mut timings = FrameTimingsRecorder::new();
            timings.record_vsync(now, now);
            timings.record_build_start(now);
            timings
        });
        let frame_number = timings.frame_number();
        let build_end = self.clock.now();
        timings.record_build_end(build_end);
        self.tracer.phase_end(&PhaseEndEvent {
            frame_number,
            phase: PhaseKind::Build,
            timestamp: build_end,
        });

        // The previous tree stays the diff baseline until a frame built on
        // top of it is actually in the pipeline.
        let mut continuation = match self.continuation.take() {
            Some(c) => c,
            None => match self.pipeline.produce() {
                Some(c) => c,
                None => {
                    tracing::debug!(
                        frame_number,
                        "no pipeline slot for direct render; dropping frame"
                    );
                    return;
                }
            },
        };

        let mut diff_span = None;
        let damage = self.config.enable_diffing.then(|| {
            let start = self.clock.now();
            self.tracer.phase_begin(&PhaseBeginEvent {
                frame_number,
                phase: PhaseKind::Diff,
                timestamp: start,
            });
            let damage = diff_layer_tree(&mut layer_tree, self.last_layer_tree.as_deref());
            let end = self.clock.now();
            self.tracer.phase_end(&PhaseEndEvent {
                frame_number,
                phase: PhaseKind::Diff,
                timestamp: end,
            });
            diff_span = Some((start, end));
            damage
        });

        let layer_tree = Arc::new(layer_tree);
        let frame = Frame {
            layer_tree: Arc::clone(&layer_tree),
            damage,
            frame_number,
            diff_span,
            timings,
        };
        if !continuation.complete(frame) {
            return;
        }
        self.last_layer_tree = Some(layer_tree);
        self.state = AnimatorState::Rendered(RenderKind::NewFrame);
        self.delegate.on_animator_draw(&self.pipeline);
    }

    // --- trace flows and secondary callbacks ---

    /// Queues a trace flow id; it ends with the next frame, or is cleared on
    /// the next vsync if no frame is scheduled.
    pub fn enqueue_trace_flow_id(&mut self, id: u64) {
        self.trace_flow_ids.push_back(id);
        let tasks = self.tasks.clone();
        let epoch = self.epoch;
        self.waiter.schedule_secondary_callback(
            TRACE_FLOW_CALLBACK_ID,
            Box::new(move || {
                tasks.post(AnimatorTask::MaybeClearTraceFlowIds { epoch });
            }),
        );
    }

    fn maybe_clear_trace_flow_ids(&mut self) {
        if self.frame_scheduled {
            return;
        }
        while let Some(flow_id) = self.trace_flow_ids.pop_front() {
            self.tracer.trace_flow_end(&TraceFlowEndEvent {
                flow_id,
                frame_number: None,
            });
        }
    }

    /// Number of trace flow ids waiting for a frame.
    #[must_use]
    pub fn pending_trace_flow_ids(&self) -> usize {
        self.trace_flow_ids.len()
    }

    /// Runs `callback` on the next vsync, whether or not a frame is
    /// produced. Replaces an earlier callback with the same `id`.
    ///
    /// Ids with the top bit set are reserved for the animator; such a
    /// callback is not scheduled.
    pub fn schedule_secondary_vsync_callback(&mut self, id: u64, callback: SecondaryCallback) {
        if self.shut_down {
            return;
        }
        if id & INTERNAL_CALLBACK_BIT != 0 {
            tracing::warn!(id, "secondary callback id uses the reserved top bit; ignoring");
            return;
        }
        self.waiter.schedule_secondary_callback(id, callback);
    }

    // --- teardown ---

    /// Stops all scheduling. Tasks and vsync callbacks issued before the
    /// call are ignored from now on, and no new vsync waits are
    /// registered. The held pipeline reservation, if any, is released.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.epoch = next_epoch();
        self.continuation = None;
        self.timings = None;
        self.frame_scheduled = false;
        self.state = AnimatorState::Idle;
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}
