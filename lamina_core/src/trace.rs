// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-loop instrumentation.
//!
//! The animator and rasterizer report what they do through a [`TraceSink`].
//! Every sink method defaults to a no-op, so a sink only implements the
//! events it cares about.
//!
//! Components own a [`Tracer`], an optional boxed sink. When the `trace`
//! feature is **off**, every `Tracer` method compiles to nothing. When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! [`FrameSummaryBuilder`] collects phase timestamps while the rasterizer
//! works on a frame and produces a [`FrameSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`DamageEvent`] and the
//!   corresponding `TraceSink` method.
//!
//! Free-form diagnostics (warnings, debug logs) go through the `tracing`
//! crate instead and are independent of these features.

use std::sync::Arc;

#[cfg(feature = "trace-rich")]
use kurbo::Rect;

use crate::time::{Duration, HostTime};
use crate::timing::{FrameParity, FrameTiming};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of the frame loop is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// The delegate building the layer tree.
    Build,
    /// Damage computation against the previous tree.
    Diff,
    /// Preroll and paint on the raster side.
    Raster,
}

impl PhaseKind {
    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Diff => "diff",
            Self::Raster => "raster",
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a frame is requested from the animator.
#[derive(Clone, Copy, Debug)]
pub struct FrameRequestEvent {
    /// Host time of the request.
    pub timestamp: HostTime,
    /// Whether the caller asked for a new layer tree.
    pub regenerate: bool,
    /// Whether the request led to a vsync registration. `false` when it
    /// was coalesced into a pending one or suppressed while paused.
    pub scheduled: bool,
}

/// Emitted when a vsync callback reaches the animator.
#[derive(Clone, Copy, Debug)]
pub struct VsyncEvent {
    /// Frame number of the timings the vsync created.
    pub frame_number: u64,
    /// Start of the vsync interval.
    pub vsync_start: HostTime,
    /// Intended present time.
    pub vsync_target: HostTime,
}

/// Marks the beginning of a frame-loop phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame number.
    pub frame_number: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a frame-loop phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame number.
    pub frame_number: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted when the animator redraws the previous tree instead of building
/// a new one.
#[derive(Clone, Copy, Debug)]
pub struct FrameReuseEvent {
    /// Frame number of the reused frame's timings.
    pub frame_number: u64,
    /// Host time of the decision.
    pub timestamp: HostTime,
}

/// Emitted when the animator tells its delegate it may do idle work.
#[derive(Clone, Copy, Debug)]
pub struct IdleEvent {
    /// Host time of the notification.
    pub timestamp: HostTime,
    /// Deadline handed to the delegate.
    pub deadline: HostTime,
}

/// Emitted for every trace flow id drained at the start of a frame.
#[derive(Clone, Copy, Debug)]
pub struct TraceFlowEndEvent {
    /// Caller-supplied flow id.
    pub flow_id: u64,
    /// Frame the flow ended in; `None` when the id was cleared while no
    /// frame was scheduled.
    pub frame_number: Option<u64>,
}

/// Per-frame timing summary.
#[derive(Clone, Copy, Debug)]
pub struct FrameSummary {
    /// Frame number.
    pub frame_number: u64,
    /// Parity of the frame number.
    pub parity: FrameParity,
    /// Start of the vsync interval.
    pub vsync_start: HostTime,
    /// Intended present time.
    pub vsync_target: HostTime,
    /// Build phase duration.
    pub build: Duration,
    /// Diff phase duration (zero if not measured).
    pub diff: Duration,
    /// Raster phase duration.
    pub raster: Duration,
    /// Vsync start to raster end.
    pub total: Duration,
    /// Whether the build finished after the target time.
    pub missed_build_deadline: bool,
    /// Whether the frame was a redraw of the previous tree.
    pub reused: bool,
}

/// Frame damage as computed by the diff engine.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct DamageEvent {
    /// Frame number.
    pub frame_number: u64,
    /// Integer-aligned damage; [`Rect::ZERO`] when nothing changed.
    pub frame_damage: Rect,
    /// Area of the whole frame.
    pub frame_rect: Rect,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the frame loop.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called for every [`request_frame`](crate::animator::Animator::request_frame).
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        _ = e;
    }

    /// Called when a vsync reaches the animator.
    fn on_vsync(&mut self, e: &VsyncEvent) {
        _ = e;
    }

    /// Called at the beginning of a frame-loop phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a frame-loop phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called when the previous tree is redrawn.
    fn on_frame_reuse(&mut self, e: &FrameReuseEvent) {
        _ = e;
    }

    /// Called when the delegate is notified of idle time.
    fn on_idle(&mut self, e: &IdleEvent) {
        _ = e;
    }

    /// Called for each trace flow id drained by a frame.
    fn on_trace_flow_end(&mut self, e: &TraceFlowEndEvent) {
        _ = e;
    }

    /// Called with a per-frame timing summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with per-frame damage (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_damage(&mut self, e: &DamageEvent) {
        _ = e;
    }
}

/// Lets one sink be shared by the logic and raster threads.
impl<S: TraceSink + ?Sized> TraceSink for Arc<parking_lot::Mutex<S>> {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        self.lock().on_frame_request(e);
    }

    fn on_vsync(&mut self, e: &VsyncEvent) {
        self.lock().on_vsync(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.lock().on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.lock().on_phase_end(e);
    }

    fn on_frame_reuse(&mut self, e: &FrameReuseEvent) {
        self.lock().on_frame_reuse(e);
    }

    fn on_idle(&mut self, e: &IdleEvent) {
        self.lock().on_idle(e);
    }

    fn on_trace_flow_end(&mut self, e: &TraceFlowEndEvent) {
        self.lock().on_trace_flow_end(e);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.lock().on_frame_summary(s);
    }

    #[cfg(feature = "trace-rich")]
    fn on_damage(&mut self, e: &DamageEvent) {
        self.lock().on_damage(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owning wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing and
/// the sink passed to [`Tracer::new`] is dropped immediately.
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to `sink`.
    #[inline]
    #[must_use]
    pub fn new(sink: impl TraceSink + Send + 'static) -> Self {
        #[cfg(feature = "trace")]
        {
            Self {
                sink: Some(Box::new(sink)),
            }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits a [`FrameRequestEvent`].
    #[inline]
    pub fn frame_request(&mut self, e: &FrameRequestEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_request(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`VsyncEvent`].
    #[inline]
    pub fn vsync(&mut self, e: &VsyncEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_vsync(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameReuseEvent`].
    #[inline]
    pub fn frame_reuse(&mut self, e: &FrameReuseEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame_reuse(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`IdleEvent`].
    #[inline]
    pub fn idle(&mut self, e: &IdleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_idle(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TraceFlowEndEvent`].
    #[inline]
    pub fn trace_flow_end(&mut self, e: &TraceFlowEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_trace_flow_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`DamageEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn damage(&mut self, e: &DamageEvent) {
        if let Some(s) = &mut self.sink {
            s.on_damage(e);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a frame and produces a [`FrameSummary`].
///
/// Build and raster durations come from the frame's [`FrameTiming`]; the
/// builder adds phases the timings do not carry.
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    phase_starts: [Option<HostTime>; 3],
    phase_ends: [Option<HostTime>; 3],
    reused: bool,
}

impl FrameSummaryBuilder {
    /// Starts an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase_starts: [None; 3],
            phase_ends: [None; 3],
            reused: false,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Marks the frame as a redraw of the previous tree.
    pub fn set_reused(&mut self, reused: bool) {
        self.reused = reused;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self, timing: &FrameTiming) -> FrameSummary {
        FrameSummary {
            frame_number: timing.frame_number,
            parity: timing.parity(),
            vsync_start: timing.vsync_start,
            vsync_target: timing.vsync_target,
            build: timing.build_duration(),
            diff: self.phase_duration(PhaseKind::Diff),
            raster: timing.raster_duration(),
            total: timing.total_span(),
            missed_build_deadline: timing.missed_build_deadline(),
            reused: self.reused,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> Duration {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }
}

impl Default for FrameSummaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Build => 0,
        PhaseKind::Diff => 1,
        PhaseKind::Raster => 2,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
