// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame timing records.
//!
//! A [`FrameTimingsRecorder`] is created when a vsync fires and travels with
//! the frame it describes: from the vsync source to the animator (build
//! phase), then to the rasterizer (raster phase). Each stage stamps its
//! boundaries, and the final stamp yields a [`FrameTiming`] summary.
//!
//! # Data flow
//!
//! 1. The vsync source creates a recorder and calls
//!    [`record_vsync`](FrameTimingsRecorder::record_vsync).
//! 2. The animator stamps build start and build end.
//! 3. The rasterizer stamps raster start and raster end, receiving the
//!    [`FrameTiming`] summary.
//!
//! Recording is a strict state machine; stamping out of order is a
//! programming error and panics.

use core::sync::atomic::{AtomicU64, Ordering};

use crate::time::{Duration, HostTime};

static NEXT_FRAME_NUMBER: AtomicU64 = AtomicU64::new(1);

/// Whether a frame number is even or odd.
///
/// Producers use this to alternate between double-buffered resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameParity {
    /// Even frame number.
    Even,
    /// Odd frame number.
    Odd,
}

impl FrameParity {
    /// Parity of `frame_number`.
    #[inline]
    #[must_use]
    pub const fn of(frame_number: u64) -> Self {
        if frame_number % 2 == 0 {
            Self::Even
        } else {
            Self::Odd
        }
    }

    /// Lower-case name, for logs and trace output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Even => "even",
            Self::Odd => "odd",
        }
    }
}

/// Which stamps a [`FrameTimingsRecorder`] holds so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecorderState {
    /// Nothing recorded yet.
    Uninitialized,
    /// Vsync start and target recorded.
    Vsync,
    /// Build start recorded.
    BuildStart,
    /// Build end recorded.
    BuildEnd,
    /// Raster start recorded.
    RasterStart,
    /// Raster end recorded; the record is complete.
    RasterEnd,
}

/// Accumulates the timestamps of one frame.
///
/// Move-only: exactly one stage owns the record at a time.
#[derive(Debug)]
pub struct FrameTimingsRecorder {
    frame_number: u64,
    state: RecorderState,
    vsync_start: HostTime,
    vsync_target: HostTime,
    build_start: HostTime,
    build_end: HostTime,
    raster_start: HostTime,
    raster_end: HostTime,
}

impl FrameTimingsRecorder {
    /// Creates a recorder with the next process-wide frame number.
    ///
    /// Frame numbers start at 1 and increase by one per recorder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame_number: NEXT_FRAME_NUMBER.fetch_add(1, Ordering::Relaxed),
            state: RecorderState::Uninitialized,
            vsync_start: HostTime(0),
            vsync_target: HostTime(0),
            build_start: HostTime(0),
            build_end: HostTime(0),
            raster_start: HostTime(0),
            raster_end: HostTime(0),
        }
    }

    /// The frame number assigned at creation.
    #[inline]
    #[must_use]
    pub const fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Parity of [`frame_number`](Self::frame_number).
    #[inline]
    #[must_use]
    pub const fn frame_parity(&self) -> FrameParity {
        FrameParity::of(self.frame_number)
    }

    /// Which stamps have been recorded.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// Records the vsync interval this frame was scheduled for.
    ///
    /// # Panics
    ///
    /// Panics if anything was recorded before.
    pub fn record_vsync(&mut self, start: HostTime, target: HostTime) {
        self.advance(RecorderState::Uninitialized, RecorderState::Vsync);
        self.vsync_start = start;
        self.vsync_target = target;
    }

    /// Records the start of the build phase.
    ///
    /// # Panics
    ///
    /// Panics unless the vsync was recorded last.
    pub fn record_build_start(&mut self, t: HostTime) {
        self.advance(RecorderState::Vsync, RecorderState::BuildStart);
        self.build_start = t;
    }

    /// Records the end of the build phase.
    ///
    /// # Panics
    ///
    /// Panics unless build start was recorded last.
    pub fn record_build_end(&mut self, t: HostTime) {
        self.advance(RecorderState::BuildStart, RecorderState::BuildEnd);
        self.build_end = t;
    }

    /// Records the start of the raster phase.
    ///
    /// # Panics
    ///
    /// Panics unless build end was recorded last.
    pub fn record_raster_start(&mut self, t: HostTime) {
        self.advance(RecorderState::BuildEnd, RecorderState::RasterStart);
        self.raster_start = t;
    }

    /// Records the end of the raster phase and returns the completed timing.
    ///
    /// # Panics
    ///
    /// Panics unless raster start was recorded last.
    pub fn record_raster_end(&mut self, t: HostTime) -> FrameTiming {
        self.advance(RecorderState::RasterStart, RecorderState::RasterEnd);
        self.raster_end = t;
        FrameTiming {
            frame_number: self.frame_number,
            vsync_start: self.vsync_start,
            vsync_target: self.vsync_target,
            build_start: self.build_start,
            build_end: self.build_end,
            raster_start: self.raster_start,
            raster_end: self.raster_end,
        }
    }

    /// Vsync start time.
    ///
    /// # Panics
    ///
    /// Panics if the vsync has not been recorded.
    #[must_use]
    pub fn vsync_start_time(&self) -> HostTime {
        self.require(RecorderState::Vsync);
        self.vsync_start
    }

    /// Vsync target time, the moment the frame is meant to be presented.
    ///
    /// # Panics
    ///
    /// Panics if the vsync has not been recorded.
    #[must_use]
    pub fn vsync_target_time(&self) -> HostTime {
        self.require(RecorderState::Vsync);
        self.vsync_target
    }

    /// Build start time.
    ///
    /// # Panics
    ///
    /// Panics if build start has not been recorded.
    #[must_use]
    pub fn build_start_time(&self) -> HostTime {
        self.require(RecorderState::BuildStart);
        self.build_start
    }

    /// Build end time.
    ///
    /// # Panics
    ///
    /// Panics if build end has not been recorded.
    #[must_use]
    pub fn build_end_time(&self) -> HostTime {
        self.require(RecorderState::BuildEnd);
        self.build_end
    }

    fn advance(&mut self, expected: RecorderState, next: RecorderState) {
        assert!(
            self.state == expected,
            "frame {} timings out of order: cannot record {next:?} in state {:?}",
            self.frame_number,
            self.state,
        );
        self.state = next;
    }

    fn require(&self, at_least: RecorderState) {
        assert!(
            self.state >= at_least,
            "frame {} timings not yet recorded: need {at_least:?}, have {:?}",
            self.frame_number,
            self.state,
        );
    }
}

impl Default for FrameTimingsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Completed timestamps of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameTiming {
    /// Frame number.
    pub frame_number: u64,
    /// When the vsync interval began.
    pub vsync_start: HostTime,
    /// When the frame was meant to be presented.
    pub vsync_target: HostTime,
    /// Build phase start.
    pub build_start: HostTime,
    /// Build phase end.
    pub build_end: HostTime,
    /// Raster phase start.
    pub raster_start: HostTime,
    /// Raster phase end.
    pub raster_end: HostTime,
}

impl FrameTiming {
    /// Time spent building the layer tree.
    #[must_use]
    pub const fn build_duration(&self) -> Duration {
        self.build_end.saturating_duration_since(self.build_start)
    }

    /// Time spent rasterizing.
    #[must_use]
    pub const fn raster_duration(&self) -> Duration {
        self.raster_end.saturating_duration_since(self.raster_start)
    }

    /// Time from vsync start to raster end.
    #[must_use]
    pub const fn total_span(&self) -> Duration {
        self.raster_end.saturating_duration_since(self.vsync_start)
    }

    /// Whether the build finished after the frame's target time.
    #[must_use]
    pub fn missed_build_deadline(&self) -> bool {
        self.build_end > self.vsync_target
    }

    /// Parity of the frame number.
    #[must_use]
    pub const fn parity(&self) -> FrameParity {
        FrameParity::of(self.frame_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded_through_build() -> FrameTimingsRecorder {
        let mut rec = FrameTimingsRecorder::new();
        rec.record_vsync(HostTime(100), HostTime(16_766));
        rec.record_build_start(HostTime(200));
        rec.record_build_end(HostTime(4_200));
        rec
    }

    #[test]
    fn frame_numbers_increase() {
        let a = FrameTimingsRecorder::new();
        let b = FrameTimingsRecorder::new();
        assert!(a.frame_number() >= 1, "frame numbers start at 1");
        assert!(b.frame_number() > a.frame_number());
    }

    #[test]
    fn full_record_yields_timing() {
        let mut rec = recorded_through_build();
        rec.record_raster_start(HostTime(5_000));
        let timing = rec.record_raster_end(HostTime(9_000));

        assert_eq!(timing.frame_number, rec.frame_number());
        assert_eq!(timing.build_duration(), Duration(4_000));
        assert_eq!(timing.raster_duration(), Duration(4_000));
        assert_eq!(timing.total_span(), Duration(8_900));
        assert!(!timing.missed_build_deadline());
        assert_eq!(rec.state(), RecorderState::RasterEnd);
    }

    #[test]
    fn getters_follow_recorded_state() {
        let rec = recorded_through_build();
        assert_eq!(rec.vsync_start_time(), HostTime(100));
        assert_eq!(rec.vsync_target_time(), HostTime(16_766));
        assert_eq!(rec.build_start_time(), HostTime(200));
        assert_eq!(rec.build_end_time(), HostTime(4_200));
    }

    #[test]
    fn parity_matches_frame_number() {
        assert_eq!(FrameParity::of(2), FrameParity::Even);
        assert_eq!(FrameParity::of(7), FrameParity::Odd);
        let rec = FrameTimingsRecorder::new();
        assert_eq!(rec.frame_parity(), FrameParity::of(rec.frame_number()));
    }

    #[test]
    #[should_panic(expected = "timings out of order")]
    fn build_before_vsync_panics() {
        let mut rec = FrameTimingsRecorder::new();
        rec.record_build_start(HostTime(1));
    }

    #[test]
    #[should_panic(expected = "timings out of order")]
    fn double_vsync_panics() {
        let mut rec = FrameTimingsRecorder::new();
        rec.record_vsync(HostTime(1), HostTime(2));
        rec.record_vsync(HostTime(3), HostTime(4));
    }

    #[test]
    #[should_panic(expected = "not yet recorded")]
    fn reading_unrecorded_stamp_panics() {
        let rec = FrameTimingsRecorder::new();
        let _ = rec.vsync_target_time();
    }
}
