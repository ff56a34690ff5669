// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Times are
//! printed in microseconds.

use std::io::Write;

use lamina_core::time::{Duration, HostTime};
use lamina_core::trace::{
    DamageEvent, FrameRequestEvent, FrameReuseEvent, FrameSummary, IdleEvent, PhaseBeginEvent,
    PhaseEndEvent, TraceFlowEndEvent, TraceSink, VsyncEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn us(t: HostTime) -> f64 {
    t.as_micros_f64()
}

fn dur_us(d: Duration) -> f64 {
    d.nanos() as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        let outcome = if e.scheduled { "scheduled" } else { "coalesced" };
        let _ = writeln!(
            self.writer,
            "[request] at {:.1}µs regenerate={} {outcome}",
            us(e.timestamp),
            e.regenerate,
        );
    }

    fn on_vsync(&mut self, e: &VsyncEvent) {
        let _ = writeln!(
            self.writer,
            "[vsync] frame={} start={:.1}µs target={:.1}µs",
            e.frame_number,
            us(e.vsync_start),
            us(e.vsync_target),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_number,
            e.phase.as_str(),
            us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_number,
            e.phase.as_str(),
            us(e.timestamp),
        );
    }

    fn on_frame_reuse(&mut self, e: &FrameReuseEvent) {
        let _ = writeln!(
            self.writer,
            "[reuse] frame={} at {:.1}µs",
            e.frame_number,
            us(e.timestamp),
        );
    }

    fn on_idle(&mut self, e: &IdleEvent) {
        let _ = writeln!(
            self.writer,
            "[idle] at {:.1}µs deadline={:.1}µs",
            us(e.timestamp),
            us(e.deadline),
        );
    }

    fn on_trace_flow_end(&mut self, e: &TraceFlowEndEvent) {
        let _ = match e.frame_number {
            Some(frame) => writeln!(self.writer, "[flow] id={} frame={frame}", e.flow_id),
            None => writeln!(self.writer, "[flow] id={} cleared", e.flow_id),
        };
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let missed = if s.missed_build_deadline { "MISSED" } else { "ok" };
        let kind = if s.reused { " reused" } else { "" };
        let _ = writeln!(
            self.writer,
            "[summary] frame={} ({}){kind} build={:.1}µs diff={:.1}µs \
             raster={:.1}µs total={:.1}µs deadline={missed}",
            s.frame_number,
            s.parity.as_str(),
            dur_us(s.build),
            dur_us(s.diff),
            dur_us(s.raster),
            dur_us(s.total),
        );
    }

    fn on_damage(&mut self, e: &DamageEvent) {
        let d = e.frame_damage;
        let _ = writeln!(
            self.writer,
            "[damage] frame={} rect=({}, {}, {}, {}) of {}x{}",
            e.frame_number,
            d.x0,
            d.y0,
            d.x1,
            d.y1,
            e.frame_rect.width(),
            e.frame_rect.height(),
        );
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;
    use lamina_core::timing::FrameParity;

    use super::*;

    fn output(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_writer()).unwrap()
    }

    #[test]
    fn pretty_print_vsync() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_vsync(&VsyncEvent {
            frame_number: 4,
            vsync_start: HostTime(1_000_000),
            vsync_target: HostTime(17_666_667),
        });
        let output = output(sink);
        assert!(output.starts_with("[vsync] frame=4"), "got: {output}");
        assert!(output.contains("start=1000.0µs"), "got: {output}");
    }

    #[test]
    fn pretty_print_summary_flags_misses() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame_summary(&FrameSummary {
            frame_number: 9,
            parity: FrameParity::Odd,
            vsync_start: HostTime(0),
            vsync_target: HostTime(16_000_000),
            build: Duration(20_000_000),
            diff: Duration::ZERO,
            raster: Duration(1_000),
            total: Duration(21_000_000),
            missed_build_deadline: true,
            reused: false,
        });
        let output = output(sink);
        assert!(output.contains("frame=9 (odd)"), "got: {output}");
        assert!(output.contains("deadline=MISSED"), "got: {output}");
        assert!(!output.contains("reused"), "got: {output}");
    }

    #[test]
    fn pretty_print_cleared_flow_and_damage() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_trace_flow_end(&TraceFlowEndEvent {
            flow_id: 12,
            frame_number: None,
        });
        sink.on_damage(&DamageEvent {
            frame_number: 1,
            frame_damage: Rect::new(0.0, 0.0, 10.0, 20.0),
            frame_rect: Rect::new(0.0, 0.0, 800.0, 600.0),
        });
        let output = output(sink);
        assert!(output.contains("[flow] id=12 cleared"), "got: {output}");
        assert!(output.contains("rect=(0, 0, 10, 20) of 800x600"), "got: {output}");
    }
}
