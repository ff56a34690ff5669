// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and appends each event to a
//! `Vec<u8>` as a tag byte followed by fixed-size little-endian fields.
//! [`decode`] reads them back as an iterator of [`RecordedEvent`].
//!
//! Recording is cheap enough to leave on for a whole session; decoding and
//! export happen afterwards.

use kurbo::Rect;

use lamina_core::time::{Duration, HostTime};
use lamina_core::timing::FrameParity;
use lamina_core::trace::{
    DamageEvent, FrameRequestEvent, FrameReuseEvent, FrameSummary, IdleEvent, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, TraceFlowEndEvent, TraceSink, VsyncEvent,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_REQUEST: u8 = 1;
const TAG_VSYNC: u8 = 2;
const TAG_PHASE_BEGIN: u8 = 3;
const TAG_PHASE_END: u8 = 4;
const TAG_FRAME_REUSE: u8 = 5;
const TAG_IDLE: u8 = 6;
const TAG_TRACE_FLOW_END: u8 = 7;
const TAG_FRAME_SUMMARY: u8 = 8;
const TAG_DAMAGE: u8 = 9;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Discards everything recorded so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_time(&mut self, t: HostTime) {
        self.write_u64(t.nanos());
    }

    fn write_duration(&mut self, d: Duration) {
        self.write_u64(d.nanos());
    }

    fn write_option_u64(&mut self, v: Option<u64>) {
        self.write_bool(v.is_some());
        self.write_u64(v.unwrap_or(0));
    }

    fn write_rect(&mut self, r: Rect) {
        for v in [r.x0, r.y0, r.x1, r.y1] {
            self.write_u64(v.to_bits());
        }
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Build => 0,
            PhaseKind::Diff => 1,
            PhaseKind::Raster => 2,
        });
    }

    fn write_phase_event(&mut self, tag: u8, frame_number: u64, phase: PhaseKind, t: HostTime) {
        self.write_u8(tag);
        self.write_u64(frame_number);
        self.write_phase(phase);
        self.write_time(t);
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_request(&mut self, e: &FrameRequestEvent) {
        self.write_u8(TAG_FRAME_REQUEST);
        self.write_time(e.timestamp);
        self.write_bool(e.regenerate);
        self.write_bool(e.scheduled);
    }

    fn on_vsync(&mut self, e: &VsyncEvent) {
        self.write_u8(TAG_VSYNC);
        self.write_u64(e.frame_number);
        self.write_time(e.vsync_start);
        self.write_time(e.vsync_target);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_phase_event(TAG_PHASE_BEGIN, e.frame_number, e.phase, e.timestamp);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_phase_event(TAG_PHASE_END, e.frame_number, e.phase, e.timestamp);
    }

    fn on_frame_reuse(&mut self, e: &FrameReuseEvent) {
        self.write_u8(TAG_FRAME_REUSE);
        self.write_u64(e.frame_number);
        self.write_time(e.timestamp);
    }

    fn on_idle(&mut self, e: &IdleEvent) {
        self.write_u8(TAG_IDLE);
        self.write_time(e.timestamp);
        self.write_time(e.deadline);
    }

    fn on_trace_flow_end(&mut self, e: &TraceFlowEndEvent) {
        self.write_u8(TAG_TRACE_FLOW_END);
        self.write_u64(e.flow_id);
        self.write_option_u64(e.frame_number);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_number);
        self.write_time(s.vsync_start);
        self.write_time(s.vsync_target);
        self.write_duration(s.build);
        self.write_duration(s.diff);
        self.write_duration(s.raster);
        self.write_duration(s.total);
        self.write_bool(s.missed_build_deadline);
        self.write_bool(s.reused);
    }

    fn on_damage(&mut self, e: &DamageEvent) {
        self.write_u8(TAG_DAMAGE);
        self.write_u64(e.frame_number);
        self.write_rect(e.frame_damage);
        self.write_rect(e.frame_rect);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`FrameRequestEvent`].
    FrameRequest(FrameRequestEvent),
    /// A [`VsyncEvent`].
    Vsync(VsyncEvent),
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`FrameReuseEvent`].
    FrameReuse(FrameReuseEvent),
    /// An [`IdleEvent`].
    Idle(IdleEvent),
    /// A [`TraceFlowEndEvent`].
    TraceFlowEnd(TraceFlowEndEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// A [`DamageEvent`].
    Damage(DamageEvent),
}

impl RecordedEvent {
    /// Host time the event is placed at on a timeline, if it has one.
    #[must_use]
    pub fn timestamp(&self) -> Option<HostTime> {
        match self {
            Self::FrameRequest(e) => Some(e.timestamp),
            Self::Vsync(e) => Some(e.vsync_start),
            Self::PhaseBegin(e) => Some(e.timestamp),
            Self::PhaseEnd(e) => Some(e.timestamp),
            Self::FrameReuse(e) => Some(e.timestamp),
            Self::Idle(e) => Some(e.timestamp),
            Self::FrameSummary(s) => Some(s.vsync_start.saturating_add(s.total)),
            Self::TraceFlowEnd(_) | Self::Damage(_) => None,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_u8(&mut self) -> Option<u8> {
        let v = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        let bytes = self.data.get(self.pos..self.pos + 8)?;
        let v = u64::from_le_bytes(bytes.try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_duration(&mut self) -> Option<Duration> {
        self.read_u64().map(Duration)
    }

    fn read_option_u64(&mut self) -> Option<Option<u64>> {
        let present = self.read_bool()?;
        let val = self.read_u64()?;
        Some(present.then_some(val))
    }

    fn read_rect(&mut self) -> Option<Rect> {
        let mut v = [0.0; 4];
        for slot in &mut v {
            *slot = f64::from_bits(self.read_u64()?);
        }
        Some(Rect::new(v[0], v[1], v[2], v[3]))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Build,
            1 => PhaseKind::Diff,
            _ => PhaseKind::Raster,
        })
    }

    fn decode_frame_request(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameRequest(FrameRequestEvent {
            timestamp: self.read_time()?,
            regenerate: self.read_bool()?,
            scheduled: self.read_bool()?,
        }))
    }

    fn decode_vsync(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Vsync(VsyncEvent {
            frame_number: self.read_u64()?,
            vsync_start: self.read_time()?,
            vsync_target: self.read_time()?,
        }))
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_number: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_number: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_frame_reuse(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameReuse(FrameReuseEvent {
            frame_number: self.read_u64()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_idle(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Idle(IdleEvent {
            timestamp: self.read_time()?,
            deadline: self.read_time()?,
        }))
    }

    fn decode_trace_flow_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TraceFlowEnd(TraceFlowEndEvent {
            flow_id: self.read_u64()?,
            frame_number: self.read_option_u64()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        let frame_number = self.read_u64()?;
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_number,
            parity: FrameParity::of(frame_number),
            vsync_start: self.read_time()?,
            vsync_target: self.read_time()?,
            build: self.read_duration()?,
            diff: self.read_duration()?,
            raster: self.read_duration()?,
            total: self.read_duration()?,
            missed_build_deadline: self.read_bool()?,
            reused: self.read_bool()?,
        }))
    }

    fn decode_damage(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Damage(DamageEvent {
            frame_number: self.read_u64()?,
            frame_damage: self.read_rect()?,
            frame_rect: self.read_rect()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_FRAME_REQUEST => self.decode_frame_request(),
            TAG_VSYNC => self.decode_vsync(),
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_FRAME_REUSE => self.decode_frame_reuse(),
            TAG_IDLE => self.decode_idle(),
            TAG_TRACE_FLOW_END => self.decode_trace_flow_end(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_DAMAGE => self.decode_damage(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> FrameSummary {
        FrameSummary {
            frame_number: 7,
            parity: FrameParity::Odd,
            vsync_start: HostTime(1_000_000),
            vsync_target: HostTime(17_666_667),
            build: Duration(400_000),
            diff: Duration(30_000),
            raster: Duration(1_500_000),
            total: Duration(3_000_000),
            missed_build_deadline: false,
            reused: true,
        }
    }

    #[test]
    fn frame_summary_survives_recording() {
        let mut rec = RecorderSink::new();
        rec.on_frame_summary(&sample_summary());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::FrameSummary(s) => {
                assert_eq!(s.frame_number, 7);
                assert_eq!(s.parity, FrameParity::Odd);
                assert_eq!(s.diff, Duration(30_000));
                assert_eq!(s.raster, Duration(1_500_000));
                assert!(s.reused);
                assert!(!s.missed_build_deadline);
            }
            other => panic!("expected FrameSummary, got {other:?}"),
        }
    }

    #[test]
    fn mixed_events_keep_order() {
        let mut rec = RecorderSink::new();
        rec.on_frame_request(&FrameRequestEvent {
            timestamp: HostTime(10),
            regenerate: true,
            scheduled: false,
        });
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_number: 3,
            phase: PhaseKind::Diff,
            timestamp: HostTime(2_000),
        });
        rec.on_trace_flow_end(&TraceFlowEndEvent {
            flow_id: 99,
            frame_number: None,
        });
        rec.on_damage(&DamageEvent {
            frame_number: 3,
            frame_damage: Rect::new(1.0, 2.0, 30.0, 40.0),
            frame_rect: Rect::new(0.0, 0.0, 800.0, 600.0),
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            RecordedEvent::FrameRequest(FrameRequestEvent {
                regenerate: true,
                scheduled: false,
                ..
            })
        ));
        assert!(matches!(
            events[1],
            RecordedEvent::PhaseBegin(PhaseBeginEvent {
                phase: PhaseKind::Diff,
                ..
            })
        ));
        assert!(matches!(
            events[2],
            RecordedEvent::TraceFlowEnd(TraceFlowEndEvent {
                flow_id: 99,
                frame_number: None,
            })
        ));
        match &events[3] {
            RecordedEvent::Damage(e) => assert_eq!(e.frame_damage, Rect::new(1.0, 2.0, 30.0, 40.0)),
            other => panic!("expected Damage, got {other:?}"),
        }
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_idle(&IdleEvent {
            timestamp: HostTime(5),
            deadline: HostTime(100_000_005),
        });
        rec.on_frame_reuse(&FrameReuseEvent {
            frame_number: 2,
            timestamp: HostTime(9),
        });
        let bytes = rec.into_bytes();
        let truncated = &bytes[..bytes.len() - 3];
        let events: Vec<_> = decode(truncated).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], RecordedEvent::Idle(_)));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        assert_eq!(decode(&[]).count(), 0);
    }
}
