// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Logic-thread events (requests, vsyncs, build and diff phases, idle) go
//! on thread 0; raster phases and summaries go on thread 1.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use lamina_core::time::{Duration, HostTime};
use lamina_core::trace::PhaseKind;

use crate::recorder::{RecordedEvent, decode};

const LOGIC_TID: u32 = 0;
const RASTER_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Timestamps are in microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let events: Vec<Value> = decode(bytes).filter_map(|e| to_json(&e)).collect();
    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_json(recorded: &RecordedEvent) -> Option<Value> {
    Some(match recorded {
        RecordedEvent::FrameRequest(e) => json!({
            "ph": "i",
            "name": "RequestFrame",
            "cat": "Animator",
            "ts": us(e.timestamp),
            "pid": 0,
            "tid": LOGIC_TID,
            "s": "t",
            "args": {
                "regenerate": e.regenerate,
                "scheduled": e.scheduled,
            }
        }),
        RecordedEvent::Vsync(e) => json!({
            "ph": "i",
            "name": "Vsync",
            "cat": "Animator",
            "ts": us(e.vsync_start),
            "pid": 0,
            "tid": LOGIC_TID,
            "s": "g",
            "args": {
                "frame_number": e.frame_number,
                "target_us": us(e.vsync_target),
            }
        }),
        RecordedEvent::PhaseBegin(e) => json!({
            "ph": "B",
            "name": e.phase.as_str(),
            "cat": "Frame",
            "ts": us(e.timestamp),
            "pid": 0,
            "tid": phase_tid(e.phase),
            "args": {
                "frame_number": e.frame_number,
            }
        }),
        RecordedEvent::PhaseEnd(e) => json!({
            "ph": "E",
            "name": e.phase.as_str(),
            "cat": "Frame",
            "ts": us(e.timestamp),
            "pid": 0,
            "tid": phase_tid(e.phase),
            "args": {
                "frame_number": e.frame_number,
            }
        }),
        RecordedEvent::FrameReuse(e) => json!({
            "ph": "i",
            "name": "DrawLastLayerTree",
            "cat": "Animator",
            "ts": us(e.timestamp),
            "pid": 0,
            "tid": LOGIC_TID,
            "s": "t",
            "args": {
                "frame_number": e.frame_number,
            }
        }),
        RecordedEvent::Idle(e) => json!({
            "ph": "X",
            "name": "Idle",
            "cat": "Animator",
            "ts": us(e.timestamp),
            "dur": dur_us(e.deadline.saturating_duration_since(e.timestamp)),
            "pid": 0,
            "tid": LOGIC_TID,
        }),
        RecordedEvent::FrameSummary(s) => json!({
            "ph": "i",
            "name": "FrameSummary",
            "cat": "Summary",
            "ts": us(s.vsync_start.saturating_add(s.total)),
            "pid": 0,
            "tid": RASTER_TID,
            "s": "t",
            "args": {
                "frame_number": s.frame_number,
                "parity": s.parity.as_str(),
                "build_us": dur_us(s.build),
                "diff_us": dur_us(s.diff),
                "raster_us": dur_us(s.raster),
                "total_us": dur_us(s.total),
                "missed_build_deadline": s.missed_build_deadline,
                "reused": s.reused,
            }
        }),
        RecordedEvent::Damage(e) => {
            let d = e.frame_damage;
            json!({
                "ph": "i",
                "name": "Damage",
                "cat": "Rich",
                "ts": 0,
                "pid": 0,
                "tid": RASTER_TID,
                "s": "p",
                "args": {
                    "frame_number": e.frame_number,
                    "rect": [d.x0, d.y0, d.x1, d.y1],
                    "area_ratio": d.area() / e.frame_rect.area().max(1.0),
                }
            })
        }
        // Flow ends carry no timestamp of their own.
        RecordedEvent::TraceFlowEnd(_) => return None,
    })
}

fn phase_tid(phase: PhaseKind) -> u32 {
    match phase {
        PhaseKind::Build | PhaseKind::Diff => LOGIC_TID,
        PhaseKind::Raster => RASTER_TID,
    }
}

fn us(t: HostTime) -> f64 {
    t.as_micros_f64()
}

fn dur_us(d: Duration) -> f64 {
    d.nanos() as f64 / 1000.0
}
