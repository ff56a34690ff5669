// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained layer tree, damage diffing and frame scheduling.
//!
//! `lamina_core` is the frame-production core of a retained-mode UI
//! engine. A producer on the logic thread builds an immutable tree of
//! compositing layers each frame; the core works out which part of the
//! screen changed since the previous frame, hands the frame to a raster
//! thread through a bounded pipeline, and paces everything to vsync.
//!
//! # Architecture
//!
//! ```text
//!   VsyncWaiter ──► Animator ──► AnimatorDelegate::on_animator_begin_frame
//!                      │                         │
//!                      │                    LayerTree
//!                      ▼                         │
//!               diff_layer_tree(new, old) ◄──────┘
//!                      │
//!                      ▼
//!          Pipeline<Frame> (bounded) ──► Rasterizer::draw
//!                                           │
//!                                   preroll ──► paint ──► Canvas
//! ```
//!
//! **[`layer`]**: Layer nodes, shared through `Arc` so unchanged subtrees
//! are retained across frames, with preroll (bounds) and paint passes.
//!
//! **[`diff`]**: Compares a new tree against the previous one and produces
//! the frame damage rectangle plus per-layer paint regions for the next
//! comparison.
//!
//! **[`pipeline`]**: Bounded single-producer single-consumer hand-off with
//! reservations that can be abandoned.
//!
//! **[`animator`]**: Vsync-driven frame scheduler with request coalescing,
//! idle notifications and redraw of the previous tree.
//!
//! **[`rasterizer`]**: Consumes frames, paints them clipped to their
//! damage, and completes [`timing`] records.
//!
//! **[`vsync`]** and **[`task`]**: Vsync sources and the logic thread's
//! message queue.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame-loop instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-frame
//!   damage events.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod animator;
pub mod canvas;
pub mod diff;
pub mod error;
pub mod geometry;
pub mod layer;
pub mod pipeline;
pub mod rasterizer;
pub mod task;
pub mod texture;
pub mod time;
pub mod timing;
pub mod trace;
pub mod vsync;

#[cfg(test)]
mod testing;
