// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The raster stage.
//!
//! A [`Rasterizer`] takes [`Frame`]s out of the animator's pipeline,
//! prerolls and paints their layer trees onto a [`Canvas`], and completes
//! the frame timings. It owns the [`TextureRegistry`] texture layers
//! resolve against and remembers the last tree it drew, so the animator can
//! ask for a redraw without building anything.

use std::sync::Arc;

use kurbo::Affine;

use crate::animator::{Frame, FramePipeline};
use crate::canvas::Canvas;
use crate::diff::Damage;
use crate::geometry;
use crate::layer::{LayerTree, PrerollContext};
use crate::pipeline::ConsumeResult;
use crate::texture::TextureRegistry;
use crate::time::Clock;
use crate::timing::{FrameTiming, FrameTimingsRecorder};
use crate::trace::{FrameSummaryBuilder, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};

/// Result of a raster attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RasterStatus {
    /// A frame was drawn.
    Success {
        /// Completed timings of the frame.
        timing: FrameTiming,
        /// Whether another frame is waiting in the pipeline.
        more_available: bool,
    },
    /// The pipeline had nothing ready.
    NotReady,
    /// A redraw was requested before any tree was drawn.
    NoLastFrame,
}

impl RasterStatus {
    /// Timings of the drawn frame, if any.
    #[must_use]
    pub fn timing(&self) -> Option<&FrameTiming> {
        match self {
            Self::Success { timing, .. } => Some(timing),
            _ => None,
        }
    }
}

/// Draws frames produced by the [`Animator`](crate::animator::Animator).
pub struct Rasterizer {
    clock: Arc<dyn Clock>,
    textures: TextureRegistry,
    last_layer_tree: Option<Arc<LayerTree>>,
    root_transform: Affine,
    tracer: Tracer,
}

impl core::fmt::Debug for Rasterizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Rasterizer")
            .field("textures", &self.textures)
            .field("has_last_layer_tree", &self.last_layer_tree.is_some())
            .field("root_transform", &self.root_transform)
            .finish_non_exhaustive()
    }
}

impl Rasterizer {
    /// Creates a rasterizer with an empty texture registry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            textures: TextureRegistry::new(),
            last_layer_tree: None,
            root_transform: Affine::IDENTITY,
            tracer: Tracer::none(),
        }
    }

    /// Sends raster events and frame summaries to `tracer`.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// Sets the transform applied above every root layer, e.g. a surface
    /// rotation.
    pub fn set_root_transform(&mut self, transform: Affine) {
        self.root_transform = transform;
    }

    /// Textures available to texture layers.
    #[must_use]
    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    /// Textures available to texture layers, mutably.
    pub fn textures_mut(&mut self) -> &mut TextureRegistry {
        &mut self.textures
    }

    /// The tree drawn most recently.
    #[must_use]
    pub fn last_layer_tree(&self) -> Option<&Arc<LayerTree>> {
        self.last_layer_tree.as_ref()
    }

    /// Consumes one frame from `pipeline` and draws it onto `canvas`.
    ///
    /// When the frame carries damage, painting is clipped to it; empty
    /// damage skips painting entirely.
    pub fn draw(&mut self, pipeline: &FramePipeline, canvas: &mut dyn Canvas) -> RasterStatus {
        let mut drawn = None;
        let result = pipeline.consume(|frame, _| {
            drawn = Some(self.draw_frame(frame, canvas));
        });
        match (result, drawn) {
            (ConsumeResult::NoneAvailable, _) | (_, None) => RasterStatus::NotReady,
            (result, Some(timing)) => RasterStatus::Success {
                timing,
                more_available: result == ConsumeResult::MoreAvailable,
            },
        }
    }

    /// Redraws the last tree in full with the given timings.
    pub fn draw_last_layer_tree(
        &mut self,
        timings: FrameTimingsRecorder,
        canvas: &mut dyn Canvas,
    ) -> RasterStatus {
        let Some(layer_tree) = self.last_layer_tree.clone() else {
            tracing::debug!("no layer tree drawn yet; nothing to redraw");
            return RasterStatus::NoLastFrame;
        };
        let timing = self.rasterize(
            &layer_tree,
            None,
            timings,
            FrameSummaryBuilder::new(),
            true,
            canvas,
        );
        RasterStatus::Success {
            timing,
            more_available: false,
        }
    }

    fn draw_frame(&mut self, frame: Frame, canvas: &mut dyn Canvas) -> FrameTiming {
        let mut summary = FrameSummaryBuilder::new();
        if let Some((start, end)) = frame.diff_span {
            summary.phase_begin(PhaseKind::Diff, start);
            summary.phase_end(PhaseKind::Diff, end);
        }
        let timing = self.rasterize(
            &frame.layer_tree,
            frame.damage,
            frame.timings,
            summary,
            false,
            canvas,
        );
        self.last_layer_tree = Some(frame.layer_tree);
        timing
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(frame = timings.frame_number(), reused = reused)
    )]
    fn rasterize(
        &mut self,
        layer_tree: &LayerTree,
        damage: Option<Damage>,
        mut timings: FrameTimingsRecorder,
        mut summary: FrameSummaryBuilder,
        reused: bool,
        canvas: &mut dyn Canvas,
    ) -> FrameTiming {
        let frame_number = timings.frame_number();
        let start = self.clock.now();
        timings.record_raster_start(start);
        summary.phase_begin(PhaseKind::Raster, start);
        summary.set_reused(reused);
        self.tracer.phase_begin(&PhaseBeginEvent {
            frame_number,
            phase: PhaseKind::Raster,
            timestamp: start,
        });

        match damage {
            Some(damage) if damage.is_empty() => {
                tracing::trace!(frame_number, "no damage; skipping paint");
            }
            _ => {
                let prerolled =
                    layer_tree.preroll(PrerollContext::new(&self.textures), self.root_transform);
                if prerolled.surface_needs_readback() {
                    tracing::trace!(frame_number, "tree reads back the surface");
                }
                let count = canvas.save();
                if let Some(damage) = damage {
                    // Damage is in root coordinates; the clip applies above
                    // the root transform.
                    let clip = geometry::round_out(geometry::map_rect(
                        self.root_transform,
                        damage.frame_damage,
                    ));
                    canvas.clip_rect(clip, false);
                }
                prerolled.paint(canvas, &self.textures);
                canvas.restore_to_count(count);
            }
        }

        let end = self.clock.now();
        let timing = timings.record_raster_end(end);
        summary.phase_end(PhaseKind::Raster, end);
        self.tracer.phase_end(&PhaseEndEvent {
            frame_number,
            phase: PhaseKind::Raster,
            timestamp: end,
        });
        #[cfg(feature = "trace-rich")]
        self.tracer.damage(&crate::trace::DamageEvent {
            frame_number,
            frame_damage: damage.map_or(layer_tree.frame_rect(), |d| d.frame_damage),
            frame_rect: layer_tree.frame_rect(),
        });
        self.tracer.frame_summary(&summary.finish(&timing));
        if timing.missed_build_deadline() {
            tracing::debug!(frame_number, "build finished after the vsync target");
        }
        timing
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Rect, Shape, Size};

    use super::*;
    use crate::canvas::{Color, DrawOp, Paint, RecordingCanvas};
    use crate::diff::diff_layer_tree;
    use crate::layer::Layer;
    use crate::time::{Duration, HostTime, ManualClock};

    fn square(rect: Rect) -> Arc<Layer> {
        Layer::shape(rect.to_path(0.1), Paint::fill(Color::BLACK)).into_shared()
    }

    fn tree(children: impl IntoIterator<Item = Arc<Layer>>) -> LayerTree {
        LayerTree::new(
            Layer::container().with_children(children).into_shared(),
            Size::new(100.0, 100.0),
            1.0,
        )
    }

    fn timings(clock: &ManualClock) -> FrameTimingsRecorder {
        let now = clock.now();
        let mut timings = FrameTimingsRecorder::new();
        timings.record_vsync(now, now.saturating_add(Duration::from_millis(16)));
        timings.record_build_start(now);
        timings.record_build_end(now);
        timings
    }

    fn push(
        pipeline: &Arc<FramePipeline>,
        layer_tree: LayerTree,
        damage: Option<Damage>,
        clock: &ManualClock,
    ) {
        let timings = timings(clock);
        let mut continuation = pipeline.produce().expect("pipeline slot");
        assert!(continuation.complete(Frame {
            layer_tree: Arc::new(layer_tree),
            damage,
            frame_number: timings.frame_number(),
            diff_span: None,
            timings,
        }));
    }

    fn setup() -> (Arc<ManualClock>, Rasterizer, Arc<FramePipeline>) {
        let clock = Arc::new(ManualClock::new(HostTime(1_000)));
        let rasterizer = Rasterizer::new(clock.clone());
        (clock, rasterizer, Arc::new(FramePipeline::new(2)))
    }

    #[test]
    fn empty_pipeline_is_not_ready() {
        let (_, mut rasterizer, pipeline) = setup();
        let mut canvas = RecordingCanvas::new();
        assert_eq!(rasterizer.draw(&pipeline, &mut canvas), RasterStatus::NotReady);
        assert!(canvas.draw_calls().is_empty());
    }

    #[test]
    fn draw_clips_to_damage_and_completes_timings() {
        let (clock, mut rasterizer, pipeline) = setup();
        let damage = Damage {
            frame_damage: Rect::new(10.0, 10.0, 30.0, 30.0),
        };
        push(&pipeline, tree([square(Rect::new(10.0, 10.0, 30.0, 30.0))]), Some(damage), &clock);
        push(&pipeline, tree([]), None, &clock);

        let mut canvas = RecordingCanvas::new();
        let status = rasterizer.draw(&pipeline, &mut canvas);
        let RasterStatus::Success {
            timing,
            more_available,
        } = status
        else {
            panic!("expected a drawn frame, got {status:?}");
        };
        assert!(more_available);
        assert_eq!(timing.raster_start, clock.now());
        let ops: Vec<_> = canvas.draw_calls().iter().map(|c| &c.op).collect();
        assert!(matches!(ops[0], DrawOp::Save));
        assert!(matches!(
            ops[1],
            DrawOp::ClipRect { rect, anti_alias: false } if *rect == damage.frame_damage
        ));
        assert!(ops.iter().any(|op| matches!(op, DrawOp::DrawPath { .. })));
        assert_eq!(canvas.save_count(), 0);
        assert!(rasterizer.last_layer_tree().is_some());

        let status = rasterizer.draw(&pipeline, &mut canvas);
        assert!(matches!(
            status,
            RasterStatus::Success {
                more_available: false,
                ..
            }
        ));
    }

    #[test]
    fn empty_damage_skips_paint() {
        let (clock, mut rasterizer, pipeline) = setup();
        push(&pipeline, tree([square(Rect::new(0.0, 0.0, 5.0, 5.0))]), Some(Damage::NONE), &clock);
        let mut canvas = RecordingCanvas::new();
        assert!(rasterizer.draw(&pipeline, &mut canvas).timing().is_some());
        assert!(canvas.draw_calls().is_empty());
    }

    #[test]
    fn redraw_needs_a_previous_frame() {
        let (clock, mut rasterizer, pipeline) = setup();
        let mut canvas = RecordingCanvas::new();
        assert_eq!(
            rasterizer.draw_last_layer_tree(timings(&clock), &mut canvas),
            RasterStatus::NoLastFrame
        );

        push(&pipeline, tree([square(Rect::new(0.0, 0.0, 5.0, 5.0))]), None, &clock);
        rasterizer.draw(&pipeline, &mut canvas);
        canvas.take_calls();

        clock.advance(Duration::from_millis(2));
        let status = rasterizer.draw_last_layer_tree(timings(&clock), &mut canvas);
        assert_eq!(status.timing().map(|t| t.raster_start), Some(clock.now()));
        assert!(
            !canvas
                .draw_calls()
                .iter()
                .any(|c| matches!(c.op, DrawOp::ClipRect { .. })),
            "redraws are not clipped"
        );
        assert!(canvas.draw_calls().iter().any(|c| matches!(c.op, DrawOp::DrawPath { .. })));
    }

    #[test]
    fn root_transform_wraps_the_tree() {
        let (clock, mut rasterizer, pipeline) = setup();
        rasterizer.set_root_transform(Affine::scale(2.0));
        let mut layer_tree = tree([square(Rect::new(0.0, 0.0, 5.0, 5.0))]);
        let damage = diff_layer_tree(&mut layer_tree, None);
        push(&pipeline, layer_tree, Some(damage), &clock);
        let mut canvas = RecordingCanvas::new();
        rasterizer.draw(&pipeline, &mut canvas);
        assert!(
            canvas
                .draw_calls()
                .iter()
                .any(|c| c.op == DrawOp::Concat(Affine::scale(2.0)))
        );
    }

    #[test]
    fn damage_clip_follows_root_transform() {
        let (clock, mut rasterizer, pipeline) = setup();
        let scale = Affine::scale(2.0);
        rasterizer.set_root_transform(scale);
        let old = tree([square(Rect::new(10.0, 10.0, 20.0, 20.0))]);
        let mut new = tree([square(Rect::new(30.0, 30.0, 40.0, 40.0))]);
        let damage = diff_layer_tree(&mut new, Some(&old));
        push(&pipeline, new, Some(damage), &clock);

        let mut canvas = RecordingCanvas::new();
        rasterizer.draw(&pipeline, &mut canvas);
        let clip = canvas
            .draw_calls()
            .iter()
            .find_map(|c| match c.op {
                DrawOp::ClipRect { rect, .. } => Some(rect),
                _ => None,
            })
            .expect("damage clip");
        assert_eq!(clip, geometry::map_rect(scale, damage.frame_damage));
        for device in [Rect::new(20.0, 20.0, 40.0, 40.0), Rect::new(60.0, 60.0, 80.0, 80.0)] {
            assert_eq!(clip.union(device), clip, "clip must cover {device:?}");
        }
    }

    #[cfg(feature = "trace")]
    #[test]
    fn summaries_reach_the_tracer() {
        use crate::trace::{FrameSummary, TraceSink};

        #[derive(Default)]
        struct Summaries(Vec<FrameSummary>);
        impl TraceSink for Summaries {
            fn on_frame_summary(&mut self, s: &FrameSummary) {
                self.0.push(*s);
            }
        }

        let (clock, rasterizer, pipeline) = setup();
        let sink = Arc::new(parking_lot::Mutex::new(Summaries::default()));
        let mut rasterizer = rasterizer.with_tracer(Tracer::new(sink.clone()));
        push(&pipeline, tree([]), None, &clock);
        rasterizer.draw(&pipeline, &mut RecordingCanvas::new());
        rasterizer.draw_last_layer_tree(timings(&clock), &mut RecordingCanvas::new());

        let summaries = &sink.lock().0;
        assert_eq!(summaries.len(), 2);
        assert!(!summaries[0].reused);
        assert!(summaries[1].reused);
    }
}
