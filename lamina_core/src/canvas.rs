// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing surface layers paint onto.
//!
//! [`Canvas`] is the command interface the paint traversal targets. The core
//! never rasterizes; an embedder implements `Canvas` over its 2D renderer.
//! [`RecordingCanvas`] captures commands as [`DrawCall`]s, which is what
//! pictures, tests and the headless demo use.

use std::sync::Arc;

use kurbo::{Affine, BezPath, Rect, Vec2};

/// A 32-bit ARGB color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u32);

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self(0x0000_0000);
    /// Opaque black.
    pub const BLACK: Self = Self(0xFF00_0000);
    /// Opaque white.
    pub const WHITE: Self = Self(0xFFFF_FFFF);

    /// Builds a color from its components.
    #[inline]
    #[must_use]
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// Alpha component.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "shifted down to the top byte"
    )]
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Whether the alpha component is 255.
    #[inline]
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        self.alpha() == 0xFF
    }
}

impl core::fmt::Debug for Color {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Color({:#010x})", self.0)
    }
}

/// Fill parameters for path and paint commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Paint {
    /// Fill color.
    pub color: Color,
    /// Whether edges are anti-aliased.
    pub anti_alias: bool,
}

impl Paint {
    /// An anti-aliased fill of `color`.
    #[must_use]
    pub const fn fill(color: Color) -> Self {
        Self {
            color,
            anti_alias: true,
        }
    }
}

/// How a layer clips its children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Clip {
    /// No clipping.
    #[default]
    None,
    /// Clip without anti-aliasing.
    HardEdge,
    /// Anti-aliased clip.
    AntiAlias,
    /// Anti-aliased clip with the children composited in a save layer.
    AntiAliasWithSaveLayer,
}

/// Image sampling used when drawing textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Sampling {
    /// Nearest-neighbour.
    Nearest,
    /// Bilinear.
    #[default]
    Linear,
}

/// Parameters of a save layer.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct SaveLayerRec {
    /// Bounds hint for the offscreen layer.
    pub bounds: Option<Rect>,
    /// Alpha applied when the layer is composited back.
    pub alpha: Option<u8>,
    /// Gaussian blur sigma applied to the backdrop before drawing into the
    /// layer.
    pub backdrop_blur: Option<f64>,
}

impl SaveLayerRec {
    /// A plain save layer with `bounds`.
    #[must_use]
    pub const fn bounded(bounds: Rect) -> Self {
        Self {
            bounds: Some(bounds),
            alpha: None,
            backdrop_blur: None,
        }
    }
}

/// A shadow cast by a physical shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Shadow {
    /// Outline of the occluder.
    pub path: BezPath,
    /// Shadow color.
    pub color: Color,
    /// Elevation of the occluder above the canvas.
    pub elevation: f64,
    /// Whether the occluder is translucent.
    pub transparent_occluder: bool,
    /// Device pixel ratio of the frame.
    pub device_pixel_ratio: f64,
}

/// A recorded drawing command.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// `save()`.
    Save,
    /// `save_layer()`.
    SaveLayer(SaveLayerRec),
    /// `restore()`.
    Restore,
    /// `concat(matrix)`.
    Concat(Affine),
    /// `translate(offset)`.
    Translate(Vec2),
    /// `clip_rect(rect, anti_alias)`.
    ClipRect {
        /// Clip rectangle.
        rect: Rect,
        /// Anti-aliased edges.
        anti_alias: bool,
    },
    /// `clip_path(path, anti_alias)`.
    ClipPath {
        /// Clip outline.
        path: BezPath,
        /// Anti-aliased edges.
        anti_alias: bool,
    },
    /// `draw_path(path, paint)`.
    DrawPath {
        /// Outline.
        path: BezPath,
        /// Fill.
        paint: Paint,
    },
    /// `draw_paint(paint)`.
    DrawPaint(Paint),
    /// `draw_shadow(shadow)`.
    DrawShadow(Shadow),
    /// `draw_picture(picture)`.
    DrawPicture {
        /// Cull rect of the picture.
        cull_rect: Rect,
        /// Number of ops the picture holds.
        op_count: usize,
    },
    /// `draw_image(image, bounds, sampling)`.
    DrawImage {
        /// Embedder image handle.
        image: u64,
        /// Destination rect.
        bounds: Rect,
        /// Sampling.
        sampling: Sampling,
    },
}

/// Drawing command sink.
///
/// Save depth starts at 0. `save` and `save_layer` return the depth before
/// the save, suitable for [`restore_to_count`](Canvas::restore_to_count).
pub trait Canvas {
    /// Pushes the current matrix and clip.
    fn save(&mut self) -> usize;

    /// Pushes an offscreen layer.
    fn save_layer(&mut self, rec: SaveLayerRec) -> usize;

    /// Pops the last save.
    fn restore(&mut self);

    /// Current save depth.
    fn save_count(&self) -> usize;

    /// Pops saves until the depth is `count`.
    fn restore_to_count(&mut self, count: usize) {
        while self.save_count() > count {
            self.restore();
        }
    }

    /// Pre-concatenates `m` onto the current matrix.
    fn concat(&mut self, m: Affine);

    /// Pre-translates the current matrix.
    fn translate(&mut self, offset: Vec2) {
        self.concat(Affine::translate(offset));
    }

    /// Intersects the clip with `rect`.
    fn clip_rect(&mut self, rect: Rect, anti_alias: bool);

    /// Intersects the clip with `path`.
    fn clip_path(&mut self, path: &BezPath, anti_alias: bool);

    /// Fills `path`.
    fn draw_path(&mut self, path: &BezPath, paint: &Paint);

    /// Fills the whole clip.
    fn draw_paint(&mut self, paint: &Paint);

    /// Draws a shadow.
    fn draw_shadow(&mut self, shadow: &Shadow);

    /// Replays a recorded picture.
    fn draw_picture(&mut self, picture: &Picture);

    /// Draws an embedder image into `bounds`.
    fn draw_image(&mut self, image: u64, bounds: Rect, sampling: Sampling);
}

// ---------------------------------------------------------------------------
// Picture
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct PictureData {
    cull_rect: Rect,
    ops: Vec<DrawOp>,
}

/// An immutable recorded drawing program.
///
/// Cloning is cheap. Equality is identity first, then a deep comparison of
/// the recorded ops.
#[derive(Clone, Debug)]
pub struct Picture {
    data: Arc<PictureData>,
}

impl Picture {
    /// Wraps recorded `ops` that draw within `cull_rect`.
    #[must_use]
    pub fn new(cull_rect: Rect, ops: Vec<DrawOp>) -> Self {
        Self {
            data: Arc::new(PictureData { cull_rect, ops }),
        }
    }

    /// Bounds of everything the picture draws.
    #[must_use]
    pub fn cull_rect(&self) -> Rect {
        self.data.cull_rect
    }

    /// The recorded ops.
    #[must_use]
    pub fn ops(&self) -> &[DrawOp] {
        &self.data.ops
    }
}

impl PartialEq for Picture {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data == other.data
    }
}

// ---------------------------------------------------------------------------
// RecordingCanvas
// ---------------------------------------------------------------------------

/// A recorded command together with the save depth it was issued at.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    /// Save depth when the command was issued.
    pub layer: usize,
    /// The command.
    pub op: DrawOp,
}

impl DrawCall {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(layer: usize, op: DrawOp) -> Self {
        Self { layer, op }
    }
}

/// A [`Canvas`] that records every command.
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvas {
    calls: Vec<DrawCall>,
    depth: usize,
}

impl RecordingCanvas {
    /// Creates an empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands recorded so far.
    #[must_use]
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Takes the recorded commands, leaving the canvas empty.
    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        self.depth = 0;
        std::mem::take(&mut self.calls)
    }

    /// Turns the recording into a [`Picture`] bounded by `cull_rect`.
    #[must_use]
    pub fn into_picture(self, cull_rect: Rect) -> Picture {
        Picture::new(cull_rect, self.calls.into_iter().map(|c| c.op).collect())
    }

    fn push(&mut self, op: DrawOp) {
        self.calls.push(DrawCall::new(self.depth, op));
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) -> usize {
        self.push(DrawOp::Save);
        self.depth += 1;
        self.depth - 1
    }

    fn save_layer(&mut self, rec: SaveLayerRec) -> usize {
        self.push(DrawOp::SaveLayer(rec));
        self.depth += 1;
        self.depth - 1
    }

    fn restore(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.push(DrawOp::Restore);
        self.depth -= 1;
    }

    fn save_count(&self) -> usize {
        self.depth
    }

    fn concat(&mut self, m: Affine) {
        self.push(DrawOp::Concat(m));
    }

    fn translate(&mut self, offset: Vec2) {
        self.push(DrawOp::Translate(offset));
    }

    fn clip_rect(&mut self, rect: Rect, anti_alias: bool) {
        self.push(DrawOp::ClipRect { rect, anti_alias });
    }

    fn clip_path(&mut self, path: &BezPath, anti_alias: bool) {
        self.push(DrawOp::ClipPath {
            path: path.clone(),
            anti_alias,
        });
    }

    fn draw_path(&mut self, path: &BezPath, paint: &Paint) {
        self.push(DrawOp::DrawPath {
            path: path.clone(),
            paint: *paint,
        });
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.push(DrawOp::DrawPaint(*paint));
    }

    fn draw_shadow(&mut self, shadow: &Shadow) {
        self.push(DrawOp::DrawShadow(shadow.clone()));
    }

    fn draw_picture(&mut self, picture: &Picture) {
        self.push(DrawOp::DrawPicture {
            cull_rect: picture.cull_rect(),
            op_count: picture.ops().len(),
        });
    }

    fn draw_image(&mut self, image: u64, bounds: Rect, sampling: Sampling) {
        self.push(DrawOp::DrawImage {
            image,
            bounds,
            sampling,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    #[test]
    fn color_components() {
        let c = Color::from_argb(0x80, 0x11, 0x22, 0x33);
        assert_eq!(c, Color(0x8011_2233));
        assert_eq!(c.alpha(), 0x80);
        assert!(!c.is_opaque());
        assert!(Color::BLACK.is_opaque());
    }

    #[test]
    fn recording_tracks_depth() {
        let mut canvas = RecordingCanvas::new();
        let count = canvas.save();
        canvas.concat(Affine::scale(2.0));
        canvas.save_layer(SaveLayerRec::bounded(Rect::new(0.0, 0.0, 4.0, 4.0)));
        canvas.draw_paint(&Paint::fill(Color::WHITE));
        canvas.restore_to_count(count);

        assert_eq!(count, 0);
        assert_eq!(canvas.save_count(), 0);
        let layers: Vec<usize> = canvas.draw_calls().iter().map(|c| c.layer).collect();
        assert_eq!(layers, [0, 1, 1, 2, 2, 1]);
        assert_eq!(canvas.draw_calls()[4].op, DrawOp::Restore);
    }

    #[test]
    fn restore_at_zero_depth_is_ignored() {
        let mut canvas = RecordingCanvas::new();
        canvas.restore();
        assert!(canvas.draw_calls().is_empty());
    }

    #[test]
    fn picture_equality_is_deep() {
        let path = Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.1);
        let record = |color| {
            let mut canvas = RecordingCanvas::new();
            canvas.draw_path(&path, &Paint::fill(color));
            canvas.into_picture(Rect::new(0.0, 0.0, 10.0, 10.0))
        };
        let a = record(Color::BLACK);
        assert_eq!(a, a.clone());
        assert_eq!(a, record(Color::BLACK));
        assert_ne!(a, record(Color::WHITE));
        assert_eq!(a.ops().len(), 1);
    }
}
