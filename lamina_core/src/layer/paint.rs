// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The paint traversal: replays a prerolled subtree onto a [`Canvas`].
//!
//! [`Canvas`]: crate::canvas::Canvas

use kurbo::Affine;

use crate::canvas::{Clip, Paint, SaveLayerRec, Shadow};

use super::context::PaintContext;
use super::kinds::LayerKind;
use super::node::Layer;

impl Layer {
    /// Whether preroll found something visible to paint in this layer.
    #[must_use]
    pub fn needs_painting(&self, ctx: &PaintContext<'_>) -> bool {
        ctx.geometry.needs_painting(self.id())
    }

    /// Paints this subtree.
    ///
    /// # Panics
    ///
    /// Panics if the layer was not prerolled or has nothing to paint; parents
    /// check [`needs_painting`](Self::needs_painting) before descending.
    pub fn paint(&self, ctx: &mut PaintContext<'_>) {
        assert!(
            self.needs_painting(ctx),
            "needs_painting is false for {} layer {:?}: paint requires non-empty prerolled bounds",
            self.kind().name(),
            self.id(),
        );
        let paint_bounds = ctx.geometry.paint_bounds(self.id());

        match self.kind() {
            LayerKind::Container => self.paint_children(ctx),
            LayerKind::Transform(transform) => {
                if *transform == Affine::IDENTITY {
                    self.paint_children(ctx);
                } else {
                    let count = ctx.canvas.save();
                    ctx.canvas.concat(*transform);
                    self.paint_children(ctx);
                    ctx.canvas.restore_to_count(count);
                }
            }
            LayerKind::ClipRect { rect, clip } => {
                let count = ctx.canvas.save();
                ctx.canvas.clip_rect(*rect, *clip != Clip::HardEdge);
                if *clip == Clip::AntiAliasWithSaveLayer {
                    ctx.canvas.save_layer(SaveLayerRec::bounded(paint_bounds));
                }
                self.paint_children(ctx);
                ctx.canvas.restore_to_count(count);
            }
            LayerKind::Opacity { alpha, offset } => {
                let count = ctx.canvas.save();
                ctx.canvas.translate(*offset);
                ctx.canvas.save_layer(SaveLayerRec {
                    bounds: Some(paint_bounds - *offset),
                    alpha: Some(*alpha),
                    backdrop_blur: None,
                });
                self.paint_children(ctx);
                ctx.canvas.restore_to_count(count);
            }
            LayerKind::PhysicalShape(shape) => {
                if shape.elevation != 0.0 {
                    ctx.canvas.draw_shadow(&Shadow {
                        path: shape.path.clone(),
                        color: shape.shadow_color,
                        elevation: shape.elevation,
                        transparent_occluder: !shape.color.is_opaque(),
                        device_pixel_ratio: ctx.frame_device_pixel_ratio,
                    });
                }
                let fill = Paint::fill(shape.color);
                if shape.clip != Clip::AntiAliasWithSaveLayer {
                    ctx.canvas.draw_path(&shape.path, &fill);
                }
                let anti_alias = match shape.clip {
                    Clip::None => {
                        self.paint_children(ctx);
                        return;
                    }
                    Clip::HardEdge => false,
                    Clip::AntiAlias | Clip::AntiAliasWithSaveLayer => true,
                };
                let count = ctx.canvas.save();
                ctx.canvas.clip_path(&shape.path, anti_alias);
                if shape.clip == Clip::AntiAliasWithSaveLayer {
                    ctx.canvas.save_layer(SaveLayerRec::bounded(paint_bounds));
                    // The fill doubles as the layer's background.
                    ctx.canvas.draw_paint(&fill);
                }
                self.paint_children(ctx);
                ctx.canvas.restore_to_count(count);
            }
            LayerKind::Shape { path, paint } => ctx.canvas.draw_path(path, paint),
            LayerKind::Texture(texture) => {
                let Some(registered) = ctx.textures.get_texture(texture.texture_id) else {
                    tracing::trace!(
                        texture_id = texture.texture_id,
                        "null texture, skipping paint"
                    );
                    return;
                };
                registered.paint(ctx.canvas, paint_bounds, texture.freeze, texture.sampling);
            }
            LayerKind::Picture(picture) => {
                let count = ctx.canvas.save();
                ctx.canvas.translate(picture.offset);
                ctx.canvas.draw_picture(&picture.picture);
                ctx.canvas.restore_to_count(count);
            }
            LayerKind::BackdropFilter { sigma } => {
                let count = ctx.canvas.save_layer(SaveLayerRec {
                    bounds: Some(paint_bounds),
                    alpha: None,
                    backdrop_blur: Some(*sigma),
                });
                self.paint_children(ctx);
                ctx.canvas.restore_to_count(count);
            }
        }
    }

    /// Paints every child that has something to paint, in order.
    fn paint_children(&self, ctx: &mut PaintContext<'_>) {
        for child in self.children() {
            if child.needs_painting(ctx) {
                child.paint(ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kurbo::{Affine, BezPath, Rect, Shape, Size, Vec2};

    use super::*;
    use crate::canvas::{Color, DrawCall, DrawOp, RecordingCanvas, Sampling};
    use crate::layer::{LayerGeometryMap, PhysicalShape, PrerollContext, TextureLayer};
    use crate::testing::{MockTexture, TexturePaint};
    use crate::texture::TextureRegistry;

    fn preroll(layer: &Layer, textures: &TextureRegistry) -> LayerGeometryMap {
        let mut ctx = PrerollContext::new(textures);
        layer.preroll(&mut ctx, Affine::IDENTITY);
        ctx.into_geometry()
    }

    fn paint(
        layer: &Layer,
        textures: &TextureRegistry,
        geometry: &LayerGeometryMap,
    ) -> Vec<DrawCall> {
        let mut canvas = RecordingCanvas::new();
        let mut ctx = PaintContext {
            canvas: &mut canvas,
            textures,
            geometry,
            frame_device_pixel_ratio: 1.0,
        };
        layer.paint(&mut ctx);
        canvas.take_calls()
    }

    fn leaf(path: &BezPath) -> Arc<Layer> {
        Layer::shape(path.clone(), Paint::fill(Color::BLACK)).into_shared()
    }

    #[test]
    #[should_panic(expected = "needs_painting")]
    fn paint_before_preroll_panics() {
        let textures = TextureRegistry::new();
        let layer = Layer::transform(Affine::scale(2.0))
            .with_child(leaf(&Rect::new(0.0, 0.0, 1.0, 1.0).to_path(0.1)));
        paint(&layer, &textures, &LayerGeometryMap::default());
    }

    #[test]
    fn transform_brackets_children() {
        let textures = TextureRegistry::new();
        let path = Rect::new(5.0, 6.0, 20.5, 21.5).to_path(0.1);
        let transform = Affine::translate((2.5, 2.5));
        let layer = Layer::transform(transform).with_child(leaf(&path));
        let geometry = preroll(&layer, &textures);

        assert_eq!(
            paint(&layer, &textures, &geometry),
            [
                DrawCall::new(0, DrawOp::Save),
                DrawCall::new(1, DrawOp::Concat(transform)),
                DrawCall::new(
                    1,
                    DrawOp::DrawPath {
                        path,
                        paint: Paint::fill(Color::BLACK)
                    }
                ),
                DrawCall::new(1, DrawOp::Restore),
            ]
        );
    }

    #[test]
    fn identity_transform_paints_children_directly() {
        let textures = TextureRegistry::new();
        let path = Rect::new(0.0, 0.0, 4.0, 4.0).to_path(0.1);
        let layer = Layer::transform(Affine::IDENTITY).with_child(leaf(&path));
        let geometry = preroll(&layer, &textures);
        let calls = paint(&layer, &textures, &geometry);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].layer, 0);
    }

    #[test]
    fn empty_children_are_skipped() {
        let textures = TextureRegistry::new();
        let visible = leaf(&Rect::new(0.0, 0.0, 4.0, 4.0).to_path(0.1));
        let empty = leaf(&BezPath::new());
        let root = Layer::container().with_children([empty, visible]);
        let geometry = preroll(&root, &textures);
        assert_eq!(paint(&root, &textures, &geometry).len(), 1);
    }

    #[test]
    fn flat_physical_shape_draws_path_only() {
        let textures = TextureRegistry::new();
        let path = Rect::new(0.0, 0.0, 8.0, 8.0).to_path(0.1);
        let layer = Layer::physical_shape(PhysicalShape::new(path.clone(), Color::WHITE));
        let geometry = preroll(&layer, &textures);

        assert_eq!(
            paint(&layer, &textures, &geometry),
            [DrawCall::new(
                0,
                DrawOp::DrawPath {
                    path,
                    paint: Paint::fill(Color::WHITE)
                }
            )]
        );
    }

    #[test]
    fn elevated_physical_shape_draws_shadow_first() {
        let textures = TextureRegistry::new();
        let path = Rect::new(0.0, 0.0, 8.0, 8.0).to_path(0.1);
        let shadow_color = Color::from_argb(0x40, 0, 0, 0);
        let layer = Layer::physical_shape(
            PhysicalShape::new(path.clone(), Color::from_argb(0x80, 0xFF, 0, 0))
                .with_elevation(4.0, shadow_color),
        );
        let geometry = preroll(&layer, &textures);
        let calls = paint(&layer, &textures, &geometry);

        assert_eq!(
            calls[0].op,
            DrawOp::DrawShadow(Shadow {
                path,
                color: shadow_color,
                elevation: 4.0,
                transparent_occluder: true,
                device_pixel_ratio: 1.0,
            })
        );
        assert!(matches!(calls[1].op, DrawOp::DrawPath { .. }));
    }

    #[test]
    fn physical_shape_clip_behaviors() {
        let textures = TextureRegistry::new();
        let path = Rect::new(0.0, 0.0, 8.0, 8.0).to_path(0.1);
        let child = leaf(&Rect::new(1.0, 1.0, 2.0, 2.0).to_path(0.1));
        let ops_for = |clip| {
            let layer = Layer::physical_shape(
                PhysicalShape::new(path.clone(), Color::WHITE).with_clip(clip),
            )
            .with_child(child.clone());
            let geometry = preroll(&layer, &textures);
            paint(&layer, &textures, &geometry)
                .into_iter()
                .map(|c| match c.op {
                    DrawOp::Save => "save",
                    DrawOp::SaveLayer(_) => "save_layer",
                    DrawOp::Restore => "restore",
                    DrawOp::ClipPath { anti_alias: true, .. } => "clip_aa",
                    DrawOp::ClipPath { anti_alias: false, .. } => "clip_hard",
                    DrawOp::DrawPath { .. } => "path",
                    DrawOp::DrawPaint(_) => "paint",
                    _ => "other",
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(ops_for(Clip::None), ["path", "path"]);
        assert_eq!(
            ops_for(Clip::HardEdge),
            ["path", "save", "clip_hard", "path", "restore"]
        );
        assert_eq!(
            ops_for(Clip::AntiAlias),
            ["path", "save", "clip_aa", "path", "restore"]
        );
        assert_eq!(
            ops_for(Clip::AntiAliasWithSaveLayer),
            ["save", "clip_aa", "save_layer", "paint", "path", "restore", "restore"]
        );
    }

    #[test]
    fn opacity_uses_alpha_save_layer() {
        let textures = TextureRegistry::new();
        let layer = Layer::opacity(0x7F, Vec2::new(3.0, 4.0))
            .with_child(leaf(&Rect::new(0.0, 0.0, 10.0, 10.0).to_path(0.1)));
        let geometry = preroll(&layer, &textures);
        let calls = paint(&layer, &textures, &geometry);

        assert_eq!(calls[1].op, DrawOp::Translate(Vec2::new(3.0, 4.0)));
        assert_eq!(
            calls[2].op,
            DrawOp::SaveLayer(SaveLayerRec {
                bounds: Some(Rect::new(0.0, 0.0, 10.0, 10.0)),
                alpha: Some(0x7F),
                backdrop_blur: None,
            })
        );
        assert_eq!(calls.last().map(|c| c.layer), Some(1));
    }

    #[test]
    fn texture_paints_through_registry() {
        let mut textures = TextureRegistry::new();
        let texture = Arc::new(MockTexture::new(3));
        textures.register_texture(texture.clone());
        let mut props = TextureLayer::new(Vec2::new(1.0, 1.0), Size::new(10.0, 5.0), 3);
        props.freeze = true;
        props.sampling = Sampling::Nearest;
        let layer = Layer::texture(props);
        let geometry = preroll(&layer, &textures);

        let calls = paint(&layer, &textures, &geometry);
        assert!(calls.is_empty(), "the mock texture draws nothing itself");
        assert_eq!(
            texture.paint_calls(),
            [TexturePaint {
                bounds: Rect::new(1.0, 1.0, 11.0, 6.0),
                freeze: true,
                sampling: Sampling::Nearest,
            }]
        );
    }

    #[test]
    fn missing_texture_paints_nothing() {
        let textures = TextureRegistry::new();
        let layer = Layer::texture(TextureLayer::new(Vec2::ZERO, Size::new(8.0, 8.0), 404));
        let geometry = preroll(&layer, &textures);
        assert!(geometry.needs_painting(layer.id()));
        assert!(paint(&layer, &textures, &geometry).is_empty());
    }

    #[test]
    #[should_panic(expected = "needs_painting")]
    fn zero_size_texture_cannot_paint() {
        let mut textures = TextureRegistry::new();
        textures.register_texture(Arc::new(MockTexture::new(1)));
        let layer = Layer::texture(TextureLayer::new(Vec2::ZERO, Size::ZERO, 1));
        let geometry = preroll(&layer, &textures);
        paint(&layer, &textures, &geometry);
    }

    #[test]
    fn picture_is_translated() {
        let textures = TextureRegistry::new();
        let mut recorder = RecordingCanvas::new();
        crate::canvas::Canvas::draw_paint(&mut recorder, &Paint::fill(Color::BLACK));
        let picture = recorder.into_picture(Rect::new(0.0, 0.0, 20.0, 20.0));
        let layer = Layer::picture(crate::layer::PictureLayer::new(Vec2::new(5.0, 5.0), picture));
        let geometry = preroll(&layer, &textures);
        assert_eq!(geometry.paint_bounds(layer.id()), Rect::new(5.0, 5.0, 25.0, 25.0));

        let calls = paint(&layer, &textures, &geometry);
        assert_eq!(calls[1].op, DrawOp::Translate(Vec2::new(5.0, 5.0)));
        assert_eq!(
            calls[2].op,
            DrawOp::DrawPicture {
                cull_rect: Rect::new(0.0, 0.0, 20.0, 20.0),
                op_count: 1
            }
        );
    }

    #[test]
    fn backdrop_filter_saves_layer_with_blur() {
        let textures = TextureRegistry::new();
        let layer = Layer::backdrop_filter(6.0)
            .with_child(leaf(&Rect::new(0.0, 0.0, 5.0, 5.0).to_path(0.1)));
        let geometry = preroll(&layer, &textures);
        let calls = paint(&layer, &textures, &geometry);
        assert!(matches!(
            calls[0].op,
            DrawOp::SaveLayer(SaveLayerRec {
                backdrop_blur: Some(s),
                ..
            }) if s == 6.0
        ));
        assert_eq!(calls.len(), 3);
    }
}
