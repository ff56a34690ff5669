// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The preroll traversal: computes paint bounds and records the matrix and
//! cull rect every layer sees.

use kurbo::{Affine, Rect};

use crate::geometry::{self, GIANT_RECT};

use super::context::{LayerGeometry, PrerollContext};
use super::kinds::LayerKind;
use super::node::Layer;

impl Layer {
    /// Computes this subtree's paint bounds.
    ///
    /// `matrix` is the accumulated transform from the root to this layer's
    /// parent. The context's cull rect is in the same coordinates as this
    /// layer's paint bounds and is restored before returning.
    pub fn preroll(&self, ctx: &mut PrerollContext<'_>, matrix: Affine) {
        let parent_cull_rect = ctx.cull_rect;
        let mut needs_system_composite = false;

        let bounds = match self.kind() {
            LayerKind::Container => {
                let (bounds, children_composite) = self.preroll_children(ctx, matrix);
                needs_system_composite = children_composite;
                bounds
            }
            LayerKind::Transform(transform) => {
                let transform = if transform.is_finite() {
                    *transform
                } else {
                    tracing::warn!(
                        layer = ?self.id(),
                        "non-finite transform replaced with identity"
                    );
                    Affine::IDENTITY
                };
                ctx.cull_rect = match geometry::invert(transform) {
                    Some(inverse) => geometry::map_rect(inverse, parent_cull_rect),
                    None => GIANT_RECT,
                };
                let (child_bounds, children_composite) =
                    self.preroll_children(ctx, matrix * transform);
                ctx.cull_rect = parent_cull_rect;
                needs_system_composite = children_composite;
                geometry::map_rect(transform, child_bounds)
            }
            LayerKind::ClipRect { rect, .. } => {
                ctx.cull_rect = geometry::intersection(parent_cull_rect, *rect);
                let (child_bounds, children_composite) = self.preroll_children(ctx, matrix);
                ctx.cull_rect = parent_cull_rect;
                needs_system_composite = children_composite;
                geometry::intersection(child_bounds, *rect)
            }
            LayerKind::Opacity { offset, .. } => {
                ctx.cull_rect = parent_cull_rect - *offset;
                let (child_bounds, children_composite) =
                    self.preroll_children(ctx, matrix * Affine::translate(*offset));
                ctx.cull_rect = parent_cull_rect;
                needs_system_composite = children_composite;
                if geometry::is_empty(child_bounds) {
                    Rect::ZERO
                } else {
                    child_bounds + *offset
                }
            }
            LayerKind::PhysicalShape(shape) => {
                // Children are clipped (or not) at paint time; their bounds
                // never extend the shape's own.
                let _ = self.preroll_children(ctx, matrix);
                if ctx.system_composite_available && shape.elevation > 0.0 {
                    needs_system_composite = true;
                    if ctx.is_opaque {
                        Rect::ZERO
                    } else {
                        shape.path_bounds()
                    }
                } else {
                    shape.local_bounds(ctx.frame_device_pixel_ratio)
                }
            }
            LayerKind::Shape { path, .. } => kurbo::Shape::bounding_box(path),
            LayerKind::Texture(texture) => {
                if ctx.textures.get_texture(texture.texture_id).is_none() {
                    tracing::trace!(texture_id = texture.texture_id, "texture not registered");
                }
                texture.bounds()
            }
            LayerKind::Picture(picture) => picture.bounds(),
            LayerKind::BackdropFilter { .. } => {
                ctx.surface_needs_readback = true;
                let (bounds, children_composite) = self.preroll_children(ctx, matrix);
                needs_system_composite = children_composite;
                bounds
            }
        };

        let paint_bounds = if geometry::is_empty(bounds) {
            Rect::ZERO
        } else {
            bounds
        };
        ctx.record(
            self.id(),
            LayerGeometry {
                paint_bounds,
                needs_system_composite,
                parent_matrix: matrix,
                parent_cull_rect,
                culled: !geometry::is_empty(paint_bounds)
                    && !geometry::intersects(paint_bounds, parent_cull_rect),
            },
        );
    }

    /// Prerolls every child and returns the union of their bounds and
    /// whether any of them needs system compositing.
    fn preroll_children(&self, ctx: &mut PrerollContext<'_>, matrix: Affine) -> (Rect, bool) {
        let mut bounds = Rect::ZERO;
        let mut needs_system_composite = false;
        for child in self.children() {
            child.preroll(ctx, matrix);
            if let Some(g) = ctx.geometry().get(child.id()) {
                bounds = geometry::join(bounds, g.paint_bounds);
                needs_system_composite |= g.needs_system_composite;
            }
        }
        (bounds, needs_system_composite)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kurbo::{Affine, Rect, Shape, Size, Vec2};

    use super::*;
    use crate::canvas::{Color, Paint};
    use crate::layer::{PhysicalShape, TextureLayer};
    use crate::texture::TextureRegistry;

    fn rect_leaf(rect: Rect) -> Arc<Layer> {
        Layer::shape(rect.to_path(0.1), Paint::fill(Color::BLACK)).into_shared()
    }

    #[test]
    fn transform_passes_matrix_and_cull_to_children() {
        let textures = TextureRegistry::new();
        let child_path = Rect::new(5.0, 6.0, 20.5, 21.5);
        let child = rect_leaf(child_path);
        let layer_transform = Affine::translate((2.5, 2.5));
        let initial = Affine::translate((-0.5, -0.5));
        let cull = Rect::new(2.0, 2.0, 16.0, 16.0);
        let layer = Layer::transform(layer_transform).with_child(child.clone());

        let mut ctx = PrerollContext::new(&textures);
        ctx.cull_rect = cull;
        layer.preroll(&mut ctx, initial);
        let geometry = ctx.into_geometry();

        let child_geometry = geometry.get(child.id()).unwrap();
        assert_eq!(child_geometry.paint_bounds, child_path);
        assert_eq!(child_geometry.parent_matrix, initial * layer_transform);
        assert_eq!(
            child_geometry.parent_cull_rect,
            geometry::map_rect(layer_transform.inverse(), cull)
        );
        assert_eq!(
            geometry.paint_bounds(layer.id()),
            geometry::map_rect(layer_transform, child_path)
        );
        assert!(geometry.needs_painting(layer.id()));
    }

    #[test]
    fn singular_transform_gives_children_unbounded_cull() {
        let textures = TextureRegistry::new();
        let child = rect_leaf(Rect::new(0.0, 0.0, 10.0, 10.0));
        let layer = Layer::transform(Affine::scale_non_uniform(0.0, 1.0)).with_child(child.clone());

        let mut ctx = PrerollContext::new(&textures);
        ctx.cull_rect = Rect::new(0.0, 0.0, 5.0, 5.0);
        layer.preroll(&mut ctx, Affine::IDENTITY);

        let child_geometry = *ctx.geometry().get(child.id()).unwrap();
        assert_eq!(child_geometry.parent_cull_rect, GIANT_RECT);
        assert_eq!(ctx.cull_rect, Rect::new(0.0, 0.0, 5.0, 5.0), "cull rect restored");
    }

    #[test]
    fn nested_transforms_compose() {
        let textures = TextureRegistry::new();
        let b = Rect::new(0.0, 0.0, 50.0, 50.0);
        let leaf = rect_leaf(b);
        let m1 = Affine::scale(2.0);
        let m2 = Affine::translate((10.0, 20.0));
        let inner = Layer::transform(m2).with_child(leaf.clone()).into_shared();
        let outer = Layer::transform(m1).with_child(inner.clone());

        let mut ctx = PrerollContext::new(&textures);
        outer.preroll(&mut ctx, Affine::IDENTITY);
        let geometry = ctx.into_geometry();

        assert_eq!(
            geometry.paint_bounds(outer.id()),
            geometry::map_rect(m1, geometry::map_rect(m2, b))
        );
        assert_eq!(geometry.get(leaf.id()).unwrap().parent_matrix, m1 * m2);
        assert_eq!(geometry.get(inner.id()).unwrap().parent_matrix, m1);
    }

    #[test]
    fn clip_rect_limits_bounds() {
        let textures = TextureRegistry::new();
        let leaf = rect_leaf(Rect::new(0.0, 0.0, 100.0, 100.0));
        let clip = Layer::clip_rect(
            Rect::new(10.0, 10.0, 40.0, 40.0),
            crate::canvas::Clip::HardEdge,
        )
        .with_child(leaf.clone());

        let mut ctx = PrerollContext::new(&textures);
        ctx.cull_rect = Rect::new(0.0, 0.0, 30.0, 30.0);
        clip.preroll(&mut ctx, Affine::IDENTITY);
        let geometry = ctx.into_geometry();

        assert_eq!(geometry.paint_bounds(clip.id()), Rect::new(10.0, 10.0, 40.0, 40.0));
        assert_eq!(
            geometry.get(leaf.id()).unwrap().parent_cull_rect,
            Rect::new(10.0, 10.0, 30.0, 30.0)
        );
    }

    #[test]
    fn opacity_offsets_children() {
        let textures = TextureRegistry::new();
        let leaf = rect_leaf(Rect::new(0.0, 0.0, 10.0, 10.0));
        let opacity = Layer::opacity(128, Vec2::new(5.0, 7.0)).with_child(leaf.clone());

        let mut ctx = PrerollContext::new(&textures);
        opacity.preroll(&mut ctx, Affine::IDENTITY);
        let geometry = ctx.into_geometry();

        assert_eq!(geometry.paint_bounds(opacity.id()), Rect::new(5.0, 7.0, 15.0, 17.0));
        assert_eq!(
            geometry.get(leaf.id()).unwrap().parent_matrix,
            Affine::translate((5.0, 7.0))
        );
    }

    #[test]
    fn physical_shape_bounds_with_and_without_elevation() {
        let textures = TextureRegistry::new();
        let path = Rect::new(0.0, 0.0, 100.0, 100.0).to_path(0.1);
        let flat = Layer::physical_shape(PhysicalShape::new(path.clone(), Color::WHITE));
        let raised = Layer::physical_shape(
            PhysicalShape::new(path, Color::WHITE).with_elevation(20.0, Color::BLACK),
        );

        let mut ctx = PrerollContext::new(&textures);
        flat.preroll(&mut ctx, Affine::IDENTITY);
        raised.preroll(&mut ctx, Affine::IDENTITY);
        let geometry = ctx.into_geometry();

        assert_eq!(geometry.paint_bounds(flat.id()), Rect::new(0.0, 0.0, 100.0, 100.0));
        let outset = 20.0 * (800.0 + 50.0) / 600.0;
        assert_eq!(
            geometry.paint_bounds(raised.id()),
            Rect::new(-outset, -outset, 100.0 + outset, 100.0 + outset)
        );
        assert!(!geometry.get(raised.id()).unwrap().needs_system_composite);
    }

    #[test]
    fn system_composite_skips_outset() {
        let textures = TextureRegistry::new();
        let path = Rect::new(0.0, 0.0, 100.0, 100.0).to_path(0.1);
        let raised = Layer::physical_shape(
            PhysicalShape::new(path, Color::WHITE).with_elevation(20.0, Color::BLACK),
        );

        let mut ctx = PrerollContext::new(&textures);
        ctx.system_composite_available = true;
        raised.preroll(&mut ctx, Affine::IDENTITY);
        let g = *ctx.geometry().get(raised.id()).unwrap();
        assert!(g.needs_system_composite);
        assert_eq!(g.paint_bounds, Rect::new(0.0, 0.0, 100.0, 100.0));

        ctx.is_opaque = true;
        raised.preroll(&mut ctx, Affine::IDENTITY);
        assert!(!ctx.geometry().needs_painting(raised.id()));
    }

    #[test]
    fn texture_bounds_do_not_depend_on_registry() {
        let textures = TextureRegistry::new();
        let visible = Layer::texture(TextureLayer::new(
            Vec2::new(1.0, 2.0),
            Size::new(3.0, 4.0),
            99,
        ));
        let zero = Layer::texture(TextureLayer::new(Vec2::new(1.0, 2.0), Size::ZERO, 99));

        let mut ctx = PrerollContext::new(&textures);
        visible.preroll(&mut ctx, Affine::IDENTITY);
        zero.preroll(&mut ctx, Affine::IDENTITY);
        let geometry = ctx.into_geometry();

        assert_eq!(geometry.paint_bounds(visible.id()), Rect::new(1.0, 2.0, 4.0, 6.0));
        assert!(geometry.needs_painting(visible.id()));
        assert_eq!(geometry.paint_bounds(zero.id()), Rect::ZERO);
        assert!(!geometry.needs_painting(zero.id()));
    }

    #[test]
    fn layers_outside_cull_rect_are_culled() {
        let textures = TextureRegistry::new();
        let inside = rect_leaf(Rect::new(0.0, 0.0, 10.0, 10.0));
        let outside = rect_leaf(Rect::new(200.0, 200.0, 210.0, 210.0));
        let root = Layer::container().with_children([inside.clone(), outside.clone()]);

        let mut ctx = PrerollContext::new(&textures);
        ctx.cull_rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        root.preroll(&mut ctx, Affine::IDENTITY);
        let geometry = ctx.into_geometry();

        assert!(geometry.needs_painting(inside.id()));
        assert!(!geometry.needs_painting(outside.id()));
        assert!(geometry.get(outside.id()).unwrap().culled);
    }

    #[test]
    fn backdrop_filter_requests_readback() {
        let textures = TextureRegistry::new();
        let layer =
            Layer::backdrop_filter(3.0).with_child(rect_leaf(Rect::new(0.0, 0.0, 8.0, 8.0)));
        let mut ctx = PrerollContext::new(&textures);
        layer.preroll(&mut ctx, Affine::IDENTITY);
        assert!(ctx.surface_needs_readback);
        assert_eq!(ctx.geometry().paint_bounds(layer.id()), Rect::new(0.0, 0.0, 8.0, 8.0));
    }
}
