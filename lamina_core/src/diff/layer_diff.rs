// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-kind diff rules.

use std::sync::Arc;

use kurbo::{Affine, Shape as _};

use crate::canvas::Clip;
use crate::geometry;
use crate::layer::{Layer, LayerKind};

use super::context::DiffContext;
use super::links::OldLayerLinks;

/// Blur kernels are treated as reaching three sigmas.
const BLUR_SIGMA_EXTENT: f64 = 3.0;

/// Whether `new` takes the place of `old` in the child list, so the two
/// should be diffed against each other rather than treated as a removal
/// plus an insertion.
pub(crate) fn is_replacing(new: &Arc<Layer>, old: &Arc<Layer>, links: &OldLayerLinks) -> bool {
    if Arc::ptr_eq(new, old) {
        return true;
    }
    if !new.kind().same_variant(old.kind()) {
        return false;
    }
    match (new.kind(), old.kind()) {
        (LayerKind::Texture(a), LayerKind::Texture(b)) if a.texture_id == b.texture_id => true,
        (LayerKind::Picture(a), LayerKind::Picture(b)) if a == b => true,
        _ => links.resolve(new.id()) == Some(old.id()),
    }
}

impl Layer {
    /// Diffs this layer against `old`, its counterpart in the previous
    /// frame. `old` is `None` when the enclosing subtree is already dirty.
    pub(crate) fn diff(&self, ctx: &mut DiffContext<'_>, old: Option<&Self>) {
        ctx.begin_subtree();
        if !ctx.is_subtree_dirty() {
            match old {
                Some(old) if !self.kind_unchanged(old) => {
                    ctx.mark_subtree_dirty(ctx.old_region(old.id()));
                }
                Some(_) => {}
                None => ctx.mark_subtree_dirty(None),
            }
        }
        let old = old.filter(|_| !ctx.is_subtree_dirty());

        match self.kind() {
            LayerKind::Container => self.diff_children(ctx, old),
            LayerKind::Transform(transform) => {
                ctx.push_transform(*transform);
                self.diff_children(ctx, old);
            }
            LayerKind::ClipRect { rect, .. } => {
                if ctx.push_cull_rect(*rect) {
                    self.diff_children(ctx, old);
                }
            }
            LayerKind::Opacity { offset, .. } => {
                ctx.push_transform(Affine::translate(*offset));
                self.diff_children(ctx, old);
            }
            LayerKind::PhysicalShape(shape) => {
                let bounds = shape.local_bounds(ctx.device_pixel_ratio());
                ctx.add_layer_bounds(bounds);
                if shape.clip == Clip::None || ctx.push_cull_rect(bounds) {
                    self.diff_children(ctx, old);
                }
            }
            LayerKind::Shape { path, .. } => ctx.add_layer_bounds(path.bounding_box()),
            LayerKind::Texture(texture) => {
                ctx.mark_subtree_has_texture();
                ctx.add_layer_bounds(texture.bounds());
            }
            LayerKind::Picture(picture) => {
                ctx.push_transform(Affine::translate(picture.offset));
                ctx.add_layer_bounds(picture.picture.cull_rect());
            }
            LayerKind::BackdropFilter { sigma } => {
                self.diff_children(ctx, old);
                let extent = sigma * BLUR_SIGMA_EXTENT;
                let sampled = ctx.current_subtree_bounds().inflate(extent, extent);
                ctx.add_readback_region(geometry::round_out(sampled));
            }
        }

        ctx.set_layer_paint_region(self.id());
        ctx.end_subtree();
    }

    /// Whether this layer's own properties match `old`'s.
    ///
    /// Textures change outside the tree, so only a frozen texture with
    /// identical properties counts as unchanged.
    fn kind_unchanged(&self, old: &Self) -> bool {
        match (self.kind(), old.kind()) {
            (LayerKind::Texture(new), LayerKind::Texture(old)) => new.freeze && new == old,
            (new, old) => new == old,
        }
    }

    fn diff_children(&self, ctx: &mut DiffContext<'_>, old: Option<&Self>) {
        let old = match old {
            Some(old) if !ctx.is_subtree_dirty() => old,
            _ => {
                for child in self.children() {
                    child.diff(ctx, None);
                }
                return;
            }
        };
        let links = ctx.links();
        let new_children = self.children();
        let old_children = old.children();

        // Matched prefix is [0, top); matched suffix starts at new_bottom /
        // old_bottom (exclusive upper bounds of the unmatched middle).
        let mut top = 0;
        while top < new_children.len()
            && top < old_children.len()
            && is_replacing(&new_children[top], &old_children[top], links)
        {
            top += 1;
        }
        let mut new_bottom = new_children.len();
        let mut old_bottom = old_children.len();
        while new_bottom > top
            && old_bottom > top
            && is_replacing(&new_children[new_bottom - 1], &old_children[old_bottom - 1], links)
        {
            new_bottom -= 1;
            old_bottom -= 1;
        }

        for removed in &old_children[top..old_bottom] {
            if let Some(region) = ctx.old_region(removed.id()) {
                ctx.add_damage_region(region);
            }
        }

        for (i, child) in new_children.iter().enumerate() {
            if i >= top && i < new_bottom {
                ctx.begin_subtree();
                ctx.mark_subtree_dirty(None);
                child.diff(ctx, None);
                ctx.end_subtree();
                continue;
            }
            let prev = if i < top {
                &old_children[i]
            } else {
                &old_children[old_bottom + (i - new_bottom)]
            };
            match ctx.old_region(prev.id()) {
                Some(region)
                    if Arc::ptr_eq(child, prev)
                        && !region.has_readback()
                        && !region.has_texture() =>
                {
                    let offset = ctx.rect_count();
                    ctx.add_existing_paint_region(region);
                    child.preserve_paint_region(ctx, region.start(), offset);
                }
                _ => child.diff(ctx, Some(prev)),
            }
        }
    }

    /// Carries the previous frame's regions of a retained subtree over to
    /// this frame. `old_start` is the buffer offset of the subtree's old
    /// region and `new_start` where its rects were re-added.
    fn preserve_paint_region(&self, ctx: &mut DiffContext<'_>, old_start: usize, new_start: usize) {
        // A layer shared at two places in the old tree keeps the region of
        // the later one, which may lie outside this subtree's range.
        if let Some(region) = ctx.old_region(self.id())
            && let Some(delta) = region.start().checked_sub(old_start)
            && new_start + delta + region.rects().len() <= ctx.rect_count()
        {
            ctx.preserve_region(self.id(), region, new_start + delta);
        }
        for child in self.children() {
            child.preserve_paint_region(ctx, old_start, new_start);
        }
    }
}
