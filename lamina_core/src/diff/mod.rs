// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage computation between consecutive layer trees.
//!
//! [`diff_layer_tree`] walks the new tree against the previous frame's tree
//! and returns the screen area that must be repainted. As a side effect it
//! records, for every layer of the new tree, the screen-space rects that
//! layer's subtree painted (its [`PaintRegion`]); the next frame's diff uses
//! those to un-paint removed or moved content.
//!
//! Children are matched by position, pointer identity and the producer's
//! [`OldLayerLinks`]. A child shared by `Arc` with the previous frame is
//! retained without walking it, unless its subtree reads back from the
//! surface or shows a texture.

mod context;
mod layer_diff;
mod links;
mod paint_region;

pub use links::OldLayerLinks;
pub use paint_region::{PaintRegion, PaintRegionMap};

use kurbo::Rect;

use crate::geometry;
use crate::layer::LayerTree;

use context::DiffContext;

/// Area of the frame that changed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Damage {
    /// Integer-aligned union of every changed rect, clipped to the frame.
    /// [`Rect::ZERO`] when nothing changed.
    pub frame_damage: Rect,
}

impl Damage {
    /// No damage.
    pub const NONE: Self = Self {
        frame_damage: Rect::ZERO,
    };

    /// Whether nothing needs repainting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        geometry::is_empty(self.frame_damage)
    }

    /// Whether the damage covers all of `frame`.
    #[must_use]
    pub fn covers(&self, frame: Rect) -> bool {
        !geometry::is_empty(self.frame_damage)
            && self.frame_damage.union(frame) == self.frame_damage
    }
}

/// Computes the damage between `new` and `old` and stores `new`'s paint
/// regions in it.
///
/// Without a previous tree, or when the frame size changed, the whole frame
/// is damaged.
#[tracing::instrument(level = "debug", skip_all, fields(layers = new.root().subtree_len()))]
pub fn diff_layer_tree(new: &mut LayerTree, old: Option<&LayerTree>) -> Damage {
    let frame_rect = new.frame_rect();
    let old = old.filter(|old| old.frame_size() == new.frame_size());
    let root = new.root().clone();

    let mut ctx = DiffContext::new(
        frame_rect,
        new.device_pixel_ratio(),
        new.old_layer_links(),
        old.map(LayerTree::paint_region_map),
    );
    match old {
        None => {
            ctx.mark_subtree_dirty(None);
            ctx.add_damage(frame_rect);
            root.diff(&mut ctx, None);
        }
        Some(old) if root.kind().same_variant(old.root().kind()) => {
            root.diff(&mut ctx, Some(old.root()));
        }
        Some(old) => {
            ctx.mark_subtree_dirty(ctx.old_region(old.root().id()));
            root.diff(&mut ctx, None);
        }
    }

    let damage = Damage {
        frame_damage: ctx.compute_damage(),
    };
    let regions = ctx.into_paint_regions();
    tracing::debug!(damage = ?damage.frame_damage, regions = regions.len(), "diffed layer tree");
    new.set_paint_region_map(regions);
    damage
}
