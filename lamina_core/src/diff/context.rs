// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Traversal state for one diff pass.

use std::collections::HashMap;
use std::sync::Arc;

use kurbo::{Affine, Rect};

use crate::geometry::{self, GIANT_RECT};
use crate::layer::LayerId;

use super::links::OldLayerLinks;
use super::paint_region::{PaintRegion, PaintRegionMap};

/// Per-subtree state, saved on [`DiffContext::begin_subtree`] and restored on
/// [`DiffContext::end_subtree`].
#[derive(Clone, Copy, Debug)]
struct SubtreeState {
    /// Everything painted inside this subtree is damage.
    dirty: bool,
    /// Index of the first rect painted by this subtree.
    rect_index: usize,
    /// Local to screen.
    transform: Affine,
    /// Screen space.
    cull_rect: Rect,
    has_texture: bool,
}

#[derive(Clone, Copy, Debug)]
struct Readback {
    /// Rect-buffer position of the placeholder pushed for this readback.
    position: usize,
    /// Screen-space area the layer samples.
    rect: Rect,
}

/// A pending region: rect-buffer range plus flags. Turned into a
/// [`PaintRegion`] once the buffer is frozen.
#[derive(Clone, Copy, Debug)]
struct RegionRange {
    from: usize,
    to: usize,
    has_readback: bool,
    has_texture: bool,
}

/// Mutable state threaded through [`Layer::diff`](crate::layer::Layer).
///
/// Rects are accumulated into one buffer in paint order; every subtree's
/// paint region is the slice of the buffer its layers pushed.
#[derive(Debug)]
pub(crate) struct DiffContext<'o> {
    state: SubtreeState,
    stack: Vec<SubtreeState>,
    rects: Vec<Rect>,
    readbacks: Vec<Readback>,
    damage: Rect,
    regions: HashMap<LayerId, RegionRange>,
    old_regions: Option<&'o PaintRegionMap>,
    links: &'o OldLayerLinks,
    frame_rect: Rect,
    device_pixel_ratio: f64,
}

impl<'o> DiffContext<'o> {
    pub(crate) fn new(
        frame_rect: Rect,
        device_pixel_ratio: f64,
        links: &'o OldLayerLinks,
        old_regions: Option<&'o PaintRegionMap>,
    ) -> Self {
        Self {
            state: SubtreeState {
                dirty: false,
                rect_index: 0,
                transform: Affine::IDENTITY,
                cull_rect: GIANT_RECT,
                has_texture: false,
            },
            stack: Vec::new(),
            rects: Vec::new(),
            readbacks: Vec::new(),
            damage: Rect::ZERO,
            regions: HashMap::new(),
            old_regions,
            links,
            frame_rect,
            device_pixel_ratio,
        }
    }

    // --- subtree scoping ---

    pub(crate) fn begin_subtree(&mut self) {
        self.stack.push(self.state);
        self.state.rect_index = self.rects.len();
        // Texture presence is a property of the subtree being entered, not
        // inherited from the parent.
        self.state.has_texture = false;
    }

    pub(crate) fn end_subtree(&mut self) {
        let has_texture = self.state.has_texture;
        if let Some(parent) = self.stack.pop() {
            self.state = parent;
            self.state.has_texture |= has_texture;
        } else {
            debug_assert!(false, "end_subtree without matching begin_subtree");
        }
    }

    /// Marks the current subtree dirty, adding `previous` (the region the
    /// subtree painted last frame, if any) as damage.
    pub(crate) fn mark_subtree_dirty(&mut self, previous: Option<&PaintRegion>) {
        debug_assert!(!self.state.dirty, "subtree is already dirty");
        if let Some(region) = previous {
            self.add_damage_region(region);
        }
        self.state.dirty = true;
    }

    pub(crate) fn is_subtree_dirty(&self) -> bool {
        self.state.dirty
    }

    pub(crate) fn mark_subtree_has_texture(&mut self) {
        self.state.has_texture = true;
    }

    // --- geometry ---

    pub(crate) fn push_transform(&mut self, transform: Affine) {
        self.state.transform *= transform;
    }

    /// Intersects the cull rect with `clip` (local coordinates). Returns
    /// `false` when nothing remains visible.
    pub(crate) fn push_cull_rect(&mut self, clip: Rect) -> bool {
        let screen = geometry::map_rect(self.state.transform, clip);
        self.state.cull_rect = geometry::intersection(self.state.cull_rect, screen);
        !geometry::is_empty(self.state.cull_rect)
    }

    /// Screen-space bounds of the current subtree so far.
    pub(crate) fn current_subtree_bounds(&self) -> Rect {
        self.rects[self.state.rect_index..]
            .iter()
            .fold(Rect::ZERO, |acc, r| geometry::join(acc, *r))
    }

    pub(crate) fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    // --- painting ---

    /// Records that the current layer paints `rect` (local coordinates).
    ///
    /// Rects outside the cull rect are dropped. When the subtree is dirty
    /// the rect is also damage.
    pub(crate) fn add_layer_bounds(&mut self, rect: Rect) {
        if geometry::is_empty(rect) {
            return;
        }
        let screen = geometry::map_rect(self.state.transform, rect);
        if geometry::intersects(screen, self.state.cull_rect) {
            self.rects.push(screen);
            if self.state.dirty {
                self.add_damage(screen);
            }
        }
    }

    /// Re-adds the rects of a retained subtree without diffing it.
    pub(crate) fn add_existing_paint_region(&mut self, region: &PaintRegion) {
        debug_assert!(!self.state.dirty, "retained subtree inside a dirty subtree");
        self.rects.extend_from_slice(region.rects());
    }

    /// Records that the current layer samples `rect` (screen space) from
    /// what was painted beneath it.
    pub(crate) fn add_readback_region(&mut self, rect: Rect) {
        self.readbacks.push(Readback {
            position: self.rects.len(),
            rect,
        });
        // Placeholder so the readback is inside the current subtree's range.
        self.rects.push(Rect::ZERO);
    }

    pub(crate) fn add_damage(&mut self, rect: Rect) {
        self.damage = geometry::join(self.damage, rect);
    }

    pub(crate) fn add_damage_region(&mut self, region: &PaintRegion) {
        for rect in region.rects() {
            self.add_damage(*rect);
        }
    }

    // --- regions ---

    /// Stores the current subtree's region as `id`'s paint region.
    pub(crate) fn set_layer_paint_region(&mut self, id: LayerId) {
        let from = self.state.rect_index;
        let range = RegionRange {
            from,
            to: self.rects.len(),
            has_readback: self.readbacks.iter().any(|r| r.position >= from),
            has_texture: self.state.has_texture,
        };
        self.regions.insert(id, range);
    }

    /// Copies `old_id`'s region from the previous frame into this frame
    /// under `new_id`. The rects themselves are re-added separately with
    /// [`add_existing_paint_region`](Self::add_existing_paint_region).
    pub(crate) fn preserve_region(&mut self, new_id: LayerId, old: &PaintRegion, offset: usize) {
        let len = old.rects().len();
        self.regions.insert(
            new_id,
            RegionRange {
                from: offset,
                to: offset + len,
                has_readback: old.has_readback(),
                has_texture: old.has_texture(),
            },
        );
    }

    pub(crate) fn rect_count(&self) -> usize {
        self.rects.len()
    }

    pub(crate) fn old_region(&self, id: LayerId) -> Option<&'o PaintRegion> {
        self.old_regions.and_then(|map| map.get(&id))
    }

    pub(crate) fn links(&self) -> &'o OldLayerLinks {
        self.links
    }

    // --- results ---

    /// Final damage: readbacks touching the damage join it, then the result
    /// is rounded out and clipped to the frame.
    pub(crate) fn compute_damage(&self) -> Rect {
        let mut damage = self.damage;
        if geometry::is_empty(damage) {
            return Rect::ZERO;
        }
        for readback in &self.readbacks {
            if geometry::intersects(readback.rect, damage) {
                damage = geometry::join(damage, readback.rect);
            }
        }
        geometry::intersection(geometry::round_out(damage), self.frame_rect)
    }

    /// Freezes the rect buffer and returns every region recorded this pass.
    pub(crate) fn into_paint_regions(self) -> PaintRegionMap {
        let buffer: Arc<[Rect]> = Arc::from(self.rects);
        self.regions
            .into_iter()
            .map(|(id, r)| {
                (
                    id,
                    PaintRegion::new(buffer.clone(), r.from, r.to, r.has_readback, r.has_texture),
                )
            })
            .collect()
    }
}
