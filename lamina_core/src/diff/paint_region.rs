// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;
use std::sync::Arc;

use kurbo::Rect;

use crate::geometry;
use crate::layer::LayerId;

/// The screen-space rectangles one layer subtree painted in a frame.
///
/// A region is a window `[from, to)` into a rect buffer shared by every
/// region of the same frame; cloning a region never copies rectangles.
/// `PaintRegion::default()` is invalid: it refers to no buffer.
#[derive(Clone, Debug, Default)]
pub struct PaintRegion {
    rects: Option<Arc<[Rect]>>,
    from: usize,
    to: usize,
    has_readback: bool,
    has_texture: bool,
}

impl PaintRegion {
    pub(crate) fn new(
        rects: Arc<[Rect]>,
        from: usize,
        to: usize,
        has_readback: bool,
        has_texture: bool,
    ) -> Self {
        debug_assert!(from <= to && to <= rects.len(), "region out of buffer bounds");
        Self {
            rects: Some(rects),
            from,
            to,
            has_readback,
            has_texture,
        }
    }

    /// Whether the region refers to a buffer.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.rects.is_some()
    }

    /// The region's rectangles; empty for an invalid region.
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        match &self.rects {
            Some(rects) => &rects[self.from..self.to],
            None => &[],
        }
    }

    /// Offset of the region's first rect in the shared buffer.
    pub(crate) fn start(&self) -> usize {
        self.from
    }

    /// Union of the region's rectangles.
    #[must_use]
    pub fn compute_bounds(&self) -> Rect {
        self.rects().iter().fold(Rect::ZERO, |acc, r| geometry::join(acc, *r))
    }

    /// Whether some layer in the subtree reads back the pixels beneath it.
    #[must_use]
    pub fn has_readback(&self) -> bool {
        self.has_readback
    }

    /// Whether the subtree contains a texture layer.
    #[must_use]
    pub fn has_texture(&self) -> bool {
        self.has_texture
    }
}

/// Paint regions of one frame, keyed by layer id.
pub type PaintRegionMap = HashMap<LayerId, PaintRegion>;
