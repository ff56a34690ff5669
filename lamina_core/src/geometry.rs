// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle and matrix helpers shared by preroll and diffing.
//!
//! `kurbo` rects have no notion of "empty"; these helpers follow the usual
//! compositor convention that a rect is empty unless `x0 < x1 && y0 < y1`,
//! and that joining with an empty rect is the identity.

use kurbo::{Affine, Rect};

/// A cull rect that contains any realistic content.
///
/// Used instead of an infinite rect so that mapping it through a matrix
/// stays finite.
pub const GIANT_RECT: Rect = Rect::new(-1e9, -1e9, 1e9, 1e9);

/// Whether `r` encloses no area.
#[inline]
#[must_use]
pub fn is_empty(r: Rect) -> bool {
    !(r.x0 < r.x1 && r.y0 < r.y1)
}

/// Smallest rect containing both `a` and `b`, ignoring empty operands.
#[must_use]
pub fn join(a: Rect, b: Rect) -> Rect {
    if is_empty(b) {
        a
    } else if is_empty(a) {
        b
    } else {
        a.union(b)
    }
}

/// Whether `a` and `b` share a region of non-zero area.
#[inline]
#[must_use]
pub fn intersects(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Intersection of `a` and `b`, or [`Rect::ZERO`] when they do not overlap.
#[must_use]
pub fn intersection(a: Rect, b: Rect) -> Rect {
    if intersects(a, b) {
        a.intersect(b)
    } else {
        Rect::ZERO
    }
}

/// Bounding box of `r` mapped through `m`.
#[inline]
#[must_use]
pub fn map_rect(m: Affine, r: Rect) -> Rect {
    m.transform_rect_bbox(r)
}

/// Inverse of `m`, or `None` when `m` is singular or not finite.
#[must_use]
pub fn invert(m: Affine) -> Option<Affine> {
    let det = m.determinant();
    if det == 0.0 || !det.is_finite() || !m.is_finite() {
        return None;
    }
    let inv = m.inverse();
    inv.is_finite().then_some(inv)
}

/// Rounds `r` outward to integer coordinates. Empty input yields
/// [`Rect::ZERO`].
#[must_use]
pub fn round_out(r: Rect) -> Rect {
    if is_empty(r) {
        Rect::ZERO
    } else {
        r.expand()
    }
}
