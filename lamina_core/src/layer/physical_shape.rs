// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Elevated shapes and their shadow bounds.

use kurbo::{BezPath, Rect, Shape};

use crate::canvas::{Clip, Color};

/// Height of the key light above the canvas, in logical pixels.
pub const LIGHT_HEIGHT: f64 = 600.0;

/// Radius of the key light, in logical pixels.
pub const LIGHT_RADIUS: f64 = 800.0;

/// Properties of a [`LayerKind::PhysicalShape`](super::LayerKind::PhysicalShape) layer.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicalShape {
    /// Fill color.
    pub color: Color,
    /// Shadow color.
    pub shadow_color: Color,
    /// Height above the parent; 0 draws no shadow.
    pub elevation: f64,
    /// Outline.
    pub path: BezPath,
    /// How children are clipped to the outline.
    pub clip: Clip,
}

impl PhysicalShape {
    /// A flat, unclipped shape filled with `color`.
    #[must_use]
    pub fn new(path: BezPath, color: Color) -> Self {
        Self {
            color,
            shadow_color: Color::BLACK,
            elevation: 0.0,
            path,
            clip: Clip::None,
        }
    }

    /// Sets the elevation and shadow color.
    #[must_use]
    pub fn with_elevation(mut self, elevation: f64, shadow_color: Color) -> Self {
        self.elevation = elevation;
        self.shadow_color = shadow_color;
        self
    }

    /// Sets the clip behaviour.
    #[must_use]
    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clip = clip;
        self
    }

    /// Bounds of the outline.
    #[must_use]
    pub fn path_bounds(&self) -> Rect {
        self.path.bounding_box()
    }

    /// Bounds of the outline plus its shadow, drawn locally.
    #[must_use]
    pub fn local_bounds(&self, device_pixel_ratio: f64) -> Rect {
        let bounds = self.path_bounds();
        if self.elevation == 0.0 {
            bounds
        } else {
            compute_shadow_bounds(bounds, self.elevation, device_pixel_ratio)
        }
    }
}

/// Outsets `bounds` by the largest extent a shadow at `elevation` can reach.
///
/// The light sits [`LIGHT_HEIGHT`] above the canvas with radius
/// [`LIGHT_RADIUS`]; the penumbra grows with the light radius (scaled to
/// physical pixels) and half the occluder size.
#[must_use]
pub fn compute_shadow_bounds(bounds: Rect, elevation: f64, device_pixel_ratio: f64) -> Rect {
    let tx = (LIGHT_RADIUS * device_pixel_ratio + bounds.width() * 0.5) / LIGHT_HEIGHT;
    let ty = (LIGHT_RADIUS * device_pixel_ratio + bounds.height() * 0.5) / LIGHT_HEIGHT;
    bounds.inflate(elevation * tx, elevation * ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> BezPath {
        Rect::new(0.0, 0.0, side, side).to_path(0.1)
    }

    #[test]
    fn flat_shape_bounds_are_path_bounds() {
        let shape = PhysicalShape::new(square(100.0), Color::WHITE);
        assert_eq!(shape.local_bounds(1.0), Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn shadow_outset_matches_light_geometry() {
        let shape =
            PhysicalShape::new(square(100.0), Color::WHITE).with_elevation(20.0, Color::BLACK);
        let outset = 20.0 * (800.0 + 50.0) / 600.0;
        let expected = Rect::new(-outset, -outset, 100.0 + outset, 100.0 + outset);
        assert_eq!(shape.local_bounds(1.0), expected);
    }

    #[test]
    fn shadow_outset_scales_with_pixel_ratio() {
        let bounds = Rect::new(0.0, 0.0, 60.0, 30.0);
        let at_1x = compute_shadow_bounds(bounds, 4.0, 1.0);
        let at_2x = compute_shadow_bounds(bounds, 4.0, 2.0);
        assert!(at_2x.width() > at_1x.width(), "higher dpr casts a wider shadow");
        // Horizontal and vertical outsets differ for non-square occluders.
        let dx = -at_1x.x0;
        let dy = -at_1x.y0;
        assert_eq!(dx, 4.0 * (800.0 + 30.0) / 600.0);
        assert_eq!(dy, 4.0 * (800.0 + 15.0) / 600.0);
    }
}
