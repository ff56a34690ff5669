// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! State threaded through the preroll and paint traversals.

use std::collections::HashMap;

use kurbo::{Affine, Rect};

use crate::canvas::Canvas;
use crate::geometry::{self, GIANT_RECT};
use crate::texture::TextureRegistry;

use super::id::LayerId;

/// What preroll computed for one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerGeometry {
    /// Bounds of everything the layer paints, in its parent's coordinates.
    pub paint_bounds: Rect,
    /// Whether the layer asked the host compositor to draw part of it.
    pub needs_system_composite: bool,
    /// Accumulated matrix from the root to the layer's parent, at the
    /// layer's last occurrence in the tree.
    pub parent_matrix: Affine,
    /// Cull rect of the layer's last occurrence, in parent coordinates.
    pub parent_cull_rect: Rect,
    /// Whether the paint bounds fall entirely outside the cull rect at
    /// every occurrence of the layer.
    pub culled: bool,
}

impl LayerGeometry {
    /// Whether the layer has anything visible to paint.
    #[inline]
    #[must_use]
    pub fn needs_painting(&self) -> bool {
        !self.culled && !geometry::is_empty(self.paint_bounds)
    }
}

/// Per-frame computed geometry, keyed by layer id.
///
/// A layer shared by several parents has one entry. Its paint bounds do not
/// depend on where it occurs, and it counts as culled only when every
/// occurrence was.
#[derive(Clone, Debug, Default)]
pub struct LayerGeometryMap {
    entries: HashMap<LayerId, LayerGeometry>,
}

impl LayerGeometryMap {
    /// Geometry of `id`, if it was prerolled.
    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&LayerGeometry> {
        self.entries.get(&id)
    }

    /// Paint bounds of `id`; empty if it was never prerolled.
    #[must_use]
    pub fn paint_bounds(&self, id: LayerId) -> Rect {
        self.entries.get(&id).map_or(Rect::ZERO, |g| g.paint_bounds)
    }

    /// Whether `id` was prerolled and has something to paint.
    #[must_use]
    pub fn needs_painting(&self, id: LayerId) -> bool {
        self.entries.get(&id).is_some_and(LayerGeometry::needs_painting)
    }

    /// Number of prerolled layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was prerolled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, id: LayerId, mut geometry: LayerGeometry) {
        if let Some(previous) = self.entries.get(&id) {
            geometry.culled &= previous.culled;
        }
        self.entries.insert(id, geometry);
    }
}

/// Inputs and outputs of the preroll traversal.
#[derive(Debug)]
pub struct PrerollContext<'a> {
    /// Current cull rect, in the coordinates of the layer being prerolled.
    pub cull_rect: Rect,
    /// Whether the surface below the tree is already fully opaque.
    pub is_opaque: bool,
    /// Physical pixels per logical pixel.
    pub frame_device_pixel_ratio: f64,
    /// Whether a host compositor can draw elevations on the layer tree's
    /// behalf.
    pub system_composite_available: bool,
    /// Set when some layer reads back what was drawn beneath it.
    pub surface_needs_readback: bool,
    /// Textures available to texture layers.
    pub textures: &'a TextureRegistry,
    geometry: LayerGeometryMap,
}

impl<'a> PrerollContext<'a> {
    /// A context with an unbounded cull rect and a pixel ratio of 1.
    #[must_use]
    pub fn new(textures: &'a TextureRegistry) -> Self {
        Self {
            cull_rect: GIANT_RECT,
            is_opaque: false,
            frame_device_pixel_ratio: 1.0,
            system_composite_available: false,
            surface_needs_readback: false,
            textures,
            geometry: LayerGeometryMap::default(),
        }
    }

    /// Geometry recorded so far.
    #[must_use]
    pub fn geometry(&self) -> &LayerGeometryMap {
        &self.geometry
    }

    /// Consumes the context and returns the recorded geometry.
    #[must_use]
    pub fn into_geometry(self) -> LayerGeometryMap {
        self.geometry
    }

    pub(crate) fn record(&mut self, id: LayerId, geometry: LayerGeometry) {
        self.geometry.insert(id, geometry);
    }
}

/// Inputs of the paint traversal.
pub struct PaintContext<'a> {
    /// Destination of drawing commands.
    pub canvas: &'a mut dyn Canvas,
    /// Textures available to texture layers.
    pub textures: &'a TextureRegistry,
    /// Geometry from the preceding preroll.
    pub geometry: &'a LayerGeometryMap,
    /// Physical pixels per logical pixel.
    pub frame_device_pixel_ratio: f64,
}

impl core::fmt::Debug for PaintContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PaintContext")
            .field("geometry", &self.geometry.len())
            .field("frame_device_pixel_ratio", &self.frame_device_pixel_ratio)
            .finish_non_exhaustive()
    }
}
