// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use kurbo::{Affine, Rect, Size};

use crate::canvas::Canvas;
use crate::diff::{OldLayerLinks, PaintRegionMap};
use crate::error::LinkError;
use crate::texture::TextureRegistry;

use super::context::{LayerGeometryMap, PaintContext, PrerollContext};
use super::node::Layer;

/// One frame's layer tree plus the metadata the diff engine and rasterizer
/// need.
///
/// Built by the producer, optionally diffed against the previous frame's tree
/// (which fills in the paint-region map), then frozen in an `Arc` and handed
/// through the pipeline.
#[derive(Debug)]
pub struct LayerTree {
    root: Arc<Layer>,
    frame_size: Size,
    device_pixel_ratio: f64,
    links: OldLayerLinks,
    paint_regions: PaintRegionMap,
}

impl LayerTree {
    /// Wraps `root` for a frame of `frame_size` physical pixels.
    #[must_use]
    pub fn new(root: Arc<Layer>, frame_size: Size, device_pixel_ratio: f64) -> Self {
        Self {
            root,
            frame_size,
            device_pixel_ratio,
            links: OldLayerLinks::default(),
            paint_regions: PaintRegionMap::default(),
        }
    }

    /// The root layer.
    #[must_use]
    pub fn root(&self) -> &Arc<Layer> {
        &self.root
    }

    /// Frame size in physical pixels.
    #[must_use]
    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    /// The frame rect, `(0, 0, width, height)`.
    #[must_use]
    pub fn frame_rect(&self) -> Rect {
        self.frame_size.to_rect()
    }

    /// Physical pixels per logical pixel.
    #[must_use]
    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    /// Declares that `new` (a layer of this tree) replaces `old` (a layer of
    /// the previous frame's tree), so the diff engine compares the two
    /// instead of treating `new` as an insertion.
    ///
    /// Layers of different kinds can be linked, but the diff engine treats
    /// such a link as no match.
    pub fn assign_old_layer(&mut self, new: &Layer, old: &Layer) -> Result<(), LinkError> {
        self.links.assign(new.id(), old.id())
    }

    /// Links recorded with [`assign_old_layer`](Self::assign_old_layer).
    #[must_use]
    pub fn old_layer_links(&self) -> &OldLayerLinks {
        &self.links
    }

    /// Screen-space paint regions computed by the last diff of this tree.
    #[must_use]
    pub fn paint_region_map(&self) -> &PaintRegionMap {
        &self.paint_regions
    }

    pub(crate) fn set_paint_region_map(&mut self, map: PaintRegionMap) {
        self.paint_regions = map;
    }

    /// Prerolls the whole tree with the given context.
    ///
    /// The context's pixel ratio is overwritten with the tree's. The root
    /// receives `root_transform` as its parent matrix.
    pub fn preroll<'t>(
        &'t self,
        mut ctx: PrerollContext<'_>,
        root_transform: Affine,
    ) -> PrerolledTree<'t> {
        let _span = tracing::trace_span!("LayerTree::preroll", layers = self.root.subtree_len())
            .entered();
        ctx.frame_device_pixel_ratio = self.device_pixel_ratio;
        self.root.preroll(&mut ctx, root_transform);
        PrerolledTree {
            tree: self,
            surface_needs_readback: ctx.surface_needs_readback,
            geometry: ctx.into_geometry(),
            root_transform,
        }
    }
}

/// A [`LayerTree`] together with the geometry computed by preroll.
#[derive(Debug)]
pub struct PrerolledTree<'t> {
    tree: &'t LayerTree,
    geometry: LayerGeometryMap,
    surface_needs_readback: bool,
    root_transform: Affine,
}

impl PrerolledTree<'_> {
    /// Per-layer geometry.
    #[must_use]
    pub fn geometry(&self) -> &LayerGeometryMap {
        &self.geometry
    }

    /// Whether some layer reads back what is drawn beneath it.
    #[must_use]
    pub fn surface_needs_readback(&self) -> bool {
        self.surface_needs_readback
    }

    /// Paints the tree onto `canvas`. Does nothing when the root has nothing
    /// to paint.
    pub fn paint(&self, canvas: &mut dyn Canvas, textures: &TextureRegistry) {
        let _span = tracing::trace_span!("LayerTree::paint").entered();
        let root = self.tree.root();
        if !self.geometry.needs_painting(root.id()) {
            return;
        }
        let count = canvas.save();
        if self.root_transform != Affine::IDENTITY {
            canvas.concat(self.root_transform);
        }
        let mut ctx = PaintContext {
            canvas,
            textures,
            geometry: &self.geometry,
            frame_device_pixel_ratio: self.tree.device_pixel_ratio,
        };
        root.paint(&mut ctx);
        ctx.canvas.restore_to_count(count);
    }
}
