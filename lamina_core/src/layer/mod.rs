// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The retained layer tree.
//!
//! A frame's content is a tree of immutable [`Layer`]s. Each frame the tree
//! goes through two passes:
//!
//! 1. **Preroll** ([`Layer::preroll`]) walks the tree top-down with the
//!    accumulated matrix and cull rect, computing each layer's paint bounds
//!    into a [`LayerGeometryMap`].
//! 2. **Paint** ([`Layer::paint`]) replays the tree onto a
//!    [`Canvas`](crate::canvas::Canvas), skipping layers with nothing to
//!    paint.
//!
//! Layers never mutate during either pass; everything computed per frame is
//! stored in side maps keyed by [`LayerId`]. That is what allows a subtree to
//! be shared between consecutive frames by cloning its `Arc`.

mod context;
mod id;
mod kinds;
mod node;
mod paint;
mod physical_shape;
mod preroll;
mod tree;

pub use context::{LayerGeometry, LayerGeometryMap, PaintContext, PrerollContext};
pub use id::LayerId;
pub use kinds::{LayerKind, PictureLayer, TextureLayer};
pub use node::Layer;
pub use physical_shape::{LIGHT_HEIGHT, LIGHT_RADIUS, PhysicalShape, compute_shadow_bounds};
pub use tree::{LayerTree, PrerolledTree};
