// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use kurbo::{Affine, BezPath, Rect, Vec2};

use crate::canvas::{Clip, Paint};

use super::id::LayerId;
use super::kinds::{LayerKind, PictureLayer, TextureLayer};
use super::physical_shape::PhysicalShape;

/// A node in the layer tree.
///
/// Layers are built once, wrapped in an `Arc`, and never mutated after they
/// are attached to a parent. A subtree that did not change between frames is
/// shared by cloning its `Arc` into the next frame's tree; the diff engine
/// recognizes such subtrees by pointer identity.
///
/// ```rust,ignore
/// let content = Arc::new(Layer::shape(path, Paint::fill(Color::BLACK)));
/// let root = Layer::transform(Affine::translate((10.0, 10.0)))
///     .with_child(content.clone())
///     .into_shared();
/// ```
#[derive(Debug)]
pub struct Layer {
    id: LayerId,
    kind: LayerKind,
    children: Vec<Arc<Self>>,
}

impl Layer {
    /// Creates a childless layer of the given kind with a fresh id.
    #[must_use]
    pub fn new(kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            kind,
            children: Vec::new(),
        }
    }

    /// A plain grouping layer.
    #[must_use]
    pub fn container() -> Self {
        Self::new(LayerKind::Container)
    }

    /// A layer applying `transform` to its children.
    #[must_use]
    pub fn transform(transform: Affine) -> Self {
        Self::new(LayerKind::Transform(transform))
    }

    /// A layer clipping its children to `rect`.
    ///
    /// # Panics
    ///
    /// Panics if `clip` is [`Clip::None`].
    #[must_use]
    pub fn clip_rect(rect: Rect, clip: Clip) -> Self {
        assert!(clip != Clip::None, "ClipRect layers require a clip behavior");
        Self::new(LayerKind::ClipRect { rect, clip })
    }

    /// A layer compositing its children with `alpha`, translated by `offset`.
    #[must_use]
    pub fn opacity(alpha: u8, offset: Vec2) -> Self {
        Self::new(LayerKind::Opacity { alpha, offset })
    }

    /// A physical shape layer.
    #[must_use]
    pub fn physical_shape(shape: PhysicalShape) -> Self {
        Self::new(LayerKind::PhysicalShape(shape))
    }

    /// A leaf filling `path` with `paint`.
    #[must_use]
    pub fn shape(path: BezPath, paint: Paint) -> Self {
        Self::new(LayerKind::Shape { path, paint })
    }

    /// A leaf showing an external texture.
    #[must_use]
    pub fn texture(texture: TextureLayer) -> Self {
        Self::new(LayerKind::Texture(texture))
    }

    /// A leaf replaying a recorded picture.
    #[must_use]
    pub fn picture(picture: PictureLayer) -> Self {
        Self::new(LayerKind::Picture(picture))
    }

    /// A layer blurring its backdrop with `sigma`.
    #[must_use]
    pub fn backdrop_filter(sigma: f64) -> Self {
        Self::new(LayerKind::BackdropFilter { sigma })
    }

    /// Appends `child`.
    ///
    /// # Panics
    ///
    /// Panics if this layer's kind is a leaf.
    pub fn push_child(&mut self, child: Arc<Self>) {
        assert!(
            self.kind.is_container(),
            "{} layers are leaves and cannot have children",
            self.kind.name()
        );
        self.children.push(child);
    }

    /// Builder form of [`push_child`](Self::push_child).
    #[must_use]
    pub fn with_child(mut self, child: Arc<Self>) -> Self {
        self.push_child(child);
        self
    }

    /// Appends every layer in `children`.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Arc<Self>>) -> Self {
        for child in children {
            self.push_child(child);
        }
        self
    }

    /// Wraps the layer in an `Arc`, ready to be attached to a parent.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// This layer's identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> LayerId {
        self.id
    }

    /// Kind and visual properties.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Children in paint order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[Arc<Self>] {
        &self.children
    }

    /// Number of layers in this subtree, including `self`.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(|c| c.subtree_len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Color;
    use kurbo::Shape;

    #[test]
    fn builder_attaches_children() {
        let leaf = Layer::shape(
            Rect::new(0.0, 0.0, 5.0, 5.0).to_path(0.1),
            Paint::fill(Color::BLACK),
        )
        .into_shared();
        let root = Layer::container()
            .with_child(leaf.clone())
            .with_children([leaf.clone()])
            .into_shared();
        assert_eq!(root.children().len(), 2);
        assert!(Arc::ptr_eq(&root.children()[0], &leaf));
        assert_eq!(root.subtree_len(), 3);
        assert_ne!(root.id(), leaf.id());
    }

    #[test]
    #[should_panic(expected = "cannot have children")]
    fn leaves_reject_children() {
        let mut leaf = Layer::backdrop_filter(1.0);
        leaf.push_child(Layer::container().into_shared());
        let mut shape = Layer::shape(BezPath::new(), Paint::default());
        shape.push_child(leaf.into_shared());
    }

    #[test]
    #[should_panic(expected = "require a clip behavior")]
    fn clip_rect_requires_clip() {
        let _ = Layer::clip_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Clip::None);
    }
}
