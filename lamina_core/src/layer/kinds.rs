// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The closed set of layer kinds and their visual properties.

use kurbo::{Affine, BezPath, Rect, Size, Vec2};

use crate::canvas::{Clip, Paint, Picture, Sampling};

use super::physical_shape::PhysicalShape;

/// What a layer draws or how it affects its children.
///
/// Equality compares visual properties only (never children), which is what
/// the diff engine needs to decide whether a layer changed.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerKind {
    /// Groups children without affecting them.
    Container,
    /// Applies a matrix to its children.
    Transform(Affine),
    /// Clips its children to a rectangle.
    ClipRect {
        /// Clip rectangle in local coordinates.
        rect: Rect,
        /// Clip behaviour; never [`Clip::None`].
        clip: Clip,
    },
    /// Composites its children with a uniform alpha.
    Opacity {
        /// Alpha, 0 to 255.
        alpha: u8,
        /// Translation applied to the children.
        offset: Vec2,
    },
    /// A filled, optionally elevated and clipping shape.
    PhysicalShape(PhysicalShape),
    /// A filled path.
    Shape {
        /// Outline.
        path: BezPath,
        /// Fill.
        paint: Paint,
    },
    /// An externally produced texture.
    Texture(TextureLayer),
    /// A recorded picture.
    Picture(PictureLayer),
    /// Blurs whatever was drawn behind it, then draws its children.
    BackdropFilter {
        /// Gaussian blur sigma.
        sigma: f64,
    },
}

impl LayerKind {
    /// Short name, for logs and panics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Container => "Container",
            Self::Transform(_) => "Transform",
            Self::ClipRect { .. } => "ClipRect",
            Self::Opacity { .. } => "Opacity",
            Self::PhysicalShape(_) => "PhysicalShape",
            Self::Shape { .. } => "Shape",
            Self::Texture(_) => "Texture",
            Self::Picture(_) => "Picture",
            Self::BackdropFilter { .. } => "BackdropFilter",
        }
    }

    /// Whether layers of this kind may have children.
    #[must_use]
    pub const fn is_container(&self) -> bool {
        !matches!(self, Self::Shape { .. } | Self::Texture(_) | Self::Picture(_))
    }

    /// Whether `self` and `other` are the same variant.
    #[must_use]
    pub fn same_variant(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

/// Properties of a [`LayerKind::Texture`] layer.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureLayer {
    /// Top-left corner in parent coordinates.
    pub offset: Vec2,
    /// Size in parent coordinates.
    pub size: Size,
    /// Registry id of the texture.
    pub texture_id: i64,
    /// Keep showing the last frame instead of advancing.
    pub freeze: bool,
    /// Sampling used when drawing.
    pub sampling: Sampling,
}

impl TextureLayer {
    /// A texture layer showing `texture_id` at `offset` with `size`.
    #[must_use]
    pub fn new(offset: Vec2, size: Size, texture_id: i64) -> Self {
        Self {
            offset,
            size,
            texture_id,
            freeze: false,
            sampling: Sampling::default(),
        }
    }

    /// Destination rect of the texture.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(self.offset.to_point(), self.size)
    }
}

/// Properties of a [`LayerKind::Picture`] layer.
#[derive(Clone, Debug, PartialEq)]
pub struct PictureLayer {
    /// Translation applied to the picture.
    pub offset: Vec2,
    /// The recorded content.
    pub picture: Picture,
    /// Hint that the picture is expensive to replay.
    pub is_complex: bool,
    /// Hint that the picture will change next frame.
    pub will_change: bool,
}

impl PictureLayer {
    /// A picture layer drawing `picture` at `offset`.
    #[must_use]
    pub fn new(offset: Vec2, picture: Picture) -> Self {
        Self {
            offset,
            picture,
            is_complex: false,
            will_change: false,
        }
    }

    /// Bounds of the picture in parent coordinates.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.picture.cull_rect() + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_comparison_ignores_payload() {
        let a = LayerKind::Transform(Affine::scale(2.0));
        let b = LayerKind::Transform(Affine::IDENTITY);
        assert!(a.same_variant(&b));
        assert_ne!(a, b);
        assert!(!a.same_variant(&LayerKind::Container));
    }

    #[test]
    fn leaves_are_not_containers() {
        let texture = LayerKind::Texture(TextureLayer::new(Vec2::ZERO, Size::new(1.0, 1.0), 0));
        assert!(!texture.is_container());
        assert!(LayerKind::BackdropFilter { sigma: 2.0 }.is_container());
        assert_eq!(texture.name(), "Texture");
    }

    #[test]
    fn texture_bounds_follow_offset_and_size() {
        let layer = TextureLayer::new(Vec2::new(10.0, 20.0), Size::new(30.0, 40.0), 1);
        assert_eq!(layer.bounds(), Rect::new(10.0, 20.0, 40.0, 60.0));
    }
}
