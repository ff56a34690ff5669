// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Externally produced textures (video frames, camera previews, platform
//! surfaces) and the registry that texture layers resolve against.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kurbo::Rect;

use crate::canvas::{Canvas, Sampling};

/// A texture whose content is produced outside the layer tree.
pub trait Texture: Send + Sync {
    /// Registry key.
    fn id(&self) -> i64;

    /// Draws the current content into `bounds`.
    ///
    /// When `freeze` is set the texture should keep showing the content it
    /// showed last rather than advancing to a newer frame.
    fn paint(&self, canvas: &mut dyn Canvas, bounds: Rect, freeze: bool, sampling: Sampling);

    /// Notifies the texture that its producer has a new frame.
    fn mark_new_frame_available(&self) {}

    /// Called when the texture is removed from the registry.
    fn on_texture_unregistered(&self) {}
}

/// Id-keyed set of live textures, owned by the raster stage.
#[derive(Default)]
pub struct TextureRegistry {
    textures: HashMap<i64, Arc<dyn Texture>>,
}

impl fmt::Debug for TextureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<i64> = self.textures.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("TextureRegistry").field("ids", &ids).finish()
    }
}

impl TextureRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `texture`, replacing any texture with the same id.
    pub fn register_texture(&mut self, texture: Arc<dyn Texture>) {
        let id = texture.id();
        if let Some(previous) = self.textures.insert(id, texture) {
            tracing::debug!(id, "replacing registered texture");
            previous.on_texture_unregistered();
        }
    }

    /// Removes the texture with `id`, if present.
    pub fn unregister_texture(&mut self, id: i64) {
        if let Some(texture) = self.textures.remove(&id) {
            texture.on_texture_unregistered();
        }
    }

    /// Looks up a texture.
    #[must_use]
    pub fn get_texture(&self, id: i64) -> Option<&Arc<dyn Texture>> {
        self.textures.get(&id)
    }

    /// Number of registered textures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Whether no textures are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTexture;

    #[test]
    fn register_lookup_unregister() {
        let mut registry = TextureRegistry::new();
        let texture = Arc::new(MockTexture::new(7));
        registry.register_texture(texture.clone());

        assert_eq!(registry.len(), 1);
        assert!(registry.get_texture(7).is_some());
        assert!(registry.get_texture(8).is_none());

        registry.unregister_texture(7);
        assert!(registry.is_empty());
        assert!(texture.was_unregistered());
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = TextureRegistry::new();
        let first = Arc::new(MockTexture::new(1));
        registry.register_texture(first.clone());
        registry.register_texture(Arc::new(MockTexture::new(1)));
        assert_eq!(registry.len(), 1);
        assert!(first.was_unregistered());
    }
}
