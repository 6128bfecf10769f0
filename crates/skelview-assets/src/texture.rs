//! Texture handles and the seam to the renderer that owns GPU memory.

use parking_lot::Mutex;
use skelview_core::alloc::sparse_set::{IndexSlot, SparseSet};

use crate::error::{AssetError, AssetResult};
use crate::locator::Locator;

/// RGBA8 pixels produced by the image decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

/// Opaque identifier handed out by a [`TextureFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// A renderer-ready texture.
///
/// Cheap to copy; the cache entry it was loaded under owns the underlying
/// resource and releases it through the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Texture {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

/// Creates and destroys renderer textures.
///
/// Implement this for your rendering backend. Calls happen on the thread
/// that pumps the [`crate::AssetCache`].
pub trait TextureFactory: Send + Sync {
    /// Upload decoded pixels, returning the backend's handle.
    fn create_texture(&self, path: &Locator, image: &DecodedImage) -> AssetResult<TextureId>;

    /// Free a texture previously returned by `create_texture`.
    fn release_texture(&self, id: TextureId);
}

#[derive(Debug)]
struct HeadlessTexture {
    path: Locator,
    width: u32,
    height: u32,
}

/// Factory that keeps texture metadata in memory without any GPU.
///
/// Ids are generational slots, so releasing the same texture twice or
/// releasing a stale id is detected and logged rather than corrupting state.
#[derive(Default)]
pub struct HeadlessTextures {
    slots: Mutex<SparseSet<HeadlessTexture>>,
    created: Mutex<u64>,
}

impl HeadlessTextures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of textures created and not yet released.
    pub fn live_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Total number of textures ever created.
    pub fn created_count(&self) -> u64 {
        *self.created.lock()
    }

    pub fn is_live(&self, id: TextureId) -> bool {
        IndexSlot::from_bits(id.0)
            .map(|slot| self.slots.lock().contains(slot))
            .unwrap_or(false)
    }

    /// Locator and size of a live texture.
    pub fn describe(&self, id: TextureId) -> Option<(Locator, u32, u32)> {
        let slot = IndexSlot::from_bits(id.0)?;
        self.slots
            .lock()
            .try_get(slot)
            .map(|t| (t.path.clone(), t.width, t.height))
    }
}

impl TextureFactory for HeadlessTextures {
    fn create_texture(&self, path: &Locator, image: &DecodedImage) -> AssetResult<TextureId> {
        if image.width == 0 || image.height == 0 {
            return Err(AssetError::loader(path.as_str(), "texture has zero size"));
        }

        let slot = self.slots.lock().push(HeadlessTexture {
            path: path.clone(),
            width: image.width,
            height: image.height,
        });
        *self.created.lock() += 1;
        Ok(TextureId(slot.to_bits()))
    }

    fn release_texture(&self, id: TextureId) {
        let released = IndexSlot::from_bits(id.0).and_then(|slot| self.slots.lock().remove(slot));
        if released.is_none() {
            tracing::warn!("release of unknown or already released texture {:?}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            width,
            height,
            pixels: vec![0; (width * height * 4) as usize],
        }
    }

    #[test]
    fn test_create_and_release() {
        let textures = HeadlessTextures::new();
        let id = textures
            .create_texture(&Locator::new("hero.png"), &image(2, 2))
            .unwrap();
        assert!(textures.is_live(id));
        assert_eq!(textures.live_count(), 1);
        assert_eq!(
            textures.describe(id),
            Some((Locator::new("hero.png"), 2, 2))
        );

        textures.release_texture(id);
        assert!(!textures.is_live(id));
        assert_eq!(textures.live_count(), 0);
        assert_eq!(textures.created_count(), 1);
    }

    #[test]
    fn test_double_release_is_harmless() {
        let textures = HeadlessTextures::new();
        let id = textures
            .create_texture(&Locator::new("a.png"), &image(1, 1))
            .unwrap();
        textures.release_texture(id);
        textures.release_texture(id);

        let reused = textures
            .create_texture(&Locator::new("b.png"), &image(1, 1))
            .unwrap();
        assert_ne!(id, reused);
        assert!(textures.is_live(reused));
    }

    #[test]
    fn test_zero_size_rejected() {
        let textures = HeadlessTextures::new();
        assert!(
            textures
                .create_texture(&Locator::new("empty.png"), &image(0, 4))
                .is_err()
        );
    }
}
