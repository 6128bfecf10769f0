//! The asset kinds the cache stores.

use std::fmt;
use std::sync::Arc;

use crate::atlas::TextureAtlas;
use crate::texture::{Texture, TextureFactory};

/// Discriminant of a [`LoadedAsset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Bytes,
    Text,
    Json,
    Texture,
    Atlas,
}

impl AssetKind {
    pub fn name(&self) -> &'static str {
        match self {
            AssetKind::Bytes => "binary",
            AssetKind::Text => "text",
            AssetKind::Json => "JSON",
            AssetKind::Texture => "texture",
            AssetKind::Atlas => "texture atlas",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved asset as stored in the cache.
///
/// Payloads are shared, so cloning a `LoadedAsset` never copies asset data.
#[derive(Debug, Clone)]
pub enum LoadedAsset {
    Bytes(Arc<[u8]>),
    Text(Arc<str>),
    Json(Arc<serde_json::Value>),
    Texture(Texture),
    Atlas(Arc<TextureAtlas>),
}

impl LoadedAsset {
    pub fn kind(&self) -> AssetKind {
        match self {
            LoadedAsset::Bytes(_) => AssetKind::Bytes,
            LoadedAsset::Text(_) => AssetKind::Text,
            LoadedAsset::Json(_) => AssetKind::Json,
            LoadedAsset::Texture(_) => AssetKind::Texture,
            LoadedAsset::Atlas(_) => AssetKind::Atlas,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            LoadedAsset::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            LoadedAsset::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            LoadedAsset::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<Texture> {
        match self {
            LoadedAsset::Texture(texture) => Some(*texture),
            _ => None,
        }
    }

    pub fn as_atlas(&self) -> Option<&Arc<TextureAtlas>> {
        match self {
            LoadedAsset::Atlas(atlas) => Some(atlas),
            _ => None,
        }
    }

    /// Run the kind's release routine.
    ///
    /// Textures are freed through the factory. An atlas does not own its page
    /// textures (each page is its own cache entry), so it has nothing to free.
    pub fn release(&self, textures: &dyn TextureFactory) {
        if let LoadedAsset::Texture(texture) = self {
            textures.release_texture(texture.id);
        }
    }
}

/// A payload type that can be pulled out of a [`LoadedAsset`].
pub trait Asset: Sized {
    /// The variant this type lives in.
    const KIND: AssetKind;

    /// Wrap into the tagged union.
    fn into_loaded(self) -> LoadedAsset;

    /// Clone the payload out, or `None` if `asset` is another kind.
    fn from_loaded(asset: &LoadedAsset) -> Option<Self>;
}

impl Asset for Arc<[u8]> {
    const KIND: AssetKind = AssetKind::Bytes;

    fn into_loaded(self) -> LoadedAsset {
        LoadedAsset::Bytes(self)
    }

    fn from_loaded(asset: &LoadedAsset) -> Option<Self> {
        match asset {
            LoadedAsset::Bytes(bytes) => Some(Arc::clone(bytes)),
            _ => None,
        }
    }
}

impl Asset for Arc<str> {
    const KIND: AssetKind = AssetKind::Text;

    fn into_loaded(self) -> LoadedAsset {
        LoadedAsset::Text(self)
    }

    fn from_loaded(asset: &LoadedAsset) -> Option<Self> {
        match asset {
            LoadedAsset::Text(text) => Some(Arc::clone(text)),
            _ => None,
        }
    }
}

impl Asset for Arc<serde_json::Value> {
    const KIND: AssetKind = AssetKind::Json;

    fn into_loaded(self) -> LoadedAsset {
        LoadedAsset::Json(self)
    }

    fn from_loaded(asset: &LoadedAsset) -> Option<Self> {
        match asset {
            LoadedAsset::Json(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }
}

impl Asset for Texture {
    const KIND: AssetKind = AssetKind::Texture;

    fn into_loaded(self) -> LoadedAsset {
        LoadedAsset::Texture(self)
    }

    fn from_loaded(asset: &LoadedAsset) -> Option<Self> {
        asset.as_texture()
    }
}

impl Asset for Arc<TextureAtlas> {
    const KIND: AssetKind = AssetKind::Atlas;

    fn into_loaded(self) -> LoadedAsset {
        LoadedAsset::Atlas(self)
    }

    fn from_loaded(asset: &LoadedAsset) -> Option<Self> {
        asset.as_atlas().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_union() {
        let text: Arc<str> = Arc::from("hello");
        let loaded = text.clone().into_loaded();
        assert_eq!(loaded.kind(), AssetKind::Text);
        assert_eq!(<Arc<str> as Asset>::from_loaded(&loaded), Some(text));
        assert!(<Arc<[u8]> as Asset>::from_loaded(&loaded).is_none());
    }

    #[test]
    fn test_accessors_match_variant() {
        let bytes = LoadedAsset::Bytes(Arc::from(&[1u8, 2, 3][..]));
        assert_eq!(bytes.as_bytes(), Some(&[1u8, 2, 3][..]));
        assert!(bytes.as_text().is_none());
        assert!(bytes.as_texture().is_none());
        assert_eq!(AssetKind::Atlas.to_string(), "texture atlas");
    }
}
