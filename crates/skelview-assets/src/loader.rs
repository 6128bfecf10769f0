//! Turning resolved bytes into assets.

use std::sync::Arc;

use skelview_core::profiling::profile_function;

use crate::error::{AssetError, AssetResult};
use crate::locator::Locator;
use crate::texture::DecodedImage;

/// Context provided to asset loaders during loading.
pub struct LoadContext<'a> {
    /// The locator the bytes were resolved for.
    pub locator: &'a Locator,
    /// The raw bytes of the asset.
    pub bytes: &'a [u8],
}

impl<'a> LoadContext<'a> {
    pub fn new(locator: &'a Locator, bytes: &'a [u8]) -> Self {
        Self { locator, bytes }
    }
}

/// Trait for loading assets from bytes.
///
/// Loaders are pure: they see only the resolved bytes and never touch the
/// cache, so a failure here is reported against the locator being loaded.
pub trait AssetLoader {
    /// The value this loader produces.
    type Asset;

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset>;
}

/// Passes bytes through untouched.
pub struct BytesLoader;

impl AssetLoader for BytesLoader {
    type Asset = Arc<[u8]>;

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        Ok(Arc::from(ctx.bytes))
    }
}

/// Strict UTF-8 text.
pub struct TextLoader;

impl AssetLoader for TextLoader {
    type Asset = Arc<str>;

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        std::str::from_utf8(ctx.bytes)
            .map(Arc::from)
            .map_err(|e| AssetError::loader(ctx.locator.as_str(), format!("invalid UTF-8: {}", e)))
    }
}

/// A JSON document.
pub struct JsonLoader;

impl AssetLoader for JsonLoader {
    type Asset = Arc<serde_json::Value>;

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        profile_function!();
        serde_json::from_slice(ctx.bytes)
            .map(Arc::new)
            .map_err(|e| AssetError::loader(ctx.locator.as_str(), format!("invalid JSON: {}", e)))
    }
}

/// Decodes any image format the `image` crate was built with into RGBA8.
pub struct ImageLoader;

impl AssetLoader for ImageLoader {
    type Asset = DecodedImage;

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        profile_function!();
        let image = image::load_from_memory(ctx.bytes)
            .map_err(|e| AssetError::loader(ctx.locator.as_str(), format!("image decode failed: {}", e)))?
            .to_rgba8();

        Ok(DecodedImage {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a solid-colour PNG.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_text_loader_rejects_invalid_utf8() {
        let locator = Locator::new("bad.txt");
        let err = TextLoader
            .load(LoadContext::new(&locator, &[0xFF, 0xFE]))
            .unwrap_err();
        assert!(matches!(err, AssetError::LoaderError { ref path, .. } if path == "bad.txt"));
    }

    #[test]
    fn test_json_loader() {
        let locator = Locator::new("hero.json");
        let value = JsonLoader
            .load(LoadContext::new(&locator, br#"{"skeleton":{"spine":"4.1.0"}}"#))
            .unwrap();
        assert_eq!(value["skeleton"]["spine"], "4.1.0");
        assert!(JsonLoader.load(LoadContext::new(&locator, b"{")).is_err());
    }

    #[test]
    fn test_image_loader_decodes_png() {
        let locator = Locator::new("hero.png");
        let bytes = png_bytes(3, 2);
        let image = ImageLoader.load(LoadContext::new(&locator, &bytes)).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixels.len(), 3 * 2 * 4);
        assert_eq!(&image.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_image_loader_rejects_garbage() {
        let locator = Locator::new("hero.png");
        assert!(ImageLoader.load(LoadContext::new(&locator, b"not a png")).is_err());
    }
}
