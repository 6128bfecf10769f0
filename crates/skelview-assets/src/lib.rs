//! skelview assets
//!
//! Loads skeleton animation bundles (a skeleton descriptor, a texture atlas
//! and the page images the atlas names) and resolves them into
//! renderer-ready objects.
//!
//! - [`version`]: reads the export version out of `.skel` and `.json`
//!   skeletons without parsing the rest of the file
//! - [`ResourceResolver`]: locator to bytes, from the session's resource
//!   table, a raw-data registry, or the network
//! - [`AssetCache`]: keyed store of loaded assets with per-frame polling
//! - [`atlas`]: atlas parsing and page-to-texture linking
//! - [`SkeletonBundle`]: gathers the files a user selected
//!
//! # Quick Start
//!
//! ```ignore
//! use skelview_assets::{AssetCache, SkeletonBundle};
//!
//! let bundle = SkeletonBundle::from_paths(&["hero.skel", "hero.atlas"])?;
//! let cache = AssetCache::new(bundle.resolver());
//! let (skeleton, atlas) = bundle.load_into(&cache);
//!
//! // once per frame
//! cache.update();
//! if cache.is_loading_complete() {
//!     let atlas = cache.require_atlas(atlas.as_str())?;
//! }
//! ```

pub mod asset;
pub mod atlas;
pub mod binary;
pub mod bundle;
pub mod cache;
pub mod error;
pub mod event;
pub mod io;
pub mod loader;
pub mod locator;
pub mod resolver;
pub mod settings;
pub mod state;
pub mod texture;
pub mod version;

pub use asset::{Asset, AssetKind, LoadedAsset};
pub use atlas::{AtlasDescriptor, AtlasPage, PageAliases, PageDescriptor, TextureAtlas};
pub use binary::BinaryInput;
pub use bundle::SkeletonBundle;
pub use cache::{AssetCache, LoadCallbacks, WeakAssetCache};
pub use error::{AssetError, AssetResult, DecodeError};
pub use event::AssetEvent;
pub use io::{BytesReader, FileReader, MemoryReader};
pub use locator::Locator;
pub use resolver::{ResolvedFrom, ResourceResolver, ResourceTable};
pub use settings::LoaderSettings;
pub use state::LoadState;
pub use texture::{DecodedImage, HeadlessTextures, Texture, TextureFactory, TextureId};
pub use version::{RuntimeLine, SkeletonFormat, SkeletonVersion};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        AssetCache, AssetError, AssetKind, AssetResult, LoadCallbacks, LoadState, LoadedAsset,
        Locator, ResourceResolver, ResourceTable, SkeletonBundle, Texture, TextureAtlas,
    };
}
