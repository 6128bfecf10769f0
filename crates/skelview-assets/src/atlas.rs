//! Texture atlases: descriptor parsing and linking pages to textures.
//!
//! An atlas load fetches the descriptor text, issues one texture load per
//! page, and once every page has completed either stores the linked
//! [`TextureAtlas`] or fails with [`AssetError::AtlasPartialFailure`].
//! Pages that did load stay in the cache either way.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use indexmap::IndexMap;
use skelview_core::alloc::HashMap;
use skelview_core::profiling::profile_function;

use crate::asset::{AssetKind, LoadedAsset};
use crate::cache::{CacheInner, LoadCallbacks};
use crate::error::{AssetError, AssetResult};
use crate::loader::{AssetLoader, LoadContext};
use crate::locator::Locator;
use crate::texture::Texture;

/// Page name to caller path overrides for an atlas load.
pub type PageAliases = HashMap<String, String>;

/// One page as declared in the atlas text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// Image file name, as written in the atlas.
    pub name: String,
    /// `key: value` lines directly under the page name (`size`, `format`, ...).
    pub properties: IndexMap<String, String>,
}

/// The page list of an atlas descriptor.
///
/// Only pages are extracted. Region entries are left for the renderer to
/// interpret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtlasDescriptor {
    pub pages: Vec<PageDescriptor>,
}

impl AtlasDescriptor {
    /// Parse atlas text.
    ///
    /// Blank lines separate pages. The first non-blank line of a section is
    /// the page name, and the `key: value` lines that immediately follow it
    /// are the page's properties. Everything after that is region data.
    pub fn parse(text: &str) -> Self {
        profile_function!();
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut pages: Vec<PageDescriptor> = Vec::new();
        let mut expect_page = true;
        let mut in_header = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                expect_page = true;
                in_header = false;
                continue;
            }

            if expect_page {
                pages.push(PageDescriptor {
                    name: trimmed.to_string(),
                    properties: IndexMap::new(),
                });
                expect_page = false;
                in_header = true;
                continue;
            }

            if in_header {
                match (trimmed.split_once(':'), pages.last_mut()) {
                    (Some((key, value)), Some(page)) => {
                        page.properties
                            .insert(key.trim().to_string(), value.trim().to_string());
                    }
                    _ => in_header = false,
                }
            }
        }

        Self { pages }
    }

    pub fn page_names(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|page| page.name.as_str())
    }
}

/// Loads an [`AtlasDescriptor`] from atlas bytes.
///
/// Fails on text that is not UTF-8 or declares no pages.
pub struct AtlasDescriptorLoader;

impl AssetLoader for AtlasDescriptorLoader {
    type Asset = AtlasDescriptor;

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        let text = std::str::from_utf8(ctx.bytes).map_err(|e| {
            AssetError::loader(ctx.locator.as_str(), format!("atlas is not UTF-8: {}", e))
        })?;

        let descriptor = AtlasDescriptor::parse(text);
        if descriptor.pages.is_empty() {
            return Err(AssetError::loader(
                ctx.locator.as_str(),
                "atlas declares no pages",
            ));
        }
        Ok(descriptor)
    }
}

/// A page bound to its loaded texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasPage {
    pub name: String,
    /// Locator the page texture is cached under.
    pub locator: Locator,
    pub properties: IndexMap<String, String>,
    pub texture: Texture,
}

/// An atlas whose every page has a texture.
///
/// While stored in a cache the page textures track the cache: reloading a
/// page rebinds the stored atlas to the new texture, and removing a page
/// evicts the atlas. A clone held outside the cache is a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureAtlas {
    pages: Vec<AtlasPage>,
}

impl TextureAtlas {
    pub fn pages(&self) -> &[AtlasPage] {
        &self.pages
    }

    pub fn page(&self, name: &str) -> Option<&AtlasPage> {
        self.pages.iter().find(|page| page.name == name)
    }

    pub fn textures(&self) -> impl Iterator<Item = Texture> + '_ {
        self.pages.iter().map(|page| page.texture)
    }

    /// Whether any page's texture is cached under `locator`.
    pub fn uses_page(&self, locator: &Locator) -> bool {
        self.pages.iter().any(|page| &page.locator == locator)
    }

    /// Copy of this atlas with every page cached under `locator` bound to
    /// `texture`.
    pub(crate) fn with_page_texture(&self, locator: &Locator, texture: Texture) -> Self {
        let pages = self
            .pages
            .iter()
            .map(|page| {
                let mut page = page.clone();
                if &page.locator == locator {
                    page.texture = texture;
                }
                page
            })
            .collect();
        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Progress of one atlas whose page loads are in flight.
struct AtlasLink {
    atlas: Locator,
    generation: u64,
    pages: Vec<PageDescriptor>,
    locators: Vec<Locator>,
    loaded: Vec<Option<bool>>,
    remaining: usize,
    callbacks: Option<LoadCallbacks>,
}

/// Start loading the atlas at `path` (caller path) stored under `locator`.
pub(crate) fn load(
    cache: &Rc<CacheInner>,
    path: &str,
    locator: Locator,
    aliases: PageAliases,
    callbacks: LoadCallbacks,
) {
    let generation = cache.issue(&locator, AssetKind::Atlas);
    let weak = Rc::downgrade(cache);
    let path = Locator::new(path);

    cache.spawn(async move {
        let descriptor = CacheInner::fetch(&weak, &locator)
            .await
            .and_then(|bytes| AtlasDescriptorLoader.load(LoadContext::new(&locator, &bytes)));

        let Some(inner) = weak.upgrade() else {
            return;
        };

        match descriptor {
            Ok(descriptor) if inner.generation() == generation => {
                link(&inner, &path, locator, generation, descriptor, &aliases, callbacks);
            }
            Ok(_) => {
                tracing::debug!("Discarding stale atlas descriptor for {}", locator);
            }
            Err(err) => inner.complete(&locator, generation, Err(err), callbacks, true),
        }
    });
}

fn page_locator(cache: &CacheInner, atlas_path: &Locator, name: &str, aliases: &PageAliases) -> Locator {
    match aliases.get(name) {
        Some(alias) => cache.locator(alias),
        None => cache.locator(atlas_path.sibling(name).as_str()),
    }
}

fn link(
    cache: &Rc<CacheInner>,
    atlas_path: &Locator,
    atlas: Locator,
    generation: u64,
    descriptor: AtlasDescriptor,
    aliases: &PageAliases,
    callbacks: LoadCallbacks,
) {
    let locators: Vec<Locator> = descriptor
        .pages
        .iter()
        .map(|page| page_locator(cache, atlas_path, &page.name, aliases))
        .collect();

    tracing::debug!("Atlas {} links {} pages", atlas, locators.len());

    let page_count = locators.len();
    let progress = Rc::new(RefCell::new(AtlasLink {
        atlas,
        generation,
        pages: descriptor.pages,
        locators: locators.clone(),
        loaded: vec![None; page_count],
        remaining: page_count,
        callbacks: Some(callbacks),
    }));

    for (index, page) in locators.into_iter().enumerate() {
        let on_loaded = Rc::clone(&progress);
        let on_failed = Rc::clone(&progress);
        let cache_ok = Rc::downgrade(cache);
        let cache_err = Rc::downgrade(cache);

        let page_callbacks = LoadCallbacks::new()
            .on_success(move |_, asset| {
                page_done(&cache_ok, &on_loaded, index, asset.as_texture().is_some())
            })
            .on_error(move |_, _| page_done(&cache_err, &on_failed, index, false));

        cache.load_texture(page, page_callbacks, false);
    }
}

fn page_done(
    cache: &Weak<CacheInner>,
    progress: &Rc<RefCell<AtlasLink>>,
    index: usize,
    loaded: bool,
) {
    let finished = {
        let mut link = progress.borrow_mut();
        link.loaded[index] = Some(loaded);
        link.remaining -= 1;
        link.remaining == 0
    };

    if finished {
        if let Some(inner) = cache.upgrade() {
            finish(&inner, progress);
        }
    }
}

fn finish(cache: &CacheInner, progress: &Rc<RefCell<AtlasLink>>) {
    let (atlas, generation, result, callbacks) = {
        let mut link = progress.borrow_mut();
        let callbacks = link.callbacks.take().unwrap_or_default();

        // textures are read back from the cache, which holds the current one
        // for each page; a page removed since it loaded counts as failed
        let textures: Vec<Option<Texture>> = link
            .loaded
            .iter()
            .zip(&link.locators)
            .map(|(loaded, locator)| match loaded {
                Some(true) => cache.stored_texture(locator),
                _ => None,
            })
            .collect();

        let result = match textures.iter().position(Option::is_none) {
            None => {
                let pages = link
                    .pages
                    .iter()
                    .zip(&link.locators)
                    .zip(textures.into_iter().flatten())
                    .map(|((page, locator), texture)| AtlasPage {
                        name: page.name.clone(),
                        locator: locator.clone(),
                        properties: page.properties.clone(),
                        texture,
                    })
                    .collect();
                Ok(LoadedAsset::Atlas(Arc::new(TextureAtlas { pages })))
            }
            Some(index) => Err(AssetError::AtlasPartialFailure {
                atlas: link.atlas.to_string(),
                page: link.locators[index].to_string(),
            }),
        };

        (link.atlas.clone(), link.generation, result, callbacks)
    };

    cache.complete(&atlas, generation, result, callbacks, true);
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATLAS_38: &str = "
hero.png
size: 1024,512
format: RGBA8888
filter: Linear,Linear
repeat: none
head
  rotate: false
  xy: 2, 2
  size: 120, 130

hero2.png
size: 256,256
format: RGBA8888
arm
  rotate: true
";

    const ATLAS_41: &str = "\u{feff}spineboy.png
\tsize: 1024, 256
\tfilter: Linear, Linear
\tpma: true
crosshair
\tbounds: 352, 7, 45, 45
eye
\tbounds: 864, 105, 47, 44
";

    #[test]
    fn test_parse_pages_and_properties() {
        let atlas = AtlasDescriptor::parse(ATLAS_38);
        assert_eq!(atlas.page_names().collect::<Vec<_>>(), ["hero.png", "hero2.png"]);
        let first = &atlas.pages[0];
        assert_eq!(first.properties.get("size").map(String::as_str), Some("1024,512"));
        assert_eq!(first.properties.len(), 4);
        assert!(!first.properties.contains_key("rotate"));
        assert_eq!(atlas.pages[1].properties.len(), 2);
    }

    #[test]
    fn test_parse_bom_and_indented_header() {
        let atlas = AtlasDescriptor::parse(ATLAS_41);
        assert_eq!(atlas.page_names().collect::<Vec<_>>(), ["spineboy.png"]);
        assert_eq!(
            atlas.pages[0].properties.get("pma").map(String::as_str),
            Some("true")
        );
        assert!(!atlas.pages[0].properties.contains_key("bounds"));
    }

    #[test]
    fn test_loader_rejects_empty_and_binary() {
        let locator = Locator::new("hero.atlas");
        let err = AtlasDescriptorLoader
            .load(LoadContext::new(&locator, b"\n\n  \n"))
            .unwrap_err();
        assert!(err.to_string().contains("no pages"));
        assert!(
            AtlasDescriptorLoader
                .load(LoadContext::new(&locator, &[0xC3, 0x28]))
                .is_err()
        );
    }

    #[test]
    fn test_page_locators() {
        use crate::resolver::{ResourceResolver, ResourceTable};
        use crate::settings::LoaderSettings;
        use crate::texture::HeadlessTextures;

        let cache = crate::AssetCache::with_settings(
            LoaderSettings::new().path_prefix("assets/").network_fallback(false),
            ResourceResolver::new(ResourceTable::new()),
            Arc::new(HeadlessTextures::new()),
        );
        let inner = cache.inner();
        let mut aliases = PageAliases::default();
        aliases.insert("hero2.png".to_string(), "shared/hero2.png".to_string());

        let atlas_path = Locator::new("chars/hero.atlas");
        assert_eq!(
            page_locator(inner, &atlas_path, "hero.png", &aliases).as_str(),
            "assets/chars/hero.png"
        );
        assert_eq!(
            page_locator(inner, &atlas_path, "hero2.png", &aliases).as_str(),
            "assets/shared/hero2.png"
        );
    }
}
