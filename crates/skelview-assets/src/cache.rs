//! The asset cache - the main coordinator for loading and lookup.

use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_executor::LocalExecutor;
use skelview_core::alloc::HashMap;
use skelview_core::profiling::profile_function;

use crate::asset::{Asset, AssetKind, LoadedAsset};
use crate::atlas::{self, PageAliases, TextureAtlas};
use crate::error::{AssetError, AssetResult};
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::loader::{AssetLoader, BytesLoader, ImageLoader, JsonLoader, LoadContext, TextLoader};
use crate::locator::Locator;
use crate::resolver::{ResourceResolver, ResourceTable};
use crate::settings::LoaderSettings;
use crate::state::{Ledger, LoadState};
use crate::texture::{HeadlessTextures, Texture, TextureFactory};

type SuccessFn = Box<dyn FnOnce(&Locator, &LoadedAsset)>;
type ErrorFn = Box<dyn FnOnce(&Locator, &AssetError)>;

/// Per-request completion hooks.
///
/// Exactly one of the two runs, exactly once, after the ledger already
/// reflects the outcome. Neither runs before the `load_*` call that
/// registered them has returned.
#[derive(Default)]
pub struct LoadCallbacks {
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl LoadCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce(&Locator, &LoadedAsset) + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&Locator, &AssetError) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    fn succeed(self, locator: &Locator, asset: &LoadedAsset) {
        if let Some(f) = self.on_success {
            f(locator, asset);
        }
    }

    fn fail(self, locator: &Locator, error: &AssetError) {
        if let Some(f) = self.on_error {
            f(locator, error);
        }
    }
}

struct CacheState {
    assets: HashMap<Locator, LoadedAsset>,
    ledger: Ledger,
    events: AssetEventBuffer,
    generation: u64,
}

impl CacheState {
    /// Keep stored atlases in step with a page entry that was just stored.
    ///
    /// Atlases with a page under `page` are rebound to the new texture, or
    /// evicted if the entry is no longer a texture.
    fn sync_atlases(&mut self, page: &Locator) {
        let Some(texture) = self.assets.get(page).and_then(LoadedAsset::as_texture) else {
            self.evict_atlases_using(page);
            return;
        };

        let mut relinked = Vec::new();
        for (locator, asset) in self.assets.iter_mut() {
            if let LoadedAsset::Atlas(atlas) = asset {
                if atlas.uses_page(page) {
                    *atlas = Arc::new(atlas.with_page_texture(page, texture));
                    relinked.push(locator.clone());
                }
            }
        }

        for locator in relinked {
            tracing::debug!("Relinked atlas {} to reloaded page {}", locator, page);
            self.events.push(AssetEvent::Reloaded {
                locator,
                kind: AssetKind::Atlas,
            });
        }
    }

    /// Evict every stored atlas with a page under `page`.
    fn evict_atlases_using(&mut self, page: &Locator) {
        let stale: Vec<Locator> = self
            .assets
            .iter()
            .filter_map(|(locator, asset)| match asset {
                LoadedAsset::Atlas(atlas) if atlas.uses_page(page) => Some(locator.clone()),
                _ => None,
            })
            .collect();

        for locator in stale {
            tracing::debug!("Evicting atlas {}, page {} is gone", locator, page);
            self.assets.remove(&locator);
            self.events.push(AssetEvent::Removed { locator });
        }
    }
}

pub(crate) struct CacheInner {
    settings: LoaderSettings,
    resolver: RefCell<ResourceResolver>,
    textures: Arc<dyn TextureFactory>,
    state: RefCell<CacheState>,
    executor: LocalExecutor<'static>,
}

/// Keyed store of loaded assets plus the bookkeeping for in-flight loads.
///
/// Loads are issued with one of the `load_*` methods and resolve when the
/// owner pumps the cache with [`AssetCache::update`], typically once per
/// frame. [`AssetCache::is_loading_complete`] is the per-frame readiness
/// check.
///
/// # Example
///
/// ```ignore
/// let cache = AssetCache::new(ResourceResolver::new(bundle.table.clone()));
/// cache.load_binary("hero.skel");
/// cache.load_texture_atlas("hero.atlas");
///
/// while !cache.is_loading_complete() {
///     cache.update();
/// }
///
/// let atlas = cache.require_atlas("hero.atlas")?;
/// ```
///
/// The cache is single-threaded and cheap to clone; clones share state.
#[derive(Clone)]
pub struct AssetCache {
    inner: Rc<CacheInner>,
}

/// Non-owning reference to an [`AssetCache`], for callbacks that need to
/// reach back into the cache.
#[derive(Clone)]
pub struct WeakAssetCache {
    inner: Weak<CacheInner>,
}

impl WeakAssetCache {
    pub fn upgrade(&self) -> Option<AssetCache> {
        self.inner.upgrade().map(|inner| AssetCache { inner })
    }
}

impl AssetCache {
    /// Cache over `resolver` with default settings and headless textures.
    pub fn new(resolver: ResourceResolver) -> Self {
        Self::with_settings(
            LoaderSettings::default(),
            resolver,
            Arc::new(HeadlessTextures::new()),
        )
    }

    /// Cache over `resolver` creating textures through `textures`.
    pub fn with_textures(resolver: ResourceResolver, textures: Arc<dyn TextureFactory>) -> Self {
        Self::with_settings(LoaderSettings::default(), resolver, textures)
    }

    pub fn with_settings(
        settings: LoaderSettings,
        resolver: ResourceResolver,
        textures: Arc<dyn TextureFactory>,
    ) -> Self {
        Self {
            inner: Rc::new(CacheInner {
                settings,
                resolver: RefCell::new(resolver),
                textures,
                state: RefCell::new(CacheState {
                    assets: HashMap::new(),
                    ledger: Ledger::new(),
                    events: AssetEventBuffer::new(),
                    generation: 0,
                }),
                executor: LocalExecutor::new(),
            }),
        }
    }

    /// Cache over `table`, building the resolver (and its network tier, if
    /// enabled) from `settings`.
    pub fn from_table(
        table: ResourceTable,
        settings: LoaderSettings,
        textures: Arc<dyn TextureFactory>,
    ) -> AssetResult<Self> {
        let resolver = ResourceResolver::with_settings(table, &settings)?;
        Ok(Self::with_settings(settings, resolver, textures))
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.inner.settings
    }

    pub fn textures(&self) -> &Arc<dyn TextureFactory> {
        &self.inner.textures
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Rc<CacheInner> {
        &self.inner
    }

    pub fn downgrade(&self) -> WeakAssetCache {
        WeakAssetCache {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// The locator a caller path maps to.
    pub fn locator(&self, path: &str) -> Locator {
        self.inner.locator(path)
    }

    /// Register bytes for `path` in the resolver's raw-data registry.
    pub fn set_raw_data(&self, path: &str, bytes: impl Into<Arc<[u8]>>) {
        let locator = self.locator(path);
        self.inner.resolver.borrow_mut().set_raw_data(locator, bytes);
    }

    // Loading

    pub fn load_binary(&self, path: &str) -> Locator {
        self.load_binary_with(path, LoadCallbacks::new())
    }

    pub fn load_binary_with(&self, path: &str, callbacks: LoadCallbacks) -> Locator {
        self.inner.load_bytes_as(self.locator(path), BytesLoader, callbacks)
    }

    pub fn load_text(&self, path: &str) -> Locator {
        self.load_text_with(path, LoadCallbacks::new())
    }

    pub fn load_text_with(&self, path: &str, callbacks: LoadCallbacks) -> Locator {
        self.inner.load_bytes_as(self.locator(path), TextLoader, callbacks)
    }

    pub fn load_json(&self, path: &str) -> Locator {
        self.load_json_with(path, LoadCallbacks::new())
    }

    pub fn load_json_with(&self, path: &str, callbacks: LoadCallbacks) -> Locator {
        self.inner.load_bytes_as(self.locator(path), JsonLoader, callbacks)
    }

    pub fn load_texture(&self, path: &str) -> Locator {
        self.load_texture_with(path, LoadCallbacks::new())
    }

    pub fn load_texture_with(&self, path: &str, callbacks: LoadCallbacks) -> Locator {
        let locator = self.locator(path);
        self.inner.load_texture(locator.clone(), callbacks, true);
        locator
    }

    /// Load an atlas descriptor and every page texture it names.
    ///
    /// Page textures are looked up next to the atlas.
    pub fn load_texture_atlas(&self, path: &str) -> Locator {
        self.load_texture_atlas_with(path, PageAliases::default(), LoadCallbacks::new())
    }

    /// Like [`AssetCache::load_texture_atlas`], with `aliases` mapping page
    /// names to the paths their textures should be loaded from.
    pub fn load_texture_atlas_with(
        &self,
        path: &str,
        aliases: PageAliases,
        callbacks: LoadCallbacks,
    ) -> Locator {
        let locator = self.locator(path);
        atlas::load(&self.inner, path, locator.clone(), aliases, callbacks);
        locator
    }

    /// Run every load that can make progress right now.
    ///
    /// Call once per frame. Completion callbacks run from inside this call.
    pub fn update(&self) {
        profile_function!();
        while self.inner.executor.try_tick() {}
    }

    /// Pump the cache until every issued load has completed.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn block_until_complete(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            self.update();
            if self.is_loading_complete() {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    // Lookup

    pub fn get(&self, path: &str) -> Option<LoadedAsset> {
        let locator = self.locator(path);
        self.inner.state.borrow().assets.get(&locator).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        let locator = self.locator(path);
        self.inner.state.borrow().assets.contains_key(&locator)
    }

    /// The stored asset, or [`AssetError::NotFound`] carrying the error
    /// recorded for the locator, if there is one.
    pub fn require(&self, path: &str) -> AssetResult<LoadedAsset> {
        let locator = self.locator(path);
        let state = self.inner.state.borrow();
        match state.assets.get(&locator) {
            Some(asset) => Ok(asset.clone()),
            None => Err(AssetError::NotFound {
                path: locator.to_string(),
                detail: state.ledger.error(locator.as_str()).map(|e| e.to_string()),
            }),
        }
    }

    /// The stored asset as `T`, failing with [`AssetError::TypeMismatch`] if
    /// it is another kind.
    pub fn require_as<T: Asset>(&self, path: &str) -> AssetResult<T> {
        let asset = self.require(path)?;
        T::from_loaded(&asset).ok_or_else(|| AssetError::TypeMismatch {
            path: self.locator(path).to_string(),
            expected: T::KIND,
            actual: asset.kind(),
        })
    }

    pub fn require_bytes(&self, path: &str) -> AssetResult<Arc<[u8]>> {
        self.require_as(path)
    }

    pub fn require_text(&self, path: &str) -> AssetResult<Arc<str>> {
        self.require_as(path)
    }

    pub fn require_json(&self, path: &str) -> AssetResult<Arc<serde_json::Value>> {
        self.require_as(path)
    }

    pub fn require_texture(&self, path: &str) -> AssetResult<Texture> {
        self.require_as(path)
    }

    pub fn require_atlas(&self, path: &str) -> AssetResult<Arc<TextureAtlas>> {
        self.require_as(path)
    }

    pub fn load_state(&self, path: &str) -> LoadState {
        let locator = self.locator(path);
        let state = self.inner.state.borrow();
        if state.ledger.is_loading(locator.as_str()) {
            LoadState::Loading
        } else if state.assets.contains_key(&locator) {
            LoadState::Loaded
        } else if state.ledger.error(locator.as_str()).is_some() {
            LoadState::Failed
        } else {
            LoadState::NotLoaded
        }
    }

    /// Whether every issued load has completed, successfully or not.
    pub fn is_loading_complete(&self) -> bool {
        self.inner.state.borrow().ledger.is_complete()
    }

    /// Loads issued and not yet completed.
    pub fn outstanding(&self) -> usize {
        self.inner.state.borrow().ledger.outstanding()
    }

    /// Loads completed, successfully or not.
    pub fn completed(&self) -> usize {
        self.inner.state.borrow().ledger.completed()
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_errors(&self) -> bool {
        self.inner.state.borrow().ledger.has_errors()
    }

    /// Recorded errors, in the order they were first recorded.
    pub fn errors(&self) -> Vec<(Locator, Arc<AssetError>)> {
        self.inner
            .state
            .borrow()
            .ledger
            .errors()
            .map(|(locator, err)| (locator.clone(), Arc::clone(err)))
            .collect()
    }

    pub fn error(&self, path: &str) -> Option<Arc<AssetError>> {
        let locator = self.locator(path);
        self.inner
            .state
            .borrow()
            .ledger
            .error(locator.as_str())
            .cloned()
    }

    /// Take the events recorded since the last drain.
    ///
    /// Every completion and eviction records an event and the buffer is only
    /// emptied here or by [`AssetCache::dispose`], so a cache that is pumped
    /// for a long time should be drained once per frame.
    pub fn drain_events(&self) -> Vec<AssetEvent> {
        self.inner.state.borrow_mut().events.drain().collect()
    }

    // Eviction

    /// Release and evict one asset. Returns whether anything was stored.
    ///
    /// Removing a page texture also evicts every stored atlas that uses it.
    pub fn remove(&self, path: &str) -> bool {
        let locator = self.locator(path);
        let removed = {
            let mut state = self.inner.state.borrow_mut();
            let removed = state.assets.remove(&locator);
            if removed.is_some() {
                state.events.push(AssetEvent::Removed {
                    locator: locator.clone(),
                });
                state.evict_atlases_using(&locator);
            }
            removed
        };

        match removed {
            Some(asset) => {
                tracing::debug!("Removed {}", locator);
                asset.release(self.inner.textures.as_ref());
                true
            }
            None => false,
        }
    }

    /// Release and evict every stored asset.
    ///
    /// Load counters and recorded errors are left alone, and loads still in
    /// flight will store their results when they complete.
    pub fn remove_all(&self) {
        let drained = {
            let mut state = self.inner.state.borrow_mut();
            let drained: Vec<_> = state.assets.drain().collect();
            for (locator, _) in &drained {
                state.events.push(AssetEvent::Removed {
                    locator: locator.clone(),
                });
            }
            drained
        };

        tracing::debug!("Removing all {} assets", drained.len());
        for (_, asset) in drained {
            asset.release(self.inner.textures.as_ref());
        }
    }

    /// Start a fresh session.
    ///
    /// Everything stored is released, the ledger and event buffer are reset,
    /// and loads still in flight are orphaned: when they complete their
    /// results are released and their callbacks never run.
    pub fn dispose(&self) {
        let drained = {
            let mut state = self.inner.state.borrow_mut();
            state.generation += 1;
            state.ledger.reset();
            state.events.clear();
            state.assets.drain().collect::<Vec<_>>()
        };

        tracing::debug!("Disposing cache, releasing {} assets", drained.len());
        for (_, asset) in drained {
            asset.release(self.inner.textures.as_ref());
        }
    }
}

impl CacheInner {
    pub(crate) fn locator(&self, path: &str) -> Locator {
        Locator::with_prefix(&self.settings.path_prefix, path)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Texture currently stored under `locator`.
    pub(crate) fn stored_texture(&self, locator: &Locator) -> Option<Texture> {
        self.state
            .borrow()
            .assets
            .get(locator)
            .and_then(LoadedAsset::as_texture)
    }

    /// Count a new load against the ledger and return the session generation.
    pub(crate) fn issue(&self, locator: &Locator, kind: AssetKind) -> u64 {
        tracing::debug!("Loading {} {}", kind, locator);
        let mut state = self.state.borrow_mut();
        state.ledger.issue(locator);
        state.generation
    }

    /// Run `task` on the cache's executor.
    pub(crate) fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        self.executor.spawn(task).detach();
    }

    /// Bytes for `locator`, fetched through the resolver.
    ///
    /// The cache is only borrowed while the fetch is started, so a pending
    /// fetch never keeps the cache alive.
    pub(crate) async fn fetch(cache: &Weak<CacheInner>, locator: &Locator) -> AssetResult<Arc<[u8]>> {
        let future = match cache.upgrade() {
            Some(inner) => {
                let future = inner.resolver.borrow().fetch(locator);
                future
            }
            None => {
                return Err(AssetError::Other {
                    message: format!("cache dropped before {} was fetched", locator),
                });
            }
        };
        future.await
    }

    fn load_bytes_as<L>(self: &Rc<Self>, locator: Locator, loader: L, callbacks: LoadCallbacks) -> Locator
    where
        L: AssetLoader + 'static,
        L::Asset: Asset,
    {
        let generation = self.issue(&locator, <L::Asset as Asset>::KIND);
        let weak = Rc::downgrade(self);
        let key = locator.clone();

        self.spawn(async move {
            let result = CacheInner::fetch(&weak, &key).await.and_then(|bytes| {
                loader
                    .load(LoadContext::new(&key, &bytes))
                    .map(Asset::into_loaded)
            });
            if let Some(inner) = weak.upgrade() {
                inner.complete(&key, generation, result, callbacks, true);
            }
        });

        locator
    }

    /// Issue a texture load for `locator`.
    ///
    /// With `record_error` unset a failure still completes the load and runs
    /// the error callback, but leaves no entry in the error map; the atlas
    /// linker reports page failures against the atlas instead.
    pub(crate) fn load_texture(self: &Rc<Self>, locator: Locator, callbacks: LoadCallbacks, record_error: bool) {
        let generation = self.issue(&locator, AssetKind::Texture);
        let weak = Rc::downgrade(self);
        let textures = Arc::clone(&self.textures);

        self.spawn(async move {
            let result = match CacheInner::fetch(&weak, &locator).await {
                Ok(bytes) => {
                    futures_lite::future::yield_now().await;
                    ImageLoader
                        .load(LoadContext::new(&locator, &bytes))
                        .and_then(|image| {
                            let id = textures.create_texture(&locator, &image)?;
                            Ok(LoadedAsset::Texture(Texture {
                                id,
                                width: image.width,
                                height: image.height,
                            }))
                        })
                }
                Err(err) => Err(err),
            };

            match weak.upgrade() {
                Some(inner) => inner.complete(&locator, generation, result, callbacks, record_error),
                None => {
                    if let Ok(asset) = result {
                        asset.release(textures.as_ref());
                    }
                }
            }
        });
    }

    /// Settle a load: update the ledger, then run exactly one callback.
    ///
    /// A completion from an earlier session is discarded and whatever it
    /// produced is released.
    pub(crate) fn complete(
        &self,
        locator: &Locator,
        generation: u64,
        result: AssetResult<LoadedAsset>,
        callbacks: LoadCallbacks,
        record_error: bool,
    ) {
        let outcome = {
            let mut state = self.state.borrow_mut();
            if state.generation != generation {
                drop(state);
                tracing::debug!("Discarding stale completion for {}", locator);
                if let Ok(asset) = result {
                    asset.release(self.textures.as_ref());
                }
                return;
            }

            state.ledger.finish(locator);
            match result {
                Ok(asset) => {
                    tracing::debug!("Loaded {} {}", asset.kind(), locator);
                    state.ledger.clear_error(locator);
                    let previous = state.assets.insert(locator.clone(), asset.clone());
                    let event = if previous.is_some() {
                        AssetEvent::Reloaded {
                            locator: locator.clone(),
                            kind: asset.kind(),
                        }
                    } else {
                        AssetEvent::Loaded {
                            locator: locator.clone(),
                            kind: asset.kind(),
                        }
                    };
                    state.events.push(event);
                    if previous.is_some() {
                        state.sync_atlases(locator);
                    }
                    Ok((asset, previous))
                }
                Err(err) => {
                    tracing::warn!("Failed to load {}: {}", locator, err);
                    let err = Arc::new(err);
                    if record_error {
                        state.ledger.record_error(locator, Arc::clone(&err));
                    }
                    state.events.push(AssetEvent::Failed {
                        locator: locator.clone(),
                        error: err.to_string(),
                    });
                    Err(err)
                }
            }
        };

        match outcome {
            Ok((asset, previous)) => {
                if let Some(previous) = previous {
                    previous.release(self.textures.as_ref());
                }
                callbacks.succeed(locator, &asset);
            }
            Err(err) => callbacks.fail(locator, &err),
        }
    }
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (_, asset) in state.assets.drain() {
            asset.release(self.textures.as_ref());
        }
    }
}
