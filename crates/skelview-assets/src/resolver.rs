//! Locator to bytes resolution.
//!
//! Three tiers are consulted in order:
//!
//! 1. the [`ResourceTable`] of files the user supplied for this session,
//! 2. the raw-data registry populated through
//!    [`ResourceResolver::set_raw_data`],
//! 3. an optional network reader.
//!
//! The first tier that has the locator wins.

use std::sync::Arc;

use indexmap::IndexMap;
use skelview_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};
use crate::io::{BytesFuture, BytesReader};
use crate::locator::Locator;
use crate::settings::LoaderSettings;

/// Named byte buffers supplied up front, typically the files of a bundle.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    entries: IndexMap<String, Arc<[u8]>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    /// Bytes for `locator`.
    ///
    /// An exact name match wins. Otherwise the first entry (in insertion
    /// order) whose file name equals the locator's file name is used, so a
    /// bundle keyed by bare file names still serves prefixed locators.
    pub fn get(&self, locator: &Locator) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.entries.get(locator.as_str()) {
            return Some(Arc::clone(bytes));
        }

        let file_name = locator.file_name();
        self.entries
            .iter()
            .find(|(name, _)| Locator::new(name.as_str()).file_name() == file_name)
            .map(|(_, bytes)| Arc::clone(bytes))
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.get(locator).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which tier produced a locator's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    Table,
    Registry,
    Network,
}

/// Maps locators to bytes for one loading session.
pub struct ResourceResolver {
    table: ResourceTable,
    registry: HashMap<Locator, Arc<[u8]>>,
    network: Option<Arc<dyn BytesReader>>,
}

impl ResourceResolver {
    /// Resolver over `table` with no network tier.
    pub fn new(table: ResourceTable) -> Self {
        Self {
            table,
            registry: HashMap::new(),
            network: None,
        }
    }

    /// Resolver configured from `settings`.
    ///
    /// With the `network` feature enabled and `network_fallback` set, an
    /// [`crate::io::HttpReader`] is installed as the last tier.
    pub fn with_settings(table: ResourceTable, settings: &LoaderSettings) -> AssetResult<Self> {
        let resolver = Self::new(table);

        #[cfg(feature = "network")]
        {
            if settings.network_fallback {
                let threads = match settings.fetch_threads {
                    0 => num_cpus::get().saturating_sub(1).max(1),
                    n => n,
                };
                let reader = crate::io::HttpReader::new(threads)?;
                return Ok(resolver.with_network(Arc::new(reader)));
            }
        }

        #[cfg(not(feature = "network"))]
        {
            if settings.network_fallback {
                tracing::debug!("network fallback requested but the network feature is disabled");
            }
        }

        Ok(resolver)
    }

    /// Install `reader` as the network tier.
    pub fn with_network(mut self, reader: Arc<dyn BytesReader>) -> Self {
        self.network = Some(reader);
        self
    }

    pub fn table(&self) -> &ResourceTable {
        &self.table
    }

    pub fn has_network(&self) -> bool {
        self.network.is_some()
    }

    /// Register bytes for a locator, replacing any earlier registration.
    pub fn set_raw_data(&mut self, locator: Locator, bytes: impl Into<Arc<[u8]>>) {
        self.registry.insert(locator, bytes.into());
    }

    pub fn remove_raw_data(&mut self, locator: &Locator) -> Option<Arc<[u8]>> {
        self.registry.remove(locator)
    }

    /// Bytes from the synchronous tiers, without touching the network.
    pub fn resolve(&self, locator: &Locator) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.table.get(locator) {
            tracing::trace!("{} resolved from resource table", locator);
            return Some(bytes);
        }
        if let Some(bytes) = self.registry.get(locator) {
            tracing::trace!("{} resolved from raw-data registry", locator);
            return Some(Arc::clone(bytes));
        }
        None
    }

    /// The tier that would serve `locator`, if any.
    pub fn resolved_from(&self, locator: &Locator) -> Option<ResolvedFrom> {
        if self.table.contains(locator) {
            Some(ResolvedFrom::Table)
        } else if self.registry.contains_key(locator) {
            Some(ResolvedFrom::Registry)
        } else if self.network.is_some() {
            Some(ResolvedFrom::Network)
        } else {
            None
        }
    }

    /// Bytes for `locator` from the first tier that has them.
    ///
    /// Synchronous tiers produce an already-completed future; the network
    /// tier completes whenever the fetch finishes.
    pub fn fetch(&self, locator: &Locator) -> BytesFuture {
        if let Some(bytes) = self.resolve(locator) {
            return Box::pin(async move { Ok(bytes) });
        }

        match &self.network {
            Some(reader) => {
                tracing::trace!("{} falling back to network", locator);
                reader.read_bytes(locator.as_str())
            }
            None => {
                let err = AssetError::resolution(
                    locator.as_str(),
                    "not in resource table or raw-data registry",
                );
                Box::pin(async move { Err(err) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use futures_lite::future::block_on;

    fn table() -> ResourceTable {
        let mut table = ResourceTable::new();
        table.insert("hero.atlas", b"atlas".to_vec());
        table.insert("hero.png", b"png".to_vec());
        table
    }

    #[test]
    fn test_table_exact_then_file_name() {
        let table = table();
        assert_eq!(&table.get(&Locator::new("hero.png")).unwrap()[..], b"png");
        assert_eq!(
            &table.get(&Locator::new("assets/hero.png")).unwrap()[..],
            b"png"
        );
        assert!(table.get(&Locator::new("Hero.png")).is_none());
    }

    #[test]
    fn test_table_beats_registry() {
        let mut resolver = ResourceResolver::new(table());
        resolver.set_raw_data(Locator::new("hero.png"), b"registry".to_vec());
        resolver.set_raw_data(Locator::new("extra.json"), b"{}".to_vec());

        let hero = Locator::new("hero.png");
        assert_eq!(&resolver.resolve(&hero).unwrap()[..], b"png");
        assert_eq!(resolver.resolved_from(&hero), Some(ResolvedFrom::Table));

        let extra = Locator::new("extra.json");
        assert_eq!(&block_on(resolver.fetch(&extra)).unwrap()[..], b"{}");
        assert_eq!(resolver.resolved_from(&extra), Some(ResolvedFrom::Registry));

        assert!(resolver.remove_raw_data(&extra).is_some());
        assert!(resolver.resolve(&extra).is_none());
    }

    #[test]
    fn test_registry_is_exact_match() {
        let mut resolver = ResourceResolver::new(ResourceTable::new());
        resolver.set_raw_data(Locator::new("a/b.json"), b"{}".to_vec());
        assert!(resolver.resolve(&Locator::new("b.json")).is_none());
    }

    #[test]
    fn test_miss_without_network_is_resolution_error() {
        let resolver = ResourceResolver::new(ResourceTable::new());
        let missing = Locator::new("missing.png");
        assert_eq!(resolver.resolved_from(&missing), None);
        let err = block_on(resolver.fetch(&missing)).unwrap_err();
        assert!(matches!(err, AssetError::Resolution { ref path, .. } if path == "missing.png"));
    }

    #[test]
    fn test_network_tier_is_last() {
        let mut remote = MemoryReader::new();
        remote.insert("hero.png", b"remote".to_vec());
        remote.insert("remote.png", b"remote".to_vec());
        let resolver = ResourceResolver::new(table()).with_network(Arc::new(remote));

        assert_eq!(
            &block_on(resolver.fetch(&Locator::new("hero.png"))).unwrap()[..],
            b"png"
        );
        let remote_only = Locator::new("remote.png");
        assert_eq!(resolver.resolved_from(&remote_only), Some(ResolvedFrom::Network));
        assert_eq!(&block_on(resolver.fetch(&remote_only)).unwrap()[..], b"remote");
    }

    #[test]
    fn test_settings_without_network() {
        let settings = LoaderSettings::new().network_fallback(false);
        let resolver = ResourceResolver::with_settings(table(), &settings).unwrap();
        assert!(!resolver.has_network());
    }
}
