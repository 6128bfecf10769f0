//! Asset events for change detection.

use crate::asset::AssetKind;
use crate::locator::Locator;

/// Events emitted by the asset cache.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetEvent {
    /// A locator was stored for the first time.
    Loaded { locator: Locator, kind: AssetKind },

    /// A stored locator was replaced by a later load.
    Reloaded { locator: Locator, kind: AssetKind },

    /// A load finished with an error.
    Failed { locator: Locator, error: String },

    /// A stored asset was removed and released.
    Removed { locator: Locator },
}

impl AssetEvent {
    pub fn locator(&self) -> &Locator {
        match self {
            AssetEvent::Loaded { locator, .. }
            | AssetEvent::Reloaded { locator, .. }
            | AssetEvent::Failed { locator, .. }
            | AssetEvent::Removed { locator } => locator,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, AssetEvent::Loaded { .. } | AssetEvent::Reloaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AssetEvent::Failed { .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, AssetEvent::Removed { .. })
    }
}

/// A buffer of asset events that can be drained each frame.
#[derive(Debug, Default)]
pub struct AssetEventBuffer {
    events: Vec<AssetEvent>,
}

impl AssetEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: AssetEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = AssetEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
