/// Settings for an [`crate::AssetCache`] and the resolver it owns.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Prepended verbatim to every caller path before it becomes a locator.
    pub path_prefix: String,

    /// Fall back to an HTTP GET when the table and registry both miss.
    /// Ignored without the `network` feature.
    pub network_fallback: bool,

    /// Worker threads for network fetches. `0` sizes the pool to the machine.
    pub fetch_threads: usize,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            path_prefix: String::new(),
            network_fallback: cfg!(feature = "network"),
            fetch_threads: 0,
        }
    }
}

impl LoaderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn network_fallback(mut self, enabled: bool) -> Self {
        self.network_fallback = enabled;
        self
    }

    pub fn fetch_threads(mut self, threads: usize) -> Self {
        self.fetch_threads = threads;
        self
    }
}
