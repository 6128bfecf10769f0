//! Byte sources for asset loading.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use skelview_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};

/// Future type for async byte loading.
pub type BytesFuture = Pin<Box<dyn Future<Output = AssetResult<Arc<[u8]>>> + Send + 'static>>;

/// Something that can produce the bytes behind a locator.
pub trait BytesReader: Send + Sync {
    /// Read all bytes for `locator`.
    fn read_bytes(&self, locator: &str) -> BytesFuture;
}

/// Blocking file reader wrapped in ready futures.
pub struct FileReader {
    base_path: PathBuf,
}

impl FileReader {
    /// Create a new file reader with a base path.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Read bytes synchronously.
    pub fn read_bytes_sync(&self, path: &Path) -> AssetResult<Vec<u8>> {
        let full_path = self.resolve_path(path);
        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound {
                    path: full_path.display().to_string(),
                    detail: None,
                }
            } else {
                AssetError::IoError {
                    path: full_path.clone(),
                    source: e,
                }
            }
        })
    }
}

impl BytesReader for FileReader {
    fn read_bytes(&self, locator: &str) -> BytesFuture {
        let result = self.read_bytes_sync(Path::new(locator)).map(Arc::from);
        Box::pin(async move { result })
    }
}

/// In-memory bytes reader for tests or embedded assets.
#[derive(Default)]
pub struct MemoryReader {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<str>, bytes: impl Into<Arc<[u8]>>) {
        self.files.insert(path.as_ref().to_string(), bytes.into());
    }

    pub fn remove(&mut self, path: impl AsRef<str>) -> Option<Arc<[u8]>> {
        self.files.remove(path.as_ref())
    }

    pub fn contains(&self, path: impl AsRef<str>) -> bool {
        self.files.contains_key(path.as_ref())
    }
}

impl BytesReader for MemoryReader {
    fn read_bytes(&self, locator: &str) -> BytesFuture {
        let result = self.files.get(locator).cloned().ok_or(AssetError::NotFound {
            path: locator.to_string(),
            detail: None,
        });
        Box::pin(async move { result })
    }
}

#[cfg(feature = "network")]
pub use network::{FetchPool, HttpReader};

#[cfg(feature = "network")]
mod network {
    use std::future::Future;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use async_executor::{Executor, Task};

    use super::{BytesFuture, BytesReader};
    use crate::error::{AssetError, AssetResult};

    /// Worker threads that run blocking fetches off the pumping thread.
    pub struct FetchPool {
        executor: Arc<Executor<'static>>,
        threads: Vec<thread::JoinHandle<()>>,
        shutdown: Arc<AtomicBool>,
    }

    impl FetchPool {
        /// Spawn `num_threads` workers (at least one).
        pub fn new(num_threads: usize) -> AssetResult<Self> {
            let num_threads = num_threads.max(1);
            let executor = Arc::new(Executor::new());
            let shutdown = Arc::new(AtomicBool::new(false));
            let mut threads = Vec::with_capacity(num_threads);

            for i in 0..num_threads {
                let exec = executor.clone();
                let shutdown_flag = shutdown.clone();

                let handle = thread::Builder::new()
                    .name(format!("skelview-fetch-{}", i))
                    .spawn(move || {
                        while !shutdown_flag.load(Ordering::Relaxed) {
                            if !exec.try_tick() {
                                thread::sleep(Duration::from_millis(1));
                            }
                        }
                    })?;

                threads.push(handle);
            }

            tracing::debug!("FetchPool created with {} threads", num_threads);

            Ok(Self {
                executor,
                threads,
                shutdown,
            })
        }

        /// Pool sized to the machine, leaving one core for the pumping thread.
        pub fn default_threads() -> AssetResult<Self> {
            Self::new(num_cpus::get().saturating_sub(1).max(1))
        }

        pub fn spawn<T>(&self, future: impl Future<Output = T> + Send + 'static) -> Task<T>
        where
            T: Send + 'static,
        {
            self.executor.spawn(future)
        }

        pub fn thread_count(&self) -> usize {
            self.threads.len()
        }
    }

    impl Drop for FetchPool {
        fn drop(&mut self) {
            self.shutdown.store(true, Ordering::Relaxed);
            for handle in std::mem::take(&mut self.threads) {
                if let Err(e) = handle.join() {
                    tracing::error!("Fetch pool thread panicked: {:?}", e);
                }
            }
        }
    }

    /// Plain HTTP GET reader; the last resolver tier.
    pub struct HttpReader {
        client: reqwest::blocking::Client,
        pool: FetchPool,
    }

    impl HttpReader {
        pub fn new(threads: usize) -> AssetResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .build()
                .map_err(|e| AssetError::Other {
                    message: format!("failed to build HTTP client: {}", e),
                })?;
            Ok(Self {
                client,
                pool: FetchPool::new(threads)?,
            })
        }
    }

    impl BytesReader for HttpReader {
        fn read_bytes(&self, locator: &str) -> BytesFuture {
            let client = self.client.clone();
            let url = locator.to_string();
            let task = self.pool.spawn(async move { fetch(&client, &url) });
            Box::pin(task)
        }
    }

    fn fetch(client: &reqwest::blocking::Client, url: &str) -> AssetResult<Arc<[u8]>> {
        tracing::debug!("GET {}", url);
        let response = client
            .get(url)
            .send()
            .map_err(|e| AssetError::resolution(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::resolution(url, format!("HTTP status {}", status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| AssetError::resolution(url, e.to_string()))?;
        Ok(Arc::from(bytes.as_ref()))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;

    #[test]
    fn test_memory_reader() {
        let mut reader = MemoryReader::new();
        reader.insert("hero.atlas", b"hero.png\n".to_vec());
        assert!(reader.contains("hero.atlas"));
        let bytes = block_on(reader.read_bytes("hero.atlas")).unwrap();
        assert_eq!(&bytes[..], b"hero.png\n");
        assert!(matches!(
            block_on(reader.read_bytes("missing")),
            Err(AssetError::NotFound { .. })
        ));
    }

    #[test]
    fn test_file_reader_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hero.skel"), [1u8, 2, 3]).unwrap();
        let reader = FileReader::new(dir.path());
        let bytes = block_on(reader.read_bytes("hero.skel")).unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);
        assert!(matches!(
            reader.read_bytes_sync(Path::new("nope.skel")),
            Err(AssetError::NotFound { .. })
        ));
    }
}
