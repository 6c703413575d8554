//! Where asset bytes come from

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::asset::AssetFailureKind;
use crate::error::AssetLoadError;

/// Fetches the encoded bytes behind an asset URL
///
/// Implementations block; the loader calls them from rayon workers.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError>;
}

/// Local files, addressed by plain path or `file://` URL
///
/// Relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    root: Option<PathBuf>,
}

impl FileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        let path = self.resolve(url);
        std::fs::read(&path)
            .map_err(|e| AssetLoadError::new(url, AssetFailureKind::Fetch, format!("{}: {}", path.display(), e)))
    }
}

/// In-memory assets keyed by URL
///
/// Used for embedded content and tests. Clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    assets: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        if let Ok(mut assets) = self.assets.write() {
            assets.insert(url.into(), bytes.into());
        }
    }

    pub fn len(&self) -> usize {
        self.assets.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        let assets = self
            .assets
            .read()
            .map_err(|_| AssetLoadError::new(url, AssetFailureKind::Fetch, "memory source poisoned"))?;
        assets
            .get(url)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| AssetLoadError::new(url, AssetFailureKind::Fetch, "not found"))
    }
}

/// Blocking HTTP(S) fetches
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new(timeout: std::time::Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl AssetSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        let response = self.client.get(url).send().map_err(|e| {
            let kind = if e.is_timeout() {
                AssetFailureKind::Timeout
            } else {
                AssetFailureKind::Fetch
            };
            AssetLoadError::new(url, kind, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetLoadError::new(url, AssetFailureKind::Fetch, format!("HTTP {}", status)));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| AssetLoadError::new(url, AssetFailureKind::Fetch, e.to_string()))
    }
}

/// Routes `http://`/`https://` URLs to HTTP and everything else to files
pub struct RoutedSource {
    file: FileSource,
    #[cfg(feature = "http")]
    http: Option<HttpSource>,
}

impl RoutedSource {
    pub fn new(file: FileSource) -> Self {
        Self {
            file,
            #[cfg(feature = "http")]
            http: None,
        }
    }

    #[cfg(feature = "http")]
    pub fn with_http(mut self, http: HttpSource) -> Self {
        self.http = Some(http);
        self
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl AssetSource for RoutedSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        if !is_remote(url) {
            return self.file.fetch(url);
        }

        #[cfg(feature = "http")]
        if let Some(http) = &self.http {
            return http.fetch(url);
        }

        Err(AssetLoadError::new(
            url,
            AssetFailureKind::Unsupported,
            "remote assets need the `http` feature",
        ))
    }
}
