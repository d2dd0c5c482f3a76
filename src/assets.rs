//! Content-addressed asset registry.
//!
//! Assets are registered by normalized source path during transform and
//! load, deduplicated (same path always returns the same `Asset`), and
//! copied once into the build output at the flush hook. Each asset gets
//! a content-fingerprinted public name; a secondary map from that name
//! back to the source path serves dev-server requests.

use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;

use crate::utils::normalize;
use crate::ImportsError;

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A registered asset, derived from its normalized source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Final path segment, extension included.
    pub basename: String,
    /// Extension with its leading dot, or empty.
    pub extension: String,
    /// Basename without the extension.
    pub stem: String,
    /// Media type guessed from the extension.
    pub filetype: String,
    /// Public output name: `{stem}.{fingerprint}{extension}`.
    pub hashname: String,
    /// Normalized absolute source path, used for the final copy.
    pub pathname: String,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Cloneable handle to the shared registry maps.
#[derive(Debug, Clone, Default)]
pub struct Assets {
    by_source: Arc<DashMap<String, Asset>>,
    by_hashname: Arc<DashMap<String, String>>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source path, or return the existing registration.
    ///
    /// The fingerprint hashes the file's current content (a missing file
    /// hashes as empty rather than failing; the flush will surface it).
    /// Two distinct paths never share a hashname: on a collision the
    /// name is extended with a path fingerprint, then a counter.
    pub fn add(&self, source_path: &str) -> Asset {
        let key = normalize(source_path);
        if let Some(existing) = self.by_source.get(&key) {
            return existing.clone();
        }
        let asset = self.create(&key);
        self.by_source
            .entry(key)
            .or_insert(asset)
            .value()
            .clone()
    }

    /// Look up a registration without creating one.
    pub fn get(&self, source_path: &str) -> Option<Asset> {
        self.by_source
            .get(&normalize(source_path))
            .map(|asset| asset.value().clone())
    }

    /// Reverse lookup by public hashname, for serving an asset during
    /// development. Returns the absolute source path to stream.
    pub fn get_from_server(&self, hashname: &str) -> Option<PathBuf> {
        let key = self.by_hashname.get(hashname)?;
        let asset = self.by_source.get(key.value())?;
        Some(PathBuf::from(&asset.pathname))
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Stable view of every registration, ordered by source path.
    pub fn snapshot(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self
            .by_source
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        assets.sort_by(|a, b| a.pathname.cmp(&b.pathname));
        assets
    }

    /// Copy every registered asset into `<dist_dir>/<assets_name>/`.
    /// The first failing copy aborts; already-copied files stay put.
    pub async fn flush(&self, dist_dir: &str, assets_name: &str) -> Result<usize, ImportsError> {
        let assets = self.snapshot();
        if assets.is_empty() {
            return Ok(0);
        }
        let dir = Path::new(dist_dir).join(assets_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ImportsError::OutputDir {
                path: dir.to_string_lossy().into_owned(),
                source,
            })?;
        let mut copied = 0usize;
        for asset in assets {
            let to = dir.join(&asset.hashname);
            tokio::fs::copy(&asset.pathname, &to)
                .await
                .map_err(|source| ImportsError::AssetCopy {
                    from: asset.pathname.clone(),
                    to: to.to_string_lossy().into_owned(),
                    source,
                })?;
            copied += 1;
        }
        tracing::debug!(count = copied, dir = %dir.display(), "flushed assets");
        Ok(copied)
    }

    fn create(&self, key: &str) -> Asset {
        let basename = key.rsplit('/').next().unwrap_or(key).to_string();
        let (stem, extension) = match basename.rfind('.') {
            Some(0) | None => (basename.clone(), String::new()),
            Some(at) => (basename[..at].to_string(), basename[at..].to_string()),
        };
        let filetype = media_type(&extension).to_string();
        let content = std::fs::read(key).unwrap_or_default();
        let print = fingerprint(&content);
        let hashname = self.claim_hashname(key, &stem, &extension, &print);
        Asset {
            basename,
            extension,
            stem,
            filetype,
            hashname,
            pathname: key.to_string(),
        }
    }

    fn claim_hashname(&self, key: &str, stem: &str, extension: &str, print: &str) -> String {
        let path_print = fingerprint(key.as_bytes());
        let mut round = 0u32;
        loop {
            let candidate = match round {
                0 => format!("{stem}.{print}{extension}"),
                1 => format!("{stem}.{print}{path_print}{extension}"),
                n => format!("{stem}.{print}{path_print}{}{extension}", n - 1),
            };
            match self.by_hashname.entry(candidate.clone()) {
                Entry::Occupied(occupied) if occupied.get() == key => return candidate,
                Entry::Occupied(_) => round += 1,
                Entry::Vacant(vacant) => {
                    vacant.insert(key.to_string());
                    return candidate;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fingerprints & Media Types
// ---------------------------------------------------------------------------

/// First 8 hex chars of an FxHasher digest.
fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    format!("{:016x}", hasher.finish())[..8].to_string()
}

fn media_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".avif" => "image/avif",
        ".svg" => "image/svg+xml",
        ".ico" => "image/x-icon",
        ".css" => "text/css",
        ".js" | ".mjs" | ".cjs" => "text/javascript",
        ".json" => "application/json",
        ".html" | ".htm" => "text/html",
        ".txt" => "text/plain",
        ".md" => "text/markdown",
        ".woff" => "font/woff",
        ".woff2" => "font/woff2",
        ".ttf" => "font/ttf",
        ".otf" => "font/otf",
        ".wasm" => "application/wasm",
        ".pdf" => "application/pdf",
        ".mp3" => "audio/mpeg",
        ".mp4" => "video/mp4",
        ".webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
