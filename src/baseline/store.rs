//! Filesystem storage for reference, latest and diff screenshots.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/reference/<key>.png   baseline images
//! <root>/reference/<key>.json  manifest of the context that produced the baseline
//! <root>/latest/<key>.png      most recent capture
//! <root>/diff/<key>.png        highlighted diff of the last failed comparison
//! ```
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed into place, so readers never observe a partial image. Writers to
//! the same file are serialized through a per-path lock.

use image::RgbaImage;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::key::BaselineKey;
use crate::context::ScreenshotContext;
use crate::diff::{decode_image, encode_png};
use crate::error::{VisregError, VisregResult};

/// The kinds of image kept per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The baseline captures are compared against
    Reference,
    /// The most recent capture
    Latest,
    /// Highlighted differences from the last failed comparison
    Diff,
}

impl ArtifactKind {
    /// Directory name under the store root
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Reference => "reference",
            ArtifactKind::Latest => "latest",
            ArtifactKind::Diff => "diff",
        }
    }
}

/// Sidecar written next to each reference image
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BaselineManifest<'a> {
    key: String,
    updated_at: String,
    context: &'a ScreenshotContext,
}

/// Baseline storage rooted at a directory
#[derive(Debug)]
pub struct BaselineStore {
    root: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl BaselineStore {
    /// Create a store rooted at the given directory; nothing is created yet
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an artifact image
    pub fn path_for(&self, kind: ArtifactKind, key: &BaselineKey) -> PathBuf {
        self.root.join(kind.dir_name()).join(key.relative_path())
    }

    /// Location of the manifest describing a reference image
    pub fn manifest_path(&self, key: &BaselineKey) -> PathBuf {
        self.root
            .join(ArtifactKind::Reference.dir_name())
            .join(key.relative_path_with_extension("json"))
    }

    /// Whether a baseline exists for the key
    pub fn exists(&self, key: &BaselineKey) -> bool {
        self.path_for(ArtifactKind::Reference, key).is_file()
    }

    /// Load the baseline for a key; `Ok(None)` when none has been saved yet
    pub fn load(&self, key: &BaselineKey) -> VisregResult<Option<RgbaImage>> {
        let path = self.path_for(ArtifactKind::Reference, key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VisregError::baseline_io(path, e)),
        };
        let image = decode_image(&bytes).map_err(|e| {
            VisregError::ImageDecode(format!("baseline {}: {}", path.display(), e))
        })?;
        Ok(Some(image))
    }

    /// Save the baseline for a key
    ///
    /// Returns `false` when the stored bytes were already identical and
    /// nothing was written.
    pub fn save(&self, key: &BaselineKey, image: &RgbaImage) -> VisregResult<bool> {
        self.save_artifact(ArtifactKind::Reference, key, image)
    }

    /// Save any artifact for a key, skipping the write if unchanged
    pub fn save_artifact(
        &self,
        kind: ArtifactKind,
        key: &BaselineKey,
        image: &RgbaImage,
    ) -> VisregResult<bool> {
        let bytes = encode_png(image)?;
        let path = self.path_for(kind, key);

        self.with_path_lock(&path, || {
            match fs::read(&path) {
                Ok(existing) if existing == bytes => {
                    debug!(path = %path.display(), "artifact unchanged; skipping write");
                    return Ok(false);
                }
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(VisregError::baseline_io(&path, e)),
            }

            write_atomic(&path, &bytes)?;
            debug!(path = %path.display(), kind = kind.dir_name(), "artifact written");
            Ok(true)
        })
    }

    /// Remove an artifact if present
    pub fn remove_artifact(&self, kind: ArtifactKind, key: &BaselineKey) -> VisregResult<()> {
        let path = self.path_for(kind, key);
        self.with_path_lock(&path, || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VisregError::baseline_io(&path, e)),
        })
    }

    /// Record the context that produced the current baseline
    pub fn write_manifest(&self, key: &BaselineKey, context: &ScreenshotContext) -> VisregResult<()> {
        let manifest = BaselineManifest {
            key: key.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339(),
            context,
        };
        let bytes = serde_json::to_string_pretty(&manifest)?;
        let path = self.manifest_path(key);
        self.with_path_lock(&path, || write_atomic(&path, bytes.as_bytes()))
    }

    /// Whether the manifest for a key has been written
    pub fn has_manifest(&self, key: &BaselineKey) -> bool {
        self.manifest_path(key).is_file()
    }

    /// List every stored reference image, sorted
    pub fn list_references(&self) -> VisregResult<Vec<PathBuf>> {
        let mut found = Vec::new();
        let dir = self.root.join(ArtifactKind::Reference.dir_name());
        if dir.exists() {
            collect_pngs(&dir, &mut found)?;
        }
        found.sort();
        Ok(found)
    }

    /// Run `f` while holding the lock for `path`
    ///
    /// The lock entry is dropped again once no other writer holds or waits
    /// on it, so the map only tracks paths currently being written.
    fn with_path_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> VisregResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| VisregError::baseline_io(path, std::io::Error::other("path has no parent")))?;
    fs::create_dir_all(dir).map_err(|e| VisregError::baseline_io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| VisregError::baseline_io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| VisregError::baseline_io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| VisregError::baseline_io(path, e.error))?;
    Ok(())
}

fn collect_pngs(dir: &Path, found: &mut Vec<PathBuf>) -> VisregResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| VisregError::baseline_io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| VisregError::baseline_io(dir, e))?.path();
        if path.is_dir() {
            collect_pngs(&path, found)?;
        } else if path.extension().is_some_and(|e| e == "png") {
            found.push(path);
        }
    }
    Ok(())
}
