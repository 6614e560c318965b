//! Object storage: the delivery surface for results and the source of
//! template media.
//!
//! The store is addressed by string keys with a flat prefix convention
//! ([`CdnPaths`]). Workers treat it as remote even when it is a local
//! directory tree: every access goes through [`ObjectStore`], and local
//! scratch files are managed separately by [`TemplateCache`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::StorageError;

/// Put/get interface over the result and template store.
pub trait ObjectStore: Send + Sync {
    /// Uploads a local file under `key`, overwriting any previous
    /// object. Returns the public key of the stored object.
    fn upload(&self, local: &Path, key: &str) -> Result<String, StorageError>;

    /// Downloads the object at `key` into `local`.
    fn download(&self, key: &str, local: &Path) -> Result<(), StorageError>;

    /// Whether an object exists at `key`.
    fn exists(&self, key: &str) -> bool;
}

/// Filesystem-backed store rooted at a directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for FsObjectStore {
    fn upload(&self, local: &Path, key: &str) -> Result<String, StorageError> {
        let target = self.object_path(key);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::copy(local, &target).map_err(|e| StorageError::Upload {
            key: key.to_string(),
            source: e,
        })?;
        info!("Uploaded {} as {}", local.display(), key);
        Ok(key.to_string())
    }

    fn download(&self, key: &str, local: &Path) -> Result<(), StorageError> {
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::copy(self.object_path(key), local).map_err(|e| StorageError::Download {
            key: key.to_string(),
            source: e,
        })?;
        debug!("Downloaded {} to {}", key, local.display());
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.object_path(key).is_file()
    }
}

/// Key and URL conventions of the delivery CDN.
#[derive(Debug, Clone)]
pub struct CdnPaths {
    /// Base URL prepended to keys for user-facing links.
    pub public_base: String,
    /// Prefix for finished results.
    pub results_prefix: String,
    /// Prefix for template source media.
    pub sources_prefix: String,
    /// Prefix for extracted face crops.
    pub faces_prefix: String,
}

impl CdnPaths {
    /// Result objects are keyed by job id so reruns overwrite cleanly.
    pub fn result_key(&self, job_id: &str, extension: &str) -> String {
        format!("{}/{}{}", self.results_prefix, job_id, extension)
    }

    pub fn source_key(&self, template_id: &str, extension: &str) -> String {
        format!("{}/{}{}", self.sources_prefix, template_id, extension)
    }

    /// Face crops live under the template, named by discovery index.
    pub fn face_key(&self, template_id: &str, face_index: usize) -> String {
        format!("{}/{}/{}.png", self.faces_prefix, template_id, face_index)
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), key)
    }
}

/// Local cache of template media keyed by template id.
///
/// The cache path is deterministic: `<dir>/<template_id><extension>`.
/// A present file is trusted without validation; templates are
/// immutable once published.
pub struct TemplateCache {
    dir: PathBuf,
}

impl TemplateCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn local_path(&self, template_id: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}{}", template_id, extension))
    }

    /// Returns the local path of the template, downloading it on a
    /// cache miss.
    pub fn ensure_local(
        &self,
        store: &dyn ObjectStore,
        key: &str,
        template_id: &str,
        extension: &str,
    ) -> Result<PathBuf, StorageError> {
        let local = self.local_path(template_id, extension);
        if local.is_file() {
            debug!("Template {} served from cache", template_id);
            return Ok(local);
        }
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::CreateDirectory {
            path: self.dir.clone(),
            source: e,
        })?;
        store.download(key, &local)?;
        info!("Template {} cached at {}", template_id, local.display());
        Ok(local)
    }
}
