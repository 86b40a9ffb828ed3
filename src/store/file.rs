//! Local file backend with atomic writes.
//!
//! The version is the SHA-256 of the file bytes. Commits check the version
//! and replace the file (temp file + rename) under a lock shared by every
//! `FileStore` on the same path in this process. Writers in other processes
//! are not coordinated.

use crate::model::Document;
use crate::store::codec::{content_version, decode_document, encode_document};
use crate::store::{DocumentStore, Snapshot, VersionToken};
use crate::WhitelockError;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Commit locks by canonical document path.
static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(path.to_path_buf()).or_default().clone()
}

/// File-based document store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Store the document at `path`, creating the parent directory.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, WhitelockError> {
        let path = path.into();
        let file_name = path.file_name().ok_or_else(|| {
            WhitelockError::ConfigError(format!("Store path has no file name: {}", path.display()))
        })?;
        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent,
            None => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| {
            WhitelockError::StoreUnavailable(format!("Failed to create store dir: {}", e))
        })?;
        let parent = fs::canonicalize(parent).map_err(|e| {
            WhitelockError::StoreUnavailable(format!("Failed to resolve store dir: {}", e))
        })?;

        let path = parent.join(file_name);
        Ok(Self {
            write_lock: lock_for(&path),
            path,
        })
    }

    /// Path of the document file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_current(&self) -> Result<Option<(String, VersionToken)>, WhitelockError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let version = content_version(&bytes);
                let content = String::from_utf8(bytes).map_err(|e| {
                    WhitelockError::DocumentMalformed(format!("Invalid UTF-8: {}", e))
                })?;
                Ok(Some((content, version)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WhitelockError::StoreUnavailable(format!(
                "Failed to read store file: {}",
                e
            ))),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentStore for FileStore {
    fn fetch(&self) -> Result<Snapshot, WhitelockError> {
        match self.read_current()? {
            None => Ok(Snapshot {
                document: Document::new(),
                version: None,
            }),
            Some((content, version)) => Ok(Snapshot {
                document: decode_document(&content)?,
                version: Some(version),
            }),
        }
    }

    fn commit(
        &self,
        document: &Document,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, WhitelockError> {
        let content = encode_document(document)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        // A file that exists but is not UTF-8 still has a version to compare.
        let current = match fs::read(&self.path) {
            Ok(bytes) => Some(content_version(&bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(WhitelockError::StoreUnavailable(format!(
                    "Failed to read store file: {}",
                    e
                )))
            }
        };
        if current.as_ref() != expected {
            return Err(WhitelockError::VersionConflict);
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, &content).map_err(|e| {
            WhitelockError::StoreUnavailable(format!("Failed to write temp file: {}", e))
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| {
            WhitelockError::StoreUnavailable(format!("Failed to rename store file: {}", e))
        })?;

        Ok(content_version(content.as_bytes()))
    }
}
