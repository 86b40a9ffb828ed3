//! Process-local document store.

use crate::model::Document;
use crate::store::codec::{content_version, decode_document, encode_document};
use crate::store::{DocumentStore, Snapshot, VersionToken};
use crate::WhitelockError;
use std::sync::Mutex;

#[derive(Debug)]
struct Stored {
    content: String,
    version: VersionToken,
}

/// In-memory store with the same conditional-write semantics as the
/// remote backends. Content is kept in its persisted JSON form so every
/// fetch decodes a fresh copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<Stored>>,
}

impl MemoryStore {
    /// An empty store (no document committed yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with a document.
    pub fn with_document(document: &Document) -> Result<Self, WhitelockError> {
        Ok(Self::with_raw(encode_document(document)?))
    }

    /// A store seeded with raw content, which need not be valid JSON.
    pub fn with_raw(content: impl Into<String>) -> Self {
        let content = content.into();
        let version = content_version(content.as_bytes());
        Self {
            state: Mutex::new(Some(Stored { content, version })),
        }
    }

    /// Current version, if a document is stored.
    pub fn version(&self) -> Option<VersionToken> {
        self.lock().as_ref().map(|stored| stored.version.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Stored>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn fetch(&self) -> Result<Snapshot, WhitelockError> {
        let state = self.lock();
        match state.as_ref() {
            None => Ok(Snapshot {
                document: Document::new(),
                version: None,
            }),
            Some(stored) => Ok(Snapshot {
                document: decode_document(&stored.content)?,
                version: Some(stored.version.clone()),
            }),
        }
    }

    fn commit(
        &self,
        document: &Document,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, WhitelockError> {
        let content = encode_document(document)?;
        let mut state = self.lock();

        let current = state.as_ref().map(|stored| &stored.version);
        if current != expected {
            return Err(WhitelockError::VersionConflict);
        }

        let version = content_version(content.as_bytes());
        *state = Some(Stored {
            content,
            version: version.clone(),
        });
        Ok(version)
    }
}
