//! Versioned document store adapters.
//!
//! A store holds exactly one whitelist document. Writes are conditional on
//! the version the writer last observed; a stale version is rejected with
//! [`WhitelockError::VersionConflict`] and nothing is written.

pub mod codec;
pub mod file;
pub mod github;
pub mod memory;

use crate::model::Document;
use crate::WhitelockError;
use std::fmt;

pub use file::FileStore;
pub use github::GitHubStore;
pub use memory::MemoryStore;

/// Opaque marker of a committed document state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a store-provided version string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The decoded document.
    pub document: Document,

    /// Version of the stored document, `None` if nothing is stored yet.
    pub version: Option<VersionToken>,
}

/// Backing store for the whitelist document.
pub trait DocumentStore: Send + Sync {
    /// Fetch the latest committed document and its version.
    ///
    /// # Errors
    /// - `StoreUnavailable` - transport or authentication failure
    /// - `DocumentMalformed` - stored content cannot be decoded
    fn fetch(&self) -> Result<Snapshot, WhitelockError>;

    /// Replace the stored document if its version still equals `expected`.
    ///
    /// `expected == None` means the document must not exist yet.
    ///
    /// # Errors
    /// - `VersionConflict` - the stored version moved on
    /// - `StoreUnavailable` - transport or authentication failure
    fn commit(
        &self,
        document: &Document,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, WhitelockError>;
}
