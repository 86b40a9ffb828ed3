//! # Whitelock
//!
//! **License key whitelist with HWID binding, stored as one JSON document
//! in a GitHub repository.**
//!
//! Product owners issue redemption keys. A user claims a key, and the first
//! hardware identifier (HWID) presented with it is bound for good. Later
//! requests must present the same HWID; only the claimant can reset it.
//!
//! ## Features
//!
//! - **Key lifecycle** - issue, claim, bind, reset, revoke as pure transitions
//! - **Claim-once fields** - owners, claimants and HWIDs are never silently overwritten
//! - **Optimistic concurrency** - conditional commits against the document's
//!   version, re-fetch and recompute on conflict, bounded jittered retries
//! - **Pluggable stores** - GitHub contents API, local file, in-memory
//! - **Service surface** - flat key/value requests in, `{status, ...}` JSON out
//!
//! ## Quickstart
//!
//! ```no_run
//! use whitelock::{WhitelistManager, WhitelockConfig};
//!
//! fn main() -> Result<(), whitelock::WhitelockError> {
//!     let manager = WhitelistManager::new(WhitelockConfig::from_env()?)?;
//!
//!     manager.create_product("MyScript", Some("owner-id"))?;
//!     let key = manager.issue_key("MyScript", "owner-id")?;
//!     manager.claim_key("MyScript", &key, "user-42")?;
//!     manager.validate_or_bind_hwid("MyScript", &key, "HWID-ABC")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! The document is never cached between calls. Each operation fetches it,
//! computes its transition, and commits with the version it read. If another
//! writer got there first the store rejects the commit and the operation is
//! recomputed against the new document, so two racing claims on one key end
//! with exactly one claimant and one `AlreadyClaimed`.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Document model
pub mod model;

// Store layer
pub mod store;

// Policy layer
pub mod policy;

// Lifecycle layer
pub mod lifecycle;

// Read-modify-write coordination
pub mod coordinator;

// Manager (main public API)
pub mod manager;

// Service surface
pub mod protocol;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{GitHubStoreConfig, WhitelockConfig};
pub use coordinator::{Coordinator, RetryPolicy};
pub use errors::{ErrorCategory, Rejection, WhitelockError};
pub use lifecycle::{Action, HwidValidation, Outcome};
pub use manager::WhitelistManager;
pub use model::{Document, KeyRecord, KeyState, Product};
pub use protocol::{handle, ServiceRequest, ServiceResponse};
pub use store::{DocumentStore, FileStore, GitHubStore, MemoryStore, Snapshot, VersionToken};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
