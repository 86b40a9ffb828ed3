//! In-memory whitelist model. Pure data, no I/O.

pub mod claim;
pub mod document;

pub use claim::{AlreadyHeld, ClaimOnce};
pub use document::{Document, KeyRecord, KeyState, Product};
