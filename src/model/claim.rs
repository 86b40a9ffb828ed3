//! Claim-once field primitive.

use serde::{Deserialize, Serialize};

/// Returned when a [`ClaimOnce`] field is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyHeld;

/// A field that starts unset and is set exactly once.
///
/// After the first claim the value is only ever compared, never replaced.
/// Clearing is crate-internal and only used on the one field with an
/// explicit reset path (a key's HWID); owners and claimants are never cleared.
///
/// Serializes as the bare value or `null`.
///
/// Outside this crate a held field cannot be cleared:
///
/// ```compile_fail
/// let mut owner = whitelock::model::ClaimOnce::held("owner".to_string());
/// owner.release();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimOnce<T>(Option<T>);

impl<T> Default for ClaimOnce<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> ClaimOnce<T> {
    /// An unset field.
    pub fn unset() -> Self {
        Self(None)
    }

    /// A field that is already held by `value`.
    pub fn held(value: T) -> Self {
        Self(Some(value))
    }

    /// Whether the field has been claimed.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Current holder, if any.
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Set the field if it is unset.
    pub fn claim(&mut self, value: T) -> Result<(), AlreadyHeld> {
        if self.0.is_some() {
            return Err(AlreadyHeld);
        }
        self.0 = Some(value);
        Ok(())
    }

    /// Clear the field, returning the previous holder.
    pub(crate) fn release(&mut self) -> Option<T> {
        self.0.take()
    }
}

impl ClaimOnce<String> {
    /// Whether the field is held by exactly `candidate`.
    ///
    /// The comparison runs over the whole string regardless of where the
    /// first difference is.
    pub fn is_held_by(&self, candidate: &str) -> bool {
        self.0
            .as_deref()
            .is_some_and(|held| constant_time_eq(held.as_bytes(), candidate.as_bytes()))
    }
}

/// Equality without an early exit on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (&x, &y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
