//! Optimistic read-modify-write against a [`DocumentStore`].
//!
//! Each attempt fetches the live document, computes the mutation from
//! scratch, and commits with the version it read. A version conflict means
//! another writer committed in between: back off, re-fetch, recompute.
//! The stale result of a losing attempt is always discarded.

use crate::errors::Rejection;
use crate::model::Document;
use crate::store::DocumentStore;
use crate::WhitelockError;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of a pure mutation: the value to return and, if the document
/// changed, the new document to commit.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    /// New document to commit, or `None` when nothing changed.
    pub document: Option<Document>,

    /// Value returned to the caller once committed.
    pub value: T,
}

impl<T> Applied<T> {
    /// A mutation that changed the document.
    pub fn commit(document: Document, value: T) -> Self {
        Self {
            document: Some(document),
            value,
        }
    }

    /// A mutation that left the document as it was.
    pub fn unchanged(value: T) -> Self {
        Self {
            document: None,
            value,
        }
    }
}

/// Bounded retry with jittered exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Commit attempts before giving up.
    pub max_attempts: u32,

    /// Backoff ceiling after the first conflict; doubles per conflict.
    pub base_backoff: Duration,

    /// Upper bound on any single backoff.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(400),
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff ceiling after `conflicts` consecutive conflicts.
    pub fn backoff_ceiling(&self, conflicts: u32) -> Duration {
        let factor = 1u32 << conflicts.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Randomized delay in `[0, ceiling]` after `conflicts` conflicts.
    pub fn backoff(&self, conflicts: u32) -> Duration {
        let ceiling = self.backoff_ceiling(conflicts);
        if ceiling.is_zero() {
            return Duration::ZERO;
        }
        let micros = ceiling.as_micros().min(u64::MAX as u128) as u64;
        Duration::from_micros(rand::thread_rng().gen_range(0..=micros))
    }
}

/// Runs pure document mutations under optimistic concurrency control.
#[derive(Clone)]
pub struct Coordinator {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl Coordinator {
    /// Create a coordinator over `store`.
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The retry policy in use.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Read the current document without writing.
    pub fn read<T, F>(&self, query: F) -> Result<T, WhitelockError>
    where
        F: FnOnce(&Document) -> Result<T, Rejection>,
    {
        let snapshot = self.store.fetch()?;
        Ok(query(&snapshot.document)?)
    }

    /// Apply `mutation` to the live document and commit the result.
    ///
    /// `mutation` may run several times, once per attempt, each time against
    /// a freshly fetched document. It must not have side effects outside its
    /// return value.
    ///
    /// # Errors
    /// - `Rejected` - the mutation rejected the current state (nothing written)
    /// - `ConcurrencyExhausted` - every attempt lost a version race
    /// - `StoreUnavailable` / `DocumentMalformed` - store failure, not retried
    pub fn execute<T, F>(&self, operation: &str, mut mutation: F) -> Result<T, WhitelockError>
    where
        F: FnMut(&Document) -> Result<Applied<T>, Rejection>,
    {
        for attempt in 1..=self.policy.max_attempts {
            let snapshot = self.store.fetch()?;
            debug!(operation, attempt, version = ?snapshot.version, "Applying mutation");

            let applied = match mutation(&snapshot.document) {
                Ok(applied) => applied,
                Err(rejection) => {
                    debug!(operation, attempt, %rejection, "Mutation rejected");
                    return Err(rejection.into());
                }
            };

            let Some(document) = applied.document else {
                return Ok(applied.value);
            };

            match self.store.commit(&document, snapshot.version.as_ref()) {
                Ok(version) => {
                    info!(operation, attempt, %version, "Committed whitelist");
                    return Ok(applied.value);
                }
                Err(WhitelockError::VersionConflict) => {
                    warn!(operation, attempt, "Version conflict, retrying");
                    if attempt < self.policy.max_attempts {
                        let delay = self.policy.backoff(attempt);
                        if !delay.is_zero() {
                            std::thread::sleep(delay);
                        }
                    }
                }
                Err(other) => return Err(other),
            }
        }

        warn!(
            operation,
            attempts = self.policy.max_attempts,
            "Giving up after repeated version conflicts"
        );
        Err(WhitelockError::ConcurrencyExhausted {
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Product;
    use crate::store::{MemoryStore, Snapshot, VersionToken};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn add_product(name: &str) -> impl FnMut(&Document) -> Result<Applied<()>, Rejection> + '_ {
        move |doc| {
            let mut next = doc.clone();
            next.insert_product(name, Product::default())?;
            Ok(Applied::commit(next, ()))
        }
    }

    /// Commits a rival document right before the first `n` commits.
    struct RacingStore {
        inner: MemoryStore,
        rivals: Mutex<Vec<String>>,
        commits: AtomicU32,
    }

    impl RacingStore {
        fn new(rivals: &[&str]) -> Self {
            Self {
                inner: MemoryStore::new(),
                rivals: Mutex::new(rivals.iter().rev().map(|r| r.to_string()).collect()),
                commits: AtomicU32::new(0),
            }
        }
    }

    impl DocumentStore for RacingStore {
        fn fetch(&self) -> Result<Snapshot, WhitelockError> {
            self.inner.fetch()
        }

        fn commit(
            &self,
            document: &Document,
            expected: Option<&VersionToken>,
        ) -> Result<VersionToken, WhitelockError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            if let Some(rival) = self.rivals.lock().unwrap().pop() {
                let current = self.inner.fetch()?;
                let mut doc = current.document;
                doc.insert_product(&rival, Product::default()).unwrap();
                self.inner.commit(&doc, current.version.as_ref())?;
            }
            self.inner.commit(document, expected)
        }
    }

    /// Store whose every operation fails at the transport level.
    struct DownStore;

    impl DocumentStore for DownStore {
        fn fetch(&self) -> Result<Snapshot, WhitelockError> {
            Err(WhitelockError::StoreUnavailable("connection refused".to_string()))
        }

        fn commit(
            &self,
            _document: &Document,
            _expected: Option<&VersionToken>,
        ) -> Result<VersionToken, WhitelockError> {
            Err(WhitelockError::StoreUnavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_commit_first_attempt() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = Coordinator::new(store.clone(), RetryPolicy::immediate(3));

        coordinator.execute("add", add_product("A")).unwrap();
        assert!(store.fetch().unwrap().document.contains_product("A"));
    }

    #[test]
    fn test_conflict_recomputes_on_fresh_document() {
        let store = Arc::new(RacingStore::new(&["Rival"]));
        let coordinator = Coordinator::new(store.clone(), RetryPolicy::immediate(3));

        let mut runs = 0;
        coordinator
            .execute("add", |doc| {
                runs += 1;
                let mut next = doc.clone();
                next.insert_product("Mine", Product::default())?;
                Ok(Applied::commit(next, ()))
            })
            .unwrap();

        assert_eq!(runs, 2);
        assert_eq!(store.commits.load(Ordering::SeqCst), 2);
        let doc = store.fetch().unwrap().document;
        assert!(doc.contains_product("Rival"));
        assert!(doc.contains_product("Mine"));
    }

    #[test]
    fn test_retry_can_surface_rejection() {
        // The rival takes the name we wanted; the retry sees it and rejects.
        let store = Arc::new(RacingStore::new(&["Same"]));
        let coordinator = Coordinator::new(store.clone(), RetryPolicy::immediate(3));

        let result = coordinator.execute("add", add_product("Same"));
        assert!(matches!(
            result,
            Err(WhitelockError::Rejected(Rejection::AlreadyExists { .. }))
        ));
        assert_eq!(store.commits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhausted() {
        let store = Arc::new(RacingStore::new(&["R1", "R2", "R3"]));
        let coordinator = Coordinator::new(store.clone(), RetryPolicy::immediate(3));

        let result = coordinator.execute("add", add_product("Mine"));
        assert!(matches!(
            result,
            Err(WhitelockError::ConcurrencyExhausted { attempts: 3 })
        ));
        assert!(!store.fetch().unwrap().document.contains_product("Mine"));
    }

    #[test]
    fn test_rejection_does_not_commit() {
        let store = Arc::new(RacingStore::new(&[]));
        let coordinator = Coordinator::new(store.clone(), RetryPolicy::immediate(3));

        let result: Result<(), _> =
            coordinator.execute("noop", |_| Err(Rejection::KeyNotFound));
        assert!(matches!(
            result,
            Err(WhitelockError::Rejected(Rejection::KeyNotFound))
        ));
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unchanged_does_not_commit() {
        let store = Arc::new(RacingStore::new(&[]));
        let coordinator = Coordinator::new(store.clone(), RetryPolicy::immediate(3));

        let value = coordinator
            .execute("peek", |doc| Ok(Applied::unchanged(doc.len())))
            .unwrap();
        assert_eq!(value, 0);
        assert_eq!(store.commits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_store_failure_not_retried() {
        let coordinator = Coordinator::new(Arc::new(DownStore), RetryPolicy::immediate(5));
        let result = coordinator.execute("add", add_product("A"));
        assert!(matches!(result, Err(WhitelockError::StoreUnavailable(_))));
    }

    #[test]
    fn test_backoff_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_ceiling(1), Duration::from_millis(25));
        assert_eq!(policy.backoff_ceiling(2), Duration::from_millis(50));
        assert_eq!(policy.backoff_ceiling(3), Duration::from_millis(100));
        assert_eq!(policy.backoff_ceiling(10), Duration::from_millis(400));

        for conflicts in 1..6 {
            assert!(policy.backoff(conflicts) <= policy.backoff_ceiling(conflicts));
        }
        assert_eq!(RetryPolicy::immediate(3).backoff(2), Duration::ZERO);
    }
}
