//! Racing writers against one document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use whitelock::{
    Document, DocumentStore, FileStore, MemoryStore, Rejection, RetryPolicy, Snapshot,
    VersionToken, WhitelistManager, WhitelockError,
};

/// Lets a rival manager commit between our fetch and our first commit.
struct InterleavedStore {
    inner: Arc<MemoryStore>,
    rival: Box<dyn Fn() + Send + Sync>,
    fired: AtomicBool,
}

impl DocumentStore for InterleavedStore {
    fn fetch(&self) -> Result<Snapshot, WhitelockError> {
        self.inner.fetch()
    }

    fn commit(
        &self,
        document: &Document,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, WhitelockError> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            (self.rival)();
        }
        self.inner.commit(document, expected)
    }
}

fn seeded() -> (Arc<MemoryStore>, String) {
    let store = Arc::new(MemoryStore::new());
    let manager = WhitelistManager::with_store(store.clone(), RetryPolicy::immediate(5));
    manager.create_product("P", None).unwrap();
    let token = manager.issue_key("P", "anyone").unwrap();
    (store, token)
}

#[test]
fn stale_commit_is_rejected_by_store() {
    let (store, token) = seeded();
    let stale = store.fetch().unwrap();

    let mut first = stale.document.clone();
    first
        .product_mut("P")
        .unwrap()
        .key_mut(&token)
        .unwrap()
        .claimant
        .claim("user1".to_string())
        .unwrap();
    store.commit(&first, stale.version.as_ref()).unwrap();

    let mut second = stale.document.clone();
    second
        .product_mut("P")
        .unwrap()
        .key_mut(&token)
        .unwrap()
        .claimant
        .claim("user2".to_string())
        .unwrap();
    assert!(matches!(
        store.commit(&second, stale.version.as_ref()),
        Err(WhitelockError::VersionConflict)
    ));

    let current = store.fetch().unwrap().document;
    assert!(current.key("P", &token).unwrap().claimant.is_held_by("user1"));
}

#[test]
fn loser_retries_and_observes_winner() {
    let (inner, token) = seeded();

    let rival_manager = WhitelistManager::with_store(inner.clone(), RetryPolicy::immediate(5));
    let rival_token = token.clone();
    let store = InterleavedStore {
        inner: inner.clone(),
        rival: Box::new(move || {
            rival_manager.claim_key("P", &rival_token, "user2").unwrap();
        }),
        fired: AtomicBool::new(false),
    };

    let manager = WhitelistManager::with_store(Arc::new(store), RetryPolicy::immediate(5));
    let result = manager.claim_key("P", &token, "user1");

    assert!(matches!(
        result,
        Err(WhitelockError::Rejected(Rejection::AlreadyClaimed))
    ));
    let doc = inner.fetch().unwrap().document;
    assert!(doc.key("P", &token).unwrap().claimant.is_held_by("user2"));
}

#[test]
fn loser_reapplies_independent_change() {
    let (inner, token) = seeded();

    let rival_manager = WhitelistManager::with_store(inner.clone(), RetryPolicy::immediate(5));
    let store = InterleavedStore {
        inner: inner.clone(),
        rival: Box::new(move || {
            rival_manager.create_product("Other", None).unwrap();
        }),
        fired: AtomicBool::new(false),
    };

    let manager = WhitelistManager::with_store(Arc::new(store), RetryPolicy::immediate(5));
    manager.claim_key("P", &token, "user1").unwrap();

    let doc = inner.fetch().unwrap().document;
    assert!(doc.contains_product("Other"));
    assert!(doc.key("P", &token).unwrap().claimant.is_held_by("user1"));
}

#[test]
fn concurrent_claims_have_one_winner() {
    const CLAIMANTS: usize = 8;
    let (store, token) = seeded();
    let barrier = Arc::new(Barrier::new(CLAIMANTS));

    let handles: Vec<_> = (0..CLAIMANTS)
        .map(|i| {
            let manager = WhitelistManager::with_store(store.clone(), RetryPolicy::default());
            let barrier = barrier.clone();
            let token = token.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.claim_key("P", &token, &format!("user{}", i))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let already_claimed = results
        .iter()
        .filter(|r| matches!(r, Err(WhitelockError::Rejected(Rejection::AlreadyClaimed))))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(already_claimed, CLAIMANTS - 1);
}

#[test]
fn concurrent_binds_have_one_hwid() {
    const CLIENTS: usize = 6;
    let (store, token) = seeded();
    let setup = WhitelistManager::with_store(store.clone(), RetryPolicy::default());
    setup.claim_key("P", &token, "user1").unwrap();

    let barrier = Arc::new(Barrier::new(CLIENTS));
    let handles: Vec<_> = (0..CLIENTS)
        .map(|i| {
            let manager = WhitelistManager::with_store(store.clone(), RetryPolicy::default());
            let barrier = barrier.clone();
            let token = token.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.validate_or_bind_hwid("P", &token, &format!("HW-{}", i))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().all(|r| r.is_ok()
        || matches!(r, Err(WhitelockError::Rejected(Rejection::HwidMismatch)))));
}

#[test]
fn separate_file_stores_on_one_path_lose_no_updates() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("whitelist.json");
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let store = Arc::new(FileStore::new(&path).unwrap());
            let manager = WhitelistManager::with_store(store, RetryPolicy::default());
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.create_product(&format!("P{}", i), None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert!(results
        .iter()
        .all(|r| r.is_ok() || matches!(r, Err(WhitelockError::ConcurrencyExhausted { .. }))));

    let store = FileStore::new(&path).unwrap();
    assert_eq!(store.fetch().unwrap().document.len(), committed);
}
