//! Whitelist Manager - the main public API for Whitelock.
//!
//! The `WhitelistManager` runs every lifecycle operation as an optimistic
//! read-modify-write against the backing store:
//! - fetch the live document (never cached between calls)
//! - compute the transition
//! - commit with the fetched version, retrying on conflicts

use crate::clock::{Clock, SystemClock};
use crate::config::WhitelockConfig;
use crate::coordinator::{Applied, Coordinator, RetryPolicy};
use crate::errors::Rejection;
use crate::lifecycle::engine::{self, Context, HwidValidation};
use crate::lifecycle::token::{RandomTokens, TokenSource};
use crate::lifecycle::{Action, Outcome};
use crate::model::{Document, Product};
use crate::store::{DocumentStore, GitHubStore};
use crate::WhitelockError;
use std::sync::Arc;

/// Main whitelist manager.
///
/// Holds no whitelist state of its own; cloning it is cheap and clones can
/// be used from any thread.
#[derive(Clone)]
pub struct WhitelistManager {
    coordinator: Coordinator,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
}

impl WhitelistManager {
    /// Create a manager backed by the GitHub repository in `config`.
    ///
    /// # Errors
    /// Returns an error if configuration validation or HTTP client creation fails.
    pub fn new(config: WhitelockConfig) -> Result<Self, WhitelockError> {
        config.validate()?;
        let store = GitHubStore::new(&config)?;
        Ok(Self::with_store(Arc::new(store), config.retry))
    }

    /// Create a manager over any document store.
    pub fn with_store(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self {
            coordinator: Coordinator::new(store, retry),
            clock: Arc::new(SystemClock),
            tokens: Arc::new(RandomTokens),
        }
    }

    /// Replace the clock used for lifecycle timestamps (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the token source (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Run an action.
    ///
    /// # Errors
    /// - `InvalidInput` - a required field is blank
    /// - `Rejected` - a business rule rejected the action
    /// - `ConcurrencyExhausted` - too many concurrent writers
    /// - `StoreUnavailable` / `DocumentMalformed` - store failure
    pub fn perform(&self, action: &Action) -> Result<Outcome, WhitelockError> {
        action.validate()?;
        self.run(action.name(), |doc, ctx| action.apply(doc, ctx))
    }

    /// Create a product, optionally with an owner.
    pub fn create_product(
        &self,
        name: &str,
        owner_id: Option<&str>,
    ) -> Result<Product, WhitelockError> {
        require("productName", name)?;
        if let Some(owner) = owner_id {
            require("userId", owner)?;
        }
        self.run("createProduct", |doc, ctx| {
            engine::create_product(doc, ctx, name, owner_id)
        })
    }

    /// Issue a key for `product`; returns the key token.
    pub fn issue_key(&self, product: &str, requester_id: &str) -> Result<String, WhitelockError> {
        require("productName", product)?;
        require("userId", requester_id)?;
        self.run("issueKey", |doc, ctx| {
            engine::issue_key(doc, ctx, product, requester_id)
        })
    }

    /// Redeem `key` for `user_id`.
    pub fn claim_key(&self, product: &str, key: &str, user_id: &str) -> Result<(), WhitelockError> {
        require("productName", product)?;
        require("key", key)?;
        require("userId", user_id)?;
        self.run("claimKey", |doc, ctx| {
            engine::claim_key(doc, ctx, product, key, user_id)
        })
    }

    /// Validate `hwid` for `key`, binding it if the key has none yet.
    pub fn validate_or_bind_hwid(
        &self,
        product: &str,
        key: &str,
        hwid: &str,
    ) -> Result<HwidValidation, WhitelockError> {
        require("productName", product)?;
        require("key", key)?;
        require("hwid", hwid)?;
        self.run("validateOrBindHwid", |doc, ctx| {
            engine::validate_or_bind_hwid(doc, ctx, product, key, hwid)
        })
    }

    /// Clear the HWID bound to `key`. Only the claimant may do this.
    pub fn reset_hwid(
        &self,
        product: &str,
        key: &str,
        requester_id: &str,
    ) -> Result<(), WhitelockError> {
        require("productName", product)?;
        require("key", key)?;
        require("userId", requester_id)?;
        self.run("resetHwid", |doc, _| {
            engine::reset_hwid(doc, product, key, requester_id)
        })
    }

    /// Take ownership of the product carrying `api_key`; returns its name.
    pub fn set_owner_and_group(
        &self,
        api_key: &str,
        user_id: &str,
        group_id: &str,
    ) -> Result<String, WhitelockError> {
        require("apiKey", api_key)?;
        require("userId", user_id)?;
        require("guildId", group_id)?;
        self.run("setOwnerAndGroup", |doc, _| {
            engine::set_owner_and_group(doc, api_key, user_id, group_id)
        })
    }

    /// Find the product carrying `api_key`.
    pub fn get_product_by_api_key(
        &self,
        api_key: &str,
    ) -> Result<(String, Product), WhitelockError> {
        require("apiKey", api_key)?;
        self.coordinator.read(|doc| {
            doc.product_by_api_key(api_key)
                .map(|(name, product)| (name.to_string(), product.clone()))
        })
    }

    /// Delete `key` from `product`. Owner-only when the product has an owner.
    pub fn revoke_key(
        &self,
        product: &str,
        key: &str,
        requester_id: &str,
    ) -> Result<(), WhitelockError> {
        require("productName", product)?;
        require("key", key)?;
        require("userId", requester_id)?;
        self.run("revokeKey", |doc, _| {
            engine::revoke_key(doc, product, key, requester_id)
        })
    }

    /// Fetch the current document.
    pub fn document(&self) -> Result<Document, WhitelockError> {
        self.coordinator.read(|doc| Ok(doc.clone()))
    }

    fn run<T, F>(&self, operation: &str, mut transition: F) -> Result<T, WhitelockError>
    where
        F: FnMut(&Document, &Context<'_>) -> Result<Applied<T>, Rejection>,
    {
        self.coordinator.execute(operation, |doc| {
            let ctx = Context {
                now: self.clock.now_utc(),
                tokens: self.tokens.as_ref(),
            };
            transition(doc, &ctx)
        })
    }
}

fn require(field: &str, value: &str) -> Result<(), WhitelockError> {
    if value.trim().is_empty() {
        return Err(WhitelockError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::GitHubStoreConfig;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::time::Duration;

    fn manager() -> (WhitelistManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let manager = WhitelistManager::with_store(store.clone(), RetryPolicy::immediate(5));
        (manager, store)
    }

    #[test]
    fn test_manager_creation_validates_config() {
        let config = WhitelockConfig {
            app_name: "test-app".to_string(),
            store: GitHubStoreConfig {
                owner: "acme".to_string(),
                repo: "licenses".to_string(),
                path: "whitelist.json".to_string(),
                branch: "main".to_string(),
                token: String::new(),
                api_base: "https://api.github.com".to_string(),
            },
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(5),
        };
        assert!(matches!(
            WhitelistManager::new(config),
            Err(WhitelockError::ConfigError(_))
        ));
    }

    #[test]
    fn test_blank_input_rejected_before_store() {
        let (manager, store) = manager();
        let result = manager.claim_key("P", "", "u");
        assert!(matches!(result, Err(WhitelockError::InvalidInput(_))));
        assert!(store.version().is_none());
    }

    #[test]
    fn test_timestamps_use_clock() {
        let (manager, _) = manager();
        let clock = Arc::new(MockClock::new(
            chrono::Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let manager = manager.with_clock(clock.clone());

        manager.create_product("P", None).unwrap();
        let key = manager.issue_key("P", "anyone").unwrap();
        clock.advance(chrono::Duration::hours(2));
        manager.claim_key("P", &key, "u1").unwrap();

        let doc = manager.document().unwrap();
        let record = doc.key("P", &key).unwrap();
        assert_eq!(
            record.issued_at,
            Some(chrono::Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap())
        );
        assert_eq!(
            record.claimed_at,
            Some(chrono::Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_validation_does_not_write() {
        let (manager, store) = manager();
        manager.create_product("P", None).unwrap();
        let key = manager.issue_key("P", "anyone").unwrap();
        manager.claim_key("P", &key, "u1").unwrap();
        manager.validate_or_bind_hwid("P", &key, "HW-1").unwrap();

        let version = store.version();
        assert_eq!(
            manager.validate_or_bind_hwid("P", &key, "HW-1").unwrap(),
            HwidValidation::Validated
        );
        assert_eq!(store.version(), version);
    }

    #[test]
    fn test_perform_matches_typed_api() {
        let (manager, _) = manager();
        let outcome = manager
            .perform(&Action::CreateProduct {
                name: "P".to_string(),
                owner_id: Some("owner".to_string()),
            })
            .unwrap();
        let Outcome::ProductCreated { product, .. } = outcome else {
            panic!("expected ProductCreated");
        };

        let (name, found) = manager
            .get_product_by_api_key(product.api_key.as_deref().unwrap())
            .unwrap();
        assert_eq!(name, "P");
        assert_eq!(found, product);
    }

    #[test]
    fn test_perform_rejects_blank_fields() {
        let (manager, _) = manager();
        let result = manager.perform(&Action::GetProductByApiKey {
            api_key: String::new(),
        });
        assert!(matches!(result, Err(WhitelockError::InvalidInput(_))));
    }
}
