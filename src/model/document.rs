//! Whitelist document: products, their keys, and HWID bindings.

use crate::errors::Rejection;
use crate::model::claim::{constant_time_eq, ClaimOnce};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One redeemable license unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    /// Identity that redeemed this key. Permanent once set.
    #[serde(rename = "userId", default)]
    pub claimant: ClaimOnce<String>,

    /// Hardware identifier bound to this key.
    #[serde(default)]
    pub hwid: ClaimOnce<String>,

    /// Guilds this key grants access in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guild_ids: Vec<String>,

    /// When the key was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,

    /// When the key was claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,

    /// When the current HWID was bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_at: Option<DateTime<Utc>>,

    /// Fields written by other tools, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lifecycle state of a key, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Issued, nobody has redeemed it.
    Issued,
    /// Redeemed, no HWID bound.
    Claimed,
    /// Redeemed and bound to a HWID.
    Bound,
}

impl KeyRecord {
    /// A freshly issued, unclaimed key.
    pub fn issued(at: DateTime<Utc>) -> Self {
        Self {
            issued_at: Some(at),
            ..Self::default()
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> KeyState {
        match (self.claimant.is_set(), self.hwid.is_set()) {
            (false, _) => KeyState::Issued,
            (true, false) => KeyState::Claimed,
            (true, true) => KeyState::Bound,
        }
    }
}

/// A product and the keys issued for it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Owner identity. Set once, never silently replaced.
    #[serde(rename = "ownerId", default)]
    pub owner: ClaimOnce<String>,

    /// Opaque token authorizing owner operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Group (guild) the product is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// When the product was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Issued keys by token. Required: an entry without it is not a product.
    pub keys: BTreeMap<String, KeyRecord>,

    /// Fields written by other tools, carried through unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Look up a key record by token.
    pub fn key(&self, token: &str) -> Result<&KeyRecord, Rejection> {
        self.keys.get(token).ok_or(Rejection::KeyNotFound)
    }

    /// Look up a key record by token for mutation.
    pub fn key_mut(&mut self, token: &str) -> Result<&mut KeyRecord, Rejection> {
        self.keys.get_mut(token).ok_or(Rejection::KeyNotFound)
    }

    /// Whether `candidate` matches this product's API key.
    pub fn api_key_matches(&self, candidate: &str) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| constant_time_eq(key.as_bytes(), candidate.as_bytes()))
    }
}

/// The entire whitelist state: product name to product.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    products: BTreeMap<String, Product>,
}

impl Document {
    /// An empty whitelist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether there are no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Iterate products in name order.
    pub fn products(&self) -> impl Iterator<Item = (&String, &Product)> {
        self.products.iter()
    }

    /// Whether a product with this name exists.
    pub fn contains_product(&self, name: &str) -> bool {
        self.products.contains_key(name)
    }

    /// Look up a product by name.
    pub fn product(&self, name: &str) -> Result<&Product, Rejection> {
        self.products
            .get(name)
            .ok_or_else(|| Rejection::ProductNotFound {
                product: name.to_string(),
            })
    }

    /// Look up a product by name for mutation.
    pub fn product_mut(&mut self, name: &str) -> Result<&mut Product, Rejection> {
        self.products
            .get_mut(name)
            .ok_or_else(|| Rejection::ProductNotFound {
                product: name.to_string(),
            })
    }

    /// Find the product carrying `api_key`. Linear scan; product counts are small.
    pub fn product_by_api_key(&self, api_key: &str) -> Result<(&str, &Product), Rejection> {
        self.products
            .iter()
            .find(|(_, product)| product.api_key_matches(api_key))
            .map(|(name, product)| (name.as_str(), product))
            .ok_or(Rejection::InvalidApiKey)
    }

    /// Name of the product carrying `api_key`.
    pub fn product_name_by_api_key(&self, api_key: &str) -> Result<String, Rejection> {
        self.product_by_api_key(api_key)
            .map(|(name, _)| name.to_string())
    }

    /// Look up a key record by product name and token.
    pub fn key(&self, product: &str, token: &str) -> Result<&KeyRecord, Rejection> {
        self.product(product)?.key(token)
    }

    /// Whether `token` is already used by any product, as key or API key.
    pub fn token_in_use(&self, token: &str) -> bool {
        self.products.values().any(|product| {
            product.keys.contains_key(token) || product.api_key.as_deref() == Some(token)
        })
    }

    /// Insert a new product. Fails if the name is taken.
    pub fn insert_product(&mut self, name: &str, product: Product) -> Result<(), Rejection> {
        if self.products.contains_key(name) {
            return Err(Rejection::AlreadyExists {
                product: name.to_string(),
            });
        }
        self.products.insert(name.to_string(), product);
        Ok(())
    }
}
