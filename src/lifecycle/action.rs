//! Whitelist operations as data.
//!
//! Each [`Action`] variant maps to one pure transition in
//! [`engine`](crate::lifecycle::engine), so the coordinator can retry any of
//! them the same way.

use crate::coordinator::Applied;
use crate::errors::Rejection;
use crate::lifecycle::engine::{self, Context, HwidValidation};
use crate::model::{Document, Product};
use crate::WhitelockError;

/// A whitelist operation and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create a product.
    CreateProduct {
        /// Product name.
        name: String,
        /// Initial owner, if known.
        owner_id: Option<String>,
    },
    /// Issue a key for a product.
    IssueKey {
        /// Product name.
        product: String,
        /// Who asks; must be the owner if one is set.
        requester_id: String,
    },
    /// Redeem a key.
    ClaimKey {
        /// Product name.
        product: String,
        /// Key token.
        key: String,
        /// Redeeming user.
        user_id: String,
    },
    /// Validate a HWID, binding it on first use.
    ValidateOrBindHwid {
        /// Product name.
        product: String,
        /// Key token.
        key: String,
        /// Presented hardware identifier.
        hwid: String,
    },
    /// Clear a key's HWID.
    ResetHwid {
        /// Product name.
        product: String,
        /// Key token.
        key: String,
        /// Who asks; must be the claimant.
        requester_id: String,
    },
    /// Take ownership of a product by API key.
    SetOwnerAndGroup {
        /// Product API key.
        api_key: String,
        /// New owner.
        user_id: String,
        /// Group (guild) to attach.
        group_id: String,
    },
    /// Look up a product by API key.
    GetProductByApiKey {
        /// Product API key.
        api_key: String,
    },
    /// Delete an issued key.
    RevokeKey {
        /// Product name.
        product: String,
        /// Key token.
        key: String,
        /// Who asks; must be the owner if one is set.
        requester_id: String,
    },
}

/// What a successful action produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A product was created.
    ProductCreated {
        /// Product name.
        name: String,
        /// The stored product.
        product: Product,
    },
    /// A key was issued.
    KeyIssued {
        /// Key token.
        key: String,
    },
    /// A key was redeemed.
    KeyClaimed,
    /// A HWID was bound or validated.
    Hwid(HwidValidation),
    /// A HWID was cleared.
    HwidReset,
    /// Product ownership was taken.
    OwnerSet {
        /// Product name.
        product: String,
    },
    /// A product was found by API key.
    ProductFound {
        /// Product name.
        name: String,
        /// The stored product.
        product: Product,
    },
    /// A key was deleted.
    KeyRevoked,
}

impl Action {
    /// Operation name, used in logs and commit attempts.
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateProduct { .. } => "createProduct",
            Action::IssueKey { .. } => "issueKey",
            Action::ClaimKey { .. } => "claimKey",
            Action::ValidateOrBindHwid { .. } => "validateOrBindHwid",
            Action::ResetHwid { .. } => "resetHwid",
            Action::SetOwnerAndGroup { .. } => "setOwnerAndGroup",
            Action::GetProductByApiKey { .. } => "getProductByApiKey",
            Action::RevokeKey { .. } => "revokeKey",
        }
    }

    /// Reject empty identifiers before touching the store.
    pub fn validate(&self) -> Result<(), WhitelockError> {
        let fields: Vec<(&str, &String)> = match self {
            Action::CreateProduct { name, owner_id } => {
                let mut fields = vec![("productName", name)];
                if let Some(owner) = owner_id {
                    fields.push(("userId", owner));
                }
                fields
            }
            Action::IssueKey {
                product,
                requester_id,
            } => vec![("productName", product), ("userId", requester_id)],
            Action::ClaimKey {
                product,
                key,
                user_id,
            } => vec![("productName", product), ("key", key), ("userId", user_id)],
            Action::ValidateOrBindHwid { product, key, hwid } => {
                vec![("productName", product), ("key", key), ("hwid", hwid)]
            }
            Action::ResetHwid {
                product,
                key,
                requester_id,
            }
            | Action::RevokeKey {
                product,
                key,
                requester_id,
            } => vec![
                ("productName", product),
                ("key", key),
                ("userId", requester_id),
            ],
            Action::SetOwnerAndGroup {
                api_key,
                user_id,
                group_id,
            } => vec![("apiKey", api_key), ("userId", user_id), ("guildId", group_id)],
            Action::GetProductByApiKey { api_key } => vec![("apiKey", api_key)],
        };

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(WhitelockError::InvalidInput(format!(
                "{} is required",
                field
            ))),
            None => Ok(()),
        }
    }

    /// Compute this action against `doc`.
    pub fn apply(&self, doc: &Document, ctx: &Context<'_>) -> Result<Applied<Outcome>, Rejection> {
        match self {
            Action::CreateProduct { name, owner_id } => {
                engine::create_product(doc, ctx, name, owner_id.as_deref()).map(|applied| {
                    map_value(applied, |product| Outcome::ProductCreated {
                        name: name.clone(),
                        product,
                    })
                })
            }
            Action::IssueKey {
                product,
                requester_id,
            } => engine::issue_key(doc, ctx, product, requester_id)
                .map(|applied| map_value(applied, |key| Outcome::KeyIssued { key })),
            Action::ClaimKey {
                product,
                key,
                user_id,
            } => engine::claim_key(doc, ctx, product, key, user_id)
                .map(|applied| map_value(applied, |()| Outcome::KeyClaimed)),
            Action::ValidateOrBindHwid { product, key, hwid } => {
                engine::validate_or_bind_hwid(doc, ctx, product, key, hwid)
                    .map(|applied| map_value(applied, Outcome::Hwid))
            }
            Action::ResetHwid {
                product,
                key,
                requester_id,
            } => engine::reset_hwid(doc, product, key, requester_id)
                .map(|applied| map_value(applied, |()| Outcome::HwidReset)),
            Action::SetOwnerAndGroup {
                api_key,
                user_id,
                group_id,
            } => engine::set_owner_and_group(doc, api_key, user_id, group_id)
                .map(|applied| map_value(applied, |product| Outcome::OwnerSet { product })),
            Action::GetProductByApiKey { api_key } => engine::product_by_api_key(doc, api_key)
                .map(|applied| {
                    map_value(applied, |(name, product)| Outcome::ProductFound {
                        name,
                        product,
                    })
                }),
            Action::RevokeKey {
                product,
                key,
                requester_id,
            } => engine::revoke_key(doc, product, key, requester_id)
                .map(|applied| map_value(applied, |()| Outcome::KeyRevoked)),
        }
    }
}

fn map_value<T, U>(applied: Applied<T>, f: impl FnOnce(T) -> U) -> Applied<U> {
    Applied {
        document: applied.document,
        value: f(applied.value),
    }
}
