//! Pure key-lifecycle transitions.
//!
//! ```text
//! ISSUED --claim--> CLAIMED --bind--> BOUND
//! BOUND  --bind(other hwid)--> rejected
//! BOUND  --reset(claimant)--> CLAIMED
//! ```
//!
//! Every function reads a document and returns either a rejection or the
//! document to commit. None of them perform I/O, so the coordinator can
//! rerun them against a fresher document after losing a version race.

use crate::coordinator::Applied;
use crate::errors::Rejection;
use crate::lifecycle::token::{generate_unique, TokenSource, API_KEY_LEN, KEY_TOKEN_LEN};
use crate::model::{ClaimOnce, Document, KeyRecord, Product};
use crate::policy::access::{check_hwid, require_claimant, require_owner, HwidCheck};
use chrono::{DateTime, Utc};

/// Inputs a transition may need besides the document.
pub struct Context<'a> {
    /// Time stamped onto records changed by this transition.
    pub now: DateTime<Utc>,

    /// Source for new key tokens and API keys.
    pub tokens: &'a dyn TokenSource,
}

/// Outcome of validating a HWID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwidValidation {
    /// The HWID was unbound and is now bound to the key.
    Bound,
    /// The HWID matched the existing binding.
    Validated,
}

/// Create a product, optionally with an owner, and give it an API key.
pub fn create_product(
    doc: &Document,
    ctx: &Context<'_>,
    name: &str,
    owner_id: Option<&str>,
) -> Result<Applied<Product>, Rejection> {
    if doc.contains_product(name) {
        return Err(Rejection::AlreadyExists {
            product: name.to_string(),
        });
    }

    let product = Product {
        owner: owner_id
            .map(|owner| ClaimOnce::held(owner.to_string()))
            .unwrap_or_default(),
        api_key: Some(generate_unique(ctx.tokens, doc, API_KEY_LEN)?),
        created_at: Some(ctx.now),
        ..Product::default()
    };

    let mut next = doc.clone();
    next.insert_product(name, product.clone())?;
    Ok(Applied::commit(next, product))
}

/// Issue a new key for a product. Owned products only accept their owner.
pub fn issue_key(
    doc: &Document,
    ctx: &Context<'_>,
    product_name: &str,
    requester_id: &str,
) -> Result<Applied<String>, Rejection> {
    require_owner(doc.product(product_name)?, requester_id)?;
    let token = generate_unique(ctx.tokens, doc, KEY_TOKEN_LEN)?;

    let mut next = doc.clone();
    next.product_mut(product_name)?
        .keys
        .insert(token.clone(), KeyRecord::issued(ctx.now));
    Ok(Applied::commit(next, token))
}

/// Redeem a key. The first claimant keeps it for good.
pub fn claim_key(
    doc: &Document,
    ctx: &Context<'_>,
    product_name: &str,
    token: &str,
    user_id: &str,
) -> Result<Applied<()>, Rejection> {
    let mut next = doc.clone();
    let key = next.product_mut(product_name)?.key_mut(token)?;
    key.claimant
        .claim(user_id.to_string())
        .map_err(|_| Rejection::AlreadyClaimed)?;
    key.claimed_at = Some(ctx.now);
    Ok(Applied::commit(next, ()))
}

/// Validate a HWID against a claimed key, binding it on first use.
///
/// A matching HWID leaves the document untouched, so repeated validations
/// do not write to the store.
pub fn validate_or_bind_hwid(
    doc: &Document,
    ctx: &Context<'_>,
    product_name: &str,
    token: &str,
    hwid: &str,
) -> Result<Applied<HwidValidation>, Rejection> {
    match check_hwid(doc.key(product_name, token)?, hwid)? {
        HwidCheck::Match => Ok(Applied::unchanged(HwidValidation::Validated)),
        HwidCheck::Unbound => {
            let mut next = doc.clone();
            let key = next.product_mut(product_name)?.key_mut(token)?;
            key.hwid
                .claim(hwid.to_string())
                .map_err(|_| Rejection::HwidMismatch)?;
            key.bound_at = Some(ctx.now);
            Ok(Applied::commit(next, HwidValidation::Bound))
        }
    }
}

/// Clear a key's HWID. Only the claimant may do this; the claimant stays.
pub fn reset_hwid(
    doc: &Document,
    product_name: &str,
    token: &str,
    requester_id: &str,
) -> Result<Applied<()>, Rejection> {
    let key = doc.key(product_name, token)?;
    require_claimant(key, requester_id)?;
    if !key.hwid.is_set() {
        return Ok(Applied::unchanged(()));
    }

    let mut next = doc.clone();
    let key = next.product_mut(product_name)?.key_mut(token)?;
    key.hwid.release();
    key.bound_at = None;
    Ok(Applied::commit(next, ()))
}

/// Take ownership of the product carrying `api_key` and attach it to a group.
/// Returns the product name.
pub fn set_owner_and_group(
    doc: &Document,
    api_key: &str,
    user_id: &str,
    group_id: &str,
) -> Result<Applied<String>, Rejection> {
    let name = doc.product_name_by_api_key(api_key)?;

    let mut next = doc.clone();
    let product = next.product_mut(&name)?;
    product
        .owner
        .claim(user_id.to_string())
        .map_err(|_| Rejection::OwnerAlreadySet)?;
    product.guild_id = Some(group_id.to_string());
    Ok(Applied::commit(next, name))
}

/// Find the product carrying `api_key`. Never writes.
pub fn product_by_api_key(
    doc: &Document,
    api_key: &str,
) -> Result<Applied<(String, Product)>, Rejection> {
    let (name, product) = doc.product_by_api_key(api_key)?;
    Ok(Applied::unchanged((name.to_string(), product.clone())))
}

/// Delete an issued key. Owned products only accept their owner.
pub fn revoke_key(
    doc: &Document,
    product_name: &str,
    token: &str,
    requester_id: &str,
) -> Result<Applied<()>, Rejection> {
    let product = doc.product(product_name)?;
    require_owner(product, requester_id)?;
    product.key(token)?;

    let mut next = doc.clone();
    next.product_mut(product_name)?.keys.remove(token);
    Ok(Applied::commit(next, ()))
}
