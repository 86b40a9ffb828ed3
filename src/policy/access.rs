//! Owner, claimant and HWID checks.
//!
//! Authorization is identity equality only:
//! - owner operations need the requester to be the product owner
//!   (products without an owner are open)
//! - HWID reset needs the requester to be the key's claimant
//! - a bound HWID must be presented exactly

use crate::errors::Rejection;
use crate::model::{KeyRecord, Product};

/// Check that `requester` may act as owner of `product`.
///
/// # Returns
/// * `Ok(())` - Requester is the owner, or the product has no owner yet
/// * `Err(NotOwner)` - Product is owned by someone else
pub fn require_owner(product: &Product, requester: &str) -> Result<(), Rejection> {
    if product.owner.is_set() && !product.owner.is_held_by(requester) {
        return Err(Rejection::NotOwner);
    }
    Ok(())
}

/// Check that `requester` is the claimant of `key`.
///
/// # Returns
/// * `Ok(())` - Requester redeemed this key
/// * `Err(NotClaimed)` - Nobody has redeemed the key
/// * `Err(NotClaimant)` - Someone else redeemed the key
pub fn require_claimant(key: &KeyRecord, requester: &str) -> Result<(), Rejection> {
    if !key.claimant.is_set() {
        return Err(Rejection::NotClaimed);
    }
    if !key.claimant.is_held_by(requester) {
        return Err(Rejection::NotClaimant);
    }
    Ok(())
}

/// Result of comparing a presented HWID against a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwidCheck {
    /// No HWID bound yet; the presented one may be bound.
    Unbound,
    /// Presented HWID equals the bound one.
    Match,
}

/// Compare a presented HWID against a claimed key.
///
/// # Returns
/// * `Ok(Unbound)` / `Ok(Match)` - Access may be granted
/// * `Err(NotClaimed)` - Key has not been redeemed
/// * `Err(HwidMismatch)` - A different HWID is bound
pub fn check_hwid(key: &KeyRecord, hwid: &str) -> Result<HwidCheck, Rejection> {
    if !key.claimant.is_set() {
        return Err(Rejection::NotClaimed);
    }
    if !key.hwid.is_set() {
        return Ok(HwidCheck::Unbound);
    }
    if key.hwid.is_held_by(hwid) {
        Ok(HwidCheck::Match)
    } else {
        Err(Rejection::HwidMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClaimOnce;

    fn owned_by(owner: Option<&str>) -> Product {
        Product {
            owner: owner
                .map(|o| ClaimOnce::held(o.to_string()))
                .unwrap_or_default(),
            ..Product::default()
        }
    }

    fn key(claimant: Option<&str>, hwid: Option<&str>) -> KeyRecord {
        KeyRecord {
            claimant: claimant
                .map(|c| ClaimOnce::held(c.to_string()))
                .unwrap_or_default(),
            hwid: hwid.map(|h| ClaimOnce::held(h.to_string())).unwrap_or_default(),
            ..KeyRecord::default()
        }
    }

    #[test]
    fn test_require_owner_open_product() {
        assert!(require_owner(&owned_by(None), "anyone").is_ok());
    }

    #[test]
    fn test_require_owner_match() {
        assert!(require_owner(&owned_by(Some("owner")), "owner").is_ok());
    }

    #[test]
    fn test_require_owner_mismatch() {
        assert_eq!(
            require_owner(&owned_by(Some("owner")), "intruder"),
            Err(Rejection::NotOwner)
        );
    }

    #[test]
    fn test_require_claimant() {
        assert_eq!(
            require_claimant(&key(None, None), "u1"),
            Err(Rejection::NotClaimed)
        );
        assert_eq!(
            require_claimant(&key(Some("u1"), None), "u2"),
            Err(Rejection::NotClaimant)
        );
        assert!(require_claimant(&key(Some("u1"), Some("HW")), "u1").is_ok());
    }

    #[test]
    fn test_check_hwid_unclaimed() {
        assert_eq!(check_hwid(&key(None, None), "HW-1"), Err(Rejection::NotClaimed));
    }

    #[test]
    fn test_check_hwid_unbound() {
        assert_eq!(
            check_hwid(&key(Some("u1"), None), "HW-1"),
            Ok(HwidCheck::Unbound)
        );
    }

    #[test]
    fn test_check_hwid_match_and_mismatch() {
        let bound = key(Some("u1"), Some("HW-1"));
        assert_eq!(check_hwid(&bound, "HW-1"), Ok(HwidCheck::Match));
        assert_eq!(check_hwid(&bound, "HW-2"), Err(Rejection::HwidMismatch));
        assert_eq!(check_hwid(&bound, "hw-1"), Err(Rejection::HwidMismatch));
    }
}
