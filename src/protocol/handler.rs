//! Dispatch service requests to the manager.

use crate::errors::ErrorCategory;
use crate::lifecycle::{HwidValidation, Outcome};
use crate::manager::WhitelistManager;
use crate::protocol::models::{ServiceRequest, ServiceResponse};
use serde_json::json;
use tracing::{debug, error};

/// Handle one request: parse, run, and shape the response.
///
/// Never fails; every error becomes an error response.
pub fn handle(manager: &WhitelistManager, request: &ServiceRequest) -> ServiceResponse {
    if !request.method.eq_ignore_ascii_case("POST") {
        return ServiceResponse::error(405, "Only POST requests are allowed");
    }

    let action = match request.action() {
        Ok(action) => action,
        Err(e) => return ServiceResponse::from_error(&e),
    };

    match manager.perform(&action) {
        Ok(outcome) => {
            debug!(action = action.name(), "Request succeeded");
            ServiceResponse::success(outcome_payload(outcome))
        }
        Err(e) => {
            if e.category() == ErrorCategory::Store {
                error!(action = action.name(), error = %e, "Request failed in store");
            } else {
                debug!(action = action.name(), error = %e, "Request rejected");
            }
            ServiceResponse::from_error(&e)
        }
    }
}

fn outcome_payload(outcome: Outcome) -> serde_json::Value {
    match outcome {
        Outcome::ProductCreated { name, product } => json!({
            "productName": name,
            "apiKey": product.api_key,
            "ownerId": product.owner,
        }),
        Outcome::KeyIssued { key } => json!({ "key": key }),
        Outcome::KeyClaimed => json!({ "message": "Key claimed" }),
        Outcome::Hwid(HwidValidation::Bound) => json!({
            "message": "Access granted",
            "bound": true,
        }),
        Outcome::Hwid(HwidValidation::Validated) => json!({
            "message": "Access granted",
            "bound": false,
        }),
        Outcome::HwidReset => json!({ "message": "HWID reset" }),
        Outcome::OwnerSet { product } => json!({ "productName": product }),
        Outcome::ProductFound { name, product } => json!({
            "productName": name,
            "product": product,
        }),
        Outcome::KeyRevoked => json!({ "message": "Key revoked" }),
    }
}
