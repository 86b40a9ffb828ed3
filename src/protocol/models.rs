//! Service request and response shapes.
//!
//! Requests arrive as flat key/value fields (`action`, `productName`,
//! `userId`, `key`, `hwid`, `apiKey`, `guildId`). Responses are
//! `{"status": "success", ...}` or `{"status": "error", "message": ...}`.

use crate::lifecycle::Action;
use crate::WhitelockError;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// An incoming service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    /// HTTP method; only `POST` is served.
    pub method: String,

    /// Flat request fields.
    pub fields: HashMap<String, String>,
}

impl ServiceRequest {
    /// A `POST` request with the given fields.
    pub fn post<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: "POST".to_string(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Build a request from an HTTP method and a JSON object body.
    ///
    /// String and number values are accepted (numeric user and guild ids
    /// are common); `null` fields are dropped.
    pub fn from_json(method: &str, body: &[u8]) -> Result<Self, WhitelockError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| WhitelockError::InvalidInput(format!("Body is not JSON: {}", e)))?;
        let Value::Object(object) = value else {
            return Err(WhitelockError::InvalidInput(
                "Body must be a JSON object".to_string(),
            ));
        };

        let mut fields = HashMap::with_capacity(object.len());
        for (name, value) in object {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Null => continue,
                _ => {
                    return Err(WhitelockError::InvalidInput(format!(
                        "{} must be a string",
                        name
                    )))
                }
            };
            fields.insert(name, text);
        }

        Ok(Self {
            method: method.to_ascii_uppercase(),
            fields,
        })
    }

    fn field(&self, name: &str) -> Result<String, WhitelockError> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| WhitelockError::InvalidInput(format!("{} is required", name)))
    }

    fn optional_field(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    /// Parse the `action` field and its arguments.
    pub fn action(&self) -> Result<Action, WhitelockError> {
        let action = self.field("action")?;
        let parsed = match action.as_str() {
            "createProduct" => Action::CreateProduct {
                name: self.field("productName")?,
                owner_id: self.optional_field("userId"),
            },
            "issueKey" => Action::IssueKey {
                product: self.field("productName")?,
                requester_id: self.field("userId")?,
            },
            "claimKey" => Action::ClaimKey {
                product: self.field("productName")?,
                key: self.field("key")?,
                user_id: self.field("userId")?,
            },
            "validateOrBindHwid" => Action::ValidateOrBindHwid {
                product: self.field("productName")?,
                key: self.field("key")?,
                hwid: self.field("hwid")?,
            },
            "resetHwid" => Action::ResetHwid {
                product: self.field("productName")?,
                key: self.field("key")?,
                requester_id: self.field("userId")?,
            },
            "setOwnerAndGroup" => Action::SetOwnerAndGroup {
                api_key: self.field("apiKey")?,
                user_id: self.field("userId")?,
                group_id: self.field("guildId")?,
            },
            "getProductByApiKey" => Action::GetProductByApiKey {
                api_key: self.field("apiKey")?,
            },
            "revokeKey" => Action::RevokeKey {
                product: self.field("productName")?,
                key: self.field("key")?,
                requester_id: self.field("userId")?,
            },
            other => {
                return Err(WhitelockError::InvalidInput(format!(
                    "Unknown action: {}",
                    other
                )))
            }
        };
        Ok(parsed)
    }
}

/// A response ready to hand to an HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    /// HTTP status code.
    pub status: u16,

    /// JSON body.
    pub body: Value,
}

impl ServiceResponse {
    /// `200` with `{"status": "success", ...payload}`.
    pub fn success(payload: Value) -> Self {
        let mut body = Map::new();
        body.insert("status".to_string(), json!("success"));
        if let Value::Object(fields) = payload {
            body.extend(fields);
        }
        Self {
            status: 200,
            body: Value::Object(body),
        }
    }

    /// `{"status": "error", "message": ...}` with the given status.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "status": "error", "message": message.into() }),
        }
    }

    /// Error response for a failed operation, status chosen by category.
    pub fn from_error(error: &WhitelockError) -> Self {
        Self::error(error.category().http_status(), error.to_string())
    }

    /// Whether this is a success response.
    pub fn is_success(&self) -> bool {
        self.body.get("status").and_then(Value::as_str) == Some("success")
    }

    /// Body serialized as JSON text.
    pub fn body_string(&self) -> String {
        self.body.to_string()
    }
}
