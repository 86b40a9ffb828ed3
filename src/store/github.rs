//! GitHub contents API backend.
//!
//! The whitelist document is a single file in a repository. The blob SHA
//! returned by GitHub is the version token; `PUT` with a stale SHA is
//! rejected by GitHub with `409 Conflict`.

use crate::config::WhitelockConfig;
use crate::model::Document;
use crate::store::codec::{decode_document, encode_document, from_base64, to_base64};
use crate::store::{DocumentStore, Snapshot, VersionToken};
use crate::WhitelockError;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const GITHUB_API_VERSION: &str = "2022-11-28";

/// File entry returned by `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Deserialize)]
struct ContentsFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Body of `PUT /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Response of a successful contents `PUT`.
#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContentsFile,
}

#[derive(Debug, Deserialize)]
struct PutContentsFile {
    sha: String,
}

/// Whitelist document stored in a GitHub repository.
pub struct GitHubStore {
    client: Client,
    user_agent: String,
    contents_url: String,
    branch: String,
    token: String,
    app_name: String,
}

impl GitHubStore {
    /// Create a store from config.
    pub fn new(config: &WhitelockConfig) -> Result<Self, WhitelockError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WhitelockError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: build_user_agent(config),
            contents_url: contents_url(config),
            branch: config.store.branch.clone(),
            token: config.store.token.clone(),
            app_name: config.app_name.clone(),
        })
    }

    /// URL of the document on the contents API.
    pub fn contents_url(&self) -> &str {
        &self.contents_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/vnd.github+json")
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }
}

impl DocumentStore for GitHubStore {
    fn fetch(&self) -> Result<Snapshot, WhitelockError> {
        let response = self
            .authorized(self.client.get(&self.contents_url))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .map_err(|e| transport_error("fetch", e))?;

        let status = response.status().as_u16();
        match status {
            200 => {
                let file: ContentsFile = response.json().map_err(|e| {
                    WhitelockError::DocumentMalformed(format!("Unexpected contents response: {}", e))
                })?;
                debug!(sha = %file.sha, "Fetched whitelist document");
                parse_contents(file)
            }
            404 => {
                debug!("Whitelist document not found, starting empty");
                Ok(Snapshot {
                    document: Document::new(),
                    version: None,
                })
            }
            _ => Err(status_error("fetch", status, response)),
        }
    }

    fn commit(
        &self,
        document: &Document,
        expected: Option<&VersionToken>,
    ) -> Result<VersionToken, WhitelockError> {
        let body = PutContents {
            message: format!("{}: update whitelist", self.app_name),
            content: to_base64(&encode_document(document)?),
            branch: &self.branch,
            sha: expected.map(VersionToken::as_str),
        };

        let response = self
            .authorized(self.client.put(&self.contents_url))
            .json(&body)
            .send()
            .map_err(|e| transport_error("commit", e))?;

        let status = response.status().as_u16();
        match status {
            200 | 201 => {
                let created: PutContentsResponse = response.json().map_err(|e| {
                    WhitelockError::StoreUnavailable(format!("Unexpected commit response: {}", e))
                })?;
                Ok(VersionToken::new(created.content.sha))
            }
            409 => Err(WhitelockError::VersionConflict),
            // Creating without a SHA when the file already exists.
            422 if expected.is_none() => Err(WhitelockError::VersionConflict),
            _ => Err(status_error("commit", status, response)),
        }
    }
}

fn parse_contents(file: ContentsFile) -> Result<Snapshot, WhitelockError> {
    match file.encoding.as_deref() {
        Some("base64") | None => {}
        Some(other) => {
            // Files over 1 MB come back with encoding "none" and no content.
            return Err(WhitelockError::DocumentMalformed(format!(
                "Unsupported content encoding: {}",
                other
            )));
        }
    }
    let content = from_base64(&file.content)?;
    Ok(Snapshot {
        document: decode_document(&content)?,
        version: Some(VersionToken::new(file.sha)),
    })
}

fn transport_error(operation: &str, error: reqwest::Error) -> WhitelockError {
    warn!(operation, error = %error, "Store request failed");
    WhitelockError::StoreUnavailable(format!("{} request failed: {}", operation, error))
}

fn status_error(operation: &str, status: u16, response: Response) -> WhitelockError {
    let message = response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_default();
    warn!(operation, status, %message, "Store rejected request");
    match status {
        401 | 403 => WhitelockError::StoreUnavailable(format!(
            "{} not authorized ({}): {}",
            operation, status, message
        )),
        _ => WhitelockError::StoreUnavailable(format!(
            "{} failed with status {}: {}",
            operation, status, message
        )),
    }
}

/// Contents API URL for the configured document.
fn contents_url(config: &WhitelockConfig) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}",
        config.store.api_base.trim_end_matches('/'),
        config.store.owner,
        config.store.repo,
        config.store.path.trim_start_matches('/'),
    )
}

/// Build a User-Agent string from config.
///
/// Format: `<app>/whitelock-<version>`
pub fn build_user_agent(config: &WhitelockConfig) -> String {
    format!("{}/whitelock-{}", config.app_name, env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubStoreConfig;
    use crate::coordinator::RetryPolicy;
    use std::time::Duration;

    fn test_config() -> WhitelockConfig {
        WhitelockConfig {
            app_name: "license-bot".to_string(),
            store: GitHubStoreConfig {
                owner: "acme".to_string(),
                repo: "licenses".to_string(),
                path: "data/whitelist.json".to_string(),
                branch: "main".to_string(),
                token: "ghp_test".to_string(),
                api_base: "https://api.github.com/".to_string(),
            },
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_build_user_agent() {
        let ua = build_user_agent(&test_config());
        assert_eq!(ua, format!("license-bot/whitelock-{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_contents_url() {
        assert_eq!(
            contents_url(&test_config()),
            "https://api.github.com/repos/acme/licenses/contents/data/whitelist.json"
        );
    }

    #[test]
    fn test_store_creation() {
        let store = GitHubStore::new(&test_config()).unwrap();
        assert!(store.contents_url().ends_with("/contents/data/whitelist.json"));
    }

    #[test]
    fn test_parse_contents() {
        let file = ContentsFile {
            sha: "abc123".to_string(),
            content: to_base64("{\"P\": {\"ownerId\": \"o\", \"keys\": {}}}\n"),
            encoding: Some("base64".to_string()),
        };

        let snapshot = parse_contents(file).unwrap();
        assert_eq!(snapshot.version, Some(VersionToken::new("abc123")));
        assert!(snapshot.document.product("P").unwrap().owner.is_held_by("o"));
    }

    #[test]
    fn test_parse_contents_too_large() {
        let file = ContentsFile {
            sha: "abc123".to_string(),
            content: String::new(),
            encoding: Some("none".to_string()),
        };
        assert!(matches!(
            parse_contents(file),
            Err(WhitelockError::DocumentMalformed(_))
        ));
    }

    #[test]
    fn test_put_body_omits_missing_sha() {
        let body = PutContents {
            message: "m".to_string(),
            content: "e30K".to_string(),
            branch: "main",
            sha: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("sha").is_none());
        assert_eq!(value["branch"], "main");
    }
}
