//! Document serialization and content versioning.
//!
//! The persisted form is pretty-printed UTF-8 JSON with a trailing newline.
//! GitHub transports it base64-encoded and wrapped at 60 columns, so decoding
//! ignores embedded whitespace.

use crate::model::Document;
use crate::store::VersionToken;
use crate::WhitelockError;
use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};

/// Serialize a document to its persisted JSON form.
pub fn encode_document(document: &Document) -> Result<String, WhitelockError> {
    let mut json = serde_json::to_string_pretty(document)
        .map_err(|e| WhitelockError::DocumentMalformed(format!("Failed to serialize: {}", e)))?;
    json.push('\n');
    Ok(json)
}

/// Parse a persisted document. Blank content is an empty whitelist.
pub fn decode_document(content: &str) -> Result<Document, WhitelockError> {
    if content.trim().is_empty() {
        return Ok(Document::new());
    }
    serde_json::from_str(content)
        .map_err(|e| WhitelockError::DocumentMalformed(format!("Failed to parse: {}", e)))
}

/// Base64-encode persisted content for transport.
pub fn to_base64(content: &str) -> String {
    STANDARD.encode(content.as_bytes())
}

/// Decode base64 transport content, tolerating line wrapping.
pub fn from_base64(encoded: &str) -> Result<String, WhitelockError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| WhitelockError::DocumentMalformed(format!("Invalid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| WhitelockError::DocumentMalformed(format!("Invalid UTF-8: {}", e)))
}

/// Content-addressed version: SHA-256 of the persisted bytes, hex-encoded.
pub fn content_version(content: &[u8]) -> VersionToken {
    VersionToken::new(hex::encode(Sha256::digest(content)))
}
