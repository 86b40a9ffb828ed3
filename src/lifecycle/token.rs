//! Random opaque tokens for keys and product API keys.

use crate::errors::Rejection;
use crate::model::Document;
use rand::rngs::OsRng;
use rand::Rng;

/// Characters used in tokens. No `0/O`, `1/I/L` lookalikes.
pub const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Length of a key token.
pub const KEY_TOKEN_LEN: usize = 20;

/// Length of a product API key.
pub const API_KEY_LEN: usize = 32;

/// Candidates tried before giving up on a unique token.
pub const MAX_TOKEN_ATTEMPTS: u32 = 8;

/// Source of candidate tokens.
pub trait TokenSource: Send + Sync {
    /// Produce a candidate token of `len` characters.
    fn generate(&self, len: usize) -> String;
}

/// Tokens drawn from the operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn generate(&self, len: usize) -> String {
        let mut rng = OsRng;
        (0..len)
            .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
            .collect()
    }
}

/// Generate a token of `len` characters not yet used anywhere in `document`.
///
/// A collision means either a broken source or an exhausted space, so the
/// candidate is regenerated and the whole attempt is capped.
pub fn generate_unique(
    source: &dyn TokenSource,
    document: &Document,
    len: usize,
) -> Result<String, Rejection> {
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let candidate = source.generate(len);
        if !document.token_in_use(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Rejection::TokenCollision {
        attempts: MAX_TOKEN_ATTEMPTS,
    })
}
