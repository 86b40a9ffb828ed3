//! Whitelock error types.

use thiserror::Error;

/// Business-rule rejections produced by pure document mutations.
///
/// Rejections are deterministic: recomputing the same mutation against the
/// same document always yields the same rejection, so they are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// No product with this name exists.
    #[error("Product not found: {product}")]
    ProductNotFound {
        /// The product name that was looked up.
        product: String,
    },

    /// The key token is not issued for this product.
    #[error("Key not found")]
    KeyNotFound,

    /// A product with this name already exists.
    #[error("Product already exists: {product}")]
    AlreadyExists {
        /// The product name that is taken.
        product: String,
    },

    /// The key already has a claimant.
    #[error("Key already claimed")]
    AlreadyClaimed,

    /// The key has no claimant yet, so no HWID can be bound or reset.
    #[error("Key has not been claimed")]
    NotClaimed,

    /// The presented HWID differs from the bound HWID.
    #[error("HWID mismatch")]
    HwidMismatch,

    /// The requester is not the product owner.
    #[error("Requester is not the product owner")]
    NotOwner,

    /// The requester is not the key's claimant.
    #[error("Requester is not the key claimant")]
    NotClaimant,

    /// No product carries this API key.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The product already has an owner.
    #[error("Product owner already set")]
    OwnerAlreadySet,

    /// Token generation kept colliding with existing tokens.
    #[error("Could not generate a unique token after {attempts} attempts")]
    TokenCollision {
        /// How many candidates were generated.
        attempts: u32,
    },
}

/// Errors that can occur while operating on the whitelist.
#[derive(Debug, Error)]
pub enum WhitelockError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A request field is missing or malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport or authentication failure talking to the backing store.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The stored document could not be decoded.
    #[error("Document malformed: {0}")]
    DocumentMalformed(String),

    /// The expected version no longer matches the store (another writer won).
    #[error("Version conflict")]
    VersionConflict,

    /// Every commit attempt lost a version race.
    #[error("Gave up after {attempts} conflicting commit attempts")]
    ConcurrencyExhausted {
        /// Number of commit attempts made.
        attempts: u32,
    },

    /// A business rule rejected the operation.
    #[error(transparent)]
    Rejected(#[from] Rejection),
}

/// Rejection category, used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed fields.
    Input,
    /// Wrong owner, claimant, API key or HWID.
    Authorization,
    /// Unknown product or key.
    NotFound,
    /// Business state forbids the transition.
    StateConflict,
    /// Optimistic concurrency retries ran out.
    Concurrency,
    /// Backing store or internal failure.
    Store,
}

impl ErrorCategory {
    /// HTTP status code for this category.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCategory::Input => 400,
            ErrorCategory::Authorization => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::StateConflict | ErrorCategory::Concurrency => 409,
            ErrorCategory::Store => 500,
        }
    }
}

impl Rejection {
    /// Category of this rejection.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Rejection::ProductNotFound { .. } | Rejection::KeyNotFound => ErrorCategory::NotFound,
            Rejection::NotOwner
            | Rejection::NotClaimant
            | Rejection::InvalidApiKey
            | Rejection::HwidMismatch => ErrorCategory::Authorization,
            Rejection::AlreadyExists { .. }
            | Rejection::AlreadyClaimed
            | Rejection::NotClaimed
            | Rejection::OwnerAlreadySet => ErrorCategory::StateConflict,
            Rejection::TokenCollision { .. } => ErrorCategory::Store,
        }
    }
}

impl WhitelockError {
    /// Category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            WhitelockError::InvalidInput(_) => ErrorCategory::Input,
            WhitelockError::Rejected(rejection) => rejection.category(),
            WhitelockError::VersionConflict | WhitelockError::ConcurrencyExhausted { .. } => {
                ErrorCategory::Concurrency
            }
            WhitelockError::ConfigError(_)
            | WhitelockError::StoreUnavailable(_)
            | WhitelockError::DocumentMalformed(_) => ErrorCategory::Store,
        }
    }

    /// The business rejection, if this error is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            WhitelockError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}
