//! Key lifecycle: issue, claim, bind, reset, revoke.

pub mod action;
pub mod engine;
pub mod token;

pub use action::{Action, Outcome};
pub use engine::{Context, HwidValidation};
pub use token::{RandomTokens, TokenSource};
