//! Authorization policy.

pub mod access;
