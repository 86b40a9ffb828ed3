//! Service surface: flat requests in, `{status, ...}` responses out.

pub mod handler;
pub mod models;

pub use handler::handle;
pub use models::{ServiceRequest, ServiceResponse};
