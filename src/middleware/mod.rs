//! Middleware for the financing API

mod tracing;

pub use tracing::request_tracing;
