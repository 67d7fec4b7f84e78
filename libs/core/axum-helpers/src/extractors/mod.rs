//! Custom extractors for Axum handlers.

pub mod client;
pub mod validated_json;

pub use client::ClientContext;
pub use validated_json::ValidatedJson;
