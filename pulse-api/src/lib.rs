//! Pulse API - HTTP client for the Pulse server REST API.
//!
//! This crate covers the REST boundary the real-time client depends on:
//! logging in to obtain the bearer token used for the socket handshake,
//! attaching `Authorization: Bearer` to requests, parsing the server's
//! `{code, msg, data}` response envelope, and checking server health.
//! Dashboard business endpoints (stats, content, reports) are out of scope.

pub mod client;
pub mod endpoints;
pub mod response;

// Re-export key types
pub use client::ApiClient;
pub use response::ApiResponse;
