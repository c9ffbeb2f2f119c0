//! Authenticated HTTP client for the shared memory/task backend.
//!
//! Owns the token lifecycle: tokens are acquired lazily on the first call,
//! cached with their expiry, and refreshed once the expiry passes. Every
//! operation goes through [`BackendClient::authenticate`] first, which is a
//! no-op while the cached session is still valid.

mod client;

pub use client::{AuthSession, BackendClient, SearchRequest};
