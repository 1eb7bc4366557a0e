//! Upstream access plumbing: request identity, caching, retry, coalescing,
//! HTTP transport and JSON:API document decoding.
//!
//! - [`fingerprint`]: canonical request keys.
//! - [`cache`]: per-kind TTL + LRU response cache.
//! - [`retry`]: exponential backoff over transient failures.
//! - [`coalesce`]: single-flight sharing of identical in-flight calls.
//! - [`transport`]: the HTTP seam and its reqwest implementation.
//! - [`jsonapi`]: document structure and relationship helpers.

pub mod cache;
pub mod coalesce;
pub mod fingerprint;
pub mod jsonapi;
pub mod retry;
pub mod transport;
