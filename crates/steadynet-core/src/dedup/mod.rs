//! Request deduplication with a short-lived result cache.
//!
//! At most one underlying call per key is in flight at any time; concurrent
//! callers for the same key share its outcome. Successful results are served
//! from cache while younger than the caller's TTL; failures are never cached.

mod cache;
mod entry;
mod error;

pub use cache::DedupCache;
pub use error::DedupError;
