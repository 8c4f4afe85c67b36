//! Synchronization layer between the UI-facing caller and the remote item
//! store.
//!
//! Reads go through a process-wide query cache keyed by operation and
//! parameters; writes invalidate the affected keys so the next observation
//! refetches authoritative server state. Re-fetching after writes is chosen
//! over patching the cache in place: one extra round trip per successful
//! write buys never having to reconcile partial client-side deltas.

mod client;
mod key;
mod store;

pub use client::{QueryResult, SyncClient};
pub use key::QueryKey;
pub use store::QueryCache;
