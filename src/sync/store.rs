//! In-memory cache store shared by every query observer.
//!
//! Values are stored as serialized JSON and re-typed on read; a value that
//! no longer deserializes degrades to a cache miss. Entries are replaced
//! wholesale under the lock, so a reader always observes either the
//! previous complete entry or the new one, never a partial write.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::inventory::ApiError;

#[derive(Debug, Clone)]
struct Entry {
  data: Value,
  cached_at: DateTime<Utc>,
  stale: bool,
}

/// A successfully read cache entry.
#[derive(Debug, Clone)]
pub struct CachedValue<T> {
  pub data: T,
  pub cached_at: DateTime<Utc>,
  /// Explicitly invalidated, or older than the caller's staleness window.
  pub is_stale: bool,
}

/// Process-wide query cache. Only the synchronization layer writes to it;
/// inject a fresh store per test for isolation.
#[derive(Debug, Default)]
pub struct QueryCache {
  entries: RwLock<HashMap<String, Entry>>,
  errors: RwLock<HashMap<String, ApiError>>,
}

impl QueryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Read the entry for `key`, applying an optional age-based staleness
  /// window on top of explicit invalidation.
  pub fn get<T: DeserializeOwned>(
    &self,
    key: &str,
    stale_after: Option<Duration>,
  ) -> Option<CachedValue<T>> {
    let entries = self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner);
    let entry = entries.get(key)?;

    let aged = stale_after
      .map(|window| Utc::now() - entry.cached_at > window)
      .unwrap_or(false);
    let data = serde_json::from_value(entry.data.clone()).ok()?;

    Some(CachedValue {
      data,
      cached_at: entry.cached_at,
      is_stale: entry.stale || aged,
    })
  }

  /// Store a fresh value for `key`, clearing any recorded failure.
  pub fn put_value(&self, key: &str, data: Value) {
    let mut entries = self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    entries.insert(
      key.to_string(),
      Entry {
        data,
        cached_at: Utc::now(),
        stale: false,
      },
    );
    drop(entries);

    self
      .errors
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(key);
  }

  /// Mark `key` stale so its next observation revalidates. The value stays
  /// available for stale-while-revalidate reads.
  pub fn mark_stale(&self, key: &str) {
    let mut entries = self
      .entries
      .write()
      .unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = entries.get_mut(key) {
      entry.stale = true;
    }
  }

  /// Record the most recent failed attempt for `key`.
  pub fn record_error(&self, key: &str, error: ApiError) {
    self
      .errors
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.to_string(), error);
  }

  pub fn last_error(&self, key: &str) -> Option<ApiError> {
    self
      .errors
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  #[allow(dead_code)]
  pub fn contains(&self, key: &str) -> bool {
    self
      .entries
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn round_trips_typed_values() {
    let cache = QueryCache::new();
    cache.put_value("k", json!({"answer": 42}));

    let read = cache
      .get::<serde_json::Map<String, Value>>("k", None)
      .unwrap();
    assert_eq!(read.data["answer"], 42);
    assert!(!read.is_stale);
    assert!(cache.contains("k"));
    assert!(!cache.contains("other"));
  }

  #[test]
  fn shape_mismatch_degrades_to_a_miss() {
    let cache = QueryCache::new();
    cache.put_value("k", json!("not a number"));
    assert!(cache.get::<u64>("k", None).is_none());
  }

  #[test]
  fn mark_stale_flags_without_discarding() {
    let cache = QueryCache::new();
    cache.put_value("k", json!([1, 2, 3]));
    cache.mark_stale("k");

    let read = cache.get::<Vec<u64>>("k", None).unwrap();
    assert!(read.is_stale);
    assert_eq!(read.data, vec![1, 2, 3]);

    // Marking an absent key is a no-op
    cache.mark_stale("missing");
    assert!(!cache.contains("missing"));
  }

  #[test]
  fn zero_age_window_means_always_stale() {
    let cache = QueryCache::new();
    cache.put_value("k", json!(1));

    assert!(cache.get::<u64>("k", Some(Duration::zero())).unwrap().is_stale);
    assert!(!cache.get::<u64>("k", Some(Duration::hours(1))).unwrap().is_stale);
  }

  #[test]
  fn errors_are_kept_per_key_until_the_next_success() {
    let cache = QueryCache::new();
    cache.record_error(
      "k",
      ApiError::Network("connection refused".to_string()),
    );
    assert!(cache.last_error("k").is_some());
    assert!(cache.last_error("other").is_none());

    cache.put_value("k", json!(1));
    assert!(cache.last_error("k").is_none());
  }
}
