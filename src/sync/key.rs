//! Cache keys for inventory queries.

use sha2::{Digest, Sha256};

/// Identifies a cacheable read: operation kind plus parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// The full item list
  Items,
  /// A single item by id
  Item { id: String },
}

impl QueryKey {
  pub fn item(id: impl Into<String>) -> Self {
    QueryKey::Item { id: id.into() }
  }

  /// Stable fixed-length key for the cache table.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      Self::Items => "items".to_string(),
      Self::Item { id } => format!("item:{}", id.trim()),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable form for logs.
  pub fn description(&self) -> String {
    match self {
      Self::Items => "all items".to_string(),
      Self::Item { id } => format!("item {}", id),
    }
  }
}
