//! Cache-aware read accessors and write triggers over an item transport.
//!
//! Reads are queries: keyed, de-duplicated while in flight, and served
//! stale-while-revalidate once a value exists. Writes are mutations: they
//! go straight to the transport and, on success, invalidate the affected
//! keys so the next observation refetches authoritative server state.
//! Nothing here retries; failures surface to the caller untouched.

use chrono::Duration;
use futures::future::join_all;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use crate::inventory::{
  ApiError, ApiResult, ImageAttachment, Item, ItemPatch, ItemTransport, NewItem,
};

use super::key::QueryKey;
use super::store::QueryCache;

type FlightResult = Result<Value, ApiError>;

/// An in-flight fetch for one cache key. Observers of the same key clone
/// the receiver instead of issuing a second request.
struct Flight {
  id: u64,
  rx: watch::Receiver<Option<FlightResult>>,
}

/// What a query observation reports.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
  /// Last successfully cached value; possibly stale while a refresh is in
  /// flight.
  pub data: Option<T>,
  /// True only while no cached value exists yet.
  pub is_loading: bool,
  /// Most recent failed attempt for this key, if any.
  pub error: Option<ApiError>,
}

impl<T> QueryResult<T> {
  #[allow(dead_code)]
  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }
}

/// Synchronization layer between callers and the remote item store.
pub struct SyncClient<T: ItemTransport> {
  transport: Arc<T>,
  cache: Arc<QueryCache>,
  flights: Arc<Mutex<HashMap<String, Flight>>>,
  next_flight: Arc<AtomicU64>,
  stale_after: Option<Duration>,
}

impl<T: ItemTransport> SyncClient<T> {
  pub fn new(transport: T) -> Self {
    Self::with_cache(transport, Arc::new(QueryCache::new()))
  }

  /// Use an existing cache store. Tests get isolation by injecting a fresh
  /// store per case.
  pub fn with_cache(transport: T, cache: Arc<QueryCache>) -> Self {
    Self {
      transport: Arc::new(transport),
      cache,
      flights: Arc::new(Mutex::new(HashMap::new())),
      next_flight: Arc::new(AtomicU64::new(1)),
      stale_after: None,
    }
  }

  /// Revalidate entries older than `stale_after` on their next
  /// observation. Without this, entries only go stale by invalidation.
  pub fn with_stale_time(mut self, stale_after: Duration) -> Self {
    self.stale_after = Some(stale_after);
    self
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  // ---- queries ----

  /// Observe the full item list. Cache key: `["items"]`.
  pub async fn items(&self) -> QueryResult<Vec<Item>> {
    self.query(QueryKey::Items).await
  }

  /// Observe a single item. Cache key: `["item", id]`.
  pub async fn item(&self, id: &str) -> QueryResult<Item> {
    self.query(QueryKey::item(id)).await
  }

  /// Current state of a key without triggering a fetch.
  #[allow(dead_code)]
  pub fn peek<R: DeserializeOwned>(&self, key: &QueryKey) -> QueryResult<R> {
    let hash = key.cache_hash();
    let cached = self.cache.get::<R>(&hash, self.stale_after);
    let in_flight = self
      .flights
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains_key(&hash);

    QueryResult {
      is_loading: cached.is_none() && in_flight,
      data: cached.map(|c| c.data),
      error: self.cache.last_error(&hash),
    }
  }

  async fn query<R>(&self, key: QueryKey) -> QueryResult<R>
  where
    R: DeserializeOwned,
  {
    let hash = key.cache_hash();

    if let Some(cached) = self.cache.get::<R>(&hash, self.stale_after) {
      if cached.is_stale {
        debug!(
          key = %key.description(),
          cached_at = %cached.cached_at,
          "serving stale value, revalidating"
        );
        self.ensure_flight(&key, &hash);
      }
      return QueryResult {
        data: Some(cached.data),
        is_loading: false,
        error: self.cache.last_error(&hash),
      };
    }

    // No cached value yet: join any in-flight fetch for this key or start
    // one, then suspend until it settles.
    let mut rx = self.ensure_flight(&key, &hash);
    let outcome = match rx.wait_for(|result| result.is_some()).await {
      Ok(guard) => (*guard).clone(),
      Err(_) => None,
    };

    match outcome {
      Some(Ok(value)) => match serde_json::from_value::<R>(value) {
        Ok(data) => QueryResult {
          data: Some(data),
          is_loading: false,
          error: None,
        },
        Err(e) => QueryResult {
          data: None,
          is_loading: false,
          error: Some(ApiError::bad_body(StatusCode::OK, e)),
        },
      },
      Some(Err(error)) => QueryResult {
        data: None,
        is_loading: false,
        error: Some(error),
      },
      // Sender dropped without a result
      None => QueryResult {
        data: None,
        is_loading: false,
        error: Some(ApiError::Network("query was cancelled".to_string())),
      },
    }
  }

  /// Register a fetch for `key` unless one is already in flight, and hand
  /// back a receiver for its completion.
  fn ensure_flight(&self, key: &QueryKey, hash: &str) -> watch::Receiver<Option<FlightResult>> {
    let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(flight) = flights.get(hash) {
      return flight.rx.clone();
    }

    let (tx, rx) = watch::channel(None);
    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
    flights.insert(
      hash.to_string(),
      Flight {
        id,
        rx: rx.clone(),
      },
    );
    drop(flights);

    let transport = Arc::clone(&self.transport);
    let cache = Arc::clone(&self.cache);
    let flights = Arc::clone(&self.flights);
    let key = key.clone();
    let hash = hash.to_string();

    tokio::spawn(async move {
      let result = fetch_value(transport, &key).await;

      // Commit only while this fetch is still the registered flight for
      // the key. A cancelled or invalidated-over fetch must not write the
      // cache; its result only reaches waiters already holding a receiver.
      let mut registry = flights.lock().unwrap_or_else(PoisonError::into_inner);
      if registry.get(&hash).map(|flight| flight.id) == Some(id) {
        registry.remove(&hash);
        match &result {
          Ok(value) => cache.put_value(&hash, value.clone()),
          Err(error) => cache.record_error(&hash, error.clone()),
        }
      } else {
        debug!(key = %key.description(), "discarding result of superseded fetch");
      }
      drop(registry);

      let _ = tx.send(Some(result));
    });

    rx
  }

  // ---- mutations ----

  /// Create an item. Invalidates `["items"]` on success.
  pub async fn create(
    &self,
    fields: NewItem,
    image: Option<ImageAttachment>,
  ) -> ApiResult<Item> {
    let item = self.transport.create_item(fields, image).await?;
    self.invalidate(&QueryKey::Items);
    Ok(item)
  }

  /// Apply a changed-fields patch. Invalidates `["items"]` and
  /// `["item", id]` on success.
  pub async fn update(
    &self,
    id: &str,
    patch: ItemPatch,
    image: Option<ImageAttachment>,
  ) -> ApiResult<Item> {
    let item = self.transport.update_item(id, patch, image).await?;
    self.invalidate(&QueryKey::Items);
    self.invalidate(&QueryKey::item(id));
    Ok(item)
  }

  /// Delete an item. An already-deleted id counts as success; either way
  /// the affected keys are invalidated.
  pub async fn delete(&self, id: &str) -> ApiResult<()> {
    match self.transport.delete_item(id).await {
      Ok(()) => {}
      Err(error) if error.is_not_found() => {
        debug!(id, "delete of a missing item counts as already done");
      }
      Err(error) => return Err(error),
    }
    self.invalidate(&QueryKey::Items);
    self.invalidate(&QueryKey::item(id));
    Ok(())
  }

  // ---- cache control ----

  /// Mark a key stale and deregister any in-flight fetch for it, so a
  /// response that raced the invalidation cannot land as fresh.
  pub fn invalidate(&self, key: &QueryKey) {
    let hash = key.cache_hash();
    self
      .flights
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&hash);
    self.cache.mark_stale(&hash);
    debug!(key = %key.description(), "invalidated");
  }

  /// Abandon an in-flight fetch for `key`. Its late result still reaches
  /// waiters already suspended on it but is never written into the cache.
  pub fn cancel(&self, key: &QueryKey) {
    let hash = key.cache_hash();
    let removed = self
      .flights
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&hash);
    if removed.is_some() {
      debug!(key = %key.description(), "cancelled in-flight query");
    }
  }

  /// Wait until every fetch in flight at the time of the call has settled.
  pub async fn settle(&self) {
    let receivers: Vec<_> = self
      .flights
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .map(|flight| flight.rx.clone())
      .collect();

    join_all(receivers.into_iter().map(|mut rx| async move {
      let _ = rx.wait_for(|result| result.is_some()).await;
    }))
    .await;
  }
}

impl<T: ItemTransport> Clone for SyncClient<T> {
  fn clone(&self) -> Self {
    Self {
      transport: Arc::clone(&self.transport),
      cache: Arc::clone(&self.cache),
      flights: Arc::clone(&self.flights),
      next_flight: Arc::clone(&self.next_flight),
      stale_after: self.stale_after,
    }
  }
}

async fn fetch_value<T: ItemTransport>(transport: Arc<T>, key: &QueryKey) -> FlightResult {
  match key {
    QueryKey::Items => transport.list_items().await.and_then(encode),
    QueryKey::Item { id } => transport.get_item(id).await.and_then(encode),
  }
}

fn encode<S: Serialize>(value: S) -> FlightResult {
  serde_json::to_value(value).map_err(|e| ApiError::bad_body(StatusCode::OK, e))
}
