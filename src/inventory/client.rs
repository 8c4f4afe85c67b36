//! HTTP transport for the inventory service.
//!
//! Five logical operations against a fixed base origin. No retries and no
//! local state; callers own diffing and cache policy.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::multipart;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;

use super::error::{ApiError, ApiResult};
use super::types::{ImageAttachment, Item, ItemPatch, NewItem};

/// The operations the synchronization layer needs from a remote item store.
///
/// `InventoryClient` is the production implementation; tests substitute an
/// in-memory fake.
#[async_trait]
pub trait ItemTransport: Send + Sync + 'static {
  async fn list_items(&self) -> ApiResult<Vec<Item>>;

  async fn get_item(&self, id: &str) -> ApiResult<Item>;

  async fn create_item(&self, fields: NewItem, image: Option<ImageAttachment>) -> ApiResult<Item>;

  /// PATCH with only the populated fields of `patch`. The caller computes
  /// the diff; the transport does not.
  async fn update_item(
    &self,
    id: &str,
    patch: ItemPatch,
    image: Option<ImageAttachment>,
  ) -> ApiResult<Item>;

  /// Deleting an already-deleted id surfaces `NotFound`; callers decide
  /// whether that counts as success.
  async fn delete_item(&self, id: &str) -> ApiResult<()>;
}

/// Multipart payload for create/update: structured text fields plus zero or
/// one binary image part.
#[derive(Debug, Clone, Default)]
pub struct ItemForm {
  fields: Vec<(&'static str, String)>,
  image: Option<ImageAttachment>,
}

impl ItemForm {
  /// All four fields, for a create request.
  pub fn from_new(item: &NewItem) -> Self {
    ItemForm {
      fields: vec![
        ("name", item.name.clone()),
        ("price", item.price.to_string()),
        ("category", item.category.clone()),
        ("selector", item.selector.to_string()),
      ],
      image: None,
    }
  }

  /// Only the populated fields, for an update request.
  pub fn from_patch(patch: &ItemPatch) -> Self {
    let mut fields = Vec::new();
    if let Some(name) = &patch.name {
      fields.push(("name", name.clone()));
    }
    if let Some(price) = patch.price {
      fields.push(("price", price.to_string()));
    }
    if let Some(category) = &patch.category {
      fields.push(("category", category.clone()));
    }
    if let Some(selector) = patch.selector {
      fields.push(("selector", selector.to_string()));
    }
    ItemForm {
      fields,
      image: None,
    }
  }

  pub fn with_image(mut self, image: Option<ImageAttachment>) -> Self {
    self.image = image;
    self
  }

  #[allow(dead_code)]
  pub fn fields(&self) -> &[(&'static str, String)] {
    &self.fields
  }

  #[allow(dead_code)]
  pub fn has_image(&self) -> bool {
    self.image.is_some()
  }

  fn into_multipart(self) -> ApiResult<multipart::Form> {
    let mut form = multipart::Form::new();
    for (name, value) in self.fields {
      form = form.text(name, value);
    }
    if let Some(image) = self.image {
      let part = multipart::Part::bytes(image.bytes)
        .file_name(image.file_name)
        .mime_str(&image.content_type)
        .map_err(|e| ApiError::Validation {
          message: format!("invalid image content type: {}", e),
        })?;
      form = form.part("image", part);
    }
    Ok(form)
  }
}

/// Inventory service client.
#[derive(Debug, Clone)]
pub struct InventoryClient {
  http: reqwest::Client,
  base_url: String,
  origin: Url,
}

impl InventoryClient {
  pub fn new(config: &Config) -> Result<Self> {
    let base_url = config.service.base_url.trim_end_matches('/').to_string();

    let mut origin = Url::parse(&base_url)
      .map_err(|e| eyre!("Invalid service base URL {}: {}", base_url, e))?;
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.service.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      origin,
    })
  }

  /// Resolve an item's server-relative image path against the service
  /// origin (the API base prefix does not apply to assets).
  pub fn image_url(&self, item: &Item) -> Option<Url> {
    if item.image.is_empty() {
      return None;
    }
    self.origin.join(&item.image).ok()
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn parse_json<T: DeserializeOwned>(
    &self,
    response: reqwest::Response,
    resource: &str,
  ) -> ApiResult<T> {
    let status = response.status();
    if status.is_success() {
      let bytes = response.bytes().await?;
      serde_json::from_slice(&bytes).map_err(|e| ApiError::bad_body(status, e))
    } else {
      let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
      Err(ApiError::from_status(status, resource, body))
    }
  }
}

#[async_trait]
impl ItemTransport for InventoryClient {
  async fn list_items(&self) -> ApiResult<Vec<Item>> {
    let response = self.http.get(self.url("/items")).send().await?;
    self.parse_json(response, "items").await
  }

  async fn get_item(&self, id: &str) -> ApiResult<Item> {
    let response = self
      .http
      .get(self.url(&format!("/items/{}", id)))
      .send()
      .await?;
    self.parse_json(response, &format!("item {}", id)).await
  }

  async fn create_item(&self, fields: NewItem, image: Option<ImageAttachment>) -> ApiResult<Item> {
    debug!(name = %fields.name, has_image = image.is_some(), "POST /items");
    let form = ItemForm::from_new(&fields).with_image(image).into_multipart()?;
    let response = self
      .http
      .post(self.url("/items"))
      .multipart(form)
      .send()
      .await?;
    self.parse_json(response, "items").await
  }

  async fn update_item(
    &self,
    id: &str,
    patch: ItemPatch,
    image: Option<ImageAttachment>,
  ) -> ApiResult<Item> {
    debug!(id, has_image = image.is_some(), "PATCH /items/{{id}}");
    let form = ItemForm::from_patch(&patch)
      .with_image(image)
      .into_multipart()?;
    let response = self
      .http
      .patch(self.url(&format!("/items/{}", id)))
      .multipart(form)
      .send()
      .await?;
    self.parse_json(response, &format!("item {}", id)).await
  }

  async fn delete_item(&self, id: &str) -> ApiResult<()> {
    debug!(id, "DELETE /items/{{id}}");
    let response = self
      .http
      .delete(self.url(&format!("/items/{}", id)))
      .send()
      .await?;

    let status = response.status();
    if status.is_success() {
      Ok(())
    } else {
      let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
      Err(ApiError::from_status(status, &format!("item {}", id), body))
    }
  }
}
