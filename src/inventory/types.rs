//! Domain types for the inventory service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A single inventory item as the service stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  /// Server-assigned, immutable after creation.
  pub id: String,
  pub name: String,
  #[serde(deserialize_with = "deserialize_price")]
  pub price: f64,
  pub category: String,
  pub selector: Selector,
  /// Server-relative path to the image asset, e.g. `/uploads/drill.png`.
  #[serde(default)]
  pub image: String,
}

/// Whether an item is stocked to be sold or to be used in-house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
  #[serde(rename = "for sale")]
  ForSale,
  #[serde(rename = "for use")]
  ForUse,
}

impl Selector {
  pub fn as_str(&self) -> &'static str {
    match self {
      Selector::ForSale => "for sale",
      Selector::ForUse => "for use",
    }
  }
}

impl fmt::Display for Selector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Selector {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "for sale" => Ok(Selector::ForSale),
      "for use" => Ok(Selector::ForUse),
      other => Err(format!(
        "selector must be either \"for sale\" or \"for use\", got \"{}\"",
        other
      )),
    }
  }
}

/// Fields for a create request. The server assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
  pub name: String,
  pub price: f64,
  pub category: String,
  pub selector: Selector,
}

/// Changed-fields subset for an update request.
///
/// The transport serializes exactly the populated fields; the diff against
/// the last-fetched item is always computed here, never ad hoc at call
/// sites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
  pub name: Option<String>,
  pub price: Option<f64>,
  pub category: Option<String>,
  pub selector: Option<Selector>,
}

impl ItemPatch {
  /// Compute the fields of `desired` that differ from `current`.
  pub fn diff(current: &Item, desired: &NewItem) -> Self {
    ItemPatch {
      name: (desired.name != current.name).then(|| desired.name.clone()),
      price: (desired.price != current.price).then_some(desired.price),
      category: (desired.category != current.category).then(|| desired.category.clone()),
      selector: (desired.selector != current.selector).then_some(desired.selector),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none() && self.price.is_none() && self.category.is_none() && self.selector.is_none()
  }
}

/// An optional binary part for create/update requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
  pub file_name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl ImageAttachment {
  /// Read an attachment from disk, guessing the content type from the
  /// file extension.
  pub fn from_path(path: &Path) -> std::io::Result<Self> {
    let bytes = std::fs::read(path)?;
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "image".to_string());
    let ext = path
      .extension()
      .map(|e| e.to_string_lossy().to_lowercase())
      .unwrap_or_default();

    Ok(ImageAttachment {
      file_name,
      content_type: content_type_for(&ext).to_string(),
      bytes,
    })
  }
}

fn content_type_for(ext: &str) -> &'static str {
  match ext {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => "application/octet-stream",
  }
}

/// Accept a JSON number or a numeric string. Multipart servers receive all
/// form fields as text and some echo them back unconverted.
fn deserialize_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
  D: serde::Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum PriceRepr {
    Number(f64),
    Text(String),
  }

  match PriceRepr::deserialize(deserializer)? {
    PriceRepr::Number(n) => Ok(n),
    PriceRepr::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_item() -> Item {
    Item {
      id: "66f2".to_string(),
      name: "Drill".to_string(),
      price: 25.0,
      category: "Tools".to_string(),
      selector: Selector::ForSale,
      image: "/uploads/drill.png".to_string(),
    }
  }

  #[test]
  fn selector_serializes_with_spaces() {
    let json = serde_json::to_string(&Selector::ForSale).unwrap();
    assert_eq!(json, "\"for sale\"");
    let back: Selector = serde_json::from_str("\"for use\"").unwrap();
    assert_eq!(back, Selector::ForUse);
  }

  #[test]
  fn selector_parses_from_cli_text() {
    assert_eq!("for sale".parse::<Selector>().unwrap(), Selector::ForSale);
    assert_eq!("For Use".parse::<Selector>().unwrap(), Selector::ForUse);
    assert!("on loan".parse::<Selector>().is_err());
  }

  #[test]
  fn item_decodes_price_from_number_or_text() {
    let numeric: Item = serde_json::from_str(
      r#"{"id":"1","name":"Drill","price":25,"category":"Tools","selector":"for sale","image":"/uploads/d.png"}"#,
    )
    .unwrap();
    assert_eq!(numeric.price, 25.0);

    let text: Item = serde_json::from_str(
      r#"{"id":"1","name":"Drill","price":"19.5","category":"Tools","selector":"for sale"}"#,
    )
    .unwrap();
    assert_eq!(text.price, 19.5);
    assert_eq!(text.image, "");
  }

  #[test]
  fn diff_picks_only_changed_fields() {
    let current = sample_item();
    let desired = NewItem {
      name: current.name.clone(),
      price: 50.0,
      category: current.category.clone(),
      selector: Selector::ForUse,
    };

    let patch = ItemPatch::diff(&current, &desired);
    assert_eq!(patch.name, None);
    assert_eq!(patch.price, Some(50.0));
    assert_eq!(patch.category, None);
    assert_eq!(patch.selector, Some(Selector::ForUse));
  }

  #[test]
  fn diff_of_identical_fields_is_empty() {
    let current = sample_item();
    let desired = NewItem {
      name: current.name.clone(),
      price: current.price,
      category: current.category.clone(),
      selector: current.selector,
    };

    assert!(ItemPatch::diff(&current, &desired).is_empty());
    assert!(!ItemPatch::diff(
      &current,
      &NewItem {
        name: "Impact driver".to_string(),
        ..desired
      }
    )
    .is_empty());
  }

  #[test]
  fn content_type_guessed_from_extension() {
    assert_eq!(content_type_for("png"), "image/png");
    assert_eq!(content_type_for("jpeg"), "image/jpeg");
    assert_eq!(content_type_for("bin"), "application/octet-stream");
  }
}
