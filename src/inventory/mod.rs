//! Inventory service domain: typed items, HTTP transport, and the grouping
//! helpers the display layer leans on.

mod categories;
mod client;
mod error;
mod types;

pub use categories::{category_rollup, filter_items, CategoryCount};
pub use client::{InventoryClient, ItemTransport};
pub use error::{ApiError, ApiResult};
pub use types::{ImageAttachment, Item, ItemPatch, NewItem, Selector};
