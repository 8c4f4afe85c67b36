mod config;
mod inventory;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use config::Config;
use inventory::{
  category_rollup, filter_items, ImageAttachment, InventoryClient, Item, ItemPatch, NewItem,
  Selector,
};
use sync::{QueryResult, SyncClient};

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Command-line inventory manager backed by a remote item service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/stockroom/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Service base URL override
  #[arg(long)]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List items, optionally filtered
  List {
    /// Only items in this category (case-insensitive; "All" matches everything)
    #[arg(short = 'C', long)]
    category: Option<String>,

    /// Only items whose name contains this text
    #[arg(short, long)]
    search: Option<String>,
  },

  /// Show item counts per category
  Categories,

  /// Show one item
  Get { id: String },

  /// Create an item
  Create {
    #[arg(long)]
    name: String,

    #[arg(long)]
    price: f64,

    #[arg(long)]
    category: String,

    /// "for sale" or "for use"
    #[arg(long, default_value = "for sale")]
    selector: Selector,

    /// Image file to attach
    #[arg(long)]
    image: Option<PathBuf>,
  },

  /// Update an item; only fields that differ from the stored item are sent
  Update {
    id: String,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    price: Option<f64>,

    #[arg(long)]
    category: Option<String>,

    /// "for sale" or "for use"
    #[arg(long)]
    selector: Option<Selector>,

    /// Replacement image file
    #[arg(long)]
    image: Option<PathBuf>,
  },

  /// Delete an item
  Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stockroom=warn")),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.url {
    config.service.base_url = url;
  }

  let transport = InventoryClient::new(&config)?;
  let mut client = SyncClient::new(transport);
  if let Some(stale_secs) = config.service.stale_secs {
    client = client.with_stale_time(chrono::Duration::seconds(stale_secs));
  }

  match args.command {
    Command::List { category, search } => list(&client, category, search).await,
    Command::Categories => categories(&client).await,
    Command::Get { id } => get(&client, &id).await,
    Command::Create {
      name,
      price,
      category,
      selector,
      image,
    } => {
      create(
        &client,
        NewItem {
          name,
          price,
          category,
          selector,
        },
        image,
      )
      .await
    }
    Command::Update {
      id,
      name,
      price,
      category,
      selector,
      image,
    } => update(&client, &id, name, price, category, selector, image).await,
    Command::Delete { id } => delete(&client, &id).await,
  }
}

/// Unwrap a query observation or report why it failed.
fn take<T>(result: QueryResult<T>, what: &str) -> Result<T> {
  match result.data {
    Some(data) => Ok(data),
    None => match result.error {
      Some(error) => Err(eyre!("Failed to load {}: {}", what, error)),
      None => Err(eyre!("Failed to load {}", what)),
    },
  }
}

fn read_image(path: Option<&Path>) -> Result<Option<ImageAttachment>> {
  path
    .map(|p| {
      ImageAttachment::from_path(p).map_err(|e| eyre!("Failed to read image {}: {}", p.display(), e))
    })
    .transpose()
}

async fn list(
  client: &SyncClient<InventoryClient>,
  category: Option<String>,
  search: Option<String>,
) -> Result<()> {
  let items = take(client.items().await, "items")?;
  let visible = filter_items(&items, category.as_deref(), search.as_deref());

  if visible.is_empty() {
    println!("No items.");
    return Ok(());
  }
  for item in visible {
    println!(
      "{:<24} {:>10} {:<12} {:<8} {}",
      item.name,
      format!("${:.2}", item.price),
      item.category,
      item.selector,
      item.id
    );
  }
  Ok(())
}

async fn categories(client: &SyncClient<InventoryClient>) -> Result<()> {
  let items = take(client.items().await, "items")?;
  for bucket in category_rollup(&items) {
    println!("{} ({})", bucket.label, bucket.count);
  }
  Ok(())
}

async fn get(client: &SyncClient<InventoryClient>, id: &str) -> Result<()> {
  let item = take(client.item(id).await, &format!("item {}", id))?;
  print_item(client, &item);
  Ok(())
}

async fn create(
  client: &SyncClient<InventoryClient>,
  fields: NewItem,
  image: Option<PathBuf>,
) -> Result<()> {
  let image = read_image(image.as_deref())?;
  let created = client.create(fields, image).await?;
  println!("Created {} ({})", created.name, created.id);
  Ok(())
}

async fn update(
  client: &SyncClient<InventoryClient>,
  id: &str,
  name: Option<String>,
  price: Option<f64>,
  category: Option<String>,
  selector: Option<Selector>,
  image: Option<PathBuf>,
) -> Result<()> {
  let current = take(client.item(id).await, &format!("item {}", id))?;

  // Diff against the stored item so the PATCH carries only real changes
  let desired = NewItem {
    name: name.unwrap_or_else(|| current.name.clone()),
    price: price.unwrap_or(current.price),
    category: category.unwrap_or_else(|| current.category.clone()),
    selector: selector.unwrap_or(current.selector),
  };
  let patch = ItemPatch::diff(&current, &desired);
  let image = read_image(image.as_deref())?;

  if patch.is_empty() && image.is_none() {
    println!("Nothing to update.");
    return Ok(());
  }

  let updated = client.update(id, patch, image).await?;
  println!("Updated {} ({})", updated.name, updated.id);
  Ok(())
}

async fn delete(client: &SyncClient<InventoryClient>, id: &str) -> Result<()> {
  client.delete(id).await?;
  println!("Deleted {}", id);
  Ok(())
}

fn print_item(client: &SyncClient<InventoryClient>, item: &Item) {
  println!("Name:     {}", item.name);
  println!("Category: {}", item.category);
  println!("Price:    ${:.2}", item.price);
  println!("Selector: {}", item.selector);
  if let Some(url) = client.transport().image_url(item) {
    println!("Image:    {}", url);
  }
  println!("Id:       {}", item.id);
}
