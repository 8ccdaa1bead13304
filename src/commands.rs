//! Command-line front end: drives the state container, the offline cache
//! and the block worker the way the storefront pages would.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;
use url::Url;

use crate::app::{bootstrap, spawn_persistence, AppContext};
use crate::cache::{CacheStorage, Destination, HttpNetwork, Request, ServiceWorker, SqliteStorage};
use crate::catalog::Product;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::ebook::{BlockRequest, BlockWorker};
use crate::state::{load_products, CartLineDetail};

/// Rows printed by `products`
const PREVIEW_ROWS: usize = 10;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Load the catalog and print the first products
  Products {
    /// Number of products to load (default from config)
    #[arg(short, long)]
    count: Option<usize>,
    /// Print only this product
    #[arg(long)]
    id: Option<String>,
  },
  /// Show or change the cart
  Cart {
    #[command(subcommand)]
    action: Option<CartCommand>,
  },
  /// Drive the offline request cache
  Offline {
    #[command(subcommand)]
    action: OfflineCommand,
  },
  /// Generate e-book blocks on the worker thread
  Ebook {
    /// Number of blocks (default from config)
    #[arg(short, long)]
    count: Option<usize>,
  },
}

#[derive(Subcommand, Debug)]
pub enum CartCommand {
  /// Print the cart with product details
  Show,
  /// Add a product variant
  Add {
    id: String,
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    qty: u32,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    size: Option<String>,
  },
  /// Set the quantity of the first line for a product
  Update {
    id: String,
    #[arg(allow_hyphen_values = true)]
    qty: i64,
  },
  /// Remove a product variant
  Remove {
    id: String,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    size: Option<String>,
  },
  /// Empty the cart
  Clear,
}

#[derive(Subcommand, Debug)]
pub enum OfflineCommand {
  /// Pre-cache the offline fallback resources
  Install,
  /// Delete partitions of older cache versions
  Activate,
  /// Answer a GET request through the cache
  Fetch {
    url: Url,
    #[arg(short, long, value_enum, default_value_t)]
    dest: Destination,
  },
  /// List stored partitions
  Partitions,
}

pub async fn run(command: Command, config: &Config) -> Result<()> {
  match command {
    Command::Products { count, id } => {
      products(config, count.unwrap_or(config.catalog.count), id.as_deref()).await
    }
    Command::Cart { action } => cart(config, action.unwrap_or(CartCommand::Show)).await,
    Command::Offline { action } => offline(config, action).await,
    Command::Ebook { count } => ebook(config, count.unwrap_or(config.ebook.count)).await,
  }
}

/// A hydrated state container with persistence running.
struct Session {
  ctx: AppContext<SqliteStore>,
  persistence: JoinHandle<()>,
}

impl Session {
  async fn start(config: &Config) -> Result<Self> {
    let kv = Arc::new(open_store(config)?);
    let ctx = AppContext::new(kv);
    let persistence = spawn_persistence(&ctx);
    bootstrap(&ctx).await;
    Ok(Self { ctx, persistence })
  }

  /// Drop the state container and wait for the last writes.
  async fn finish(self) -> Result<()> {
    drop(self.ctx);
    self
      .persistence
      .await
      .map_err(|e| eyre!("Persistence task failed: {}", e))
  }
}

/// Open the configured store, degrading to memory when it cannot be opened.
fn open_store(config: &Config) -> Result<SqliteStore> {
  let path = match &config.store.path {
    Some(p) => p.clone(),
    None => SqliteStore::default_path()?,
  };

  match SqliteStore::open(&path) {
    Ok(store) => Ok(store),
    Err(e) => {
      warn!(error = %e, path = %path.display(), "Local store unavailable, state will not survive this run");
      SqliteStore::open_in_memory()
    }
  }
}

async fn products(config: &Config, count: usize, id: Option<&str>) -> Result<()> {
  let session = Session::start(config).await?;
  let store = &session.ctx.store;

  load_products(store, &session.ctx.products, count, &config.catalog.categories).await?;

  if let Some(id) = id {
    match store.product_by_id(id) {
      Some(p) => println!("{}", format_product(&p)),
      None => println!("No product {}", id),
    }
    return session.finish().await;
  }

  let products = store.all_products();
  for p in products.iter().take(PREVIEW_ROWS) {
    println!("{}", format_product(p));
  }
  if products.len() > PREVIEW_ROWS {
    println!("...");
  }
  println!(
    "{} products{}",
    products.len(),
    if store.products_loading() { " (still loading)" } else { "" }
  );

  session.finish().await
}

fn format_product(p: &Product) -> String {
  format!(
    "{:<6} {:<45} {:<12} ${:>7.2}  {:.1}{}",
    p.id,
    p.name,
    p.category,
    p.price,
    p.rating,
    if p.is_new { "  new" } else { "" }
  )
}

async fn cart(config: &Config, action: CartCommand) -> Result<()> {
  let session = Session::start(config).await?;
  let store = &session.ctx.store;

  match action {
    CartCommand::Show => {}
    CartCommand::Add {
      id,
      qty,
      color,
      size,
    } => store.add_to_cart(&id, qty, color.as_deref(), size.as_deref()),
    CartCommand::Update { id, qty } => store.update_quantity(&id, qty),
    CartCommand::Remove { id, color, size } => {
      store.remove_from_cart(&id, color.as_deref(), size.as_deref())
    }
    CartCommand::Clear => store.clear_cart(),
  }

  let details = store.cart_with_details();
  let unknown = store.cart_items().len().saturating_sub(details.len());

  for line in details.iter() {
    println!("{}", format_line(line));
  }
  if unknown > 0 {
    println!("({} lines refer to products not in the catalog)", unknown);
  }
  println!("Items: {}  Subtotal: ${:.2}", store.cart_count(), store.cart_subtotal());

  session.finish().await
}

fn format_line(line: &CartLineDetail) -> String {
  let variant = match (&line.selected_color, &line.selected_size) {
    (Some(c), Some(s)) => format!(" [{} / {}]", c, s),
    (Some(v), None) | (None, Some(v)) => format!(" [{}]", v),
    (None, None) => String::new(),
  };
  format!(
    "{:<6} {}{}  x{}  ${:.2}",
    line.product.id, line.product.name, variant, line.quantity, line.total_price
  )
}

fn responses_path(config: &Config) -> Result<PathBuf> {
  match &config.store.responses_path {
    Some(p) => Ok(p.clone()),
    None => SqliteStorage::default_path(),
  }
}

async fn offline(config: &Config, action: OfflineCommand) -> Result<()> {
  let storage = SqliteStorage::open(&responses_path(config)?)?;
  let network = HttpNetwork::new(Duration::from_secs(config.offline.timeout_secs))?;
  let worker = ServiceWorker::new(storage, network, &config.offline)?;

  match action {
    OfflineCommand::Install => {
      let count = worker.install().await?;
      println!("Pre-cached {} resources into {}", count, worker.names().html);
    }
    OfflineCommand::Activate => {
      let deleted = worker.activate().await?;
      if deleted.is_empty() {
        println!("No stale partitions");
      }
      for name in deleted {
        println!("Deleted {}", name);
      }
    }
    OfflineCommand::Fetch { url, dest } => {
      let request = Request::get(url, dest);
      match worker.handle_fetch(&request).await {
        Some(result) => {
          println!(
            "{} {:?} {} ({} bytes)",
            result.data.status,
            result.source,
            result.data.content_type.as_deref().unwrap_or("-"),
            result.data.body.len()
          );
          if let Some(at) = result.cached_at {
            println!("cached at {}", at.format("%Y-%m-%d %H:%M:%S"));
          }
        }
        None => println!("Not handled"),
      }
      worker.settle().await;
    }
    OfflineCommand::Partitions => {
      for name in worker.storage().partitions()? {
        let marker = if worker.names().contains(&name) { "" } else { "  (stale)" };
        println!("{}{}", name, marker);
      }
    }
  }

  Ok(())
}

async fn ebook(config: &Config, count: usize) -> Result<()> {
  let worker = BlockWorker::new(config.ebook.iterations);
  let response = worker.run(BlockRequest { count }).await?;

  let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
  for block in &response.blocks {
    let value = serde_json::to_value(block).map_err(|e| eyre!("Failed to encode block: {}", e))?;
    let tag = value["type"].as_str().unwrap_or("unknown").to_string();
    *by_type.entry(tag).or_default() += 1;
  }

  println!("{} blocks, result {:.3}", response.blocks.len(), response.result);
  for (tag, n) in by_type {
    println!("  {:<14} {}", tag, n);
  }

  Ok(())
}
