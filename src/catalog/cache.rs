//! Product cache adapter: the cached catalog and its generation cursor.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{with_store, Collection, KvStore, Write};

use super::product::{self, Product};

pub const PRODUCTS_KEY: &str = "all-products";
pub const INDEX_KEY: &str = "last-index";

/// Result of a stale-while-revalidate read of the catalog.
#[derive(Debug, Clone)]
pub struct SwrRead {
  /// Whatever is cached right now (possibly empty)
  pub initial: Vec<Product>,
  /// Whether the cache holds fewer products than requested
  pub needs_update: bool,
  /// Generation cursor to resume from
  pub generate_from: u64,
}

/// Reads and writes the `products` collection and the cursor in `metadata`.
pub struct ProductCache<S: KvStore> {
  store: Arc<S>,
}

impl<S: KvStore + 'static> ProductCache<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  pub async fn get_cached_products(&self) -> Result<Option<Vec<Product>>> {
    with_store(&self.store, |s| s.get(Collection::Products, PRODUCTS_KEY)).await
  }

  /// Overwrite the whole cached catalog.
  pub async fn save_products(&self, products: Vec<Product>) -> Result<()> {
    with_store(&self.store, move |s| {
      s.put(Collection::Products, PRODUCTS_KEY, &products)
    })
    .await
  }

  /// Generation cursor, 0 when never written.
  pub async fn get_last_index(&self) -> Result<u64> {
    let index: Option<u64> =
      with_store(&self.store, |s| s.get(Collection::Metadata, INDEX_KEY)).await?;
    Ok(index.unwrap_or(0))
  }

  #[allow(dead_code)]
  pub async fn set_last_index(&self, index: u64) -> Result<()> {
    with_store(&self.store, move |s| {
      s.put(Collection::Metadata, INDEX_KEY, &index)
    })
    .await
  }

  /// Return the cached catalog without generating anything.
  pub async fn get_products_swr(&self, required: usize) -> Result<SwrRead> {
    let initial = self.get_cached_products().await?.unwrap_or_default();
    let generate_from = self.get_last_index().await?;

    Ok(SwrRead {
      needs_update: initial.len() < required,
      initial,
      generate_from,
    })
  }

  /// Extend the cached catalog to `required` products.
  ///
  /// Only the missing suffix is generated. The collection and the cursor
  /// are written in one transaction, products first. When the cache is
  /// already large enough nothing is written.
  pub async fn generate_incrementally(
    &self,
    required: usize,
    categories: &[String],
  ) -> Result<Vec<Product>> {
    let mut products = self.get_cached_products().await?.unwrap_or_default();
    let cursor = self.get_last_index().await?;

    if products.len() >= required {
      debug!(cached = products.len(), required, "Catalog already satisfies request");
      return Ok(products);
    }

    let cached = products.len() as u64;
    let start = if cursor < cached {
      // A products write landed without its cursor; resume after what is there.
      warn!(cursor, cached, "Generation cursor behind cached catalog, resuming from catalog length");
      cached
    } else {
      if cursor > cached {
        warn!(cursor, cached, "Generation cursor ahead of cached catalog");
      }
      cursor
    };

    let generated = product::generate_range(start..required as u64, categories)?;
    info!(from = start, to = required, "Generated {} products", generated.len());
    products.extend(generated);

    let writes = vec![
      Write::json(Collection::Products, PRODUCTS_KEY, &products)?,
      Write::json(Collection::Metadata, INDEX_KEY, &(products.len() as u64))?,
    ];
    with_store(&self.store, move |s| s.put_batch(&writes)).await?;

    Ok(products)
  }
}

impl<S: KvStore> Clone for ProductCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}
