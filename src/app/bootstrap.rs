//! Startup hydration of the state container from the local store.

use tracing::{info, warn};

use crate::db::KvStore;
use crate::state::{Action, CartAction, ProductsAction};

use super::AppContext;

/// What startup hydration found in the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrationReport {
  pub products: Option<usize>,
  pub cart_lines: Option<usize>,
}

/// Seed the state container from the cache, then trip the hydration latch.
///
/// Both reads run concurrently. A failed read is logged and treated as an
/// empty cache.
pub async fn bootstrap<S: KvStore + 'static>(ctx: &AppContext<S>) -> HydrationReport {
  let (cart, products) = tokio::join!(ctx.cart.get_cached_cart(), ctx.products.get_cached_products());

  let products = products.unwrap_or_else(|e| {
    warn!(error = %e, "Failed to read cached products, starting empty");
    None
  });
  let cart = cart.unwrap_or_else(|e| {
    warn!(error = %e, "Failed to read cached cart, starting empty");
    None
  });

  let report = HydrationReport {
    products: products.as_ref().map(Vec::len),
    cart_lines: cart.as_ref().map(Vec::len),
  };

  if let Some(products) = products {
    ctx
      .store
      .dispatch(Action::Products(ProductsAction::Hydrate(products)));
  }

  if let Some(cart) = cart {
    ctx.store.dispatch(Action::Cart(CartAction::Hydrate(cart)));
  }

  ctx.latch.mark(ctx.store.state());
  info!(
    revision = ctx.store.revision(),
    products = report.products.unwrap_or(0),
    cart_lines = report.cart_lines.unwrap_or(0),
    "Hydrated state from local store"
  );

  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cart::CartLineItem;
  use crate::catalog::product::generate_range;
  use crate::db::{Collection, SqliteStore, Write};
  use color_eyre::{eyre::eyre, Result};
  use std::sync::Arc;

  /// Store whose reads always fail.
  struct BrokenStore;

  impl KvStore for BrokenStore {
    fn get_raw(&self, _collection: Collection, _key: &str) -> Result<Option<Vec<u8>>> {
      Err(eyre!("disk on fire"))
    }

    fn put_batch(&self, _writes: &[Write]) -> Result<()> {
      Err(eyre!("disk on fire"))
    }

    fn collections(&self) -> Result<Vec<String>> {
      Ok(Vec::new())
    }
  }

  #[tokio::test]
  async fn test_bootstrap_empty_store() {
    let ctx = AppContext::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
    let report = bootstrap(&ctx).await;

    assert_eq!(report, HydrationReport::default());
    assert!(ctx.latch.is_hydrated());
    assert_eq!(ctx.latch.hydrated_state().map(|s| s.revision), Some(0));
    assert!(ctx.store.all_products().is_empty());
  }

  #[tokio::test]
  async fn test_bootstrap_hydrates_both_slices() {
    let kv = Arc::new(SqliteStore::open_in_memory().unwrap());
    let products = generate_range(0..3, &["toys".to_string()]).unwrap();
    let cart = vec![CartLineItem {
      id: "product-2".to_string(),
      quantity: 2,
      selected_color: None,
      selected_size: Some("L".to_string()),
    }];
    kv.put(Collection::Products, "all-products", &products).unwrap();
    kv.put(Collection::Cart, "all-cart", &cart).unwrap();

    let ctx = AppContext::new(kv);
    let report = bootstrap(&ctx).await;

    assert_eq!(report.products, Some(3));
    assert_eq!(report.cart_lines, Some(1));
    assert_eq!(*ctx.store.all_products(), products);
    assert_eq!(ctx.store.cart_items(), cart);
    assert_eq!(ctx.store.cart_count(), 2);
    assert_eq!(ctx.latch.hydrated_state().map(|s| s.revision), Some(2));
  }

  #[tokio::test]
  async fn test_bootstrap_survives_read_failures() {
    let ctx = AppContext::new(Arc::new(BrokenStore));
    let report = bootstrap(&ctx).await;

    assert_eq!(report, HydrationReport::default());
    assert!(ctx.latch.is_hydrated());
    assert_eq!(ctx.store.cart_count(), 0);
  }
}
