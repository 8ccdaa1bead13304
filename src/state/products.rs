//! Products slice and the asynchronous catalog load.

use color_eyre::Result;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::catalog::{Product, ProductCache};
use crate::db::KvStore;

use super::{Action, Store};

/// Normalized products keyed by id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductsState {
  pub entities: IndexMap<String, Product>,
  pub loading: bool,
}

/// Mutations of the products slice.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductsAction {
  /// Replace the whole set (startup hydration)
  Hydrate(Vec<Product>),
  /// A load started
  LoadPending,
  /// A load finished; replaces the whole set
  LoadFulfilled(Vec<Product>),
  /// A load failed
  LoadRejected,
}

impl ProductsState {
  pub fn reduce(&mut self, action: ProductsAction) {
    match action {
      ProductsAction::Hydrate(products) => self.set_all(products),
      ProductsAction::LoadPending => self.loading = true,
      ProductsAction::LoadFulfilled(products) => {
        self.set_all(products);
        self.loading = false;
      }
      ProductsAction::LoadRejected => self.loading = false,
    }
  }

  fn set_all(&mut self, products: Vec<Product>) {
    self.entities = products
      .into_iter()
      .map(|product| (product.id.clone(), product))
      .collect();
  }
}

/// Load `count` products into the store.
///
/// Serves the cached catalog when it is large enough, otherwise extends
/// it first. Overlapping loads are not cancelled; whichever finishes last
/// sets the slice.
pub async fn load_products<S: KvStore + 'static>(
  store: &Store,
  cache: &ProductCache<S>,
  count: usize,
  categories: &[String],
) -> Result<()> {
  store.dispatch(Action::Products(ProductsAction::LoadPending));

  let result = async {
    let read = cache.get_products_swr(count).await?;
    if read.needs_update {
      debug!(
        cached = read.initial.len(),
        from = read.generate_from,
        count,
        "Catalog needs generation"
      );
      cache.generate_incrementally(count, categories).await
    } else {
      Ok(read.initial)
    }
  }
  .await;

  match result {
    Ok(products) => {
      store.dispatch(Action::Products(ProductsAction::LoadFulfilled(products)));
      Ok(())
    }
    Err(e) => {
      warn!(error = %e, "Failed to load products");
      store.dispatch(Action::Products(ProductsAction::LoadRejected));
      Err(e)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::product::{generate_range, DEFAULT_CATEGORIES};
  use crate::db::SqliteStore;
  use std::sync::Arc;

  fn categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
  }

  #[test]
  fn test_hydrate_preserves_order() {
    let products = generate_range(0..5, &categories()).unwrap();
    let mut state = ProductsState::default();
    state.reduce(ProductsAction::Hydrate(products.clone()));

    let ids: Vec<_> = state.entities.keys().cloned().collect();
    let expected: Vec<_> = products.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids, expected);
  }

  #[test]
  fn test_loading_flag_transitions() {
    let mut state = ProductsState::default();
    state.reduce(ProductsAction::LoadPending);
    assert!(state.loading);
    state.reduce(ProductsAction::LoadRejected);
    assert!(!state.loading);

    state.reduce(ProductsAction::LoadPending);
    state.reduce(ProductsAction::LoadFulfilled(
      generate_range(0..3, &categories()).unwrap(),
    ));
    assert!(!state.loading);
    assert_eq!(state.entities.len(), 3);
  }

  #[tokio::test]
  async fn test_load_generates_then_serves_cache() {
    let store = Store::new();
    let cache = ProductCache::new(Arc::new(SqliteStore::open_in_memory().unwrap()));

    load_products(&store, &cache, 25, &categories()).await.unwrap();
    let first = store.all_products();
    assert_eq!(first.len(), 25);
    assert!(!store.products_loading());

    load_products(&store, &cache, 10, &categories()).await.unwrap();
    // The full cached catalog is served, not a truncated one.
    assert_eq!(store.all_products().len(), 25);
    assert_eq!(*store.all_products(), *first);
  }

  #[tokio::test]
  async fn test_load_failure_clears_loading() {
    let store = Store::new();
    let cache = ProductCache::new(Arc::new(SqliteStore::open_in_memory().unwrap()));

    let result = load_products(&store, &cache, 5, &[]).await;
    assert!(result.is_err());
    assert!(!store.products_loading());
    assert!(store.all_products().is_empty());
  }

  #[tokio::test]
  async fn test_overlapping_loads_settle_on_one_catalog() {
    let store = Store::new();
    let cache = ProductCache::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
    let categories = categories();

    let (small, large) = tokio::join!(
      load_products(&store, &cache, 10, &categories),
      load_products(&store, &cache, 25, &categories)
    );
    small.unwrap();
    large.unwrap();

    assert!(!store.products_loading());
    let products = store.all_products();
    assert!(products.len() == 10 || products.len() == 25, "got {}", products.len());
    for (i, product) in products.iter().enumerate() {
      assert_eq!(product.id, format!("product-{}", i + 1));
    }
  }
}
