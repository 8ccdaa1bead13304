//! Cart line items and the cart cache adapter.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{with_store, Collection, KvStore};

pub const CART_KEY: &str = "all-cart";

/// One cart line. Lines are unique by `(id, selected_color, selected_size)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
  /// Product id
  pub id: String,
  pub quantity: u32,
  pub selected_color: Option<String>,
  pub selected_size: Option<String>,
}

impl CartLineItem {
  /// Whether this line is the given product variant.
  pub fn is_variant(&self, id: &str, color: Option<&str>, size: Option<&str>) -> bool {
    self.id == id && self.selected_color.as_deref() == color && self.selected_size.as_deref() == size
  }
}

/// Reads and writes the `cart` collection.
pub struct CartCache<S: KvStore> {
  store: Arc<S>,
}

impl<S: KvStore + 'static> CartCache<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store }
  }

  pub async fn get_cached_cart(&self) -> Result<Option<Vec<CartLineItem>>> {
    with_store(&self.store, |s| s.get(Collection::Cart, CART_KEY)).await
  }

  /// Overwrite the whole cached cart.
  pub async fn save_cart(&self, items: Vec<CartLineItem>) -> Result<()> {
    with_store(&self.store, move |s| s.put(Collection::Cart, CART_KEY, &items)).await
  }
}

impl<S: KvStore> Clone for CartCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::SqliteStore;

  fn line(id: &str, quantity: u32, color: Option<&str>, size: Option<&str>) -> CartLineItem {
    CartLineItem {
      id: id.to_string(),
      quantity,
      selected_color: color.map(String::from),
      selected_size: size.map(String::from),
    }
  }

  #[tokio::test]
  async fn test_cart_round_trip_and_overwrite() {
    let cache = CartCache::new(Arc::new(SqliteStore::open_in_memory().unwrap()));
    assert!(cache.get_cached_cart().await.unwrap().is_none());

    cache
      .save_cart(vec![line("p1", 2, Some("red"), Some("M")), line("p2", 1, None, None)])
      .await
      .unwrap();
    cache.save_cart(vec![line("p3", 4, None, Some("L"))]).await.unwrap();

    let cached = cache.get_cached_cart().await.unwrap().unwrap();
    assert_eq!(cached, vec![line("p3", 4, None, Some("L"))]);
  }

  #[test]
  fn test_variant_match_uses_all_three_fields() {
    let item = line("p1", 1, Some("red"), Some("M"));
    assert!(item.is_variant("p1", Some("red"), Some("M")));
    assert!(!item.is_variant("p1", Some("blue"), Some("M")));
    assert!(!item.is_variant("p1", Some("red"), None));
    assert!(!item.is_variant("p2", Some("red"), Some("M")));
  }

  #[test]
  fn test_json_shape() {
    let json = serde_json::to_value(line("p1", 2, None, Some("S"))).unwrap();
    assert_eq!(
      json,
      serde_json::json!({"id": "p1", "quantity": 2, "selectedColor": null, "selectedSize": "S"})
    );
  }
}
