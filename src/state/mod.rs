//! In-memory state container.
//!
//! Holds the `products` and `cart` slices. Every dispatch is a commit: it
//! bumps the revision and notifies subscribers through a watch channel,
//! so a slow subscriber only ever sees the latest state.

pub mod cart;
pub mod products;
pub mod selectors;

use std::sync::Arc;
use tokio::sync::watch;

use crate::cart::CartLineItem;
use crate::catalog::Product;

pub use cart::{CartAction, CartState};
pub use products::{load_products, ProductsAction, ProductsState};
pub use selectors::CartLineDetail;

use selectors::Selectors;

/// Snapshot of the whole application state.
///
/// Slices sit behind `Arc` and are only replaced when a commit changes them.
#[derive(Debug, Clone, Default)]
pub struct AppState {
  /// Number of commits so far
  pub revision: u64,
  pub products: Arc<ProductsState>,
  pub cart: Arc<CartState>,
}

/// A state mutation, routed to the slice it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  Products(ProductsAction),
  Cart(CartAction),
}

impl AppState {
  fn apply(&mut self, action: Action) {
    self.revision += 1;
    match action {
      Action::Products(action) => {
        let mut next = ProductsState::clone(&self.products);
        next.reduce(action);
        if next != *self.products {
          self.products = Arc::new(next);
        }
      }
      Action::Cart(action) => {
        let mut next = CartState::clone(&self.cart);
        next.reduce(action);
        if next != *self.cart {
          self.cart = Arc::new(next);
        }
      }
    }
  }
}

/// Shared handle to the state container.
#[derive(Clone)]
pub struct Store {
  tx: Arc<watch::Sender<AppState>>,
  selectors: Arc<Selectors>,
}

impl Store {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(AppState::default());
    Self {
      tx: Arc::new(tx),
      selectors: Arc::new(Selectors::default()),
    }
  }

  /// Apply an action and notify subscribers.
  pub fn dispatch(&self, action: Action) {
    self.tx.send_modify(|state| state.apply(action));
  }

  /// Current snapshot. Cheap: slices are shared.
  pub fn state(&self) -> AppState {
    self.tx.borrow().clone()
  }

  pub fn revision(&self) -> u64 {
    self.tx.borrow().revision
  }

  /// Receive every commit from now on. The channel closes once all
  /// `Store` handles are dropped.
  pub fn subscribe(&self) -> watch::Receiver<AppState> {
    self.tx.subscribe()
  }

  #[allow(dead_code)]
  pub fn selectors(&self) -> &Selectors {
    &self.selectors
  }

  // Cart shortcuts

  pub fn add_to_cart(&self, id: &str, quantity: u32, color: Option<&str>, size: Option<&str>) {
    self.dispatch(Action::Cart(CartAction::Add {
      id: id.to_string(),
      quantity,
      color: color.map(String::from),
      size: size.map(String::from),
    }));
  }

  pub fn update_quantity(&self, id: &str, quantity: i64) {
    self.dispatch(Action::Cart(CartAction::UpdateQuantity {
      id: id.to_string(),
      quantity,
    }));
  }

  pub fn remove_from_cart(&self, id: &str, color: Option<&str>, size: Option<&str>) {
    self.dispatch(Action::Cart(CartAction::Remove {
      id: id.to_string(),
      color: color.map(String::from),
      size: size.map(String::from),
    }));
  }

  pub fn clear_cart(&self) {
    self.dispatch(Action::Cart(CartAction::Clear));
  }

  // Selectors

  pub fn all_products(&self) -> Arc<Vec<Product>> {
    let state = self.state();
    self
      .selectors
      .all_products
      .get(state.products, |products| selectors::all_products(products))
  }

  pub fn product_by_id(&self, id: &str) -> Option<Product> {
    self.tx.borrow().products.entities.get(id).cloned()
  }

  pub fn products_loading(&self) -> bool {
    self.tx.borrow().products.loading
  }

  pub fn cart_items(&self) -> Vec<CartLineItem> {
    self.tx.borrow().cart.items.clone()
  }

  pub fn cart_with_details(&self) -> Arc<Vec<CartLineDetail>> {
    let state = self.state();
    self
      .selectors
      .cart_with_details
      .get((state.cart, state.products), |(cart, products)| {
        selectors::cart_with_details(cart, products)
      })
  }

  pub fn cart_count(&self) -> u64 {
    let state = self.state();
    *self
      .selectors
      .cart_count
      .get(state.cart, |cart| selectors::cart_count(cart))
  }

  pub fn cart_subtotal(&self) -> f64 {
    let details = self.cart_with_details();
    *self
      .selectors
      .cart_subtotal
      .get(details, |details| selectors::cart_subtotal(details))
  }
}

impl Default for Store {
  fn default() -> Self {
    Self::new()
  }
}
