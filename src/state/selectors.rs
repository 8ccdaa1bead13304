//! Derived reads over the state, memoized on slice identity.
//!
//! Slices are held behind `Arc` and replaced only when they change, so a
//! selector can tell that its inputs are unchanged by pointer equality.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::catalog::Product;

use super::cart::CartState;
use super::products::ProductsState;

/// A cart line joined with its product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineDetail {
  #[serde(flatten)]
  pub product: Product,
  pub quantity: u32,
  pub selected_color: Option<String>,
  pub selected_size: Option<String>,
  pub total_price: f64,
}

pub fn all_products(products: &ProductsState) -> Vec<Product> {
  products.entities.values().cloned().collect()
}

/// Join cart lines with products, dropping lines whose product is gone.
pub fn cart_with_details(cart: &CartState, products: &ProductsState) -> Vec<CartLineDetail> {
  cart
    .items
    .iter()
    .filter_map(|item| {
      let product = products.entities.get(&item.id)?;
      Some(CartLineDetail {
        product: product.clone(),
        quantity: item.quantity,
        selected_color: item.selected_color.clone(),
        selected_size: item.selected_size.clone(),
        total_price: product.price * item.quantity as f64,
      })
    })
    .collect()
}

pub fn cart_count(cart: &CartState) -> u64 {
  cart.items.iter().map(|item| item.quantity as u64).sum()
}

pub fn cart_subtotal(details: &[CartLineDetail]) -> f64 {
  details.iter().map(|line| line.total_price).sum()
}

/// Inputs whose identity decides whether a memoized value is still valid.
pub trait MemoInputs: Clone {
  fn same(&self, other: &Self) -> bool;
}

impl<A> MemoInputs for Arc<A> {
  fn same(&self, other: &Self) -> bool {
    Arc::ptr_eq(self, other)
  }
}

impl<A, B> MemoInputs for (Arc<A>, Arc<B>) {
  fn same(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0) && Arc::ptr_eq(&self.1, &other.1)
  }
}

/// Single-entry memo cell, recomputing only when its inputs change.
pub struct Memo<I, T> {
  slot: Mutex<Option<(I, Arc<T>)>>,
  computations: AtomicUsize,
}

impl<I: MemoInputs, T> Memo<I, T> {
  pub fn new() -> Self {
    Self {
      slot: Mutex::new(None),
      computations: AtomicUsize::new(0),
    }
  }

  pub fn get(&self, inputs: I, compute: impl FnOnce(&I) -> T) -> Arc<T> {
    // A poisoned slot only holds a cached value; keep using it.
    let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());

    if let Some((cached_inputs, value)) = slot.as_ref() {
      if cached_inputs.same(&inputs) {
        return Arc::clone(value);
      }
    }

    let value = Arc::new(compute(&inputs));
    self.computations.fetch_add(1, Ordering::Relaxed);
    *slot = Some((inputs, Arc::clone(&value)));
    value
  }

  /// How many times the value has been computed.
  #[allow(dead_code)]
  pub fn computations(&self) -> usize {
    self.computations.load(Ordering::Relaxed)
  }
}

impl<I: MemoInputs, T> Default for Memo<I, T> {
  fn default() -> Self {
    Self::new()
  }
}

/// Memo cells for every selector of the store.
#[derive(Default)]
pub struct Selectors {
  pub all_products: Memo<Arc<ProductsState>, Vec<Product>>,
  pub cart_with_details: Memo<(Arc<CartState>, Arc<ProductsState>), Vec<CartLineDetail>>,
  pub cart_count: Memo<Arc<CartState>, u64>,
  pub cart_subtotal: Memo<Arc<Vec<CartLineDetail>>, f64>,
}
