//! Write-behind persistence of the cart and products slices.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cart::CartCache;
use crate::catalog::ProductCache;
use crate::db::KvStore;
use crate::state::{AppState, CartState, ProductsState};

use super::{AppContext, HydrationLatch};

/// Start mirroring committed state into the local store.
///
/// Commits before the hydration latch trips are ignored. Afterwards each
/// commit writes the slices whose stored content changed since the last
/// successful write; the products `loading` flag is never stored, so
/// flipping it alone writes nothing. Bursts of commits coalesce to the
/// latest state. Write failures are logged and retried with the next
/// commit.
///
/// The task ends once every `Store` handle is dropped, after persisting
/// the final state, so awaiting the handle flushes pending writes.
pub fn spawn_persistence<S: KvStore + 'static>(ctx: &AppContext<S>) -> JoinHandle<()> {
  let rx = ctx.store.subscribe();
  let writer = Writer {
    latch: ctx.latch.clone(),
    products: ctx.products.clone(),
    cart: ctx.cart.clone(),
    saved_products: None,
    saved_cart: None,
  };
  tokio::spawn(writer.run(rx))
}

struct Writer<S: KvStore> {
  latch: HydrationLatch,
  products: ProductCache<S>,
  cart: CartCache<S>,
  saved_products: Option<Arc<ProductsState>>,
  saved_cart: Option<Arc<CartState>>,
}

impl<S: KvStore + 'static> Writer<S> {
  async fn run(mut self, mut rx: watch::Receiver<AppState>) {
    while rx.changed().await.is_ok() {
      let state = rx.borrow_and_update().clone();

      let Some(hydrated) = self.latch.hydrated_state() else {
        continue;
      };

      // The hydrated slices mirror what is already on disk, even when the
      // commits that produced them were coalesced away.
      if self.saved_cart.is_none() {
        self.saved_cart = Some(Arc::clone(&hydrated.cart));
      }
      if self.saved_products.is_none() {
        self.saved_products = Some(Arc::clone(&hydrated.products));
      }

      if state.revision <= hydrated.revision {
        continue;
      }

      self.persist(state).await;
    }

    debug!("State container closed, persistence stopped");
  }

  async fn persist(&mut self, state: AppState) {
    if !is_saved(&self.saved_cart, &state.cart) {
      match self.cart.save_cart(state.cart.items.clone()).await {
        Ok(()) => {
          debug!(revision = state.revision, lines = state.cart.items.len(), "Persisted cart");
          self.saved_cart = Some(state.cart);
        }
        Err(e) => warn!(error = %e, revision = state.revision, "Failed to persist cart"),
      }
    }

    if catalog_saved(&self.saved_products, &state.products) {
      // Same catalog, only `loading` moved; track the new slice for cheap checks.
      self.saved_products = Some(state.products);
      return;
    }

    let products = state.products.entities.values().cloned().collect();
    match self.products.save_products(products).await {
      Ok(()) => {
        debug!(
          revision = state.revision,
          products = state.products.entities.len(),
          "Persisted products"
        );
        self.saved_products = Some(state.products);
      }
      Err(e) => warn!(error = %e, revision = state.revision, "Failed to persist products"),
    }
  }
}

fn is_saved<T>(saved: &Option<Arc<T>>, current: &Arc<T>) -> bool {
  saved
    .as_ref()
    .is_some_and(|saved| Arc::ptr_eq(saved, current))
}

/// Whether the stored catalog already equals this slice's entities, in order.
fn catalog_saved(saved: &Option<Arc<ProductsState>>, current: &Arc<ProductsState>) -> bool {
  is_saved(saved, current)
    || saved
      .as_ref()
      .is_some_and(|saved| saved.entities.iter().eq(current.entities.iter()))
}
