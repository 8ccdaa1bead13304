//! Process-wide wiring: the state container, the cache adapters and the
//! hydration latch, created once at startup and passed where needed.

mod bootstrap;
mod persistence;

pub use bootstrap::bootstrap;
pub use persistence::spawn_persistence;

use std::sync::{Arc, OnceLock};

use crate::cart::CartCache;
use crate::catalog::ProductCache;
use crate::db::KvStore;
use crate::state::{AppState, Store};

/// One-way latch set once startup hydration is done.
///
/// Keeps the state as of that moment. Commits up to and including its
/// revision are the hydration itself and are not persisted again, and its
/// slices are what the local store already holds.
#[derive(Clone, Default)]
pub struct HydrationLatch {
  hydrated: Arc<OnceLock<AppState>>,
}

impl HydrationLatch {
  pub fn new() -> Self {
    Self::default()
  }

  /// Trip the latch. Later calls keep the first state.
  pub fn mark(&self, state: AppState) {
    let _ = self.hydrated.set(state);
  }

  #[allow(dead_code)]
  pub fn is_hydrated(&self) -> bool {
    self.hydrated.get().is_some()
  }

  /// State at the moment hydration finished.
  pub fn hydrated_state(&self) -> Option<&AppState> {
    self.hydrated.get()
  }
}

/// Everything the bootstrap sequencer and the persistence task share.
pub struct AppContext<S: KvStore> {
  pub store: Store,
  pub products: ProductCache<S>,
  pub cart: CartCache<S>,
  pub latch: HydrationLatch,
}

impl<S: KvStore + 'static> AppContext<S> {
  pub fn new(kv: Arc<S>) -> Self {
    Self {
      store: Store::new(),
      products: ProductCache::new(Arc::clone(&kv)),
      cart: CartCache::new(kv),
      latch: HydrationLatch::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_latch_keeps_first_revision() {
    let latch = HydrationLatch::new();
    assert!(!latch.is_hydrated());
    assert_eq!(latch.hydrated_state().map(|s| s.revision), None);

    latch.mark(AppState {
      revision: 3,
      ..AppState::default()
    });
    latch.mark(AppState {
      revision: 10,
      ..AppState::default()
    });
    assert!(latch.is_hydrated());
    assert_eq!(latch.hydrated_state().map(|s| s.revision), Some(3));

    let shared = latch.clone();
    assert_eq!(shared.hydrated_state().map(|s| s.revision), Some(3));
  }
}
