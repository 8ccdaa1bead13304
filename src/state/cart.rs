//! Cart slice.

use crate::cart::CartLineItem;

/// Ordered cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
  pub items: Vec<CartLineItem>,
}

/// Mutations of the cart slice.
#[derive(Debug, Clone, PartialEq)]
pub enum CartAction {
  /// Replace every line (startup hydration)
  Hydrate(Vec<CartLineItem>),
  /// Merge into the matching variant line, or append a new one.
  /// A zero quantity is ignored.
  Add {
    id: String,
    quantity: u32,
    color: Option<String>,
    size: Option<String>,
  },
  /// Set the quantity of the first line with this product id, clamped to 1
  UpdateQuantity { id: String, quantity: i64 },
  /// Remove the exact variant line
  Remove {
    id: String,
    color: Option<String>,
    size: Option<String>,
  },
  Clear,
}

impl CartState {
  pub fn reduce(&mut self, action: CartAction) {
    match action {
      CartAction::Hydrate(items) => self.items = items,
      CartAction::Add {
        id,
        quantity,
        color,
        size,
      } => {
        if quantity == 0 {
          return;
        }

        let existing = self
          .items
          .iter_mut()
          .find(|item| item.is_variant(&id, color.as_deref(), size.as_deref()));

        match existing {
          Some(item) => item.quantity = item.quantity.saturating_add(quantity),
          None => self.items.push(CartLineItem {
            id,
            quantity,
            selected_color: color,
            selected_size: size,
          }),
        }
      }
      CartAction::UpdateQuantity { id, quantity } => {
        // Matches on id alone; with several variants of one product only the first changes.
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
          item.quantity = quantity.clamp(1, u32::MAX as i64) as u32;
        }
      }
      CartAction::Remove { id, color, size } => {
        self
          .items
          .retain(|item| !item.is_variant(&id, color.as_deref(), size.as_deref()));
      }
      CartAction::Clear => self.items.clear(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn add(id: &str, quantity: u32, color: Option<&str>, size: Option<&str>) -> CartAction {
    CartAction::Add {
      id: id.to_string(),
      quantity,
      color: color.map(String::from),
      size: size.map(String::from),
    }
  }

  #[test]
  fn test_add_same_variant_merges() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 2, Some("red"), Some("M")));
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.items[0].selected_color.as_deref(), Some("red"));
    assert_eq!(cart.items[0].selected_size.as_deref(), Some("M"));

    cart.reduce(add("p1", 1, Some("red"), Some("M")));
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
  }

  #[test]
  fn test_add_other_variant_appends() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 1, Some("red"), Some("M")));
    cart.reduce(add("p1", 1, Some("blue"), Some("M")));
    cart.reduce(add("p1", 1, Some("red"), None));
    cart.reduce(add("p2", 5, None, None));

    assert_eq!(cart.items.len(), 4);
    assert_eq!(cart.items[3].id, "p2");
    assert_eq!(cart.items[3].quantity, 5);
  }

  #[test]
  fn test_update_quantity_clamps_to_one() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 4, None, None));

    for quantity in [0, -1, -100] {
      cart.reduce(CartAction::UpdateQuantity {
        id: "p1".to_string(),
        quantity,
      });
      assert_eq!(cart.items[0].quantity, 1);
    }

    cart.reduce(CartAction::UpdateQuantity {
      id: "p1".to_string(),
      quantity: 7,
    });
    assert_eq!(cart.items[0].quantity, 7);
  }

  #[test]
  fn test_add_zero_quantity_is_ignored() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 0, None, None));
    assert!(cart.items.is_empty());

    cart.reduce(add("p1", 2, Some("red"), None));
    cart.reduce(add("p1", 0, Some("red"), None));
    cart.reduce(add("p2", 0, None, None));
    assert_eq!(cart.items.len(), 1);
    assert!(cart.items.iter().all(|item| item.quantity >= 1));
    assert_eq!(cart.items[0].quantity, 2);
  }

  #[test]
  fn test_update_quantity_hits_first_variant_only() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 1, Some("red"), None));
    cart.reduce(add("p1", 1, Some("blue"), None));

    cart.reduce(CartAction::UpdateQuantity {
      id: "p1".to_string(),
      quantity: 9,
    });
    assert_eq!(cart.items[0].quantity, 9);
    assert_eq!(cart.items[1].quantity, 1);
  }

  #[test]
  fn test_update_unknown_id_is_noop() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 2, None, None));
    let before = cart.clone();

    cart.reduce(CartAction::UpdateQuantity {
      id: "missing".to_string(),
      quantity: 5,
    });
    assert_eq!(cart, before);
  }

  #[test]
  fn test_remove_exact_variant() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 1, Some("red"), Some("M")));
    cart.reduce(add("p1", 1, Some("red"), Some("L")));

    cart.reduce(CartAction::Remove {
      id: "p1".to_string(),
      color: Some("red".to_string()),
      size: Some("M".to_string()),
    });
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].selected_size.as_deref(), Some("L"));
  }

  #[test]
  fn test_clear_and_hydrate() {
    let mut cart = CartState::default();
    cart.reduce(add("p1", 1, None, None));
    cart.reduce(CartAction::Clear);
    assert!(cart.items.is_empty());

    let items = vec![CartLineItem {
      id: "p9".to_string(),
      quantity: 3,
      selected_color: None,
      selected_size: None,
    }];
    cart.reduce(CartAction::Hydrate(items.clone()));
    assert_eq!(cart.items, items);
  }
}
