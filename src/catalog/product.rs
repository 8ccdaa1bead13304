//! Product records and the synthetic catalog generator.

use color_eyre::{eyre::eyre, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A catalog product. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: String,
  pub name: String,
  pub price: f64,
  pub category: String,
  pub rating: f64,
  pub is_new: bool,
  pub image: String,
  pub image_alt: String,
}

/// Default category set used when the config does not name one.
pub const DEFAULT_CATEGORIES: &[&str] = &[
  "electronics",
  "clothing",
  "home",
  "sports",
  "books",
  "toys",
  "beauty",
  "automotive",
];

const NAMES: [&str; 10] = [
  "Premium Wireless Bluetooth Headphones",
  "Ultra HD 4K Smart Television",
  "Professional DSLR Camera Kit",
  "Ergonomic Office Chair",
  "Stainless Steel Coffee Maker",
  "Portable Power Bank 20000mAh",
  "Gaming Mechanical Keyboard",
  "Fitness Tracker Smart Watch",
  "Memory Foam Mattress Queen",
  "Electric Standing Desk",
];

pub const MIN_PRICE: f64 = 10.0;
pub const MAX_PRICE: f64 = 510.0;
pub const MIN_RATING: f64 = 3.0;
pub const MAX_RATING: f64 = 5.0;

/// Generate the product at `index`.
///
/// Name, category, id, `is_new` and image are derived from the index.
/// Price and rating are drawn fresh on every call.
#[allow(dead_code)]
pub fn generate(index: u64, categories: &[String]) -> Result<Product> {
  generate_with(&mut rand::rng(), index, categories)
}

/// Generate every product in `range`.
pub fn generate_range(range: Range<u64>, categories: &[String]) -> Result<Vec<Product>> {
  let mut rng = rand::rng();
  range
    .map(|index| generate_with(&mut rng, index, categories))
    .collect()
}

fn generate_with<R: Rng>(rng: &mut R, index: u64, categories: &[String]) -> Result<Product> {
  if categories.is_empty() {
    return Err(eyre!("Cannot generate products without categories"));
  }

  let category = &categories[(index % categories.len() as u64) as usize];
  let base_name = NAMES[(index % NAMES.len() as u64) as usize];
  let number = index + 1;
  let name = format!("{} - Model {}", base_name, number);

  let price = round_to(rng.random_range(MIN_PRICE..=MAX_PRICE), 2);
  let rating = round_to(rng.random_range(MIN_RATING..=MAX_RATING), 1);

  Ok(Product {
    id: format!("product-{}", number),
    image_alt: format!("{} in {}", name, category),
    name,
    price,
    category: category.clone(),
    rating,
    is_new: index % 50 == 0,
    image: format!("https://picsum.photos/seed/{}/400/600", number),
  })
}

fn round_to(value: f64, decimals: i32) -> f64 {
  let factor = 10f64.powi(decimals);
  (value * factor).round() / factor
}
