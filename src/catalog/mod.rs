//! Product catalog: records, generator and the product cache adapter.

pub mod cache;
pub mod product;

pub use cache::ProductCache;
pub use product::Product;
