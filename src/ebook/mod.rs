//! E-book reader content and its background worker.

pub mod blocks;
pub mod worker;

pub use worker::{BlockRequest, BlockWorker};
