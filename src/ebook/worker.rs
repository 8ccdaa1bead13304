//! Off-thread block generation.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::blocks::{generate_blocks, Block};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
  pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockResponse {
  pub blocks: Vec<Block>,
  /// Outcome of the busy loop
  pub result: f64,
}

/// Runs the CPU-heavy part of preparing a document on a blocking thread
/// so async tasks keep running meanwhile.
#[derive(Debug, Clone, Copy)]
pub struct BlockWorker {
  iterations: u64,
}

impl BlockWorker {
  pub fn new(iterations: u64) -> Self {
    Self { iterations }
  }

  pub async fn run(&self, request: BlockRequest) -> Result<BlockResponse> {
    let iterations = self.iterations;

    tokio::task::spawn_blocking(move || {
      let started = Instant::now();
      let result = busy_sum(iterations);
      let blocks = generate_blocks(request.count);
      debug!(
        count = blocks.len(),
        iterations,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Generated blocks"
      );
      BlockResponse { blocks, result }
    })
    .await
    .map_err(|e| eyre!("Block worker failed: {}", e))
  }
}

/// Sum of `sqrt(i)` for `i` in `0..iterations`.
pub fn busy_sum(iterations: u64) -> f64 {
  (0..iterations).map(|i| (i as f64).sqrt()).sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_busy_sum() {
    assert_eq!(busy_sum(0), 0.0);
    // 0 + 1 + sqrt(2) + sqrt(3)
    let expected = 1.0 + 2f64.sqrt() + 3f64.sqrt();
    assert!((busy_sum(4) - expected).abs() < 1e-12);
  }

  #[tokio::test]
  async fn test_run_returns_blocks_and_result() {
    let worker = BlockWorker::new(10);
    let response = worker.run(BlockRequest { count: 20 }).await.unwrap();

    assert_eq!(response.blocks.len(), 20);
    assert_eq!(response.blocks[19].id, "block-19");
    assert!((response.result - busy_sum(10)).abs() < 1e-12);
  }

  #[test]
  fn test_message_shape() {
    let request: BlockRequest = serde_json::from_str(r#"{"count":500}"#).unwrap();
    assert_eq!(request.count, 500);

    let response = BlockResponse {
      blocks: Vec::new(),
      result: 1.5,
    };
    assert_eq!(
      serde_json::to_value(&response).unwrap(),
      serde_json::json!({ "blocks": [], "result": 1.5 })
    );
  }
}
