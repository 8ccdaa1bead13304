//! Network access behind the offline cache.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::debug;

use super::traits::{Request, Response};

/// Performs requests the cache cannot answer by itself.
///
/// An `Err` means the request never completed (offline, DNS, timeout).
/// HTTP error statuses are ordinary responses.
pub trait Network: Send + Sync + 'static {
  fn fetch(&self, request: &Request) -> BoxFuture<'static, Result<Response>>;
}

/// HTTP network backed by `reqwest`.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Network for HttpNetwork {
  fn fetch(&self, request: &Request) -> BoxFuture<'static, Result<Response>> {
    let client = self.client.clone();
    let method = request.method.clone();
    let url = request.url.clone();

    Box::pin(async move {
      let method = reqwest::Method::from_bytes(method.as_bytes())
        .map_err(|e| eyre!("Invalid method {}: {}", method, e))?;

      let response = client
        .request(method, url.clone())
        .send()
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

      let status = response.status().as_u16();
      let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
      let body = response
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?;

      debug!(%url, status, bytes = body.len(), "Fetched from network");

      Ok(Response {
        status,
        opaque: false,
        content_type,
        body: body.to_vec(),
      })
    })
  }
}
