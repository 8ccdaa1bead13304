//! Request routing and caching strategies of the offline cache.

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OfflineConfig;

use super::network::Network;
use super::storage::{CacheStorage, CachedResponse};
use super::traits::{CacheResult, Destination, Request, Response};

/// The four partitions of one cache version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
  pub html: String,
  pub static_assets: String,
  pub images: String,
  pub fonts: String,
}

impl CacheNames {
  pub fn new(version: &str) -> Self {
    Self {
      html: format!("html-{}", version),
      static_assets: format!("static-{}", version),
      images: format!("images-{}", version),
      fonts: format!("fonts-{}", version),
    }
  }

  pub fn all(&self) -> [&str; 4] {
    [&self.html, &self.static_assets, &self.images, &self.fonts]
  }

  pub fn contains(&self, name: &str) -> bool {
    self.all().contains(&name)
  }
}

/// How a request is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
  /// Live page, falling back to the pre-cached offline page
  NetworkFirstDocument,
  /// Stored copy if present, network otherwise
  CacheFirst(String),
  /// Stored copy now, refreshed in the background
  StaleWhileRevalidate(String),
  /// Network, falling back to the stored copy
  NetworkFirst(String),
}

/// Offline request cache.
///
/// Sits in front of the network and answers GET requests according to
/// their destination. Storage errors are logged and treated as misses;
/// network errors fall back to cached or synthesized responses.
pub struct ServiceWorker<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: Arc<N>,
  names: CacheNames,
  origin: Url,
  precache: Vec<String>,
  fallback_page: String,
  font_hosts: Vec<String>,
  /// Background revalidations not yet awaited
  pending: Mutex<Vec<JoinHandle<()>>>,
}

impl<S: CacheStorage + 'static, N: Network> ServiceWorker<S, N> {
  pub fn new(storage: S, network: N, config: &OfflineConfig) -> Result<Self> {
    let origin = Url::parse(&config.origin)
      .map_err(|e| eyre!("Invalid origin {}: {}", config.origin, e))?;

    Ok(Self {
      storage: Arc::new(storage),
      network: Arc::new(network),
      names: CacheNames::new(&config.version),
      origin,
      precache: config.precache.clone(),
      fallback_page: config.fallback_page.clone(),
      font_hosts: config.font_hosts.clone(),
      pending: Mutex::new(Vec::new()),
    })
  }

  pub fn names(&self) -> &CacheNames {
    &self.names
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Pick the strategy for a request. `None` means the request passes
  /// through untouched (anything but GET).
  pub fn route(&self, request: &Request) -> Option<Strategy> {
    if !request.is_get() {
      return None;
    }

    let strategy = match request.destination {
      Destination::Document => Strategy::NetworkFirstDocument,
      Destination::Image => Strategy::CacheFirst(self.names.images.clone()),
      _ if self.is_font(request) => Strategy::CacheFirst(self.names.fonts.clone()),
      Destination::Script | Destination::Style => {
        Strategy::StaleWhileRevalidate(self.names.static_assets.clone())
      }
      _ => Strategy::NetworkFirst(self.names.static_assets.clone()),
    };

    Some(strategy)
  }

  fn is_font(&self, request: &Request) -> bool {
    request.destination == Destination::Font
      || request
        .url
        .host_str()
        .is_some_and(|host| self.font_hosts.iter().any(|h| h == host))
  }

  /// Pre-cache the offline fallback resources into the HTML partition.
  ///
  /// All resources must fetch successfully; otherwise nothing is stored.
  pub async fn install(&self) -> Result<usize> {
    let requests = self
      .precache
      .iter()
      .map(|path| {
        self
          .origin
          .join(path)
          .map(|url| Request::get(url, Destination::Other))
          .map_err(|e| eyre!("Invalid pre-cache path {}: {}", path, e))
      })
      .collect::<Result<Vec<_>>>()?;

    let responses =
      futures::future::try_join_all(requests.iter().map(|r| self.network.fetch(r))).await?;

    let mut entries = Vec::with_capacity(requests.len());
    for (request, response) in requests.iter().zip(responses) {
      if !response.is_ok() {
        return Err(eyre!(
          "Pre-cache of {} failed with status {}",
          request.url,
          response.status
        ));
      }
      entries.push((request.cache_url(), response));
    }

    self.storage.put_all(&self.names.html, &entries)?;
    info!(partition = %self.names.html, count = entries.len(), "Installed offline fallback");

    Ok(entries.len())
  }

  /// Delete every partition that does not belong to the current version.
  pub async fn activate(&self) -> Result<Vec<String>> {
    let mut deleted = Vec::new();

    for partition in self.storage.partitions()? {
      if self.names.contains(&partition) {
        continue;
      }
      self.storage.delete_partition(&partition)?;
      info!(%partition, "Deleted stale cache partition");
      deleted.push(partition);
    }

    Ok(deleted)
  }

  /// Answer a request. Returns `None` for requests that are not intercepted.
  pub async fn handle_fetch(&self, request: &Request) -> Option<CacheResult<Response>> {
    let strategy = self.route(request)?;
    debug!(url = %request.url, ?strategy, "Routing request");

    let result = match strategy {
      Strategy::NetworkFirstDocument => self.network_first_document(request).await,
      Strategy::CacheFirst(partition) => self.cache_first(request, &partition).await,
      Strategy::StaleWhileRevalidate(partition) => {
        self.stale_while_revalidate(request, &partition).await
      }
      Strategy::NetworkFirst(partition) => self.network_first(request, &partition).await,
    };

    Some(result)
  }

  /// Wait for background revalidations started so far.
  pub async fn settle(&self) {
    let handles = {
      let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
      std::mem::take(&mut *pending)
    };

    for handle in handles {
      if let Err(e) = handle.await {
        warn!(error = %e, "Revalidation task failed");
      }
    }
  }

  async fn network_first_document(&self, request: &Request) -> CacheResult<Response> {
    match self.network.fetch(request).await {
      Ok(response) => CacheResult::from_network(response),
      Err(e) => {
        debug!(url = %request.url, error = %e, "Navigation failed, serving offline page");
        let fallback = self
          .origin
          .join(&self.fallback_page)
          .ok()
          .and_then(|url| lookup(self.storage.as_ref(), &self.names.html, url.as_str()));

        match fallback {
          Some(cached) => CacheResult::fallback(cached.response, cached.cached_at),
          None => CacheResult::synthesized(Response::offline()),
        }
      }
    }
  }

  async fn network_first(&self, request: &Request, partition: &str) -> CacheResult<Response> {
    let url = request.cache_url();

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.is_cacheable() {
          store(self.storage.as_ref(), partition, &url, &response);
        }
        CacheResult::from_network(response)
      }
      Err(e) => {
        debug!(%url, error = %e, "Network failed, trying cache");
        match lookup(self.storage.as_ref(), partition, &url) {
          Some(cached) => CacheResult::from_cache(cached.response, cached.cached_at),
          None => CacheResult::synthesized(Response::offline()),
        }
      }
    }
  }

  async fn cache_first(&self, request: &Request, partition: &str) -> CacheResult<Response> {
    let url = request.cache_url();

    if let Some(cached) = lookup(self.storage.as_ref(), partition, &url) {
      return CacheResult::from_cache(cached.response, cached.cached_at);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.is_cacheable() {
          store(self.storage.as_ref(), partition, &url, &response);
        }
        CacheResult::from_network(response)
      }
      Err(e) => {
        debug!(%url, error = %e, "Asset unavailable");
        CacheResult::synthesized(Response::not_found())
      }
    }
  }

  async fn stale_while_revalidate(
    &self,
    request: &Request,
    partition: &str,
  ) -> CacheResult<Response> {
    let url = request.cache_url();

    let Some(cached) = lookup(self.storage.as_ref(), partition, &url) else {
      // Nothing stored: the caller waits on the network.
      return match self.network.fetch(request).await {
        Ok(response) => {
          if response.is_cacheable() {
            store(self.storage.as_ref(), partition, &url, &response);
          }
          CacheResult::from_network(response)
        }
        Err(e) => {
          debug!(%url, error = %e, "Asset unavailable");
          CacheResult::synthesized(Response::offline())
        }
      };
    };

    let storage = Arc::clone(&self.storage);
    let fetch = self.network.fetch(request);
    let partition = partition.to_string();
    let handle = tokio::spawn(async move {
      match fetch.await {
        Ok(response) if response.is_cacheable() => {
          store(storage.as_ref(), &partition, &url, &response);
          debug!(%url, "Revalidated");
        }
        Ok(response) => debug!(%url, status = response.status, "Revalidation not cacheable"),
        Err(e) => debug!(%url, error = %e, "Revalidation failed"),
      }
    });
    let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
    pending.retain(|h| !h.is_finished());
    pending.push(handle);
    drop(pending);

    CacheResult::from_cache(cached.response, cached.cached_at)
  }
}

fn lookup<S: CacheStorage + ?Sized>(storage: &S, partition: &str, url: &str) -> Option<CachedResponse> {
  storage.match_url(partition, url).unwrap_or_else(|e| {
    warn!(%partition, %url, error = %e, "Cache lookup failed");
    None
  })
}

fn store<S: CacheStorage + ?Sized>(storage: &S, partition: &str, url: &str, response: &Response) {
  if let Err(e) = storage.put(partition, url, response) {
    warn!(%partition, %url, error = %e, "Failed to store response");
  }
}
