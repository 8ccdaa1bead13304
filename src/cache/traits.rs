//! Core types for the offline request cache.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use url::Url;

/// What kind of resource a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
  /// Page navigation
  Document,
  Image,
  Font,
  Script,
  Style,
  /// Anything else (fetch/XHR, manifests, ...)
  #[default]
  Other,
}

/// An outgoing request as seen by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: String,
  pub url: Url,
  pub destination: Destination,
}

impl Request {
  pub fn get(url: Url, destination: Destination) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      destination,
    }
  }

  pub fn is_get(&self) -> bool {
    self.method.eq_ignore_ascii_case("GET")
  }

  /// URL used as the cache key (fragment stripped).
  pub fn cache_url(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.into()
  }
}

/// A response, either from the network, from a partition or synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  /// Cross-origin response whose status and body are hidden
  pub opaque: bool,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      opaque: false,
      content_type: content_type.map(String::from),
      body: body.into(),
    }
  }

  /// Placeholder served when neither network nor cache can answer.
  pub fn offline() -> Self {
    Self::new(503, Some("text/plain"), "Offline")
  }

  /// Empty not-found response for missing cache-first assets.
  pub fn not_found() -> Self {
    Self::new(404, None, Vec::new())
  }

  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Only complete responses, or opaque ones, are worth storing.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 || self.opaque
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Install-time fallback served in place of the requested resource.
  pub fn fallback(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Fallback,
      cached_at: Some(cached_at),
    }
  }

  pub fn synthesized(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Synthesized,
      cached_at: None,
    }
  }
}

/// Indicates where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Live network response
  Network,
  /// Stored response for the same request
  Cache,
  /// Pre-cached offline page
  Fallback,
  /// Built locally because nothing else was available
  Synthesized,
}
