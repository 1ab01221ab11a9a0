//! Request and response value types shared by the cache, network, and worker.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
      Method::Options => "OPTIONS",
    }
  }
}

/// An intercepted request, identified by method and URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: Url,
}

impl Request {
  pub fn new(method: Method, url: &str) -> Result<Self> {
    let url = Url::parse(url).map_err(|e| eyre!("Invalid request URL {}: {}", url, e))?;
    Ok(Self { method, url })
  }

  /// Shorthand for a GET request.
  pub fn get(url: &str) -> Result<Self> {
    Self::new(Method::Get, url)
  }

  /// Whether this request may be served from and written to the cache.
  /// Only GET participates; everything else bypasses the cache entirely.
  pub fn is_cacheable(&self) -> bool {
    self.method == Method::Get
  }

  /// Stable, fixed-length cache key for this request.
  pub fn cache_key(&self) -> String {
    let input = format!("{}:{}", self.method.as_str(), self.url);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Origin classification of a response, relative to the request that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
  /// Same-origin response with a verifiable status
  Basic,
  /// Cross-origin response obtained with CORS
  Cors,
  /// Cross-origin response whose status cannot be verified
  Opaque,
}

/// A captured response: status, headers, body, and origin kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  pub url: String,
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub kind: ResponseKind,
}

impl Response {
  /// Whether this response is allowed into the cache: a same-origin
  /// "basic" response with HTTP status 200. Opaque responses are never
  /// cached since their success cannot be verified.
  pub fn is_cache_worthy(&self) -> bool {
    self.status == 200 && self.kind == ResponseKind::Basic
  }

  pub fn body_text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Classify a response origin against the request origin.
pub fn classify_origin(request_url: &Url, response_url: &Url, cors: bool) -> ResponseKind {
  if request_url.origin() == response_url.origin() {
    ResponseKind::Basic
  } else if cors {
    ResponseKind::Cors
  } else {
    ResponseKind::Opaque
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_get_is_cacheable() {
    let get = Request::get("https://app.safeverse.io/").unwrap();
    assert!(get.is_cacheable());

    for method in [Method::Head, Method::Post, Method::Put, Method::Delete, Method::Patch] {
      let req = Request::new(method, "https://app.safeverse.io/").unwrap();
      assert!(!req.is_cacheable());
    }
  }

  #[test]
  fn test_cache_key_is_stable_and_method_sensitive() {
    let a = Request::get("https://app.safeverse.io/feed").unwrap();
    let b = Request::get("https://app.safeverse.io/feed").unwrap();
    let c = Request::new(Method::Head, "https://app.safeverse.io/feed").unwrap();

    assert_eq!(a.cache_key(), b.cache_key());
    assert_ne!(a.cache_key(), c.cache_key());
    assert_eq!(a.cache_key().len(), 64);
  }

  #[test]
  fn test_classify_origin() {
    let req = Url::parse("https://app.safeverse.io/feed").unwrap();
    let same = Url::parse("https://app.safeverse.io/other").unwrap();
    let cross = Url::parse("https://cdn.example.com/lib.js").unwrap();

    assert_eq!(classify_origin(&req, &same, false), ResponseKind::Basic);
    assert_eq!(classify_origin(&req, &cross, true), ResponseKind::Cors);
    assert_eq!(classify_origin(&req, &cross, false), ResponseKind::Opaque);
  }

  #[test]
  fn test_cache_worthiness() {
    let mut resp = Response {
      url: "https://app.safeverse.io/".into(),
      status: 200,
      headers: vec![("content-type".into(), "text/html".into())],
      body: b"<html></html>".to_vec(),
      kind: ResponseKind::Basic,
    };
    assert!(resp.is_cache_worthy());

    resp.status = 404;
    assert!(!resp.is_cache_worthy());

    resp.status = 200;
    resp.kind = ResponseKind::Opaque;
    assert!(!resp.is_cache_worthy());
  }
}
