//! Image resolver/relay.
//!
//! Listing photos are usually hotlink protected. The relay fetches a photo on
//! the caller's behalf with browser-like headers, but only for URLs the
//! [`TrustPolicy`] accepts, so it never becomes an open page proxy.

mod policy;

pub use policy::{ImageEligibility, TrustPolicy};

use crate::fetcher::pick_user_agent;
use reqwest::header::{CONTENT_TYPE, LOCATION, REFERER, USER_AGENT};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Photos at a given URL never change, so consumers may cache them forever.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";
/// Upper bound on a relayed image body.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("`{0}` is not an absolute http(s) url")]
    InvalidUrl(String),
    #[error("host `{0}` is not a trusted image host")]
    UntrustedHost(String),
    #[error("url does not point at an image resource")]
    NotAnImageResource,
    #[error("url looks like a listing page, not an image")]
    LooksLikeListingPage,
    #[error("upstream image fetch failed{}", .status_code.map(|s| format!(" with HTTP {s}")).unwrap_or_default())]
    UpstreamFetch { status_code: Option<u16> },
}

impl RelayError {
    /// Stable reason code reported to callers.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidUrl(_) => "invalid-url",
            RelayError::UntrustedHost(_) => "untrusted-host",
            RelayError::NotAnImageResource => "not-an-image-resource",
            RelayError::LooksLikeListingPage => "looks-like-listing-page",
            RelayError::UpstreamFetch { .. } => "upstream-fetch-failed",
        }
    }
}

/// Relayed image bytes plus the headers the consumer should send on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: &'static str,
}

#[derive(Clone)]
pub struct ImageRelay {
    client: reqwest::Client,
    policy: TrustPolicy,
    max_bytes: usize,
}

impl ImageRelay {
    pub fn new(policy: TrustPolicy, timeout: Duration) -> reqwest::Result<Self> {
        // Redirects are followed by hand so every hop goes through the policy.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            policy,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub async fn resolve(&self, raw_url: &str) -> Result<RelayedImage, RelayError> {
        let mut url = self.policy.evaluate(raw_url).map_err(|e| {
            tracing::info!(url = raw_url, reason = e.code(), "image relay rejected url");
            e
        })?;

        let mut hops = 0;
        let mut resp = loop {
            let resp = self.send(&url).await?;
            let status = resp.status();
            if !status.is_redirection() {
                break resp;
            }
            hops += 1;
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok());
            let Some(location) = location.filter(|_| hops <= MAX_REDIRECTS) else {
                tracing::warn!(%url, status = status.as_u16(), hops, "image redirect not followed");
                return Err(RelayError::UpstreamFetch {
                    status_code: Some(status.as_u16()),
                });
            };
            let next = url
                .join(location)
                .map_err(|_| RelayError::InvalidUrl(location.to_string()))?;
            url = self.policy.evaluate(next.as_str()).map_err(|e| {
                tracing::warn!(from = %url, to = %next, reason = e.code(), "image redirect rejected");
                e
            })?;
        };

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "image upstream rejected request");
            return Err(RelayError::UpstreamFetch {
                status_code: Some(status.as_u16()),
            });
        }
        let too_large = RelayError::UpstreamFetch {
            status_code: Some(status.as_u16()),
        };

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // Header check only; bytes are passed through untouched.
        if let Some(ct) = &content_type {
            if !ct.to_ascii_lowercase().starts_with("image/") {
                tracing::warn!(%url, content_type = %ct, "upstream did not serve an image");
                return Err(RelayError::NotAnImageResource);
            }
        }

        if resp.content_length().is_some_and(|len| len > self.max_bytes as u64) {
            tracing::warn!(%url, max_bytes = self.max_bytes, "image exceeds size limit");
            return Err(too_large);
        }
        let mut bytes = Vec::new();
        loop {
            let chunk = resp.chunk().await.map_err(|e| {
                tracing::warn!(%url, error = %e, "image body read failed");
                RelayError::UpstreamFetch {
                    status_code: Some(status.as_u16()),
                }
            })?;
            let Some(chunk) = chunk else { break };
            if bytes.len() + chunk.len() > self.max_bytes {
                tracing::warn!(%url, max_bytes = self.max_bytes, "image exceeds size limit");
                return Err(too_large);
            }
            bytes.extend_from_slice(&chunk);
        }
        tracing::debug!(%url, bytes = bytes.len(), hops, "relayed image");

        Ok(RelayedImage {
            bytes,
            content_type: content_type.unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
            cache_control: IMMUTABLE_CACHE_CONTROL,
        })
    }

    async fn send(&self, url: &Url) -> Result<reqwest::Response, RelayError> {
        let mut request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, pick_user_agent())
            .header("Accept", "image/avif,image/webp,image/apng,image/*,*/*;q=0.8");
        if let Some(referer) = &self.policy.referer {
            request = request.header(REFERER, referer.as_str());
        }
        request.send().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "image upstream unreachable");
            RelayError::UpstreamFetch { status_code: None }
        })
    }
}
