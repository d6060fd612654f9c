use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use std::time::Duration;
use thiserror::Error;
use url::Url;

// Desktop browsers rotated per request; the first entry doubles as the fallback.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0",
];

pub(crate) fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

// Markers of an anti-bot interstitial served with a 2xx status.
const CHALLENGE_PATTERNS: [&str; 8] = [
    "press & hold",
    "prove you're not a robot",
    "unusual traffic",
    "automated requests",
    "hcaptcha",
    "g-recaptcha",
    "px-captcha",
    "are you a human",
];

// Real listing pages are far larger; interstitials are small.
const CHALLENGE_MAX_BYTES: usize = 60_000;

/// Raw page as fetched, before any parsing.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub requested_url: String,
    pub final_url: Url,
    pub status: u16,
    pub html: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid url `{0}`")]
    InvalidUrl(String),
    #[error("listing page returned HTTP {status_code}")]
    Status { status_code: u16 },
    #[error("network failure fetching listing page: {reason}")]
    Transient { reason: String },
    #[error("listing source served an anti-bot challenge instead of the page")]
    Challenge,
}

impl FetchError {
    /// Whether a caller may reasonably retry with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transient { .. } | FetchError::Challenge => true,
            FetchError::Status { status_code } => *status_code == 429 || *status_code >= 500,
            FetchError::InvalidUrl(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status_code } => Some(*status_code),
            _ => None,
        }
    }
}

/// Anything that can produce raw listing page content for a URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawContent, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// HTTP page fetcher dressed up as a desktop browser.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client })
    }
}

/// Only absolute http(s) URLs are fetchable.
pub fn parse_page_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

fn browser_headers(url: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    // Listing sources expect navigation from their own pages.
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", url.origin().ascii_serialization())) {
        headers.insert(REFERER, referer);
    }
    headers
}

pub(crate) fn looks_like_challenge(html: &str) -> bool {
    if html.len() > CHALLENGE_MAX_BYTES {
        return false;
    }
    let lower = html.to_lowercase();
    CHALLENGE_PATTERNS.iter().any(|p| lower.contains(p))
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, raw_url: &str) -> Result<RawContent, FetchError> {
        let url = parse_page_url(raw_url)?;
        let user_agent = pick_user_agent();
        tracing::debug!(%url, user_agent, "fetching listing page");

        let resp = self
            .client
            .get(url.clone())
            .headers(browser_headers(&url))
            .header(reqwest::header::USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| FetchError::Transient {
                reason: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = resp.status().as_u16();
        let final_url = resp.url().clone();
        if !resp.status().is_success() {
            tracing::warn!(%url, status, "listing page fetch rejected");
            return Err(FetchError::Status { status_code: status });
        }
        if final_url != url {
            tracing::debug!(%final_url, "followed redirects");
        }

        let html = resp.text().await.map_err(|e| FetchError::Transient {
            reason: e.to_string(),
        })?;
        tracing::debug!(bytes = html.len(), "fetched listing html");

        if looks_like_challenge(&html) {
            tracing::warn!(%url, bytes = html.len(), "⚠️ challenge page detected");
            return Err(FetchError::Challenge);
        }

        Ok(RawContent {
            requested_url: raw_url.to_string(),
            final_url,
            status,
            html,
        })
    }
}
