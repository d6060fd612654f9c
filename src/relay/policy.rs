use super::RelayError;
use serde::Serialize;
use url::Url;

/// Allow-list deciding which image URLs the relay will fetch.
///
/// Kept as plain data so deployments can widen or narrow it without touching
/// the relay itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    /// Trusted domains; a host matches on equality or as a subdomain.
    pub hosts: Vec<String>,
    /// Lower-case file extensions (without dot) that mark an image resource.
    pub image_extensions: Vec<String>,
    /// Path segments that mark a media/photo resource.
    pub media_segments: Vec<String>,
    /// Path fragments that identify listing or detail pages.
    pub listing_markers: Vec<String>,
    /// Referer sent upstream to satisfy hotlink protection.
    pub referer: Option<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl TrustPolicy {
    /// Image CDNs for the supported listing marketplace.
    pub fn listing_images() -> Self {
        Self {
            hosts: owned(&["zillowstatic.com", "zillow.com"]),
            image_extensions: owned(&["jpg", "jpeg", "png", "webp", "avif", "gif"]),
            media_segments: owned(&["photos", "photo", "images", "image", "media", "fp", "img"]),
            listing_markers: owned(&[
                "/homedetails/",
                "/homes/",
                "/b/",
                "/apartments/",
                "/community/",
                "/profile/",
                "/search/",
            ]),
            referer: Some("https://www.zillow.com/".to_string()),
        }
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts
            .into_iter()
            .map(|h| {
                let h: String = h.into();
                h.trim().trim_start_matches("*.").to_ascii_lowercase()
            })
            .filter(|h| !h.is_empty())
            .collect();
        self
    }

    pub fn with_referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer;
        self
    }

    pub fn is_trusted_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.hosts
            .iter()
            .any(|trusted| host == *trusted || host.ends_with(&format!(".{trusted}")))
    }

    /// Checks run in order: syntax, host, listing-page shape, image shape.
    pub fn evaluate(&self, raw: &str) -> Result<Url, RelayError> {
        let url = Url::parse(raw.trim()).map_err(|_| RelayError::InvalidUrl(raw.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::InvalidUrl(raw.to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| RelayError::InvalidUrl(raw.to_string()))?;
        if !self.is_trusted_host(host) {
            return Err(RelayError::UntrustedHost(host.to_string()));
        }

        let path = url.path().to_ascii_lowercase();
        if self.listing_markers.iter().any(|m| path.contains(m.as_str())) {
            return Err(RelayError::LooksLikeListingPage);
        }

        let has_image_extension = path
            .rsplit('/')
            .next()
            .and_then(|last| last.rsplit_once('.'))
            .is_some_and(|(_, ext)| self.image_extensions.iter().any(|e| e == ext));
        let has_media_segment = path
            .split('/')
            .any(|segment| self.media_segments.iter().any(|m| m == segment));
        if !has_image_extension && !has_media_segment {
            return Err(RelayError::NotAnImageResource);
        }

        Ok(url)
    }

    pub fn eligibility(&self, raw: &str) -> ImageEligibility {
        match self.evaluate(raw) {
            Ok(_) => ImageEligibility {
                allowed: true,
                reason: "trusted-image",
            },
            Err(e) => ImageEligibility {
                allowed: false,
                reason: e.code(),
            },
        }
    }
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::listing_images()
    }
}

/// Per-URL decision; `reason` is a rejection code or `trusted-image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageEligibility {
    pub allowed: bool,
    pub reason: &'static str,
}
