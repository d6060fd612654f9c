use crate::coordinator::ExtractorConfig;
use crate::fetcher::FetchConfig;
use crate::relay::{TrustPolicy, DEFAULT_MAX_IMAGE_BYTES};
use crate::schema::FieldSchema;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::time::Duration;

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub fetch: FetchConfig,
    pub extractor: ExtractorConfig,
    pub schema: FieldSchema,
    pub image_policy: TrustPolicy,
    pub relay_timeout: Duration,
    pub relay_max_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&get, "PORT", 3000u16)?;
        let fetch = FetchConfig {
            timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 30u64)?),
            max_redirects: parse_or(&get, "FETCH_MAX_REDIRECTS", 10usize)?,
        };
        let extractor = ExtractorConfig {
            field_timeout: Duration::from_millis(parse_or(&get, "EXTRACTOR_TIMEOUT_MS", 2000u64)?),
        };

        let mut schema = FieldSchema::listing();
        if let Some(overrides) = get("FIELD_TIERS") {
            schema = schema
                .with_overrides(&overrides)
                .context("invalid FIELD_TIERS")?;
        }

        let mut image_policy = TrustPolicy::listing_images();
        if let Some(hosts) = get("IMAGE_TRUSTED_HOSTS") {
            image_policy = image_policy.with_hosts(hosts.split(','));
            if image_policy.hosts.is_empty() {
                anyhow::bail!("IMAGE_TRUSTED_HOSTS does not name any host");
            }
        }
        if let Some(referer) = get("IMAGE_REFERER") {
            image_policy = image_policy.with_referer(Some(referer));
        }

        let relay_timeout = Duration::from_secs(parse_or(&get, "RELAY_TIMEOUT_SECS", 15u64)?);
        let relay_max_bytes = parse_or(&get, "RELAY_MAX_BYTES", DEFAULT_MAX_IMAGE_BYTES)?;

        Ok(Self {
            port,
            fetch,
            extractor,
            schema,
            image_policy,
            relay_timeout,
            relay_max_bytes,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid {key} value `{raw}`")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Tier};
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.fetch.timeout, Duration::from_secs(30));
        assert_eq!(cfg.fetch.max_redirects, 10);
        assert_eq!(cfg.extractor.field_timeout, Duration::from_millis(2000));
        assert_eq!(cfg.relay_timeout, Duration::from_secs(15));
        assert_eq!(cfg.relay_max_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(cfg.schema, FieldSchema::listing());
        assert_eq!(cfg.image_policy, TrustPolicy::listing_images());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("FETCH_TIMEOUT_SECS", "5"),
            ("EXTRACTOR_TIMEOUT_MS", "250"),
            ("FIELD_TIERS", "squareFeet=important, features=required"),
            ("IMAGE_TRUSTED_HOSTS", "cdn.example.com, img.example.net"),
            ("IMAGE_REFERER", "https://www.example.com/"),
            ("RELAY_MAX_BYTES", "1048576"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.fetch.timeout, Duration::from_secs(5));
        assert_eq!(cfg.extractor.field_timeout, Duration::from_millis(250));
        assert_eq!(cfg.schema.tier_of(Field::SquareFeet), Some(Tier::Important));
        assert_eq!(cfg.schema.tier_of(Field::Features), Some(Tier::Required));
        assert_eq!(cfg.image_policy.hosts, vec!["cdn.example.com", "img.example.net"]);
        assert_eq!(cfg.image_policy.referer.as_deref(), Some("https://www.example.com/"));
        assert_eq!(cfg.relay_max_bytes, 1_048_576);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = config(&[("PORT", "  "), ("FIELD_TIERS", "")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.schema, FieldSchema::listing());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("FIELD_TIERS", "price=critical")]).is_err());
        assert!(config(&[("FIELD_TIERS", "garage=optional")]).is_err());
        assert!(config(&[("IMAGE_TRUSTED_HOSTS", " , ")]).is_err());
    }
}
