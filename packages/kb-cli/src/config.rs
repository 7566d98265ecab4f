use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

use kb_pipeline::fetchers::FIRECRAWL_API_URL;

/// Environment configuration shared by the KB binaries
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent key means no rendering fetch capability
    pub firecrawl_api_key: Option<String>,
    pub firecrawl_api_url: String,
    pub kb_root: PathBuf,
    /// Pins `generated_at` of published outputs
    pub source_timestamp: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            firecrawl_api_key: non_empty("FIRECRAWL_API_KEY"),
            firecrawl_api_url: non_empty("FIRECRAWL_API_URL")
                .unwrap_or_else(|| FIRECRAWL_API_URL.to_string()),
            kb_root: PathBuf::from(non_empty("KB_ROOT").unwrap_or_else(|| "kb".to_string())),
            source_timestamp: non_empty("SOURCE_TIMESTAMP"),
        })
    }

    /// The KB root, preferring an explicit flag over `KB_ROOT`.
    pub fn kb_root_or(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.unwrap_or_else(|| self.kb_root.clone())
    }

    /// Validate `SOURCE_TIMESTAMP` eagerly so a typo is reported up front.
    pub fn check_source_timestamp(&self) -> Result<()> {
        if let Some(raw) = &self.source_timestamp {
            let raw = raw.trim();
            let ok = chrono::DateTime::parse_from_rfc3339(raw).is_ok() || raw.parse::<i64>().is_ok();
            if !ok {
                return Err(anyhow::anyhow!("'{}' is neither RFC 3339 nor epoch seconds", raw))
                    .context("SOURCE_TIMESTAMP is invalid");
            }
        }
        Ok(())
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(source_timestamp: Option<&str>) -> Config {
        Config {
            firecrawl_api_key: None,
            firecrawl_api_url: FIRECRAWL_API_URL.to_string(),
            kb_root: PathBuf::from("kb"),
            source_timestamp: source_timestamp.map(str::to_string),
        }
    }

    #[test]
    fn test_flag_overrides_kb_root() {
        let config = config(None);
        assert_eq!(config.kb_root_or(None), PathBuf::from("kb"));
        assert_eq!(config.kb_root_or(Some("/data/kb".into())), PathBuf::from("/data/kb"));
    }

    #[test]
    fn test_source_timestamp_formats() {
        assert!(config(None).check_source_timestamp().is_ok());
        assert!(config(Some("2025-03-01T00:00:00Z")).check_source_timestamp().is_ok());
        assert!(config(Some("1740787200")).check_source_timestamp().is_ok());
        assert!(config(Some("yesterday")).check_source_timestamp().is_err());
    }
}
