//! Ingest configuration from the environment.

use anyhow::{Result, bail};

const DEFAULT_API_URL: &str = "https://api.jcdecaux.com/vls/v3/stations";

/// Where and how the ingest collaborator polls the station-status API.
///
/// The engine itself takes no configuration beyond the optional date
/// filter; everything here belongs to the loader/sink side of the run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub api_url: String,
    pub api_key: String,
}

impl IngestConfig {
    /// Builds the config from `STATION_API_URL` (optional) and
    /// `STATION_API_KEY` (required) in the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var("STATION_API_URL").ok(),
            std::env::var("STATION_API_KEY").ok(),
        )
    }

    fn from_vars(api_url: Option<String>, api_key: Option<String>) -> Result<Self> {
        let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
            bail!("STATION_API_KEY must be set to poll the station API");
        };

        Ok(Self {
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_an_error() {
        assert!(IngestConfig::from_vars(None, None).is_err());
        assert!(IngestConfig::from_vars(None, Some(String::new())).is_err());
    }

    #[test]
    fn test_default_url_applies_when_unset() {
        let config = IngestConfig::from_vars(None, Some("secret".to_string())).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_key, "secret");
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = IngestConfig::from_vars(
            Some("https://example.test/stations".to_string()),
            Some("secret".to_string()),
        )
        .unwrap();
        assert_eq!(config.api_url, "https://example.test/stations");
    }
}
