//! SDK configuration
//!
//! Defaults, environment overrides (`FOLIO_*`) and `.env` loading.

use crate::error::{Result, SdkError};
use chrono::Datelike;
use folio_client::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Earliest publication year a literature search covers when none is given
pub const DEFAULT_EARLIEST_LITERATURE_YEAR: i32 = 1900;

/// Keyword of a search tab that has been opened but not yet queried
pub const NEW_LITERATURE_SEARCH: &str = "new-literature-search";

/// Route the OAuth provider redirects back to
pub const DEFAULT_OAUTH_CALLBACK_PATH: &str = "/api/auth/callback";

/// Configuration for the Folio data layer
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Transport configuration
    pub client: ClientConfig,
    /// Origin the application is served from (OAuth callback host)
    pub app_origin: String,
    /// Path appended to `app_origin` for the OAuth callback
    pub oauth_callback_path: String,
    /// Default start year for literature searches
    pub earliest_literature_year: i32,
    /// Keyword sentinel for an empty search tab; never searched
    pub new_search_sentinel: String,
    /// How long a fetched profile stays fresh (None = until invalidated)
    pub profile_stale_time: Option<Duration>,
    /// How long search results stay fresh (None = until invalidated)
    pub literature_stale_time: Option<Duration>,
    /// Directory for materialized content; system temp dir when unset
    pub content_dir: Option<PathBuf>,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            app_origin: "http://localhost:3000".to_string(),
            oauth_callback_path: DEFAULT_OAUTH_CALLBACK_PATH.to_string(),
            earliest_literature_year: DEFAULT_EARLIEST_LITERATURE_YEAR,
            new_search_sentinel: NEW_LITERATURE_SEARCH.to_string(),
            profile_stale_time: None,
            literature_stale_time: None,
            content_dir: None,
        }
    }
}

impl SdkConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self {
            client: ClientConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("FOLIO_APP_ORIGIN") {
            config.app_origin = val;
        }

        if let Ok(val) = std::env::var("FOLIO_OAUTH_CALLBACK_PATH") {
            config.oauth_callback_path = val;
        }

        if let Ok(val) = std::env::var("FOLIO_EARLIEST_LITERATURE_YEAR") {
            if let Ok(year) = val.parse::<i32>() {
                config.earliest_literature_year = year;
            }
        }

        if let Ok(val) = std::env::var("FOLIO_NEW_SEARCH_SENTINEL") {
            config.new_search_sentinel = val;
        }

        if let Ok(val) = std::env::var("FOLIO_PROFILE_STALE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.profile_stale_time = Some(Duration::from_secs(secs));
            }
        }

        if let Ok(val) = std::env::var("FOLIO_LITERATURE_STALE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.literature_stale_time = Some(Duration::from_secs(secs));
            }
        }

        if let Ok(val) = std::env::var("FOLIO_CONTENT_DIR") {
            config.content_dir = Some(PathBuf::from(val));
        }

        config
    }

    /// Load a `.env` file if present, then read the environment
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Full OAuth redirect target
    pub fn oauth_redirect_target(&self) -> String {
        format!(
            "{}{}",
            self.app_origin.trim_end_matches('/'),
            self.oauth_callback_path
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.app_origin.is_empty() {
            return Err(SdkError::Config("app_origin must not be empty".into()));
        }

        let current = chrono::Local::now().year();
        if self.earliest_literature_year > current {
            return Err(SdkError::Config(format!(
                "earliest_literature_year {} is after the current year {}",
                self.earliest_literature_year, current
            )));
        }

        if self.new_search_sentinel.is_empty() {
            return Err(SdkError::Config(
                "new_search_sentinel must not be empty".into(),
            ));
        }

        Ok(())
    }
}
