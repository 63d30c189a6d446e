//! Run configuration and service credentials.
//!
//! Credentials are read from the environment once in `main` and handed to the
//! clients explicitly; nothing below reads `std::env` on its own.

use std::env;
use std::time::Duration;

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey")]
    MissingGeminiKey,

    #[error("GOOGLE_API_KEY and GOOGLE_CSE_ID must both be set to use the google search engine")]
    MissingGoogleSearch,
}

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: ApiKey,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct GoogleSearchConfig {
    pub api_key: ApiKey,
    pub engine_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    gemini: Option<GeminiConfig>,
    google: Option<GoogleSearchConfig>,
}

impl Credentials {
    /// Reads `GEMINI_API_KEY`, `GEMINI_MODEL`, `GOOGLE_API_KEY` and `GOOGLE_CSE_ID`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini = var("GEMINI_API_KEY").map(|key| GeminiConfig {
            api_key: ApiKey::new(key),
            model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        });

        let google = match (var("GOOGLE_API_KEY"), var("GOOGLE_CSE_ID")) {
            (Some(key), Some(engine_id)) => Some(GoogleSearchConfig {
                api_key: ApiKey::new(key),
                engine_id,
            }),
            _ => None,
        };

        Self { gemini, google }
    }

    pub fn gemini(&self) -> Result<&GeminiConfig, ConfigError> {
        self.gemini.as_ref().ok_or(ConfigError::MissingGeminiKey)
    }

    pub fn google(&self) -> Result<&GoogleSearchConfig, ConfigError> {
        self.google.as_ref().ok_or(ConfigError::MissingGoogleSearch)
    }
}

/// Parameters of a single run, fixed once the command line is parsed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub n_associations: usize,
    /// Maximum number of fields requested from each site.
    pub limit: usize,
    pub source_link: String,
    /// Fields to ask for, in priority order; only the first `limit` are used.
    pub fields: Vec<String>,
    /// Appended to every website search query.
    pub query_suffix: Option<String>,
    pub site_timeout: Duration,
    pub verbose: bool,
}
