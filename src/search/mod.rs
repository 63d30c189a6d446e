//! Website lookup: turns an organization name into a candidate website URL.

mod duckduckgo;
mod google;
mod grounded;

pub use duckduckgo::DuckDuckGo;
pub use google::GoogleCustomSearch;
pub use grounded::GeminiLookup;

use crate::gemini::GeminiError;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search rate limited (gave up after {0} attempts)")]
    RateLimited(u32),

    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search failed: status {0}")]
    Status(u16),

    #[error("{0}")]
    Gemini(#[from] GeminiError),
}

/// Abstraction over search providers.
/// `Ok(None)` means the provider answered but had no usable result.
pub trait WebSearch {
    async fn find_website(&self, query: &str) -> Result<Option<String>, SearchError>;
}

/// The provider selected on the command line.
pub enum SearchBackend {
    DuckDuckGo(DuckDuckGo),
    Google(GoogleCustomSearch),
    Gemini(GeminiLookup),
}

impl WebSearch for SearchBackend {
    async fn find_website(&self, query: &str) -> Result<Option<String>, SearchError> {
        match self {
            SearchBackend::DuckDuckGo(s) => s.find_website(query).await,
            SearchBackend::Google(s) => s.find_website(query).await,
            SearchBackend::Gemini(s) => s.find_website(query).await,
        }
    }
}
