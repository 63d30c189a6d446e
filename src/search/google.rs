use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{SearchError, WebSearch};
use crate::config::{ApiKey, GoogleSearchConfig};

const API_URL: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

/// Google Custom Search JSON API.
#[derive(Clone)]
pub struct GoogleCustomSearch {
    http: Client,
    api_key: ApiKey,
    engine_id: String,
    api_url: String,
}

impl GoogleCustomSearch {
    pub fn new(http: Client, config: &GoogleSearchConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            engine_id: config.engine_id.clone(),
            api_url: API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_url(http: Client, api_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey::new("test-key"),
            engine_id: "test-cx".to_string(),
            api_url: api_url.to_string(),
        }
    }
}

impl WebSearch for GoogleCustomSearch {
    async fn find_website(&self, query: &str) -> Result<Option<String>, SearchError> {
        let response = self
            .http
            .get(&self.api_url)
            .header("User-Agent", crate::USER_AGENT)
            .query(&[
                ("q", query),
                ("key", self.api_key.expose()),
                ("cx", self.engine_id.as_str()),
                ("num", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited(1));
        }
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body: SearchResponse = response.json().await?;
        let link = body.items.into_iter().next().map(|item| item.link);
        debug!(query, link = ?link, "google search complete");
        Ok(link)
    }
}
