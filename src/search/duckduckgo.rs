//! DuckDuckGo HTML endpoint: no API key, but aggressively rate limited.

use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{SearchError, WebSearch};

const HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const MAX_ATTEMPTS: u32 = 5;
const INITIAL_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct DuckDuckGo {
    http: Client,
    endpoint: String,
    initial_delay: Duration,
}

impl DuckDuckGo {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            endpoint: HTML_ENDPOINT.to_string(),
            initial_delay: INITIAL_DELAY,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_endpoint(http: Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            initial_delay: Duration::ZERO,
        }
    }

    /// `None` when DuckDuckGo throttled the request.
    async fn search_page(&self, query: &str) -> Result<Option<String>, SearchError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("User-Agent", crate::USER_AGENT)
            .header("Accept", "text/html")
            .form(&[("q", query)])
            .send()
            .await?;

        let status = response.status();
        // 202 comes with the "anomaly" captcha page instead of results.
        if status == StatusCode::ACCEPTED || status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.contains("anomaly-modal") {
            return Ok(None);
        }
        Ok(Some(body))
    }
}

impl WebSearch for DuckDuckGo {
    async fn find_website(&self, query: &str) -> Result<Option<String>, SearchError> {
        for attempt in 0..MAX_ATTEMPTS {
            if let Some(body) = self.search_page(query).await? {
                let link = first_result(&body);
                debug!(query, link = ?link, "duckduckgo search complete");
                return Ok(link);
            }

            if attempt + 1 < MAX_ATTEMPTS {
                let delay = self.initial_delay * 2u32.pow(attempt);
                warn!(
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs(),
                    "DuckDuckGo rate limit hit, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
        Err(SearchError::RateLimited(MAX_ATTEMPTS))
    }
}

fn first_result(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.result:not(.result--ad) a.result__a").ok()?;

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(resolve_href)
        .next()
}

/// Result links are either direct or wrapped as `//duckduckgo.com/l/?uddg=<encoded>`.
fn resolve_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let parsed = url::Url::parse(&absolute).ok()?;

    let target = if parsed.host_str().is_some_and(|h| h.ends_with("duckduckgo.com")) {
        let (_, decoded) = parsed.query_pairs().find(|(k, _)| k == "uddg")?;
        // Some redirect links are encoded twice.
        if decoded.starts_with("http%3A") || decoded.starts_with("https%3A") {
            percent_decode_str(&decoded).decode_utf8_lossy().into_owned()
        } else {
            decoded.into_owned()
        }
    } else {
        absolute
    };

    let target_url = url::Url::parse(&target).ok()?;
    matches!(target_url.scheme(), "http" | "https").then_some(target)
}
