//! HTTP page fetching: download, charset decoding, main-content isolation and
//! HTML→Markdown conversion.

mod converter;
mod extractor;
mod guard;

pub use converter::Page;

use converter::to_page;
use encoding_rs::{Encoding, UTF_8};
use extractor::main_content;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

const MAX_RESPONSE_BYTES: usize = 10_000_000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked: internal/private host not allowed")]
    InternalHost,

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,
}

/// Retrieves a web page as Markdown.
/// Implemented by `HttpFetcher` for production; stubs are used in tests.
pub trait PageFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        guard::validate_url(url)?;

        let (final_url, html) = download(&self.http, url).await?;

        // Redirects may land somewhere the original URL did not point to.
        guard::validate_url(&final_url)?;

        let content = main_content(&html, Some(&final_url));
        debug!(
            url = %final_url,
            bytes = html.len(),
            raw_fallback = content.used_raw_fallback,
            "page fetched"
        );
        Ok(to_page(content, final_url))
    }
}

async fn download(client: &Client, url: &str) -> Result<(String, String), FetchError> {
    let response = client
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    let charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_from_content_type)
        .map(str::to_string);

    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_BYTES
    {
        return Err(FetchError::TooLarge);
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    Ok((final_url, decode_body(&body, charset.as_deref())))
}

fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decodes with the declared charset, falling back to UTF-8. A BOM wins over
/// the header, and malformed sequences are replaced rather than rejected.
fn decode_body(body: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// Serves canned Markdown keyed by URL; anything else is a 404.
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        pages: HashMap<String, String>,
    }

    impl StubFetcher {
        pub(crate) fn with_page(mut self, url: &str, markdown: &str) -> Self {
            self.pages.insert(url.to_string(), markdown.to_string());
            self
        }
    }

    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
            let markdown = self.pages.get(url).ok_or(FetchError::Status(404))?;
            Ok(Page {
                url: url.to_string(),
                title: None,
                markdown: markdown.clone(),
                used_raw_fallback: false,
            })
        }
    }
}
