//! Prompt-driven extraction of structured fields from a single web page.

pub mod prompt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::fetch::{FetchError, PageFetcher};
use crate::gemini::{GeminiClient, GeminiError};
use crate::table::{is_reserved_column, normalize_field_name};

/// Raw extraction result: a JSON object as returned by the model, keys in
/// response order.
pub type Extraction = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("could not load page: {0}")]
    Fetch(#[from] FetchError),

    #[error("extraction service failed: {0}")]
    Gemini(#[from] GeminiError),

    #[error("extraction result is not a JSON object: {0}")]
    Malformed(String),
}

/// Given a page URL and a natural-language instruction, returns the
/// requested fields, at most `limit` of them.
/// Implemented by `GeminiExtractor` for production; mock implementations used in tests.
pub trait Extractor {
    async fn extract(
        &self,
        url: &str,
        instruction: &str,
        limit: usize,
    ) -> Result<Extraction, ExtractError>;
}

pub struct GeminiExtractor<F> {
    gemini: GeminiClient,
    fetcher: F,
}

impl<F: PageFetcher> GeminiExtractor<F> {
    pub fn new(gemini: GeminiClient, fetcher: F) -> Self {
        Self { gemini, fetcher }
    }
}

impl<F: PageFetcher> Extractor for GeminiExtractor<F> {
    async fn extract(
        &self,
        url: &str,
        instruction: &str,
        limit: usize,
    ) -> Result<Extraction, ExtractError> {
        let page = self.fetcher.fetch(url).await?;
        let prompt = prompt::extraction_prompt(instruction, limit, &page);

        let text = self.gemini.generate_json(&prompt).await?;
        let mut extraction = parse_extraction(&text)?;
        select_fields(&mut extraction, limit);

        debug!(
            url = %page.url,
            raw_fallback = page.used_raw_fallback,
            fields = extraction.len(),
            "extraction complete"
        );
        Ok(extraction)
    }
}

fn parse_extraction(text: &str) -> Result<Extraction, ExtractError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        let end = body.floor_char_boundary(120);
        ExtractError::Malformed(format!("{e}: {}", &body[..end]))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        // A bare list is what models tend to send for "find all X" prompts.
        Value::Array(items) => Ok(Map::from_iter([("items".to_string(), Value::Array(items))])),
        other => Err(ExtractError::Malformed(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Keeps the first `limit` usable keys. Keys naming a reserved column, or
/// repeating an earlier key once normalized, do not count toward the limit.
fn select_fields(extraction: &mut Extraction, limit: usize) {
    let mut seen: Vec<String> = Vec::with_capacity(limit);
    *extraction = std::mem::take(extraction)
        .into_iter()
        .filter(|(key, _)| {
            let field = normalize_field_name(key);
            if field.is_empty() || is_reserved_column(&field) || seen.contains(&field) {
                return false;
            }
            seen.push(field);
            true
        })
        .take(limit)
        .collect();
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Canned extraction results keyed by URL; unknown URLs fail with a 404.
    #[derive(Default)]
    pub(crate) struct MockExtractor {
        results: HashMap<String, Result<Value, u16>>,
        calls: Mutex<Vec<(String, String, usize)>>,
    }

    impl MockExtractor {
        pub(crate) fn with_result(mut self, url: &str, value: Value) -> Self {
            self.results.insert(url.to_string(), Ok(value));
            self
        }

        pub(crate) fn with_failure(mut self, url: &str, status: u16) -> Self {
            self.results.insert(url.to_string(), Err(status));
            self
        }

        /// `(url, instruction, limit)` for every call, in order.
        pub(crate) fn calls(&self) -> Vec<(String, String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Extractor for MockExtractor {
        async fn extract(
            &self,
            url: &str,
            instruction: &str,
            limit: usize,
        ) -> Result<Extraction, ExtractError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), instruction.to_string(), limit));

            match self.results.get(url) {
                Some(Ok(Value::Object(map))) => {
                    let mut map = map.clone();
                    select_fields(&mut map, limit);
                    Ok(map)
                }
                Some(Ok(other)) => Err(ExtractError::Malformed(other.to_string())),
                Some(Err(status)) => Err(FetchError::Status(*status).into()),
                None => Err(FetchError::Status(404).into()),
            }
        }
    }
}
