use tracing::debug;

use super::{SearchError, WebSearch};
use crate::gemini::GeminiClient;

/// Website lookup through Gemini with Google Search grounding.
#[derive(Clone)]
pub struct GeminiLookup {
    gemini: GeminiClient,
}

impl GeminiLookup {
    pub fn new(gemini: GeminiClient) -> Self {
        Self { gemini }
    }
}

impl WebSearch for GeminiLookup {
    async fn find_website(&self, query: &str) -> Result<Option<String>, SearchError> {
        let prompt = format!(
            "What is the official website of the organization \"{query}\"? \
             Reply with the URL only."
        );
        let result = self.gemini.grounded_search(&prompt).await?;

        // Grounding sources are redirect links; a URL in the answer is preferred.
        let link = result
            .answer
            .as_deref()
            .and_then(first_url)
            .or_else(|| result.sources.into_iter().next().map(|s| s.url));

        debug!(query, link = ?link, "gemini lookup complete");
        Ok(link)
    }
}

fn first_url(text: &str) -> Option<String> {
    text.match_indices("http").find_map(|(start, _)| {
        let candidate: String = text[start..]
            .chars()
            .take_while(|c| !c.is_whitespace() && !matches!(c, ')' | ']' | '>' | '"' | '\'' | '`'))
            .collect();
        let candidate = candidate.trim_end_matches(['.', ',', ';', ':']);

        let parsed = url::Url::parse(candidate).ok()?;
        matches!(parsed.scheme(), "http" | "https").then(|| candidate.to_string())
    })
}
