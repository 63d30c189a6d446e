use tracing::warn;

use super::types::{GenerateContentResponse, GroundedResult, Source};

/// Concatenated text of the first candidate, or `None` when the model
/// returned nothing (safety filter, empty candidate list).
pub fn first_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.content.as_ref())?;

    let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
    (!text.trim().is_empty()).then_some(text)
}

pub fn grounded_result(response: &GenerateContentResponse) -> GroundedResult {
    let answer = first_text(response);
    if answer.is_none() {
        warn!("Gemini returned empty answer (safety filter or empty response)");
    }

    let sources = response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.grounding_metadata.as_ref())
        .and_then(|m| m.grounding_chunks.as_ref())
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| {
                    let web = chunk.web.as_ref()?;
                    let url = web.uri.as_ref().filter(|u| !u.is_empty())?.clone();
                    Some(Source { url })
                })
                .collect()
        })
        .unwrap_or_default();

    GroundedResult { answer, sources }
}
