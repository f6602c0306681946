//! Model reply parsing.

use tracing::warn;

use crate::model::DocumentMetadata;

const FALLBACK_TITLE: &str = "Unbekanntes Dokument";
const FALLBACK_CONFIDENCE: f64 = 0.3;

/// The JSON body of a reply: the first ```json fence, else the first plain
/// fence, else the whole text.
fn json_body(reply: &str) -> &str {
    if let Some((_, rest)) = reply.split_once("```json") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    if let Some((_, rest)) = reply.split_once("```") {
        return rest.split("```").next().unwrap_or(rest).trim();
    }
    reply.trim()
}

/// Parse a classifier reply. Unparsable replies never fail: they become a
/// low-confidence placeholder carrying the parse error and the raw reply.
pub fn parse_reply(reply: &str, type_hint: Option<&str>) -> DocumentMetadata {
    match serde_json::from_str::<DocumentMetadata>(json_body(reply)) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!(error = %e, "Model reply is not valid metadata JSON");
            DocumentMetadata {
                doc_type: Some(type_hint.unwrap_or("other").to_string()),
                title: Some(FALLBACK_TITLE.to_string()),
                confidence: Some(FALLBACK_CONFIDENCE),
                error: Some(format!("Failed to parse AI response: {e}")),
                raw_response: Some(reply.to_string()),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_fence() {
        let reply = "Here you go:\n```json\n{\"type\": \"invoice\", \"confidence\": 0.9}\n```\nAnything else?";
        let metadata = parse_reply(reply, None);
        assert_eq!(metadata.doc_type.as_deref(), Some("invoice"));
        assert_eq!(metadata.confidence, Some(0.9));
        assert!(metadata.error.is_none());
    }

    #[test]
    fn test_plain_fence_and_raw_body() {
        let fenced = parse_reply("```\n{\"title\": \"Vertrag\"}\n```", None);
        assert_eq!(fenced.title.as_deref(), Some("Vertrag"));

        let raw = parse_reply("  {\"type\": \"receipt\"}  ", None);
        assert_eq!(raw.doc_type.as_deref(), Some("receipt"));
    }

    #[test]
    fn test_garbage_becomes_placeholder() {
        let metadata = parse_reply("I could not read this document.", Some("invoice"));
        assert_eq!(metadata.doc_type.as_deref(), Some("invoice"));
        assert_eq!(metadata.title.as_deref(), Some(FALLBACK_TITLE));
        assert_eq!(metadata.confidence, Some(FALLBACK_CONFIDENCE));
        assert!(metadata.error.unwrap().starts_with("Failed to parse AI response"));
        assert_eq!(
            metadata.raw_response.as_deref(),
            Some("I could not read this document.")
        );

        let without_hint = parse_reply("nope", None);
        assert_eq!(without_hint.doc_type.as_deref(), Some("other"));
    }
}
