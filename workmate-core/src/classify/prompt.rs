//! Classifier driving a language model through prompts.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::classify::DocumentClassifier;
use crate::classify::parse::parse_reply;
use crate::error::WorkmateResult;
use crate::model::DocumentMetadata;

/// Image handed to a vision-capable model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub media_type: &'static str,
    pub data: Vec<u8>,
}

impl ImageInput {
    pub fn read(path: &Path) -> WorkmateResult<Self> {
        let data = std::fs::read(path)?;
        Ok(ImageInput {
            media_type: media_type_for(path),
            data,
        })
    }
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Raw model invocation. Implementations own the HTTP client, the model
/// name and the API key.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> WorkmateResult<String>;

    async fn complete_with_image(&self, prompt: &str, image: &ImageInput) -> WorkmateResult<String>;
}

const METADATA_SCHEMA: &str = r#"{
  "type": "invoice|reminder|contract|receipt|other",
  "title": "short descriptive title, e.g. 'Telekom Rechnung Januar 2026'",
  "confidence": 0.0-1.0,
  "sender": {"name": "...", "address": "...", "email": "...", "phone": "..."},
  "recipient": {"name": "...", "address": "..."},
  "amount": 89.99,
  "currency": "EUR|USD|CHF",
  "due_date": "YYYY-MM-DD",
  "issue_date": "YYYY-MM-DD",
  "invoice_number": "...",
  "iban": "...",
  "payment_reference": "...",
  "description": "one sentence summary",
  "action_required": true,
  "priority": "low|medium|high|critical",
  "suggested_task": {"title": "...", "description": "...", "due_date": "YYYY-MM-DD"}"#;

const RULES: &str = "\
Rules:
- Reply with the JSON object only
- Use null for anything not present in the document
- Copy amounts and dates exactly
- Documents are often German
- Priority: critical for overdue notices (Mahnung), high when due soon, medium for invoices, low for receipts";

fn hint_line(type_hint: Option<&str>) -> String {
    type_hint
        .map(|t| format!("Expected document type: {t}.\n"))
        .unwrap_or_default()
}

pub fn text_prompt(text: &str, type_hint: Option<&str>) -> String {
    format!(
        "Extract structured information from the document text below.\n{hint}\n\
         Document text:\n---\n{text}\n---\n\n\
         Answer with a JSON object of this shape:\n{METADATA_SCHEMA}\n}}\n\n{RULES}\n",
        hint = hint_line(type_hint),
    )
}

pub fn vision_prompt(type_hint: Option<&str>) -> String {
    format!(
        "Extract structured information from the attached document image.\n{hint}\n\
         Answer with a JSON object of this shape:\n{METADATA_SCHEMA},\n  \
         \"extracted_text\": \"all text visible in the image\",\n  \
         \"ocr_quality\": \"high|medium|low\"\n}}\n\n{RULES}\n\
         - Transcribe every visible line into extracted_text\n",
        hint = hint_line(type_hint),
    )
}

/// [`DocumentClassifier`] over a [`ModelBackend`].
pub struct PromptClassifier {
    name: String,
    backend: Arc<dyn ModelBackend>,
}

impl PromptClassifier {
    pub fn new(name: &str, backend: Arc<dyn ModelBackend>) -> Self {
        PromptClassifier {
            name: name.to_string(),
            backend,
        }
    }
}

#[async_trait]
impl DocumentClassifier for PromptClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify_text(
        &self,
        text: &str,
        type_hint: Option<&str>,
    ) -> WorkmateResult<DocumentMetadata> {
        info!(classifier = %self.name, chars = text.len(), "Classifying document text");
        let reply = self.backend.complete(&text_prompt(text, type_hint)).await?;
        Ok(parse_reply(&reply, type_hint))
    }

    async fn classify_image(
        &self,
        image: &Path,
        type_hint: Option<&str>,
    ) -> WorkmateResult<DocumentMetadata> {
        let input = ImageInput::read(image)?;
        debug!(classifier = %self.name, media_type = input.media_type, "Classifying document image");
        let reply = self
            .backend
            .complete_with_image(&vision_prompt(type_hint), &input)
            .await?;
        Ok(parse_reply(&reply, type_hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
        media_types: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ModelBackend for Recorder {
        async fn complete(&self, prompt: &str) -> WorkmateResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("```json\n{\"type\": \"invoice\", \"confidence\": 0.8}\n```".to_string())
        }

        async fn complete_with_image(
            &self,
            prompt: &str,
            image: &ImageInput,
        ) -> WorkmateResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.media_types.lock().unwrap().push(image.media_type);
            Ok("{\"type\": \"receipt\", \"ocr_quality\": \"high\", \"extracted_text\": \"REWE\"}".to_string())
        }
    }

    #[tokio::test]
    async fn test_text_prompt_carries_text_and_hint() {
        let backend = Arc::new(Recorder::default());
        let classifier = PromptClassifier::new("primary", backend.clone());

        let metadata = classifier
            .classify_text("Rechnung Nr. 4711", Some("invoice"))
            .await
            .unwrap();
        assert_eq!(metadata.doc_type.as_deref(), Some("invoice"));

        let prompt = backend.prompts.lock().unwrap().remove(0);
        assert!(prompt.contains("Rechnung Nr. 4711"));
        assert!(prompt.contains("Expected document type: invoice."));
    }

    #[tokio::test]
    async fn test_image_media_type_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.PNG");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let backend = Arc::new(Recorder::default());
        let classifier = PromptClassifier::new("vision", backend.clone());
        let metadata = classifier.classify_image(&path, None).await.unwrap();

        assert_eq!(metadata.ocr_quality.as_deref(), Some("high"));
        assert_eq!(backend.media_types.lock().unwrap()[0], "image/png");
        assert!(backend.prompts.lock().unwrap()[0].contains("ocr_quality"));
    }

    #[tokio::test]
    async fn test_missing_image_is_an_error() {
        let classifier = PromptClassifier::new("vision", Arc::new(Recorder::default()));
        let result = classifier
            .classify_image(Path::new("/nonexistent/scan.jpg"), None)
            .await;
        assert!(result.is_err());
    }
}
