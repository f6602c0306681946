//! Document classification: structured metadata from text or images.

mod parse;
mod prompt;
mod suggest;

pub use parse::parse_reply;
pub use prompt::{ImageInput, ModelBackend, PromptClassifier, text_prompt, vision_prompt};
pub use suggest::{parse_due_date, suggest_task, task_from_suggestion};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{WorkmateError, WorkmateResult};
use crate::model::DocumentMetadata;

#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify_text(
        &self,
        text: &str,
        type_hint: Option<&str>,
    ) -> WorkmateResult<DocumentMetadata>;

    /// Classify straight from an image, transcribing it on the way.
    async fn classify_image(
        &self,
        image: &Path,
        type_hint: Option<&str>,
    ) -> WorkmateResult<DocumentMetadata>;
}

/// Classifiers tried in order. The next one only runs when the previous
/// one failed outright; a low-confidence answer is still an answer.
pub struct ClassifierChain {
    classifiers: Vec<Arc<dyn DocumentClassifier>>,
}

impl ClassifierChain {
    pub fn new(classifiers: Vec<Arc<dyn DocumentClassifier>>) -> WorkmateResult<Self> {
        if classifiers.is_empty() {
            return Err(WorkmateError::Config(
                "No document classifier configured".into(),
            ));
        }
        Ok(ClassifierChain { classifiers })
    }

    fn exhausted(failures: Vec<String>) -> WorkmateError {
        WorkmateError::RemoteApi(format!("All classifiers failed. {}", failures.join(", ")))
    }
}

#[async_trait]
impl DocumentClassifier for ClassifierChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn classify_text(
        &self,
        text: &str,
        type_hint: Option<&str>,
    ) -> WorkmateResult<DocumentMetadata> {
        let mut failures = Vec::new();
        for classifier in &self.classifiers {
            match classifier.classify_text(text, type_hint).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => {
                    warn!(classifier = classifier.name(), error = %e, "Classifier failed, trying next");
                    failures.push(format!("{}: {e}", classifier.name()));
                }
            }
        }
        Err(Self::exhausted(failures))
    }

    async fn classify_image(
        &self,
        image: &Path,
        type_hint: Option<&str>,
    ) -> WorkmateResult<DocumentMetadata> {
        let mut failures = Vec::new();
        for classifier in &self.classifiers {
            match classifier.classify_image(image, type_hint).await {
                Ok(metadata) => return Ok(metadata),
                Err(e) => {
                    warn!(classifier = classifier.name(), error = %e, "Classifier failed, trying next");
                    failures.push(format!("{}: {e}", classifier.name()));
                }
            }
        }
        Err(Self::exhausted(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        confidence: Option<f64>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(name: &'static str, confidence: f64) -> Arc<Self> {
            Arc::new(Scripted {
                name,
                confidence: Some(confidence),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Scripted {
                name,
                confidence: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn answer(&self) -> WorkmateResult<DocumentMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.confidence {
                Some(confidence) => Ok(DocumentMetadata {
                    confidence: Some(confidence),
                    title: Some(self.name.to_string()),
                    ..Default::default()
                }),
                None => Err(WorkmateError::RemoteApi("overloaded".into())),
            }
        }
    }

    #[async_trait]
    impl DocumentClassifier for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn classify_text(&self, _: &str, _: Option<&str>) -> WorkmateResult<DocumentMetadata> {
            self.answer()
        }

        async fn classify_image(&self, _: &Path, _: Option<&str>) -> WorkmateResult<DocumentMetadata> {
            self.answer()
        }
    }

    fn chain(classifiers: &[&Arc<Scripted>]) -> ClassifierChain {
        let classifiers = classifiers
            .iter()
            .map(|c| {
                let c: Arc<Scripted> = Arc::clone(*c);
                c as Arc<dyn DocumentClassifier>
            })
            .collect();
        ClassifierChain::new(classifiers).unwrap()
    }

    #[tokio::test]
    async fn test_fallback_only_on_failure() {
        let primary = Scripted::failing("primary");
        let secondary = Scripted::ok("secondary", 0.9);
        let chain = chain(&[&primary, &secondary]);

        let metadata = chain.classify_text("text", None).await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("secondary"));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_does_not_trigger_fallback() {
        let primary = Scripted::ok("primary", 0.1);
        let secondary = Scripted::ok("secondary", 0.9);
        let chain = chain(&[&primary, &secondary]);

        let metadata = chain.classify_image(Path::new("scan.jpg"), None).await.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("primary"));
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failures_are_reported() {
        let chain = chain(&[&Scripted::failing("primary"), &Scripted::failing("secondary")]);

        let message = chain.classify_text("text", None).await.unwrap_err().to_string();
        assert!(message.contains("primary: "));
        assert!(message.contains("secondary: "));
    }

    #[test]
    fn test_empty_chain_is_a_config_error() {
        assert!(matches!(
            ClassifierChain::new(Vec::new()),
            Err(WorkmateError::Config(_))
        ));
    }
}
