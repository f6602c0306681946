//! Document processing: extraction, classification, promotion, QA gate and
//! task creation.
//!
//! Each stage feeds the next. Any stage failure marks the document failed,
//! records the message in its metadata and stops the run.

mod qa;

pub use qa::{QaDecision, QaThresholds};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::classify::{DocumentClassifier, suggest_task, task_from_suggestion};
use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{Document, DocumentMetadata, ProcessingStatus};
use crate::reminder::ReminderScheduler;
use crate::store::{DocumentStore, ReminderStore, TaskStore};

/// Text recognised in a document, with the engine's confidence in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f64,
}

#[async_trait]
pub trait OcrExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> WorkmateResult<OcrOutput>;
}

/// OCR confidence implied by a vision model's own quality rating.
pub fn ocr_confidence_from_quality(quality: Option<&str>) -> f64 {
    match quality {
        Some("high") => 0.9,
        Some("medium") => 0.7,
        _ => 0.5,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOutcome {
    pub document_id: Uuid,
    pub status: ProcessingStatus,
    pub ocr_confidence: f64,
    pub ai_confidence: f64,
    pub needs_review: bool,
    pub task_id: Option<Uuid>,
    pub reminders_created: usize,
}

pub struct DocumentPipeline {
    documents: Arc<dyn DocumentStore>,
    tasks: Arc<dyn TaskStore>,
    reminders: ReminderScheduler,
    classifier: Arc<dyn DocumentClassifier>,
    ocr: Arc<dyn OcrExtractor>,
    thresholds: QaThresholds,
}

impl DocumentPipeline {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        tasks: Arc<dyn TaskStore>,
        reminders: Arc<dyn ReminderStore>,
        classifier: Arc<dyn DocumentClassifier>,
        ocr: Arc<dyn OcrExtractor>,
        thresholds: QaThresholds,
    ) -> Self {
        DocumentPipeline {
            documents,
            tasks,
            reminders: ReminderScheduler::new(reminders),
            classifier,
            ocr,
            thresholds,
        }
    }

    /// Process one document to a terminal status.
    #[instrument(skip(self), fields(document = %document_id))]
    pub async fn process(&self, document_id: Uuid) -> WorkmateResult<ProcessingOutcome> {
        let mut document = self.documents.get_document(document_id).await?;

        document.processing_status = ProcessingStatus::Processing;
        self.documents.update_document(&document).await?;

        match self.run_stages(&mut document).await {
            Ok(outcome) => {
                info!(
                    status = ?outcome.status,
                    ai_confidence = outcome.ai_confidence,
                    task_created = outcome.task_id.is_some(),
                    "Document processed"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Document processing failed");
                document.processing_status = ProcessingStatus::Failed;
                document.metadata.get_or_insert_with(DocumentMetadata::default).error =
                    Some(e.to_string());
                if let Err(store_err) = self.documents.update_document(&document).await {
                    warn!(error = %store_err, "Could not record processing failure");
                }
                Err(e)
            }
        }
    }

    /// Process documents concurrently. One failing document does not affect
    /// the others.
    pub async fn process_many(
        &self,
        document_ids: &[Uuid],
    ) -> Vec<(Uuid, WorkmateResult<ProcessingOutcome>)> {
        let runs = document_ids
            .iter()
            .map(|&id| async move { (id, self.process(id).await) });
        join_all(runs).await
    }

    async fn run_stages(&self, document: &mut Document) -> WorkmateResult<ProcessingOutcome> {
        if !document.file_path.exists() {
            return Err(WorkmateError::stage(
                "extraction",
                format!("File not found: {}", document.file_path.display()),
            ));
        }

        let type_hint = document.type_hint().map(str::to_string);

        // 1-2. Extraction and classification
        let (mut metadata, ocr_confidence) = if document.is_image() {
            let metadata = self
                .classifier
                .classify_image(&document.file_path, type_hint.as_deref())
                .await
                .map_err(|e| WorkmateError::stage("classification", e))?;
            let confidence = ocr_confidence_from_quality(metadata.ocr_quality.as_deref());
            document.extracted_text = Some(metadata.extracted_text.clone().unwrap_or_default());
            document.confidence_score = Some(confidence);
            (metadata, confidence)
        } else {
            let ocr = self
                .ocr
                .extract(&document.file_path)
                .await
                .map_err(|e| WorkmateError::stage("ocr", e))?;
            document.extracted_text = Some(ocr.text.clone());
            document.confidence_score = Some(ocr.confidence);
            self.documents.update_document(document).await?;

            let metadata = self
                .classifier
                .classify_text(&ocr.text, type_hint.as_deref())
                .await
                .map_err(|e| WorkmateError::stage("classification", e))?;
            (metadata, ocr.confidence)
        };

        // 3. Promotion
        if self.thresholds.promotes_title(&metadata) {
            if let Some(title) = metadata.title.as_ref().filter(|t| !t.trim().is_empty()) {
                document.title = title.clone();
            }
        }
        if self.thresholds.promotes_type(&metadata) {
            if let Some(doc_type) = metadata.doc_type.as_ref().filter(|t| !t.trim().is_empty()) {
                document.doc_type = doc_type.clone();
            }
        }

        // 4. QA gate
        let decision = self.thresholds.assess(&metadata);
        metadata.qa_needs_review = Some(decision.needs_review);
        metadata.qa_review_reason = decision.reason.clone();

        // 5. Task creation
        let mut task_id = None;
        let mut reminders_created = 0;
        if let Some(suggestion) = suggest_task(&metadata) {
            let confident = metadata.confidence() >= self.thresholds.medium;
            if confident || !decision.needs_review {
                let task = task_from_suggestion(document.user_id, document.id, &suggestion, &metadata);
                let task = self
                    .tasks
                    .insert_task(task)
                    .await
                    .map_err(|e| WorkmateError::stage("task_creation", e))?;
                let reminders = self
                    .reminders
                    .create_reminders_for_task(&task, None)
                    .await
                    .map_err(|e| WorkmateError::stage("task_creation", e))?;
                task_id = Some(task.id);
                reminders_created = reminders.len();
            } else {
                metadata.suggested_task = Some(suggestion);
            }
        }

        // 6. Final status
        let ai_confidence = metadata.confidence();
        document.processing_status = if decision.needs_review {
            ProcessingStatus::NeedsReview
        } else {
            ProcessingStatus::Done
        };
        document.processed_at = Some(Utc::now());
        document.metadata = Some(metadata);
        self.documents.update_document(document).await?;

        Ok(ProcessingOutcome {
            document_id: document.id,
            status: document.processing_status,
            ocr_confidence,
            ai_confidence,
            needs_review: decision.needs_review,
            task_id,
            reminders_created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, TaskSuggestion};
    use crate::store::MemoryStore;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Answers by file name; unknown files fail.
    struct ByFile {
        answers: HashMap<String, DocumentMetadata>,
    }

    impl ByFile {
        fn answer(&self, key: &str) -> WorkmateResult<DocumentMetadata> {
            self.answers
                .get(key)
                .cloned()
                .ok_or_else(|| WorkmateError::RemoteApi(format!("model refused {key}")))
        }
    }

    #[async_trait]
    impl DocumentClassifier for ByFile {
        fn name(&self) -> &str {
            "by-file"
        }

        async fn classify_text(&self, text: &str, _: Option<&str>) -> WorkmateResult<DocumentMetadata> {
            self.answer(text)
        }

        async fn classify_image(&self, image: &Path, _: Option<&str>) -> WorkmateResult<DocumentMetadata> {
            let name = image.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            self.answer(name)
        }
    }

    /// Returns the file name as the recognised text.
    struct FileNameOcr;

    #[async_trait]
    impl OcrExtractor for FileNameOcr {
        async fn extract(&self, path: &Path) -> WorkmateResult<OcrOutput> {
            Ok(OcrOutput {
                text: path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string(),
                confidence: 0.82,
            })
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        pipeline: DocumentPipeline,
        dir: tempfile::TempDir,
        user: Uuid,
    }

    fn fixture(answers: Vec<(&str, DocumentMetadata)>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let classifier = ByFile {
            answers: answers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        let pipeline = DocumentPipeline::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(classifier),
            Arc::new(FileNameOcr),
            QaThresholds::default(),
        );
        Fixture {
            store,
            pipeline,
            dir: tempfile::tempdir().unwrap(),
            user: Uuid::new_v4(),
        }
    }

    impl Fixture {
        async fn document(&self, file_name: &str, mime: &str) -> Document {
            let path: PathBuf = self.dir.path().join(file_name);
            std::fs::write(&path, b"scan").unwrap();
            let document = Document::new(self.user, "Scan", mime, path);
            self.store.insert_document(document).await.unwrap()
        }

        async fn reload(&self, id: Uuid) -> Document {
            self.store.get_document(id).await.unwrap()
        }
    }

    fn invoice(confidence: f64, priority: Priority, amount: f64) -> DocumentMetadata {
        DocumentMetadata {
            doc_type: Some("invoice".to_string()),
            title: Some("Stadtwerke Abrechnung".to_string()),
            confidence: Some(confidence),
            priority: Some(priority),
            amount: Some(amount),
            action_required: Some(true),
            suggested_task: Some(TaskSuggestion {
                title: Some("Stadtwerke bezahlen".to_string()),
                due_date: Some("2099-03-15".to_string()),
                priority: Some(priority),
                amount: Some(amount),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_confident_invoice_creates_task_and_reminders() {
        let f = fixture(vec![("bill.pdf", invoice(0.9, Priority::High, 120.0))]);
        let doc = f.document("bill.pdf", "application/pdf").await;

        let outcome = f.pipeline.process(doc.id).await.unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Done);
        assert_eq!(outcome.ocr_confidence, 0.82);
        assert_eq!(outcome.reminders_created, 3);

        let task = f.store.get_task(f.user, outcome.task_id.unwrap()).await.unwrap();
        assert_eq!(task.title, "Stadtwerke bezahlen");
        assert_eq!(task.document_id, Some(doc.id));
        assert_eq!(task.currency.as_deref(), Some("EUR"));

        let stored = f.reload(doc.id).await;
        assert_eq!(stored.title, "Stadtwerke Abrechnung");
        assert_eq!(stored.doc_type, "invoice");
        assert_eq!(stored.extracted_text.as_deref(), Some("bill.pdf"));
        assert!(stored.processed_at.is_some());
        assert_eq!(stored.metadata.unwrap().qa_needs_review, Some(false));
    }

    #[tokio::test]
    async fn test_uncertain_document_keeps_suggestion_for_review() {
        let f = fixture(vec![("bill.pdf", invoice(0.5, Priority::High, 120.0))]);
        let doc = f.document("bill.pdf", "application/pdf").await;

        let outcome = f.pipeline.process(doc.id).await.unwrap();
        assert_eq!(outcome.status, ProcessingStatus::NeedsReview);
        assert!(outcome.task_id.is_none());
        assert!(f.store.list_tasks(f.user).await.unwrap().is_empty());

        let stored = f.reload(doc.id).await;
        let metadata = stored.metadata.unwrap();
        assert_eq!(
            metadata.qa_review_reason.as_deref(),
            Some("Medium confidence on critical document")
        );
        assert!(metadata.suggested_task.is_some());
        // Below both promotion thresholds
        assert_eq!(stored.title, "Scan");
        assert_eq!(stored.doc_type, "other");
    }

    #[tokio::test]
    async fn test_medium_tier_low_priority_creates_task_without_review() {
        let f = fixture(vec![("bill.pdf", invoice(0.5, Priority::Low, 100.0))]);
        let doc = f.document("bill.pdf", "application/pdf").await;

        let outcome = f.pipeline.process(doc.id).await.unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Done);
        assert!(outcome.task_id.is_some());
    }

    #[tokio::test]
    async fn test_high_tier_review_still_creates_task() {
        let f = fixture(vec![("bill.pdf", invoice(0.7, Priority::Critical, 2000.0))]);
        let doc = f.document("bill.pdf", "application/pdf").await;

        let outcome = f.pipeline.process(doc.id).await.unwrap();
        assert_eq!(outcome.status, ProcessingStatus::NeedsReview);
        assert!(outcome.task_id.is_some());
        // 0.7 promotes the title but not the type
        let stored = f.reload(doc.id).await;
        assert_eq!(stored.title, "Stadtwerke Abrechnung");
        assert_eq!(stored.doc_type, "other");
    }

    #[tokio::test]
    async fn test_images_skip_ocr_and_use_quality_rating() {
        let mut receipt = invoice(0.95, Priority::Low, 12.5);
        receipt.action_required = Some(false);
        receipt.ocr_quality = Some("medium".to_string());
        receipt.extracted_text = Some("REWE Markt".to_string());
        let f = fixture(vec![("receipt.jpg", receipt)]);
        let doc = f.document("receipt.jpg", "image/jpeg").await;

        let outcome = f.pipeline.process(doc.id).await.unwrap();
        assert_eq!(outcome.ocr_confidence, 0.7);
        assert!(outcome.task_id.is_none());

        let stored = f.reload(doc.id).await;
        assert_eq!(stored.extracted_text.as_deref(), Some("REWE Markt"));
        assert_eq!(stored.confidence_score, Some(0.7));
    }

    #[tokio::test]
    async fn test_classifier_failure_isolated_to_its_document() {
        let f = fixture(vec![("good.pdf", invoice(0.9, Priority::Medium, 50.0))]);
        let bad = f.document("bad.pdf", "application/pdf").await;
        let good = f.document("good.pdf", "application/pdf").await;

        let results = f.pipeline.process_many(&[bad.id, good.id]).await;
        assert_eq!(results.len(), 2);

        let (_, bad_result) = &results[0];
        assert!(matches!(
            bad_result,
            Err(WorkmateError::PipelineStage { stage, .. }) if stage == "classification"
        ));
        let (_, good_result) = &results[1];
        assert!(good_result.is_ok());

        let failed = f.reload(bad.id).await;
        assert_eq!(failed.processing_status, ProcessingStatus::Failed);
        assert!(failed.metadata.unwrap().error.unwrap().contains("model refused"));
        assert_eq!(f.reload(good.id).await.processing_status, ProcessingStatus::Done);
    }

    #[tokio::test]
    async fn test_missing_file_fails_extraction() {
        let f = fixture(vec![]);
        let document = Document::new(f.user, "Ghost", "application/pdf", f.dir.path().join("gone.pdf"));
        let document = f.store.insert_document(document).await.unwrap();

        let err = f.pipeline.process(document.id).await.unwrap_err();
        assert!(matches!(err, WorkmateError::PipelineStage { ref stage, .. } if stage == "extraction"));
        assert_eq!(f.reload(document.id).await.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let f = fixture(vec![]);
        let err = f.pipeline.process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, WorkmateError::NotFound(_)));
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(ocr_confidence_from_quality(Some("high")), 0.9);
        assert_eq!(ocr_confidence_from_quality(Some("medium")), 0.7);
        assert_eq!(ocr_confidence_from_quality(Some("low")), 0.5);
        assert_eq!(ocr_confidence_from_quality(None), 0.5);
    }
}
