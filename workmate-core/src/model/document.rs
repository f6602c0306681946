//! Uploaded documents and the metadata extracted from them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::model::task::{Priority, lenient_priority};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Done,
    NeedsReview,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessingStatus::Done | ProcessingStatus::NeedsReview | ProcessingStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    /// invoice, reminder, contract, receipt or other
    #[serde(rename = "type", default = "default_doc_type")]
    pub doc_type: String,
    pub mime_type: String,
    /// Resolved location of the stored file
    pub file_path: PathBuf,
    #[serde(default)]
    pub processing_status: ProcessingStatus,
    #[serde(default)]
    pub extracted_text: Option<String>,
    /// OCR confidence in [0, 1]
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

fn default_doc_type() -> String {
    "other".to_string()
}

impl Document {
    pub fn new(user_id: Uuid, title: &str, mime_type: &str, file_path: PathBuf) -> Self {
        Document {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            doc_type: default_doc_type(),
            mime_type: mime_type.to_string(),
            file_path,
            processing_status: ProcessingStatus::Pending,
            extracted_text: None,
            confidence_score: None,
            metadata: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Type hint for the classifier; `other` carries no information.
    pub fn type_hint(&self) -> Option<&str> {
        Some(self.doc_type.as_str()).filter(|t| !t.is_empty() && *t != "other")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A task proposed by the classifier for a document that needs action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSuggestion {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `YYYY-MM-DD` as produced by the model
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Structured metadata returned by a classifier plus the pipeline's own
/// annotations (QA decision, stored suggestion, failure message).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Classifier confidence in [0, 1]
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    /// high, medium or low; only reported by vision classifiers
    #[serde(default)]
    pub ocr_quality: Option<String>,
    #[serde(default)]
    pub sender: Option<Party>,
    #[serde(default)]
    pub recipient: Option<Party>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub action_required: Option<bool>,
    #[serde(default, deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub suggested_task: Option<TaskSuggestion>,

    // Pipeline annotations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_needs_review: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_review_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,

    /// Anything else the model returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    pub fn confidence(&self) -> f64 {
        self.confidence.unwrap_or(0.0)
    }

    pub fn action_required(&self) -> bool {
        self.action_required.unwrap_or(false)
    }

    pub fn amount(&self) -> f64 {
        self.amount.unwrap_or(0.0)
    }
}
