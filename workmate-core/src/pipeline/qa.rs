//! Confidence gate deciding whether a processed document needs a human.

use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIDENCE_HIGH, CONFIDENCE_LOW, CONFIDENCE_MEDIUM, CRITICAL_REVIEW_AMOUNT, REVIEW_AMOUNT,
    TITLE_PROMOTION_CONFIDENCE, TYPE_PROMOTION_CONFIDENCE,
};
use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{DocumentMetadata, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
    pub title_promotion: f64,
    pub type_promotion: f64,
}

impl Default for QaThresholds {
    fn default() -> Self {
        QaThresholds {
            low: CONFIDENCE_LOW,
            medium: CONFIDENCE_MEDIUM,
            high: CONFIDENCE_HIGH,
            title_promotion: TITLE_PROMOTION_CONFIDENCE,
            type_promotion: TYPE_PROMOTION_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QaDecision {
    pub needs_review: bool,
    pub reason: Option<String>,
}

impl QaThresholds {
    pub fn validate(&self) -> WorkmateResult<()> {
        let ordered = 0.0 <= self.low && self.low <= self.medium && self.medium <= self.high;
        if !ordered || self.high > 1.0 {
            return Err(WorkmateError::Config(format!(
                "QA thresholds must satisfy 0 <= low <= medium <= high <= 1 (got {}/{}/{})",
                self.low, self.medium, self.high
            )));
        }
        Ok(())
    }

    /// Decide whether the document needs manual review.
    ///
    /// - below `low`: always
    /// - `[low, medium)`: priority high/critical, or amount above 500
    /// - `[medium, high)`: critical priority with amount above 1000
    /// - from `high`: never
    pub fn assess(&self, metadata: &DocumentMetadata) -> QaDecision {
        let confidence = metadata.confidence();
        let amount = metadata.amount();
        let mut decision = QaDecision {
            needs_review: false,
            reason: None,
        };

        if confidence < self.low {
            decision.flag("Low AI confidence - manual review required");
        } else if confidence < self.medium {
            if matches!(metadata.priority, Some(Priority::Critical | Priority::High)) {
                decision.flag("Medium confidence on critical document");
            }
            if amount > REVIEW_AMOUNT {
                decision.flag("Medium confidence on high-value document");
            }
        } else if confidence < self.high
            && metadata.priority == Some(Priority::Critical)
            && amount > CRITICAL_REVIEW_AMOUNT
        {
            decision.flag("Critical high-value document requires verification");
        }

        decision
    }

    pub fn promotes_title(&self, metadata: &DocumentMetadata) -> bool {
        metadata.confidence() > self.title_promotion
    }

    pub fn promotes_type(&self, metadata: &DocumentMetadata) -> bool {
        metadata.confidence() > self.type_promotion
    }
}

impl QaDecision {
    fn flag(&mut self, reason: &str) {
        self.needs_review = true;
        self.reason = Some(reason.to_string());
    }
}
