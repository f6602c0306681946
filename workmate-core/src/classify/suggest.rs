//! Turning classifier output into tasks.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::constants::DEFAULT_CURRENCY;
use crate::model::{DocumentMetadata, Priority, Task, TaskSuggestion};

/// Task proposal for a document. `None` unless the document needs action.
/// The model's own suggestion wins; otherwise one is derived from the
/// document type.
pub fn suggest_task(metadata: &DocumentMetadata) -> Option<TaskSuggestion> {
    if !metadata.action_required() {
        return None;
    }

    if let Some(suggestion) = metadata.suggested_task.as_ref() {
        return Some(suggestion.clone());
    }

    let title = metadata.title.as_deref().unwrap_or("Unbekanntes Dokument");
    let currency = metadata.currency.as_deref().unwrap_or(DEFAULT_CURRENCY);
    let amount = metadata.amount;

    let (task_title, description) = match (metadata.doc_type.as_deref(), amount) {
        (Some("invoice"), Some(amount)) if amount != 0.0 => {
            let sender = metadata
                .sender
                .as_ref()
                .and_then(|s| s.name.as_deref())
                .unwrap_or("Unbekannt");
            (
                format!("{title} bezahlen ({amount} {currency})"),
                format!("Rechnung von {sender} bezahlen"),
            )
        }
        (Some("reminder"), _) => (
            format!("DRINGEND: {title} bezahlen"),
            format!(
                "Mahnung! Sofort bezahlen: {} {currency}",
                amount.map(|a| a.to_string()).unwrap_or_default()
            ),
        ),
        _ => (
            format!("{title} bearbeiten"),
            format!("Dokument '{title}' bearbeiten"),
        ),
    };

    Some(TaskSuggestion {
        title: Some(task_title),
        description: Some(description),
        due_date: metadata.due_date.clone(),
        priority: metadata.priority,
        amount,
    })
}

/// Accepts `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS`; anything else is no date.
pub fn parse_due_date(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Build the task row for an accepted suggestion.
pub fn task_from_suggestion(
    user_id: Uuid,
    document_id: Uuid,
    suggestion: &TaskSuggestion,
    metadata: &DocumentMetadata,
) -> Task {
    let mut task = Task::new(
        user_id,
        suggestion.title.as_deref().unwrap_or("Dokument bearbeiten"),
    );
    task.document_id = Some(document_id);
    task.description = suggestion.description.clone();
    task.due_date = parse_due_date(suggestion.due_date.as_deref());
    task.priority = suggestion.priority.unwrap_or(Priority::Medium);
    task.amount = suggestion.amount;
    task.currency = Some(
        metadata
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
    );
    task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Party;
    use chrono::TimeZone;

    fn metadata(doc_type: &str) -> DocumentMetadata {
        DocumentMetadata {
            doc_type: Some(doc_type.to_string()),
            title: Some("Telekom Rechnung Januar".to_string()),
            action_required: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_action_no_suggestion() {
        let mut m = metadata("invoice");
        m.action_required = Some(false);
        assert!(suggest_task(&m).is_none());
    }

    #[test]
    fn test_model_suggestion_is_used_verbatim() {
        let mut m = metadata("invoice");
        m.suggested_task = Some(TaskSuggestion {
            title: Some("Telekom bezahlen".to_string()),
            due_date: Some("2025-03-15".to_string()),
            ..Default::default()
        });
        let suggestion = suggest_task(&m).unwrap();
        assert_eq!(suggestion.title.as_deref(), Some("Telekom bezahlen"));
    }

    #[test]
    fn test_untitled_model_suggestion_is_kept() {
        let mut m = metadata("invoice");
        m.amount = Some(89.99);
        m.suggested_task = Some(TaskSuggestion {
            due_date: Some("2025-03-15".to_string()),
            priority: Some(Priority::High),
            ..Default::default()
        });

        let suggestion = suggest_task(&m).unwrap();
        assert_eq!(suggestion, m.suggested_task.clone().unwrap());

        let task = task_from_suggestion(Uuid::new_v4(), Uuid::new_v4(), &suggestion, &m);
        assert_eq!(task.title, "Dokument bearbeiten");
        assert_eq!(task.priority, Priority::High);
        assert!(task.amount.is_none());
        assert_eq!(
            task.due_date,
            Some(Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invoice_fallback_names_amount_and_sender() {
        let mut m = metadata("invoice");
        m.amount = Some(89.99);
        m.sender = Some(Party {
            name: Some("Telekom".to_string()),
            ..Default::default()
        });

        let suggestion = suggest_task(&m).unwrap();
        assert_eq!(
            suggestion.title.as_deref(),
            Some("Telekom Rechnung Januar bezahlen (89.99 EUR)")
        );
        assert_eq!(
            suggestion.description.as_deref(),
            Some("Rechnung von Telekom bezahlen")
        );
    }

    #[test]
    fn test_reminder_and_generic_fallbacks() {
        let mut dunning = metadata("reminder");
        dunning.title = Some("Mahnung Stadtwerke".to_string());
        assert_eq!(
            suggest_task(&dunning).unwrap().title.as_deref(),
            Some("DRINGEND: Mahnung Stadtwerke bezahlen")
        );

        let contract = metadata("contract");
        assert_eq!(
            suggest_task(&contract).unwrap().title.as_deref(),
            Some("Telekom Rechnung Januar bearbeiten")
        );
    }

    #[test]
    fn test_due_date_formats() {
        assert_eq!(
            parse_due_date(Some("2025-03-01")),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_due_date(Some("2025-03-01 14:30:00")),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 14, 30, 0).unwrap())
        );
        assert_eq!(parse_due_date(Some("01.03.2025")), None);
        assert_eq!(parse_due_date(None), None);
    }

    #[test]
    fn test_task_defaults() {
        let m = metadata("contract");
        let suggestion = TaskSuggestion::default();
        let task = task_from_suggestion(Uuid::new_v4(), Uuid::new_v4(), &suggestion, &m);
        assert_eq!(task.title, "Dokument bearbeiten");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.currency.as_deref(), Some("EUR"));
        assert!(task.due_date.is_none());
    }
}
