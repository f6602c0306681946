use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Outcome of one sync pass. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    pub local_created: usize,
    pub local_updated: usize,
    pub local_deleted: usize,
    pub remote_created: usize,
    pub remote_updated: usize,
    pub remote_deleted: usize,
    /// Local event ids left in CONFLICT
    pub conflicts: Vec<Uuid>,
    pub errors: usize,
    pub error_messages: Vec<String>,
}

impl SyncResult {
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.error_messages.push(message.into());
    }

    pub fn total_synced(&self) -> usize {
        self.local_created
            + self.local_updated
            + self.local_deleted
            + self.remote_created
            + self.remote_updated
            + self.remote_deleted
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }

    pub fn summary(&self) -> String {
        let mut message = format!("Synced {} event(s)", self.total_synced());
        if !self.conflicts.is_empty() {
            message.push_str(&format!(", {} conflict(s) need resolution", self.conflicts.len()));
        }
        if self.errors > 0 {
            message.push_str(&format!(", {} error(s)", self.errors));
        }
        message
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_mentions_conflicts_and_errors() {
        let mut result = SyncResult {
            local_created: 2,
            remote_updated: 1,
            conflicts: vec![Uuid::new_v4()],
            ..Default::default()
        };
        result.record_error("boom");

        assert_eq!(result.total_synced(), 3);
        assert_eq!(
            result.summary(),
            "Synced 3 event(s), 1 conflict(s) need resolution, 1 error(s)"
        );
        assert!(!result.is_clean());
    }

    #[test]
    fn test_clean_result_summary() {
        let result = SyncResult::default();
        assert!(result.is_clean());
        assert_eq!(result.to_string(), "Synced 0 event(s)");
    }
}
