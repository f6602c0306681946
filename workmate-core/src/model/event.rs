//! Local calendar events and their sync bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WorkmateError, WorkmateResult};
use crate::remote::RemoteEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
    Conflict,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Conflict => "conflict",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = WorkmateError;

    fn from_str(s: &str) -> WorkmateResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            "conflict" => Ok(SyncStatus::Conflict),
            other => Err(WorkmateError::Validation(format!(
                "Unknown sync status '{other}'"
            ))),
        }
    }
}

/// The user-visible content of an event, shared by the local row and the
/// provider-side copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
}

impl EventFields {
    pub fn validate(&self) -> WorkmateResult<()> {
        if self.end_time <= self.start_time {
            return Err(WorkmateError::Validation(format!(
                "End time must be after start time for '{}'",
                self.title
            )));
        }
        Ok(())
    }

    /// Field-level comparison used for conflict detection. Providers report
    /// missing descriptions and locations as empty strings, so blank and
    /// absent compare equal.
    pub fn same_content(&self, other: &EventFields) -> bool {
        self.title.trim() == other.title.trim()
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && normalized(&self.location) == normalized(&other.location)
            && normalized(&self.description) == normalized(&other.description)
    }
}

fn normalized(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A local calendar event row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Task this event was derived from, if any
    pub task_id: Option<Uuid>,
    /// Integration this event is synchronised with, if any
    pub integration_id: Option<Uuid>,
    #[serde(flatten)]
    pub fields: EventFields,

    // Sync Infrastructure
    /// Remote-side primary key
    pub external_event_id: Option<String>,
    /// Last known remote revision (etag or provider timestamp)
    pub remote_revision: Option<String>,
    pub sync_status: SyncStatus,
    /// End of the last sync pass that reconciled this row with its remote copy
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Latest remote copy seen while the row was in conflict
    #[serde(default)]
    pub remote_snapshot: Option<RemoteEvent>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn new(user_id: Uuid, fields: EventFields, now: DateTime<Utc>) -> WorkmateResult<Self> {
        fields.validate()?;

        Ok(CalendarEvent {
            id: Uuid::new_v4(),
            user_id,
            task_id: None,
            integration_id: None,
            fields,
            external_event_id: None,
            remote_revision: None,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
            remote_snapshot: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Build a synced local row from an event that so far only exists remotely.
    pub fn from_remote(
        user_id: Uuid,
        integration_id: Uuid,
        remote: &RemoteEvent,
        now: DateTime<Utc>,
    ) -> WorkmateResult<Self> {
        let mut event = CalendarEvent::new(user_id, remote.fields.clone(), now)?;
        event.integration_id = Some(integration_id);
        event.mark_synced(remote, now);
        Ok(event)
    }

    pub fn is_linked(&self) -> bool {
        self.external_event_id.is_some()
    }

    /// Whether the local row was edited after the last reconciliation.
    pub fn modified_since_sync(&self) -> bool {
        match self.last_synced_at {
            Some(synced) => self.updated_at > synced,
            None => true,
        }
    }

    /// Overwrite local content with the remote copy.
    pub fn apply_remote(&mut self, remote: &RemoteEvent, now: DateTime<Utc>) -> WorkmateResult<()> {
        remote.fields.validate()?;
        self.fields = remote.fields.clone();
        self.updated_at = now;
        self.mark_synced(remote, now);
        Ok(())
    }

    /// Record that the local row and `remote` now hold the same content.
    pub fn mark_synced(&mut self, remote: &RemoteEvent, now: DateTime<Utc>) {
        self.external_event_id = Some(remote.id.clone());
        self.remote_revision = remote.revision();
        self.sync_status = SyncStatus::Synced;
        self.last_synced_at = Some(now);
        self.remote_snapshot = None;
    }

    /// Drop the remote linkage, e.g. when the owning integration goes away.
    pub fn unlink(&mut self) {
        self.integration_id = None;
        self.external_event_id = None;
        self.remote_revision = None;
        self.remote_snapshot = None;
        self.last_synced_at = None;
        self.sync_status = SyncStatus::Pending;
    }
}

/// Input for creating a local event by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub task_id: Option<Uuid>,
    pub integration_id: Option<Uuid>,
    #[serde(flatten)]
    pub fields: EventFields,
}

impl EventDraft {
    pub fn validate(&self) -> WorkmateResult<()> {
        self.fields.validate()
    }
}

/// Partial update of a local event. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
}

impl EventPatch {
    /// Apply onto a copy of `fields`, validating the result.
    pub fn apply_to(&self, fields: &EventFields) -> WorkmateResult<EventFields> {
        let mut next = fields.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(location) = &self.location {
            next.location = Some(location.clone());
        }
        if let Some(start) = self.start_time {
            next.start_time = start;
        }
        if let Some(end) = self.end_time {
            next.end_time = end;
        }
        if let Some(all_day) = self.all_day {
            next.all_day = all_day;
        }
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields(title: &str) -> EventFields {
        EventFields {
            title: title.to_string(),
            description: None,
            location: None,
            start_time: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
            all_day: false,
        }
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let mut f = fields("Dentist");
        f.end_time = f.start_time;
        let err = CalendarEvent::new(Uuid::new_v4(), f, Utc::now()).unwrap_err();
        assert!(matches!(err, WorkmateError::Validation(_)));
    }

    #[test]
    fn test_blank_and_missing_description_compare_equal() {
        let a = fields("Dentist");
        let mut b = fields("Dentist");
        b.description = Some("  ".to_string());
        assert!(a.same_content(&b));

        b.location = Some("Main St".to_string());
        assert!(!a.same_content(&b));
    }

    #[test]
    fn test_patch_validates_combined_times() {
        let f = fields("Dentist");
        let patch = EventPatch {
            end_time: Some(Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(patch.apply_to(&f).is_err());

        let patch = EventPatch {
            title: Some("Dentist (moved)".to_string()),
            ..Default::default()
        };
        assert_eq!(patch.apply_to(&f).unwrap().title, "Dentist (moved)");
    }

    #[test]
    fn test_modified_since_sync() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut event = CalendarEvent::new(Uuid::new_v4(), fields("Dentist"), now).unwrap();
        assert!(event.modified_since_sync());

        event.last_synced_at = Some(now);
        assert!(!event.modified_since_sync());

        event.updated_at = now + chrono::Duration::minutes(1);
        assert!(event.modified_since_sync());
    }
}
