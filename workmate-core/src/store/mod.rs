//! Persistence collaborators.
//!
//! The relational layer lives outside this crate; the engine, mapper,
//! scheduler and pipeline only depend on these traits. [`MemoryStore`]
//! implements all of them and can be persisted as a JSON [`snapshot`].

mod memory;
pub mod snapshot;

pub use memory::{MemoryData, MemoryStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkmateResult;
use crate::model::{
    CalendarEvent, Credentials, Document, Integration, Reminder, SyncStatus, Task,
};

/// Marker left behind when a linked local event is deleted, so the next
/// sync pass removes the remote copy instead of importing it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub integration_id: Uuid,
    pub external_event_id: String,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Only events starting at or after this instant
    pub start: Option<DateTime<Utc>>,
    /// Only events ending at or before this instant
    pub end: Option<DateTime<Utc>>,
    pub sync_status: Option<SyncStatus>,
}

impl EventFilter {
    pub fn matches(&self, event: &CalendarEvent) -> bool {
        self.start.is_none_or(|s| event.fields.start_time >= s)
            && self.end.is_none_or(|e| event.fields.end_time <= e)
            && self.sync_status.is_none_or(|s| event.sync_status == s)
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get_task(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<Task>;
    async fn list_tasks(&self, user_id: Uuid) -> WorkmateResult<Vec<Task>>;
    async fn insert_task(&self, task: Task) -> WorkmateResult<Task>;
    async fn update_task(&self, task: &Task) -> WorkmateResult<()>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get_event(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<CalendarEvent>;
    async fn list_events(&self, user_id: Uuid, filter: &EventFilter)
    -> WorkmateResult<Vec<CalendarEvent>>;
    /// Every event owned by an integration.
    async fn events_for_integration(&self, integration_id: Uuid)
    -> WorkmateResult<Vec<CalendarEvent>>;
    async fn events_for_task(&self, task_id: Uuid) -> WorkmateResult<Vec<CalendarEvent>>;
    async fn insert_event(&self, event: CalendarEvent) -> WorkmateResult<CalendarEvent>;
    async fn update_event(&self, event: &CalendarEvent) -> WorkmateResult<()>;
    async fn delete_event(&self, id: Uuid) -> WorkmateResult<()>;
    /// Clear the integration linkage on all its events. Returns how many
    /// rows were touched.
    async fn unlink_integration(&self, integration_id: Uuid) -> WorkmateResult<usize>;

    async fn record_tombstone(&self, tombstone: Tombstone) -> WorkmateResult<()>;
    async fn tombstones(&self, integration_id: Uuid) -> WorkmateResult<Vec<Tombstone>>;
    async fn clear_tombstone(
        &self,
        integration_id: Uuid,
        external_event_id: &str,
    ) -> WorkmateResult<()>;
}

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get_integration(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<Integration>;
    async fn list_integrations(&self, user_id: Uuid) -> WorkmateResult<Vec<Integration>>;
    /// Every integration of every user, for the scheduled trigger.
    async fn all_integrations(&self) -> WorkmateResult<Vec<Integration>>;
    async fn insert_integration(&self, integration: Integration) -> WorkmateResult<Integration>;
    async fn update_integration(&self, integration: &Integration) -> WorkmateResult<()>;
    async fn update_credentials(&self, id: Uuid, credentials: &Credentials) -> WorkmateResult<()>;
    async fn delete_integration(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<()>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: Uuid) -> WorkmateResult<Document>;
    async fn list_documents(&self, user_id: Uuid) -> WorkmateResult<Vec<Document>>;
    async fn insert_document(&self, document: Document) -> WorkmateResult<Document>;
    async fn update_document(&self, document: &Document) -> WorkmateResult<()>;
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert_reminders(&self, reminders: Vec<Reminder>) -> WorkmateResult<()>;
    async fn get_reminder(&self, id: Uuid) -> WorkmateResult<Reminder>;
    async fn update_reminder(&self, reminder: &Reminder) -> WorkmateResult<()>;
    async fn reminders_for_task(&self, task_id: Uuid) -> WorkmateResult<Vec<Reminder>>;
    async fn pending_reminders(&self) -> WorkmateResult<Vec<Reminder>>;
    /// Remove the task's reminders that have not fired yet. Returns the count.
    async fn delete_pending_for_task(&self, task_id: Uuid) -> WorkmateResult<usize>;
}

/// Delete a local event, leaving a tombstone when it was linked to a
/// remote event.
pub async fn delete_event_with_tombstone(
    events: &dyn EventStore,
    event: &CalendarEvent,
) -> WorkmateResult<()> {
    if let (Some(integration_id), Some(external_id)) =
        (event.integration_id, event.external_event_id.as_ref())
    {
        events
            .record_tombstone(Tombstone {
                integration_id,
                external_event_id: external_id.clone(),
                deleted_at: Utc::now(),
            })
            .await?;
    }
    events.delete_event(event.id).await
}
