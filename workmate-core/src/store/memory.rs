use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{
    CalendarEvent, Credentials, Document, Integration, Reminder, ReminderStatus, Task,
};
use crate::store::{
    DocumentStore, EventFilter, EventStore, IntegrationStore, ReminderStore, TaskStore, Tombstone,
};

/// Everything the store holds. Also the on-disk snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryData {
    #[serde(default)]
    pub tasks: BTreeMap<Uuid, Task>,
    #[serde(default)]
    pub events: BTreeMap<Uuid, CalendarEvent>,
    #[serde(default)]
    pub integrations: BTreeMap<Uuid, Integration>,
    #[serde(default)]
    pub documents: BTreeMap<Uuid, Document>,
    #[serde(default)]
    pub reminders: BTreeMap<Uuid, Reminder>,
    #[serde(default)]
    pub tombstones: Vec<Tombstone>,
}

/// In-process implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: MemoryData) -> Self {
        MemoryStore {
            data: RwLock::new(data),
        }
    }

    /// Copy of the current contents.
    pub async fn data(&self) -> MemoryData {
        self.data.read().await.clone()
    }
}

fn not_found(kind: &str, id: Uuid) -> WorkmateError {
    WorkmateError::NotFound(format!("{kind} {id}"))
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<Task> {
        let data = self.data.read().await;
        data.tasks
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Task", id))
    }

    async fn list_tasks(&self, user_id: Uuid) -> WorkmateResult<Vec<Task>> {
        let data = self.data.read().await;
        Ok(data
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_task(&self, task: Task) -> WorkmateResult<Task> {
        let mut data = self.data.write().await;
        data.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task(&self, task: &Task) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        let slot = data
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| not_found("Task", task.id))?;
        *slot = task.clone();
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get_event(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<CalendarEvent> {
        let data = self.data.read().await;
        data.events
            .get(&id)
            .filter(|e| e.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Event", id))
    }

    async fn list_events(
        &self,
        user_id: Uuid,
        filter: &EventFilter,
    ) -> WorkmateResult<Vec<CalendarEvent>> {
        let data = self.data.read().await;
        let mut events: Vec<CalendarEvent> = data
            .events
            .values()
            .filter(|e| e.user_id == user_id && filter.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.fields.start_time);
        Ok(events)
    }

    async fn events_for_integration(
        &self,
        integration_id: Uuid,
    ) -> WorkmateResult<Vec<CalendarEvent>> {
        let data = self.data.read().await;
        Ok(data
            .events
            .values()
            .filter(|e| e.integration_id == Some(integration_id))
            .cloned()
            .collect())
    }

    async fn events_for_task(&self, task_id: Uuid) -> WorkmateResult<Vec<CalendarEvent>> {
        let data = self.data.read().await;
        Ok(data
            .events
            .values()
            .filter(|e| e.task_id == Some(task_id))
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: CalendarEvent) -> WorkmateResult<CalendarEvent> {
        event.fields.validate()?;
        let mut data = self.data.write().await;
        data.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(&self, event: &CalendarEvent) -> WorkmateResult<()> {
        event.fields.validate()?;
        let mut data = self.data.write().await;
        let slot = data
            .events
            .get_mut(&event.id)
            .ok_or_else(|| not_found("Event", event.id))?;
        *slot = event.clone();
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        data.events
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Event", id))
    }

    async fn unlink_integration(&self, integration_id: Uuid) -> WorkmateResult<usize> {
        let mut data = self.data.write().await;
        let mut touched = 0;
        for event in data.events.values_mut() {
            if event.integration_id == Some(integration_id) {
                event.unlink();
                touched += 1;
            }
        }
        data.tombstones.retain(|t| t.integration_id != integration_id);
        Ok(touched)
    }

    async fn record_tombstone(&self, tombstone: Tombstone) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        let exists = data.tombstones.iter().any(|t| {
            t.integration_id == tombstone.integration_id
                && t.external_event_id == tombstone.external_event_id
        });
        if !exists {
            data.tombstones.push(tombstone);
        }
        Ok(())
    }

    async fn tombstones(&self, integration_id: Uuid) -> WorkmateResult<Vec<Tombstone>> {
        let data = self.data.read().await;
        Ok(data
            .tombstones
            .iter()
            .filter(|t| t.integration_id == integration_id)
            .cloned()
            .collect())
    }

    async fn clear_tombstone(
        &self,
        integration_id: Uuid,
        external_event_id: &str,
    ) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        data.tombstones.retain(|t| {
            !(t.integration_id == integration_id && t.external_event_id == external_event_id)
        });
        Ok(())
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn get_integration(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<Integration> {
        let data = self.data.read().await;
        data.integrations
            .get(&id)
            .filter(|i| i.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("Integration", id))
    }

    async fn list_integrations(&self, user_id: Uuid) -> WorkmateResult<Vec<Integration>> {
        let data = self.data.read().await;
        let mut integrations: Vec<Integration> = data
            .integrations
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        integrations.sort_by_key(|i| i.created_at);
        Ok(integrations)
    }

    async fn all_integrations(&self) -> WorkmateResult<Vec<Integration>> {
        let data = self.data.read().await;
        Ok(data.integrations.values().cloned().collect())
    }

    async fn insert_integration(&self, integration: Integration) -> WorkmateResult<Integration> {
        let mut data = self.data.write().await;
        data.integrations.insert(integration.id, integration.clone());
        Ok(integration)
    }

    async fn update_integration(&self, integration: &Integration) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        let slot = data
            .integrations
            .get_mut(&integration.id)
            .ok_or_else(|| not_found("Integration", integration.id))?;
        *slot = integration.clone();
        Ok(())
    }

    async fn update_credentials(&self, id: Uuid, credentials: &Credentials) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        let slot = data
            .integrations
            .get_mut(&id)
            .ok_or_else(|| not_found("Integration", id))?;
        slot.credentials = credentials.clone();
        Ok(())
    }

    async fn delete_integration(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        match data.integrations.get(&id) {
            Some(i) if i.user_id == user_id => {
                data.integrations.remove(&id);
                Ok(())
            }
            _ => Err(not_found("Integration", id)),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, id: Uuid) -> WorkmateResult<Document> {
        let data = self.data.read().await;
        data.documents
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Document", id))
    }

    async fn list_documents(&self, user_id: Uuid) -> WorkmateResult<Vec<Document>> {
        let data = self.data.read().await;
        Ok(data
            .documents
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_document(&self, document: Document) -> WorkmateResult<Document> {
        let mut data = self.data.write().await;
        data.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn update_document(&self, document: &Document) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        let slot = data
            .documents
            .get_mut(&document.id)
            .ok_or_else(|| not_found("Document", document.id))?;
        *slot = document.clone();
        Ok(())
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn insert_reminders(&self, reminders: Vec<Reminder>) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        for reminder in reminders {
            data.reminders.insert(reminder.id, reminder);
        }
        Ok(())
    }

    async fn get_reminder(&self, id: Uuid) -> WorkmateResult<Reminder> {
        let data = self.data.read().await;
        data.reminders
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Reminder", id))
    }

    async fn update_reminder(&self, reminder: &Reminder) -> WorkmateResult<()> {
        let mut data = self.data.write().await;
        let slot = data
            .reminders
            .get_mut(&reminder.id)
            .ok_or_else(|| not_found("Reminder", reminder.id))?;
        *slot = reminder.clone();
        Ok(())
    }

    async fn reminders_for_task(&self, task_id: Uuid) -> WorkmateResult<Vec<Reminder>> {
        let data = self.data.read().await;
        let mut reminders: Vec<Reminder> = data
            .reminders
            .values()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.trigger_at);
        Ok(reminders)
    }

    async fn pending_reminders(&self) -> WorkmateResult<Vec<Reminder>> {
        let data = self.data.read().await;
        let mut reminders: Vec<Reminder> = data
            .reminders
            .values()
            .filter(|r| r.status == ReminderStatus::Pending)
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.trigger_at);
        Ok(reminders)
    }

    async fn delete_pending_for_task(&self, task_id: Uuid) -> WorkmateResult<usize> {
        let mut data = self.data.write().await;
        let before = data.reminders.len();
        data.reminders
            .retain(|_, r| !(r.task_id == task_id && r.status == ReminderStatus::Pending));
        Ok(before - data.reminders.len())
    }
}
