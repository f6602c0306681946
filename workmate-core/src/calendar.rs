//! Manual calendar and integration operations.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::WorkmateResult;
use crate::model::{CalendarEvent, EventDraft, EventPatch, Integration, SyncStatus};
use crate::remote::{AdapterFactory, ConnectionTest};
use crate::store::{EventFilter, EventStore, IntegrationStore, delete_event_with_tombstone};

pub struct CalendarService {
    events: Arc<dyn EventStore>,
    integrations: Arc<dyn IntegrationStore>,
    adapters: Arc<dyn AdapterFactory>,
}

impl CalendarService {
    pub fn new(
        events: Arc<dyn EventStore>,
        integrations: Arc<dyn IntegrationStore>,
        adapters: Arc<dyn AdapterFactory>,
    ) -> Self {
        CalendarService {
            events,
            integrations,
            adapters,
        }
    }

    pub async fn create_event(
        &self,
        user_id: Uuid,
        draft: EventDraft,
    ) -> WorkmateResult<CalendarEvent> {
        draft.validate()?;
        if let Some(integration_id) = draft.integration_id {
            self.integrations
                .get_integration(user_id, integration_id)
                .await?;
        }

        let mut event = CalendarEvent::new(user_id, draft.fields, Utc::now())?;
        event.task_id = draft.task_id;
        event.integration_id = draft.integration_id;
        self.events.insert_event(event).await
    }

    /// Edit a local event. A synced or failed row goes back to pending so
    /// the next pass pushes it; a conflicting row stays in conflict.
    pub async fn update_event(
        &self,
        user_id: Uuid,
        id: Uuid,
        patch: &EventPatch,
    ) -> WorkmateResult<CalendarEvent> {
        let mut event = self.events.get_event(user_id, id).await?;
        event.fields = patch.apply_to(&event.fields)?;
        event.updated_at = Utc::now();
        if event.sync_status != SyncStatus::Conflict {
            event.sync_status = SyncStatus::Pending;
        }
        self.events.update_event(&event).await?;
        Ok(event)
    }

    pub async fn delete_event(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<()> {
        let event = self.events.get_event(user_id, id).await?;
        delete_event_with_tombstone(self.events.as_ref(), &event).await
    }

    pub async fn list_events(
        &self,
        user_id: Uuid,
        filter: &EventFilter,
    ) -> WorkmateResult<Vec<CalendarEvent>> {
        self.events.list_events(user_id, filter).await
    }

    pub async fn add_integration(&self, integration: Integration) -> WorkmateResult<Integration> {
        let stored = self.integrations.insert_integration(integration).await?;
        info!(integration = %stored.id, kind = %stored.integration_type, "Integration added");
        Ok(stored.redacted())
    }

    /// Integrations of a user, credentials stripped.
    pub async fn list_integrations(&self, user_id: Uuid) -> WorkmateResult<Vec<Integration>> {
        let integrations = self.integrations.list_integrations(user_id).await?;
        Ok(integrations.iter().map(Integration::redacted).collect())
    }

    /// Delete an integration. Its events stay, with the linkage cleared.
    pub async fn remove_integration(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<usize> {
        self.integrations.get_integration(user_id, id).await?;
        let unlinked = self.events.unlink_integration(id).await?;
        self.integrations.delete_integration(user_id, id).await?;
        info!(integration = %id, unlinked, "Integration removed");
        Ok(unlinked)
    }

    /// Probe the provider. Never fails once the integration is found.
    pub async fn test_connection(&self, user_id: Uuid, id: Uuid) -> WorkmateResult<ConnectionTest> {
        let integration = self.integrations.get_integration(user_id, id).await?;

        let adapter = match self.adapters.adapter_for(&integration) {
            Ok(adapter) => adapter,
            Err(e) => return Ok(ConnectionTest::failed(e.to_string())),
        };

        match adapter.refresh_credentials().await {
            Ok(Some(credentials)) => {
                self.integrations
                    .update_credentials(integration.id, &credentials)
                    .await?;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(integration = %id, error = %e, "Credential refresh failed");
                return Ok(ConnectionTest::failed(e.to_string()));
            }
        }

        Ok(adapter.test_connection().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkmateError;
    use crate::model::{EventFields, IntegrationType};
    use crate::remote::ProviderRegistry;
    use crate::store::MemoryStore;
    use crate::testing::FakeCalendar;
    use chrono::{Duration, TimeZone};

    fn service(store: &Arc<MemoryStore>, remote: &FakeCalendar) -> CalendarService {
        CalendarService::new(store.clone(), store.clone(), Arc::new(remote.clone()))
    }

    fn draft(title: &str) -> EventDraft {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        EventDraft {
            task_id: None,
            integration_id: None,
            fields: EventFields {
                title: title.to_string(),
                description: None,
                location: None,
                start_time: start,
                end_time: start + Duration::hours(1),
                all_day: false,
            },
        }
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_times_before_storing() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store, &FakeCalendar::new());
        let user = Uuid::new_v4();

        let mut bad = draft("Dentist");
        bad.fields.end_time = bad.fields.start_time - Duration::minutes(1);
        let err = service.create_event(user, bad).await.unwrap_err();
        assert!(matches!(err, WorkmateError::Validation(_)));
        assert!(service.list_events(user, &EventFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_editing_synced_event_returns_it_to_pending() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store, &FakeCalendar::new());
        let user = Uuid::new_v4();

        let mut event = service.create_event(user, draft("Dentist")).await.unwrap();
        event.sync_status = SyncStatus::Synced;
        store.update_event(&event).await.unwrap();

        let patch = EventPatch {
            location: Some("Main St 1".to_string()),
            ..Default::default()
        };
        let updated = service.update_event(user, event.id, &patch).await.unwrap();
        assert_eq!(updated.sync_status, SyncStatus::Pending);
        assert!(updated.updated_at >= event.updated_at);
    }

    #[tokio::test]
    async fn test_removing_integration_keeps_events() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store, &FakeCalendar::new());
        let user = Uuid::new_v4();
        let integration = service
            .add_integration(Integration::new(user, "Work", IntegrationType::Caldav))
            .await
            .unwrap();

        let mut d = draft("Standup");
        d.integration_id = Some(integration.id);
        let event = service.create_event(user, d).await.unwrap();

        assert_eq!(service.remove_integration(user, integration.id).await.unwrap(), 1);
        let kept = store.get_event(user, event.id).await.unwrap();
        assert!(kept.integration_id.is_none());
        assert!(service.list_integrations(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_hides_credentials() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store, &FakeCalendar::new());
        let user = Uuid::new_v4();
        let mut integration = Integration::new(user, "Work", IntegrationType::Caldav);
        integration.credentials.set("password", "hunter2");
        service.add_integration(integration).await.unwrap();

        let listed = service.list_integrations(user).await.unwrap();
        assert!(listed[0].credentials.is_empty());
    }

    #[tokio::test]
    async fn test_connection_reports_failures_instead_of_erroring() {
        let store = Arc::new(MemoryStore::new());
        let remote = FakeCalendar::new();
        let service = service(&store, &remote);
        let user = Uuid::new_v4();
        let integration = service
            .add_integration(Integration::new(user, "Google", IntegrationType::GoogleCalendar))
            .await
            .unwrap();

        let ok = service.test_connection(user, integration.id).await.unwrap();
        assert!(ok.success);
        assert_eq!(ok.calendars.len(), 1);

        remote.state.lock().unwrap().reject_auth = true;
        let failed = service.test_connection(user, integration.id).await.unwrap();
        assert!(!failed.success);
        assert!(failed.calendars.is_empty());
    }

    #[tokio::test]
    async fn test_outlook_has_no_provider() {
        let store = Arc::new(MemoryStore::new());
        let service = CalendarService::new(
            store.clone(),
            store.clone(),
            Arc::new(ProviderRegistry::new()),
        );
        let user = Uuid::new_v4();
        let integration = service
            .add_integration(Integration::new(user, "Outlook", IntegrationType::Outlook))
            .await
            .unwrap();

        let result = service.test_connection(user, integration.id).await.unwrap();
        assert!(!result.success);
        assert!(result.message.contains("outlook"));
    }
}
