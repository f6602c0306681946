//! In-memory provider used by the unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{Credentials, EventFields, Integration};
use crate::remote::{
    AdapterFactory, EventListing, RemoteCalendar, RemoteCalendarAdapter, RemoteEvent,
};

#[derive(Default)]
pub struct FakeRemoteState {
    pub events: BTreeMap<String, RemoteEvent>,
    pub next_id: u32,
    /// Titles whose create/update calls fail with a remote API error
    pub failing_titles: HashSet<String>,
    pub reject_auth: bool,
    pub fail_fetch: bool,
    pub rotate_to: Option<Credentials>,
    pub deleted: Vec<String>,
}

/// Provider backed by a shared map; clones observe the same calendar.
#[derive(Clone, Default)]
pub struct FakeCalendar {
    pub state: Arc<Mutex<FakeRemoteState>>,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RemoteEvent> {
        self.state.lock().unwrap().events.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<RemoteEvent> {
        self.state.lock().unwrap().events.get(id).cloned()
    }

    /// Insert an event as if it had been created in the provider's own UI.
    pub fn seed(&self, fields: EventFields, last_modified: DateTime<Utc>) -> RemoteEvent {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let event = RemoteEvent {
            id: format!("remote-{}", state.next_id),
            fields,
            last_modified,
            etag: Some(format!("\"{}-0\"", state.next_id)),
        };
        state.events.insert(event.id.clone(), event.clone());
        event
    }

    /// Edit an event remotely, bumping its revision.
    pub fn edit(&self, id: &str, title: &str, last_modified: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        let event = state.events.get_mut(id).unwrap();
        event.fields.title = title.to_string();
        event.last_modified = last_modified;
        event.etag = Some(format!("\"{id}-{}\"", last_modified.timestamp_micros()));
    }

    pub fn remove(&self, id: &str) {
        self.state.lock().unwrap().events.remove(id);
    }

    pub fn fail_title(&self, title: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_titles
            .insert(title.to_string());
    }

    fn check_title(&self, fields: &EventFields) -> WorkmateResult<()> {
        if self.state.lock().unwrap().failing_titles.contains(&fields.title) {
            return Err(WorkmateError::RemoteApi(format!(
                "provider rejected '{}'",
                fields.title
            )));
        }
        Ok(())
    }

    fn check_auth(&self) -> WorkmateResult<()> {
        if self.state.lock().unwrap().reject_auth {
            return Err(WorkmateError::Authentication("token revoked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCalendarAdapter for FakeCalendar {
    async fn refresh_credentials(&self) -> WorkmateResult<Option<Credentials>> {
        Ok(self.state.lock().unwrap().rotate_to.clone())
    }

    async fn list_calendars(&self) -> WorkmateResult<Vec<RemoteCalendar>> {
        self.check_auth()?;
        Ok(vec![RemoteCalendar {
            id: "primary".to_string(),
            name: "Personal".to_string(),
            description: None,
            timezone: Some("Europe/Berlin".to_string()),
            primary: true,
        }])
    }

    async fn get_events(
        &self,
        _calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page_size: usize,
    ) -> WorkmateResult<EventListing> {
        self.check_auth()?;
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(WorkmateError::RemoteApi("503 Service Unavailable".into()));
        }
        let in_window: Vec<RemoteEvent> = state
            .events
            .values()
            .filter(|e| e.fields.end_time >= start && e.fields.start_time < end)
            .cloned()
            .collect();

        // Behaves like a provider that stops after one page
        if in_window.len() > page_size {
            return Ok(EventListing::partial(
                in_window.into_iter().take(page_size).collect(),
            ));
        }
        Ok(EventListing::complete(in_window))
    }

    async fn create_event(
        &self,
        _calendar_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent> {
        self.check_auth()?;
        self.check_title(fields)?;
        Ok(self.seed(fields.clone(), Utc::now()))
    }

    async fn update_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent> {
        self.check_auth()?;
        self.check_title(fields)?;
        let mut state = self.state.lock().unwrap();
        let event = state
            .events
            .get_mut(event_id)
            .ok_or_else(|| WorkmateError::RemoteApi(format!("404 {event_id}")))?;
        let now = Utc::now();
        event.fields = fields.clone();
        event.last_modified = now;
        event.etag = Some(format!("\"{event_id}-{}\"", now.timestamp_micros()));
        Ok(event.clone())
    }

    async fn delete_event(&self, _calendar_id: &str, event_id: &str) -> WorkmateResult<()> {
        self.check_auth()?;
        let mut state = self.state.lock().unwrap();
        state.events.remove(event_id);
        state.deleted.push(event_id.to_string());
        Ok(())
    }
}

impl AdapterFactory for FakeCalendar {
    fn adapter_for(
        &self,
        _integration: &Integration,
    ) -> WorkmateResult<Box<dyn RemoteCalendarAdapter>> {
        Ok(Box::new(self.clone()))
    }
}
