//! Remote calendar capabilities.
//!
//! Every provider (CalDAV, Google Calendar, ...) implements
//! [`RemoteCalendarAdapter`]. The sync engine only talks to this trait and
//! picks the implementation through the [`ProviderRegistry`] by the
//! integration's type tag.

mod registry;

pub use registry::{AdapterFactory, ProviderRegistry};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkmateResult;
use crate::model::{Credentials, EventFields};

/// An event as seen by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    #[serde(flatten)]
    pub fields: EventFields,
    pub last_modified: DateTime<Utc>,
    /// Provider revision tag (etag or equivalent)
    pub etag: Option<String>,
}

impl RemoteEvent {
    /// Revision marker stored on the local row; falls back to the
    /// modification timestamp for providers without etags.
    pub fn revision(&self) -> Option<String> {
        self.etag
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| Some(self.last_modified.to_rfc3339()))
    }
}

/// Events found in a listing window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventListing {
    pub events: Vec<RemoteEvent>,
    /// False when events of the window may be missing, e.g. a listing cut
    /// short or resources that could not be read. Remote deletions are
    /// only inferred from complete listings.
    pub complete: bool,
}

impl EventListing {
    pub fn complete(events: Vec<RemoteEvent>) -> Self {
        EventListing {
            events,
            complete: true,
        }
    }

    pub fn partial(events: Vec<RemoteEvent>) -> Self {
        EventListing {
            events,
            complete: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCalendar {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

/// Outcome of [`RemoteCalendarAdapter::test_connection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub message: String,
    pub calendars: Vec<RemoteCalendar>,
}

impl ConnectionTest {
    pub fn failed(message: impl Into<String>) -> Self {
        ConnectionTest {
            success: false,
            message: message.into(),
            calendars: Vec::new(),
        }
    }
}

/// Uniform capability set over a provider's calendar API.
///
/// Failures are reported as `RemoteApi` (recorded per item by the engine) or
/// `Authentication` (fatal for the pass).
#[async_trait]
pub trait RemoteCalendarAdapter: Send + Sync {
    /// Make the stored credentials usable, rotating tokens if needed.
    ///
    /// Returns the new credentials when they changed so the caller can
    /// persist them; `None` means the stored ones are still valid.
    async fn refresh_credentials(&self) -> WorkmateResult<Option<Credentials>>;

    async fn list_calendars(&self) -> WorkmateResult<Vec<RemoteCalendar>>;

    /// Every event overlapping `[start, end)`. `page_size` bounds single
    /// requests for providers that page; it never truncates the listing.
    async fn get_events(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page_size: usize,
    ) -> WorkmateResult<EventListing>;

    async fn create_event(&self, calendar_id: &str, fields: &EventFields)
    -> WorkmateResult<RemoteEvent>;

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> WorkmateResult<()>;

    /// Check that the provider is reachable with the stored credentials.
    /// Never fails; problems are reported in the result.
    async fn test_connection(&self) -> ConnectionTest {
        match self.list_calendars().await {
            Ok(calendars) => ConnectionTest {
                success: true,
                message: format!(
                    "Successfully connected. Found {} calendar(s).",
                    calendars.len()
                ),
                calendars,
            },
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}
