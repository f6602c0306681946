//! Google Calendar provider for workmate.
//!
//! Talks to the Calendar v3 REST API with the integration's OAuth tokens.
//! Token rotation happens only in [`RemoteCalendarAdapter::refresh_credentials`];
//! the new credentials are handed back to the caller for persisting.

mod google_event;
mod session;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;
use workmate_core::config::GoogleAppConfig;
use workmate_core::error::{WorkmateError, WorkmateResult};
use workmate_core::model::{Credentials, EventFields, Integration, IntegrationType};
use workmate_core::remote::{
    EventListing, ProviderRegistry, RemoteCalendar, RemoteCalendarAdapter, RemoteEvent,
};

use crate::google_event::{CalendarList, EventList, FromGoogle, GoogleEvent, ToGoogle};
use crate::session::{Session, TokenResponse};

pub struct GoogleCalendarAdapter {
    http: reqwest::Client,
    app: GoogleAppConfig,
    timeout_secs: u64,
    session: RwLock<Session>,
}

impl GoogleCalendarAdapter {
    pub fn new(
        app: GoogleAppConfig,
        credentials: Credentials,
        timeout_secs: u64,
    ) -> WorkmateResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| WorkmateError::Config(format!("Could not build HTTP client: {e}")))?;

        Ok(GoogleCalendarAdapter {
            http,
            app,
            timeout_secs,
            session: RwLock::new(Session::new(credentials)),
        })
    }

    fn url(&self, segments: &[&str]) -> WorkmateResult<Url> {
        let mut url = Url::parse(&self.app.api_base)
            .map_err(|e| WorkmateError::Config(format!("Invalid Google API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| WorkmateError::Config("Google API base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> WorkmateResult<RequestBuilder> {
        let session = self.session.read().await;
        let token = session.access_token()?;
        debug!(%method, %url, "Google API request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> WorkmateResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, action, self.timeout_secs))?;
        check_status(response, action).await
    }

    async fn send_event(
        &self,
        builder: RequestBuilder,
        action: &str,
    ) -> WorkmateResult<RemoteEvent> {
        let event: GoogleEvent = self
            .send(builder, action)
            .await?
            .json()
            .await
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to {action}: {e}")))?;
        RemoteEvent::from_google(event)
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to {action}: {e:#}")))
    }
}

fn transport_error(e: reqwest::Error, action: &str, timeout_secs: u64) -> WorkmateError {
    if e.is_timeout() {
        WorkmateError::Timeout(timeout_secs)
    } else {
        WorkmateError::RemoteApi(format!("Failed to {action}: {e}"))
    }
}

async fn check_status(response: Response, action: &str) -> WorkmateResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WorkmateError::Authentication(
            format!("Google rejected the credentials ({status}) while trying to {action}"),
        )),
        _ => Err(WorkmateError::RemoteApi(format!(
            "Failed to {action}: {status} {body}"
        ))),
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl RemoteCalendarAdapter for GoogleCalendarAdapter {
    async fn refresh_credentials(&self) -> WorkmateResult<Option<Credentials>> {
        let mut session = self.session.write().await;
        let now = Utc::now();
        if !session.needs_refresh(now) {
            return Ok(None);
        }

        let token_uri = session
            .token_uri()
            .unwrap_or(self.app.token_uri.as_str())
            .to_string();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", session.refresh_token()?),
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error(e, "refresh access token", self.timeout_secs))?;

        // The token endpoint answers 400 invalid_grant for revoked tokens
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkmateError::Authentication(format!(
                "Google refused the refresh token: {body}"
            )));
        }

        let tokens: TokenResponse = check_status(response, "refresh access token")
            .await?
            .json()
            .await
            .map_err(|e| WorkmateError::RemoteApi(format!("Malformed token response: {e}")))?;

        session.apply(tokens, now);
        info!("Rotated Google access token");
        Ok(Some(session.credentials().clone()))
    }

    async fn list_calendars(&self) -> WorkmateResult<Vec<RemoteCalendar>> {
        let url = self.url(&["users", "me", "calendarList"])?;
        let list: CalendarList = self
            .send(self.request(Method::GET, url).await?, "list calendars")
            .await?
            .json()
            .await
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to list calendars: {e}")))?;

        Ok(list
            .items
            .into_iter()
            .filter(|c| !c.id.is_empty())
            .map(RemoteCalendar::from)
            .collect())
    }

    async fn get_events(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page_size: usize,
    ) -> WorkmateResult<EventListing> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("timeMin", rfc3339(start)),
                ("timeMax", rfc3339(end)),
                ("maxResults", page_size.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let builder = self.request(Method::GET, url.clone()).await?.query(&query);

            let page: EventList = self
                .send(builder, "fetch events")
                .await?
                .json()
                .await
                .map_err(|e| WorkmateError::RemoteApi(format!("Failed to fetch events: {e}")))?;

            for event in page.items {
                if event.status.as_deref() == Some("cancelled") {
                    continue;
                }
                events.push(RemoteEvent::from_google(event).map_err(|e| {
                    WorkmateError::RemoteApi(format!("Failed to fetch events: {e:#}"))
                })?);
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => {
                    debug!(fetched = events.len(), "Fetching next page of events");
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(EventListing::complete(events))
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent> {
        let url = self.url(&["calendars", calendar_id, "events"])?;
        let builder = self
            .request(Method::POST, url)
            .await?
            .json(&fields.to_google());
        let created = self
            .send_event(builder, &format!("create event '{}'", fields.title))
            .await?;
        debug!(id = %created.id, "Created Google event");
        Ok(created)
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent> {
        // PATCH keeps attendees and other properties workmate does not manage
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let builder = self
            .request(Method::PATCH, url)
            .await?
            .json(&fields.to_google());
        self.send_event(builder, &format!("update event {event_id}"))
            .await
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> WorkmateResult<()> {
        let url = self.url(&["calendars", calendar_id, "events", event_id])?;
        let response = self
            .request(Method::DELETE, url)
            .await?
            .send()
            .await
            .map_err(|e| transport_error(e, "delete event", self.timeout_secs))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!(event_id, "Google event already gone");
                Ok(())
            }
            _ => check_status(response, &format!("delete event {event_id}"))
                .await
                .map(|_| ()),
        }
    }
}

/// Register the Google provider. Without an OAuth client configured,
/// Google integrations fail with a configuration error when used.
pub fn register(
    registry: ProviderRegistry,
    app: Option<GoogleAppConfig>,
    timeout_secs: u64,
) -> ProviderRegistry {
    registry.register(IntegrationType::GoogleCalendar, move |integration: &Integration| {
        let app = app.clone().ok_or_else(|| {
            WorkmateError::Config(
                "Google OAuth client is not configured. Add a [google] section to config.toml"
                    .into(),
            )
        })?;
        let adapter =
            GoogleCalendarAdapter::new(app, integration.credentials.clone(), timeout_secs)?;
        Ok(Box::new(adapter) as Box<dyn RemoteCalendarAdapter>)
    })
}
