//! Generic CalDAV provider for workmate.
//!
//! Integration config: `url` (calendar home or collection URL) and an
//! optional `calendar_id` (collection href or URL; defaults to `url`).
//! Credentials: `username` and `password` for basic auth.
//!
//! Remote event ids are resource hrefs, revisions are ETags.

mod caldav;
mod ics;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;
use workmate_core::error::{WorkmateError, WorkmateResult};
use workmate_core::model::{Credentials, EventFields, Integration, IntegrationType};
use workmate_core::remote::{
    EventListing, ProviderRegistry, RemoteCalendar, RemoteCalendarAdapter, RemoteEvent,
};

use crate::caldav::{
    CALENDAR_PROPFIND, calendar_query, parse_calendar_collections, parse_calendar_resources,
};

const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

pub struct CalDavAdapter {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    timeout_secs: u64,
}

impl CalDavAdapter {
    pub fn new(
        base_url: &str,
        credentials: &Credentials,
        timeout_secs: u64,
    ) -> WorkmateResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| WorkmateError::Config(format!("Invalid CalDAV URL '{base_url}': {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| WorkmateError::Config(format!("Could not build HTTP client: {e}")))?;

        Ok(CalDavAdapter {
            http,
            base_url,
            username: credentials.require_str("username")?.to_string(),
            password: credentials.require_str("password")?.to_string(),
            timeout_secs,
        })
    }

    pub fn from_integration(integration: &Integration, timeout_secs: u64) -> WorkmateResult<Self> {
        let url = integration.config.require_str("url")?;
        Self::new(url, &integration.credentials, timeout_secs)
    }

    /// Resolve a collection id or resource href against the server.
    /// `primary` stands for the configured URL itself.
    fn resolve(&self, href: &str) -> WorkmateResult<Url> {
        if href.is_empty() || href == "primary" {
            return Ok(self.base_url.clone());
        }
        self.base_url
            .join(href)
            .map_err(|e| WorkmateError::Config(format!("Invalid CalDAV href '{href}': {e}")))
    }

    fn collection(&self, calendar_id: &str) -> WorkmateResult<Url> {
        let mut url = self.resolve(calendar_id)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!(%method, %url, "CalDAV request");
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> WorkmateResult<Response> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                WorkmateError::Timeout(self.timeout_secs)
            } else {
                WorkmateError::RemoteApi(format!("Failed to {action}: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WorkmateError::Authentication(
                format!("CalDAV server rejected the credentials ({status}) while trying to {action}"),
            )),
            StatusCode::PRECONDITION_FAILED => Err(WorkmateError::RemoteApi(format!(
                "Failed to {action}: the event changed on the server"
            ))),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(WorkmateError::RemoteApi(format!(
                    "Failed to {action}: {status} {body}"
                )))
            }
        }
    }

    async fn body(response: Response, action: &str) -> WorkmateResult<String> {
        response
            .text()
            .await
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to {action}: {e}")))
    }

    async fn put(
        &self,
        url: Url,
        uid: &str,
        fields: &EventFields,
        precondition: (reqwest::header::HeaderName, String),
        action: &str,
    ) -> WorkmateResult<RemoteEvent> {
        fields.validate()?;
        let now = Utc::now();
        let (header, value) = precondition;
        let builder = self
            .request(Method::PUT, url.clone())
            .header(CONTENT_TYPE, ICS_CONTENT_TYPE)
            .header(header, value)
            .body(ics::generate_ics(uid, fields, now));
        let response = self.send(builder, action).await?;

        Ok(RemoteEvent {
            id: url.path().to_string(),
            fields: fields.clone(),
            last_modified: now,
            etag: etag_of(&response),
        })
    }
}

fn etag_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn report() -> WorkmateResult<Method> {
    Method::from_bytes(b"REPORT").map_err(|e| WorkmateError::RemoteApi(e.to_string()))
}

fn propfind() -> WorkmateResult<Method> {
    Method::from_bytes(b"PROPFIND").map_err(|e| WorkmateError::RemoteApi(e.to_string()))
}

#[async_trait]
impl RemoteCalendarAdapter for CalDavAdapter {
    /// Basic auth has nothing to rotate.
    async fn refresh_credentials(&self) -> WorkmateResult<Option<Credentials>> {
        Ok(None)
    }

    async fn list_calendars(&self) -> WorkmateResult<Vec<RemoteCalendar>> {
        let builder = self
            .request(propfind()?, self.base_url.clone())
            .header("Depth", "1")
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(CALENDAR_PROPFIND);
        let response = self.send(builder, "list calendars").await?;
        let body = Self::body(response, "list calendars").await?;

        let collections = parse_calendar_collections(&body)
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to list calendars: {e:#}")))?;

        Ok(collections
            .into_iter()
            .map(|c| RemoteCalendar {
                name: c.display_name.unwrap_or_else(|| c.href.clone()),
                id: c.href,
                description: c.description,
                timezone: c.timezone,
                primary: false,
            })
            .collect())
    }

    async fn get_events(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _page_size: usize,
    ) -> WorkmateResult<EventListing> {
        let builder = self
            .request(report()?, self.collection(calendar_id)?)
            .header("Depth", "1")
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(calendar_query(start, end));
        let response = self.send(builder, "fetch events").await?;
        let body = Self::body(response, "fetch events").await?;

        let resources = parse_calendar_resources(&body)
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to fetch events: {e:#}")))?;

        let mut events = Vec::new();
        let mut skipped = 0;
        for resource in resources {
            match ics::parse_event(&resource.data) {
                Ok(parsed) => events.push(RemoteEvent {
                    id: resource.href,
                    fields: parsed.fields,
                    last_modified: parsed.last_modified.unwrap_or_else(Utc::now),
                    etag: resource.etag,
                }),
                // One unreadable resource must not block the rest of the calendar
                Err(e) => {
                    skipped += 1;
                    warn!(
                        href = %resource.href,
                        error = %format!("{e:#}"),
                        "Skipping calendar resource"
                    );
                }
            }
        }

        if skipped > 0 {
            return Ok(EventListing::partial(events));
        }
        Ok(EventListing::complete(events))
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent> {
        let uid = uuid::Uuid::new_v4().to_string();
        let url = self
            .collection(calendar_id)?
            .join(&format!("{uid}.ics"))
            .map_err(|e| WorkmateError::RemoteApi(e.to_string()))?;

        self.put(
            url,
            &uid,
            fields,
            (IF_NONE_MATCH, "*".to_string()),
            &format!("create event '{}'", fields.title),
        )
        .await
    }

    /// Reads the resource first to keep its UID and to guard the write with
    /// its current ETag.
    async fn update_event(
        &self,
        _calendar_id: &str,
        event_id: &str,
        fields: &EventFields,
    ) -> WorkmateResult<RemoteEvent> {
        let action = format!("update event {event_id}");
        let url = self.resolve(event_id)?;

        let response = self.send(self.request(Method::GET, url.clone()), &action).await?;
        let etag = etag_of(&response).unwrap_or_else(|| "*".to_string());
        let current = Self::body(response, &action).await?;
        let uid = ics::parse_event(&current)
            .map(|parsed| parsed.uid)
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to {action}: {e:#}")))?;

        self.put(url, &uid, fields, (IF_MATCH, etag), &action).await
    }

    async fn delete_event(&self, _calendar_id: &str, event_id: &str) -> WorkmateResult<()> {
        let url = self.resolve(event_id)?;
        let response = self
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(|e| WorkmateError::RemoteApi(format!("Failed to delete event: {e}")))?;

        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) {
            debug!(event_id, "CalDAV resource already gone");
            return Ok(());
        }
        let status = response.status();
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(WorkmateError::Authentication(
                format!("CalDAV server rejected the credentials ({status}) while deleting"),
            )),
            _ => Err(WorkmateError::RemoteApi(format!(
                "Failed to delete event {event_id}: {status}"
            ))),
        }
    }
}

pub fn register(registry: ProviderRegistry, timeout_secs: u64) -> ProviderRegistry {
    registry.register(IntegrationType::Caldav, move |integration: &Integration| {
        let adapter = CalDavAdapter::from_integration(integration, timeout_secs)?;
        Ok(Box::new(adapter) as Box<dyn RemoteCalendarAdapter>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        let mut credentials = Credentials::default();
        credentials.set("username", "alice");
        credentials.set("password", "s3cret");
        credentials
    }

    fn adapter(server: &MockServer) -> CalDavAdapter {
        let url = format!("{}/dav/calendars/alice/work/", server.uri());
        CalDavAdapter::new(&url, &credentials(), 5).unwrap()
    }

    fn fields() -> EventFields {
        EventFields {
            title: "Stadtwerke bezahlen".into(),
            description: None,
            location: None,
            start_time: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(),
            all_day: true,
        }
    }

    const EVENT_ICS: &str = "BEGIN:VCALENDAR\nBEGIN:VEVENT\nUID:foreign-uid\nSUMMARY:Zahnarzt\nDTSTART:20250310T080000Z\nDTEND:20250310T090000Z\nLAST-MODIFIED:20250301T100000Z\nEND:VEVENT\nEND:VCALENDAR\n";

    #[tokio::test]
    async fn test_get_events_reports_with_time_range() {
        let server = MockServer::start().await;
        let multistatus = format!(
            r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/calendars/alice/work/zahnarzt.ics</d:href>
    <d:propstat><d:prop>
      <d:getetag>"v1"</d:getetag>
      <c:calendar-data>{EVENT_ICS}</c:calendar-data>
    </d:prop></d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/calendars/alice/work/broken.ics</d:href>
    <d:propstat><d:prop><c:calendar-data>BEGIN:VCALENDAR
END:VCALENDAR</c:calendar-data></d:prop></d:propstat>
  </d:response>
</d:multistatus>"#
        );
        Mock::given(method("REPORT"))
            .and(path("/dav/calendars/alice/work/"))
            .and(header("depth", "1"))
            .and(header_exists("authorization"))
            .and(body_string_contains(r#"start="20250301T000000Z""#))
            .respond_with(ResponseTemplate::new(207).set_body_string(multistatus))
            .expect(1)
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let listing = adapter(&server)
            .get_events("primary", start, end, 250)
            .await
            .unwrap();

        // The unreadable resource makes the listing partial
        assert!(!listing.complete);
        let events = listing.events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "/dav/calendars/alice/work/zahnarzt.ics");
        assert_eq!(events[0].etag.as_deref(), Some("\"v1\""));
        assert_eq!(events[0].fields.title, "Zahnarzt");
        assert_eq!(
            events[0].last_modified,
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_get_events_is_not_cut_at_page_size() {
        let server = MockServer::start().await;
        let response = |name: &str| {
            format!(
                r#"<d:response>
    <d:href>/dav/calendars/alice/work/{name}.ics</d:href>
    <d:propstat><d:prop>
      <d:getetag>"{name}"</d:getetag>
      <c:calendar-data>{}</c:calendar-data>
    </d:prop></d:propstat>
  </d:response>"#,
                EVENT_ICS.replace("foreign-uid", name)
            )
        };
        let multistatus = format!(
            r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  {}
  {}
  {}
</d:multistatus>"#,
            response("a"),
            response("b"),
            response("c")
        );
        Mock::given(method("REPORT"))
            .respond_with(ResponseTemplate::new(207).set_body_string(multistatus))
            .mount(&server)
            .await;

        let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let listing = adapter(&server)
            .get_events("primary", start, end, 2)
            .await
            .unwrap();

        assert!(listing.complete);
        assert_eq!(listing.events.len(), 3);
    }

    #[tokio::test]
    async fn test_create_puts_new_resource() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("if-none-match", "*"))
            .and(body_string_contains("SUMMARY:Stadtwerke bezahlen"))
            .respond_with(ResponseTemplate::new(201).insert_header("ETag", "\"new\""))
            .expect(1)
            .mount(&server)
            .await;

        let created = adapter(&server).create_event("primary", &fields()).await.unwrap();
        assert!(created.id.starts_with("/dav/calendars/alice/work/"));
        assert!(created.id.ends_with(".ics"));
        assert_eq!(created.etag.as_deref(), Some("\"new\""));
    }

    #[tokio::test]
    async fn test_update_keeps_uid_and_guards_with_etag() {
        let server = MockServer::start().await;
        let href = "/dav/calendars/alice/work/zahnarzt.ics";
        Mock::given(method("GET"))
            .and(path(href))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_string(EVENT_ICS),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(href))
            .and(header("if-match", "\"v1\""))
            .and(body_string_contains("UID:foreign-uid"))
            .respond_with(ResponseTemplate::new(204).insert_header("ETag", "\"v2\""))
            .expect(1)
            .mount(&server)
            .await;

        let updated = adapter(&server)
            .update_event("primary", href, &fields())
            .await
            .unwrap();
        assert_eq!(updated.id, href);
        assert_eq!(updated.etag.as_deref(), Some("\"v2\""));
    }

    #[tokio::test]
    async fn test_stale_etag_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EVENT_ICS))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .update_event("primary", "/dav/calendars/alice/work/zahnarzt.ics", &fields())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkmateError::RemoteApi(ref m) if m.contains("changed on the server")));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_resource() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        adapter(&server)
            .delete_event("primary", "/dav/calendars/alice/work/gone.ics")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("PROPFIND"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = adapter(&server).list_calendars().await.unwrap_err();
        assert!(matches!(err, WorkmateError::Authentication(_)));
    }

    #[test]
    fn test_missing_password_is_authentication_error() {
        let mut credentials = Credentials::default();
        credentials.set("username", "alice");
        let result = CalDavAdapter::new("https://dav.example.com/", &credentials, 5);
        assert!(matches!(result, Err(WorkmateError::Authentication(_))));
    }
}
