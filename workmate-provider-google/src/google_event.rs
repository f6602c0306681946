//! Google Calendar event wire format and conversions.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use workmate_core::model::EventFields;
use workmate_core::remote::{RemoteCalendar, RemoteEvent};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<GoogleEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<GoogleEventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    #[serde(default)]
    pub items: Vec<GoogleEvent>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Deserialize)]
pub struct CalendarList {
    #[serde(default)]
    pub items: Vec<CalendarListEntry>,
}

pub trait FromGoogle {
    fn from_google(event: GoogleEvent) -> Result<Self>
    where
        Self: Sized;
}

pub trait ToGoogle {
    fn to_google(&self) -> GoogleEvent;
}

fn parse_time(time: Option<&GoogleEventTime>, which: &str) -> Result<(DateTime<Utc>, bool)> {
    let Some(time) = time else {
        bail!("Event has no {which} time");
    };
    if let Some(dt) = time.date_time {
        Ok((dt, false))
    } else if let Some(date) = time.date {
        Ok((date.and_time(NaiveTime::MIN).and_utc(), true))
    } else {
        bail!("Event has no {which} time");
    }
}

impl FromGoogle for RemoteEvent {
    fn from_google(event: GoogleEvent) -> Result<Self> {
        let id = event.id.clone().context("Event has no id")?;
        let (start_time, all_day) = parse_time(event.start.as_ref(), "start")
            .with_context(|| format!("Malformed event {id}"))?;
        let (end_time, _) = parse_time(event.end.as_ref(), "end")
            .with_context(|| format!("Malformed event {id}"))?;

        Ok(RemoteEvent {
            id,
            fields: EventFields {
                title: event.summary.unwrap_or_default(),
                description: event.description,
                location: event.location,
                start_time,
                end_time,
                all_day,
            },
            last_modified: event.updated.unwrap_or_else(Utc::now),
            etag: event.etag,
        })
    }
}

fn event_time_to_google(at: DateTime<Utc>, all_day: bool) -> GoogleEventTime {
    if all_day {
        GoogleEventTime {
            date: Some(at.date_naive()),
            ..Default::default()
        }
    } else {
        GoogleEventTime {
            date_time: Some(at),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        }
    }
}

impl ToGoogle for EventFields {
    fn to_google(&self) -> GoogleEvent {
        GoogleEvent {
            summary: Some(self.title.clone()),
            description: Some(self.description.clone().unwrap_or_default()),
            location: Some(self.location.clone().unwrap_or_default()),
            start: Some(event_time_to_google(self.start_time, self.all_day)),
            end: Some(event_time_to_google(self.end_time, self.all_day)),
            ..Default::default()
        }
    }
}

impl From<CalendarListEntry> for RemoteCalendar {
    fn from(entry: CalendarListEntry) -> Self {
        RemoteCalendar {
            name: if entry.summary.is_empty() {
                "(unnamed)".to_string()
            } else {
                entry.summary
            },
            id: entry.id,
            description: entry.description,
            timezone: entry.time_zone.or_else(|| Some("UTC".to_string())),
            primary: entry.primary,
        }
    }
}
