//! CalDAV request bodies and multistatus parsing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use roxmltree::Node;

/// A fetched calendar resource with its ICS data.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarResource {
    pub href: String,
    pub etag: Option<String>,
    pub data: String,
}

/// A calendar collection found under the calendar home.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarCollection {
    pub href: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub timezone: Option<String>,
}

/// `YYYYMMDDTHHMMSSZ`, the only form time-range filters accept.
pub fn format_caldav_datetime(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// calendar-query REPORT body with a server-side time-range filter.
pub fn calendar_query(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:getetag/>
        <C:calendar-data/>
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
        format_caldav_datetime(start),
        format_caldav_datetime(end)
    )
}

pub const CALENDAR_PROPFIND: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:displayname/>
        <D:resourcetype/>
        <C:calendar-description/>
        <C:calendar-timezone/>
    </D:prop>
</D:propfind>"#;

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn responses<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    doc.root_element()
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
}

/// Parse calendar resources from a REPORT multistatus. Responses without
/// calendar data are skipped.
pub fn parse_calendar_resources(body: &str) -> Result<Vec<CalendarResource>> {
    let doc = roxmltree::Document::parse(body).context("Malformed multistatus response")?;

    let mut resources = Vec::new();
    for response in responses(&doc) {
        let Some(href) = child_text(response, "href") else {
            continue;
        };
        let etag = child_text(response, "getetag");

        // calendar-data keeps its line breaks
        let data = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text())
            .map(str::to_string);

        if let Some(data) = data {
            resources.push(CalendarResource { href, etag, data });
        }
    }

    Ok(resources)
}

/// Parse a PROPFIND multistatus, keeping only calendar collections.
pub fn parse_calendar_collections(body: &str) -> Result<Vec<CalendarCollection>> {
    let doc = roxmltree::Document::parse(body).context("Malformed multistatus response")?;

    Ok(responses(&doc)
        .filter(|response| {
            response
                .descendants()
                .filter(|n| n.tag_name().name() == "resourcetype")
                .flat_map(|n| n.children())
                .any(|n| n.tag_name().name() == "calendar")
        })
        .filter_map(|response| {
            Some(CalendarCollection {
                href: child_text(response, "href")?,
                display_name: child_text(response, "displayname"),
                description: child_text(response, "calendar-description"),
                timezone: child_text(response, "calendar-timezone")
                    .and_then(|tz| timezone_id(&tz)),
            })
        })
        .collect())
}

/// The TZID of a `calendar-timezone` VTIMEZONE blob.
fn timezone_id(vtimezone: &str) -> Option<String> {
    vtimezone
        .lines()
        .find_map(|line| line.trim().strip_prefix("TZID:"))
        .map(str::to_string)
}
