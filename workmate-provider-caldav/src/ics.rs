//! VEVENT generation and parsing.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold};
use icalendar::{
    Calendar, CalendarDateTime, Component, DatePerhapsTime, EventLike, Property, ValueType,
};
use workmate_core::model::EventFields;

const PRODID: &str = "PRODID:-//workmate//workmate//EN";

/// One VEVENT as read from a calendar resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub uid: String,
    pub fields: EventFields,
    pub last_modified: Option<DateTime<Utc>>,
}

fn ics_utc(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn add_time_property(
    ics_event: &mut icalendar::Event,
    name: &str,
    at: DateTime<Utc>,
    all_day: bool,
) {
    if all_day {
        let mut prop = Property::new(name, at.format("%Y%m%d").to_string());
        prop.append_parameter(ValueType::Date);
        ics_event.append_property(prop);
    } else {
        ics_event.add_property(name, ics_utc(at));
    }
}

/// Generate a VCALENDAR holding one VEVENT.
pub fn generate_ics(uid: &str, fields: &EventFields, now: DateTime<Utc>) -> String {
    let mut ics_event = icalendar::Event::new();
    ics_event.uid(uid);
    ics_event.summary(&fields.title);
    ics_event.add_property("DTSTAMP", ics_utc(now));
    ics_event.add_property("LAST-MODIFIED", ics_utc(now));

    add_time_property(&mut ics_event, "DTSTART", fields.start_time, fields.all_day);
    add_time_property(&mut ics_event, "DTEND", fields.end_time, fields.all_day);

    if let Some(ref description) = fields.description {
        ics_event.description(description);
    }
    if let Some(ref location) = fields.location {
        ics_event.location(location);
    }

    let mut cal = Calendar::new();
    cal.push(ics_event.done());

    cal.done()
        .to_string()
        .lines()
        .filter(|line| *line != "CALSCALE:GREGORIAN")
        .map(|line| if line.starts_with("PRODID:") { PRODID } else { line })
        .fold(String::new(), |mut out, line| {
            out.push_str(line);
            out.push_str("\r\n");
            out
        })
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Floating times are read as UTC; unknown TZIDs fall back to UTC too.
fn to_utc(time: DatePerhapsTime) -> (DateTime<Utc>, bool) {
    match time {
        DatePerhapsTime::Date(date) => (date.and_time(NaiveTime::MIN).and_utc(), true),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => (dt, false),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => (naive.and_utc(), false),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let zoned = tzid
                .parse::<Tz>()
                .ok()
                .and_then(|tz| tz.from_local_datetime(&date_time).earliest())
                .map(|dt| dt.with_timezone(&Utc));
            (zoned.unwrap_or_else(|| date_time.and_utc()), false)
        }
    }
}

fn parse_utc_stamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y%m%dT%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse the first VEVENT of a calendar resource.
///
/// A missing DTEND means one day for all-day events and one hour otherwise.
pub fn parse_event(content: &str) -> Result<ParsedEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Invalid iCalendar data")?;
    let vevent = calendar
        .components
        .iter()
        .find(|c| c.name == "VEVENT")
        .context("No VEVENT in calendar resource")?;

    let uid = vevent.find_prop("UID").context("VEVENT has no UID")?.val.to_string();
    let dtstart = vevent.find_prop("DTSTART").context("VEVENT has no DTSTART")?;
    let (start_time, all_day) = DatePerhapsTime::try_from(dtstart)
        .map(to_utc)
        .map_err(|_| anyhow::anyhow!("Unreadable DTSTART in {uid}"))?;

    let end_time = match vevent.find_prop("DTEND") {
        Some(dtend) => {
            DatePerhapsTime::try_from(dtend)
                .map(to_utc)
                .map_err(|_| anyhow::anyhow!("Unreadable DTEND in {uid}"))?
                .0
        }
        None => {
            let length = if all_day { Duration::days(1) } else { Duration::hours(1) };
            start_time
                .checked_add_signed(length)
                .ok_or_else(|| anyhow::anyhow!("DTSTART out of range in {uid}"))?
        }
    };

    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| unescape(p.val.as_ref()))
            .filter(|s| !s.is_empty())
    };

    let last_modified = vevent
        .find_prop("LAST-MODIFIED")
        .or_else(|| vevent.find_prop("DTSTAMP"))
        .and_then(|p| parse_utc_stamp(p.val.as_ref()));

    Ok(ParsedEvent {
        fields: EventFields {
            title: text("SUMMARY").unwrap_or_default(),
            description: text("DESCRIPTION"),
            location: text("LOCATION"),
            start_time,
            end_time,
            all_day,
        },
        uid,
        last_modified,
    })
}
