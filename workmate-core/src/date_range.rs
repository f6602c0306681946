//! Time windows for sync passes and event listings.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::SyncSettings;
use crate::error::{WorkmateError, WorkmateResult};

/// Bounded window a sync pass operates on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> WorkmateResult<Self> {
        if end <= start {
            return Err(WorkmateError::Validation(
                "Sync window end must be after its start".into(),
            ));
        }
        Ok(SyncWindow { start, end })
    }

    /// `[now - lookback_days, now + lookahead_days)`
    pub fn around(now: DateTime<Utc>, settings: &SyncSettings) -> WorkmateResult<Self> {
        SyncWindow::new(
            shift_days(now, -settings.lookback_days)?,
            shift_days(now, settings.lookahead_days)?,
        )
    }

    /// Half-open like the providers' listing bounds: an event starting
    /// exactly at `end` is not listed remotely.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Parse CLI arguments.
    /// - `from`: YYYY-MM-DD, defaults to the window start from `settings`
    /// - `to`: YYYY-MM-DD (inclusive), defaults to the window end from `settings`
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        settings: &SyncSettings,
    ) -> WorkmateResult<Self> {
        let default = SyncWindow::around(Utc::now(), settings)?;

        let start = match from {
            Some(s) => parse_date_start(s)?,
            None => default.start,
        };

        let end = match to {
            Some(s) => parse_date_end(s)?,
            None => default.end,
        };

        SyncWindow::new(start, end)
    }
}

/// `at` moved by `days`, rejecting offsets outside chrono's range.
pub fn shift_days(at: DateTime<Utc>, days: i64) -> WorkmateResult<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|offset| at.checked_add_signed(offset))
        .ok_or_else(|| WorkmateError::Validation(format!("{days} days is out of range")))
}

/// `at` moved by `minutes`, rejecting offsets outside chrono's range.
pub fn shift_minutes(at: DateTime<Utc>, minutes: i64) -> WorkmateResult<DateTime<Utc>> {
    Duration::try_minutes(minutes)
        .and_then(|offset| at.checked_add_signed(offset))
        .ok_or_else(|| WorkmateError::Validation(format!("{minutes} minutes is out of range")))
}

fn parse_date(s: &str) -> WorkmateResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        WorkmateError::Validation(format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
    })
}

/// Parse YYYY-MM-DD as start of day in UTC
fn parse_date_start(s: &str) -> WorkmateResult<DateTime<Utc>> {
    Ok(parse_date(s)?.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Parse YYYY-MM-DD as end of day in UTC
fn parse_date_end(s: &str) -> WorkmateResult<DateTime<Utc>> {
    let next_day = parse_date(s)?
        .succ_opt()
        .ok_or_else(|| WorkmateError::Validation(format!("'{s}' is out of range")))?;
    Ok(next_day.and_time(chrono::NaiveTime::MIN).and_utc() - Duration::seconds(1))
}
