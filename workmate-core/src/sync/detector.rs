//! Classification of a local/remote event pair linked by external id.

use std::fmt;

use crate::model::CalendarEvent;
use crate::remote::RemoteEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairState {
    Unchanged,
    LocalModified,
    RemoteModified,
    /// Both sides changed since the last sync and their content differs
    Conflict,
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PairState::Unchanged => "unchanged",
            PairState::LocalModified => "locally modified",
            PairState::RemoteModified => "remotely modified",
            PairState::Conflict => "conflict",
        };
        f.write_str(s)
    }
}

/// Classify a pair against the row's `last_synced_at`.
///
/// Without a previous sync the sides are only considered equal when their
/// content matches; otherwise the pair is a conflict. A side is never
/// picked silently.
pub fn classify_pair(local: &CalendarEvent, remote: &RemoteEvent) -> PairState {
    let Some(last_synced) = local.last_synced_at else {
        return if local.fields.same_content(&remote.fields) {
            PairState::Unchanged
        } else {
            PairState::Conflict
        };
    };

    let local_changed = local.updated_at > last_synced;
    let remote_changed = remote_changed_since(local, remote, last_synced);

    match (local_changed, remote_changed) {
        (false, false) => PairState::Unchanged,
        (true, false) => PairState::LocalModified,
        (false, true) => PairState::RemoteModified,
        (true, true) => {
            if local.fields.same_content(&remote.fields) {
                PairState::Unchanged
            } else {
                PairState::Conflict
            }
        }
    }
}

/// The remote timestamp must have moved past the last sync. When the stored
/// revision tag still equals the current one, the remote content is the one
/// we last saw regardless of clock skew.
fn remote_changed_since(
    local: &CalendarEvent,
    remote: &RemoteEvent,
    last_synced: chrono::DateTime<chrono::Utc>,
) -> bool {
    if remote.last_modified <= last_synced {
        return false;
    }

    match (local.remote_revision.as_deref(), remote.revision()) {
        (Some(stored), Some(current)) => stored != current,
        _ => true,
    }
}
