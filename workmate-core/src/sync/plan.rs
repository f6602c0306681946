//! Sync plan computation: what to push, what to pull, what to park.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::date_range::SyncWindow;
use crate::model::{CalendarEvent, SyncDirection, SyncStatus};
use crate::remote::{EventListing, RemoteEvent};
use crate::store::Tombstone;
use crate::sync::detector::{PairState, classify_pair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Create => write!(f, "+"),
            ChangeKind::Update => write!(f, "~"),
            ChangeKind::Delete => write!(f, "-"),
        }
    }
}

/// A change applied to the remote calendar.
#[derive(Debug, Clone)]
pub enum PushChange {
    Create(CalendarEvent),
    Update {
        local: CalendarEvent,
        remote: RemoteEvent,
    },
    Delete(Tombstone),
}

/// A change applied to the local store.
#[derive(Debug, Clone)]
pub enum PullChange {
    Create(RemoteEvent),
    Update {
        local: CalendarEvent,
        remote: RemoteEvent,
    },
    Delete(CalendarEvent),
}

impl PushChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PushChange::Create(_) => ChangeKind::Create,
            PushChange::Update { .. } => ChangeKind::Update,
            PushChange::Delete(_) => ChangeKind::Delete,
        }
    }

    pub fn label(&self) -> String {
        match self {
            PushChange::Create(local) | PushChange::Update { local, .. } => {
                local.fields.title.clone()
            }
            PushChange::Delete(tombstone) => tombstone.external_event_id.clone(),
        }
    }
}

impl PullChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PullChange::Create(_) => ChangeKind::Create,
            PullChange::Update { .. } => ChangeKind::Update,
            PullChange::Delete(_) => ChangeKind::Delete,
        }
    }

    pub fn label(&self) -> String {
        match self {
            PullChange::Create(remote) | PullChange::Update { remote, .. } => {
                remote.fields.title.clone()
            }
            PullChange::Delete(local) => local.fields.title.clone(),
        }
    }
}

/// A linked pair the planner looked at.
#[derive(Debug, Clone)]
pub struct EventPair {
    pub local: CalendarEvent,
    pub remote: RemoteEvent,
}

/// Differences between the local and remote side of one integration,
/// already filtered by the integration's sync direction.
#[derive(Debug, Default)]
pub struct SyncPlan {
    pub to_push: Vec<PushChange>,
    pub to_pull: Vec<PullChange>,
    /// Pairs changed on both sides; never mutated automatically
    pub conflicts: Vec<EventPair>,
    /// Unchanged pairs whose row has not been stamped as synced yet
    pub to_mark_synced: Vec<EventPair>,
    /// Conflicted rows whose remote side was not listed; reported as is
    pub unpaired_conflicts: Vec<CalendarEvent>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_push.is_empty()
            && self.to_pull.is_empty()
            && self.conflicts.is_empty()
            && self.to_mark_synced.is_empty()
            && self.unpaired_conflicts.is_empty()
    }

    /// Pair local rows with remote events by external id and decide what
    /// to do with each, honouring `direction`.
    ///
    /// `local_events` holds every row owned by the integration; `window`
    /// restricts which unmatched rows are considered, since the remote
    /// side was only listed for that window. A linked row missing from an
    /// incomplete `remote` listing is left untouched.
    pub fn build(
        local_events: Vec<CalendarEvent>,
        remote: EventListing,
        tombstones: Vec<Tombstone>,
        direction: SyncDirection,
        window: &SyncWindow,
    ) -> SyncPlan {
        let mut plan = SyncPlan::default();

        let tombstoned: HashSet<String> = tombstones
            .iter()
            .map(|t| t.external_event_id.clone())
            .collect();

        let listing_complete = remote.complete;
        let mut remote_by_id: HashMap<String, RemoteEvent> = remote
            .events
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        for local in local_events {
            let paired = local
                .external_event_id
                .as_ref()
                .and_then(|id| remote_by_id.remove(id));

            match paired {
                Some(remote) => plan.plan_pair(local, remote, direction),
                None => plan.plan_local_only(local, direction, window, listing_complete),
            }
        }

        for (id, remote) in remote_by_id {
            if tombstoned.contains(&id) {
                continue;
            }
            if direction.pulls() {
                plan.to_pull.push(PullChange::Create(remote));
            }
        }

        if direction.pushes() {
            plan.to_push
                .extend(tombstones.into_iter().map(PushChange::Delete));
        }

        // Deterministic order: by event start, deletions of remote ids last
        plan.to_push.sort_by_key(|c| match c {
            PushChange::Create(l) | PushChange::Update { local: l, .. } => {
                (0, Some(l.fields.start_time))
            }
            PushChange::Delete(_) => (1, None),
        });
        plan.to_pull.sort_by_key(|c| match c {
            PullChange::Create(r) | PullChange::Update { remote: r, .. } => r.fields.start_time,
            PullChange::Delete(l) => l.fields.start_time,
        });

        plan
    }

    fn plan_pair(&mut self, local: CalendarEvent, remote: RemoteEvent, direction: SyncDirection) {
        if local.sync_status == SyncStatus::Conflict {
            self.conflicts.push(EventPair { local, remote });
            return;
        }

        match classify_pair(&local, &remote) {
            PairState::Unchanged => {
                if local.sync_status != SyncStatus::Synced || local.last_synced_at.is_none() {
                    self.to_mark_synced.push(EventPair { local, remote });
                }
            }
            PairState::LocalModified => {
                if direction.pushes() {
                    self.to_push.push(PushChange::Update { local, remote });
                }
            }
            PairState::RemoteModified => {
                if direction.pulls() {
                    self.to_pull.push(PullChange::Update { local, remote });
                }
            }
            PairState::Conflict => self.conflicts.push(EventPair { local, remote }),
        }
    }

    fn plan_local_only(
        &mut self,
        local: CalendarEvent,
        direction: SyncDirection,
        window: &SyncWindow,
        listing_complete: bool,
    ) {
        if local.sync_status == SyncStatus::Conflict {
            self.unpaired_conflicts.push(local);
            return;
        }

        if !window.contains(local.fields.start_time) {
            return;
        }

        if !local.is_linked() {
            // Never synced: create on remote
            if direction.pushes() {
                self.to_push.push(PushChange::Create(local));
            }
            return;
        }

        // Absent from a partial listing says nothing about the remote side
        if !listing_complete {
            return;
        }

        // Was synced before, now gone from remote
        if local.modified_since_sync() {
            // Local edits win over the remote deletion
            if direction.pushes() {
                self.to_push.push(PushChange::Create(local));
            }
        } else if direction.pulls() {
            self.to_pull.push(PullChange::Delete(local));
        }
    }

    pub fn push_counts(&self) -> (usize, usize, usize) {
        count_by_kind(self.to_push.iter().map(PushChange::kind))
    }

    pub fn pull_counts(&self) -> (usize, usize, usize) {
        count_by_kind(self.to_pull.iter().map(PullChange::kind))
    }
}

fn count_by_kind(kinds: impl Iterator<Item = ChangeKind>) -> (usize, usize, usize) {
    let mut created = 0;
    let mut updated = 0;
    let mut deleted = 0;

    for kind in kinds {
        match kind {
            ChangeKind::Create => created += 1,
            ChangeKind::Update => updated += 1,
            ChangeKind::Delete => deleted += 1,
        }
    }

    (created, updated, deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventFields;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn window() -> SyncWindow {
        SyncWindow::new(now() - Duration::days(30), now() + Duration::days(30)).unwrap()
    }

    fn listed(events: Vec<RemoteEvent>) -> EventListing {
        EventListing::complete(events)
    }

    fn fields(title: &str, day: u32) -> EventFields {
        EventFields {
            title: title.to_string(),
            description: None,
            location: None,
            start_time: Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, day, 10, 0, 0).unwrap(),
            all_day: false,
        }
    }

    fn synced_local(title: &str, remote_id: &str) -> CalendarEvent {
        let synced_at = now() - Duration::hours(2);
        let mut event = CalendarEvent::new(Uuid::new_v4(), fields(title, 5), synced_at).unwrap();
        event.external_event_id = Some(remote_id.to_string());
        event.remote_revision = Some(format!("etag-{remote_id}"));
        event.sync_status = SyncStatus::Synced;
        event.last_synced_at = Some(synced_at);
        event
    }

    fn remote(title: &str, id: &str, modified: DateTime<Utc>) -> RemoteEvent {
        RemoteEvent {
            id: id.to_string(),
            fields: fields(title, 5),
            last_modified: modified,
            etag: Some(format!("etag-{id}")),
        }
    }

    #[test]
    fn test_new_local_event_is_pushed_when_direction_allows() {
        let local = CalendarEvent::new(Uuid::new_v4(), fields("New", 3), now()).unwrap();

        let plan = SyncPlan::build(
            vec![local.clone()],
            listed(vec![]),
            vec![],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert_eq!(plan.push_counts(), (1, 0, 0));

        let plan = SyncPlan::build(vec![local], listed(vec![]), vec![], SyncDirection::RemoteToLocal, &window());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_remote_only_event_is_pulled() {
        let plan = SyncPlan::build(
            vec![],
            listed(vec![remote("Remote", "r1", now())]),
            vec![],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert_eq!(plan.pull_counts(), (1, 0, 0));

        let plan = SyncPlan::build(
            vec![],
            listed(vec![remote("Remote", "r1", now())]),
            vec![],
            SyncDirection::LocalToRemote,
            &window(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_tombstoned_remote_event_is_deleted_not_imported() {
        let tombstone = Tombstone {
            integration_id: Uuid::new_v4(),
            external_event_id: "r1".to_string(),
            deleted_at: now(),
        };
        let plan = SyncPlan::build(
            vec![],
            listed(vec![remote("Gone", "r1", now())]),
            vec![tombstone],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert_eq!(plan.pull_counts(), (0, 0, 0));
        assert_eq!(plan.push_counts(), (0, 0, 1));
    }

    #[test]
    fn test_remote_deletion_removes_unmodified_local_row() {
        let local = synced_local("Standup", "r1");
        let plan = SyncPlan::build(vec![local], listed(vec![]), vec![], SyncDirection::Bidirectional, &window());
        assert_eq!(plan.pull_counts(), (0, 0, 1));
    }

    #[test]
    fn test_remote_deletion_of_locally_edited_row_recreates_remotely() {
        let mut local = synced_local("Standup", "r1");
        local.updated_at = now();
        let plan = SyncPlan::build(vec![local], listed(vec![]), vec![], SyncDirection::Bidirectional, &window());
        assert_eq!(plan.push_counts(), (1, 0, 0));
        assert_eq!(plan.pull_counts(), (0, 0, 0));
    }

    #[test]
    fn test_rows_outside_window_are_left_alone() {
        let mut local = synced_local("Old", "r1");
        local.fields.start_time = now() - Duration::days(90);
        local.fields.end_time = local.fields.start_time + Duration::hours(1);
        let plan = SyncPlan::build(vec![local], listed(vec![]), vec![], SyncDirection::Bidirectional, &window());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_conflict_rows_stay_in_conflict() {
        let mut local = synced_local("A", "r1");
        local.sync_status = SyncStatus::Conflict;
        let plan = SyncPlan::build(
            vec![local],
            listed(vec![remote("A", "r1", now())]),
            vec![],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert_eq!(plan.conflicts.len(), 1);
        assert!(plan.to_push.is_empty() && plan.to_pull.is_empty());
    }

    #[test]
    fn test_modified_pairs_follow_direction() {
        let mut local = synced_local("A2", "r1");
        local.updated_at = now();
        let r = remote("A", "r1", now() - Duration::hours(3));

        let plan = SyncPlan::build(
            vec![local.clone()],
            listed(vec![r.clone()]),
            vec![],
            SyncDirection::LocalToRemote,
            &window(),
        );
        assert_eq!(plan.push_counts(), (0, 1, 0));

        let plan = SyncPlan::build(vec![local], listed(vec![r]), vec![], SyncDirection::RemoteToLocal, &window());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_partial_listing_never_infers_remote_deletion() {
        let untouched = synced_local("Standup", "r1");
        let mut edited = synced_local("Review", "r2");
        edited.updated_at = now();

        let plan = SyncPlan::build(
            vec![untouched, edited],
            EventListing::partial(vec![]),
            vec![],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_partial_listing_still_pushes_new_rows() {
        let local = CalendarEvent::new(Uuid::new_v4(), fields("New", 3), now()).unwrap();
        let plan = SyncPlan::build(
            vec![local],
            EventListing::partial(vec![]),
            vec![],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert_eq!(plan.push_counts(), (1, 0, 0));
    }

    #[test]
    fn test_conflict_row_without_remote_is_only_reported() {
        let mut local = synced_local("A", "r1");
        local.sync_status = SyncStatus::Conflict;
        local.updated_at = now();

        let plan = SyncPlan::build(
            vec![local.clone()],
            listed(vec![]),
            vec![],
            SyncDirection::Bidirectional,
            &window(),
        );
        assert!(plan.to_push.is_empty() && plan.to_pull.is_empty());
        assert_eq!(plan.unpaired_conflicts.len(), 1);
        assert_eq!(plan.unpaired_conflicts[0].id, local.id);
    }

    #[test]
    fn test_event_starting_at_window_end_is_outside() {
        let mut local = synced_local("Edge", "r1");
        local.fields.start_time = window().end;
        local.fields.end_time = local.fields.start_time + Duration::hours(1);
        let plan = SyncPlan::build(vec![local], listed(vec![]), vec![], SyncDirection::Bidirectional, &window());
        assert!(plan.is_empty());
    }
}
