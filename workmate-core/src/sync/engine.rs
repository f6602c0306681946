//! One sync pass for one integration: fetch, pair, classify, apply, report.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::SyncSettings;
use crate::date_range::SyncWindow;
use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{CalendarEvent, Credentials, Integration, SyncStatus};
use crate::remote::{AdapterFactory, RemoteCalendarAdapter};
use crate::store::{EventStore, IntegrationStore};
use crate::sync::plan::{PullChange, PushChange, SyncPlan};
use crate::sync::result::SyncResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    KeepLocal,
    KeepRemote,
}

impl FromStr for ConflictResolution {
    type Err = WorkmateError;

    fn from_str(s: &str) -> WorkmateResult<Self> {
        match s {
            "keep_local" | "local" => Ok(ConflictResolution::KeepLocal),
            "keep_remote" | "remote" => Ok(ConflictResolution::KeepRemote),
            other => Err(WorkmateError::Validation(format!(
                "Unknown resolution '{other}'. Expected keep_local or keep_remote"
            ))),
        }
    }
}

/// Orchestrates sync passes. Passes for the same integration are
/// serialised through a per-integration lock.
pub struct CalendarSyncEngine {
    events: Arc<dyn EventStore>,
    integrations: Arc<dyn IntegrationStore>,
    adapters: Arc<dyn AdapterFactory>,
    settings: SyncSettings,
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CalendarSyncEngine {
    pub fn new(
        events: Arc<dyn EventStore>,
        integrations: Arc<dyn IntegrationStore>,
        adapters: Arc<dyn AdapterFactory>,
        settings: SyncSettings,
    ) -> Self {
        CalendarSyncEngine {
            events,
            integrations,
            adapters,
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn integration_lock(&self, integration_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(integration_id).or_default().clone()
    }

    /// Run a full pass. `force` overrides a disabled integration.
    ///
    /// Rotated credentials are written back whatever the outcome. The
    /// integration's `last_synced_at` only moves on passes without errors.
    #[instrument(skip(self), fields(user = %user_id, integration = %integration_id))]
    pub async fn sync_integration(
        &self,
        user_id: Uuid,
        integration_id: Uuid,
        force: bool,
    ) -> WorkmateResult<SyncResult> {
        let lock = self.integration_lock(integration_id).await;
        let _guard = lock.lock().await;

        let mut integration = self
            .integrations
            .get_integration(user_id, integration_id)
            .await?;

        if !integration.enabled && !force {
            return Err(WorkmateError::IntegrationDisabled(integration.name.clone()));
        }

        let adapter = self.adapters.adapter_for(&integration)?;
        let (rotated, outcome) = self.run_pass(&integration, adapter.as_ref()).await;

        if let Some(credentials) = rotated {
            debug!("Persisting rotated credentials");
            integration.credentials = credentials;
        }

        match &outcome {
            Ok(result) => {
                if result.is_clean() {
                    integration.last_synced_at = Some(Utc::now());
                    integration.needs_reauth = false;
                }
                info!(
                    local_created = result.local_created,
                    local_updated = result.local_updated,
                    local_deleted = result.local_deleted,
                    remote_created = result.remote_created,
                    remote_updated = result.remote_updated,
                    remote_deleted = result.remote_deleted,
                    conflicts = result.conflicts.len(),
                    errors = result.errors,
                    "Sync pass finished"
                );
            }
            Err(e) if e.is_fatal_for_pass() => {
                warn!(error = %e, "Sync pass aborted, integration needs re-authorization");
                integration.needs_reauth = true;
            }
            Err(e) => warn!(error = %e, "Sync pass failed"),
        }

        self.integrations.update_integration(&integration).await?;
        outcome
    }

    /// Pass over every integration whose auto-sync interval has elapsed.
    pub async fn sync_due_integrations(
        &self,
        now: DateTime<Utc>,
    ) -> WorkmateResult<Vec<(Uuid, WorkmateResult<SyncResult>)>> {
        let due: Vec<Integration> = self
            .integrations
            .all_integrations()
            .await?
            .into_iter()
            .filter(|i| i.is_due(now))
            .collect();

        let passes = due.iter().map(|integration| async move {
            let outcome = self
                .sync_integration(integration.user_id, integration.id, false)
                .await;
            (integration.id, outcome)
        });
        Ok(join_all(passes).await)
    }

    async fn run_pass(
        &self,
        integration: &Integration,
        adapter: &dyn RemoteCalendarAdapter,
    ) -> (Option<Credentials>, WorkmateResult<SyncResult>) {
        let rotated = match adapter.refresh_credentials().await {
            Ok(rotated) => rotated,
            Err(e) => return (None, Err(e)),
        };

        let outcome = self.sync_with(integration, adapter).await;
        (rotated, outcome)
    }

    async fn sync_with(
        &self,
        integration: &Integration,
        adapter: &dyn RemoteCalendarAdapter,
    ) -> WorkmateResult<SyncResult> {
        let window = SyncWindow::around(Utc::now(), &self.settings)?;
        let calendar_id = integration.calendar_id();

        let listing = adapter
            .get_events(calendar_id, window.start, window.end, self.settings.max_results)
            .await?;
        let local_events = self.events.events_for_integration(integration.id).await?;
        let tombstones = self.events.tombstones(integration.id).await?;

        debug!(
            remote = listing.events.len(),
            complete = listing.complete,
            local = local_events.len(),
            tombstones = tombstones.len(),
            "Fetched both sides"
        );

        let plan = SyncPlan::build(
            local_events,
            listing,
            tombstones,
            integration.sync_direction,
            &window,
        );

        let mut result = SyncResult::default();

        for change in plan.to_push {
            let label = change.label();
            let row = match &change {
                PushChange::Create(local) | PushChange::Update { local, .. } => Some(local.clone()),
                PushChange::Delete(_) => None,
            };
            if let Err(e) = self.apply_push(integration, adapter, change, &mut result).await {
                self.record_failure(&mut result, row, &label, e).await?;
            }
        }

        for change in plan.to_pull {
            let label = change.label();
            let row = match &change {
                PullChange::Update { local, .. } | PullChange::Delete(local) => Some(local.clone()),
                PullChange::Create(_) => None,
            };
            if let Err(e) = self.apply_pull(integration, change, &mut result).await {
                self.record_failure(&mut result, row, &label, e).await?;
            }
        }

        for pair in plan.conflicts {
            let mut local = pair.local;
            local.sync_status = SyncStatus::Conflict;
            local.remote_snapshot = Some(pair.remote);
            match self.events.update_event(&local).await {
                Ok(()) => result.conflicts.push(local.id),
                Err(e) => result.record_error(format!("{}: {e}", local.fields.title)),
            }
        }

        result
            .conflicts
            .extend(plan.unpaired_conflicts.iter().map(|local| local.id));

        for pair in plan.to_mark_synced {
            let mut local = pair.local;
            local.mark_synced(&pair.remote, Utc::now());
            if let Err(e) = self.events.update_event(&local).await {
                result.record_error(format!("{}: {e}", local.fields.title));
            }
        }

        Ok(result)
    }

    async fn apply_push(
        &self,
        integration: &Integration,
        adapter: &dyn RemoteCalendarAdapter,
        change: PushChange,
        result: &mut SyncResult,
    ) -> WorkmateResult<()> {
        let calendar_id = integration.calendar_id();

        match change {
            PushChange::Create(mut local) => {
                let created = adapter.create_event(calendar_id, &local.fields).await?;
                local.integration_id = Some(integration.id);
                local.mark_synced(&created, Utc::now());
                self.events.update_event(&local).await?;
                result.remote_created += 1;
            }
            PushChange::Update { mut local, remote } => {
                let updated = adapter
                    .update_event(calendar_id, &remote.id, &local.fields)
                    .await?;
                local.mark_synced(&updated, Utc::now());
                self.events.update_event(&local).await?;
                result.remote_updated += 1;
            }
            PushChange::Delete(tombstone) => {
                adapter
                    .delete_event(calendar_id, &tombstone.external_event_id)
                    .await?;
                self.events
                    .clear_tombstone(integration.id, &tombstone.external_event_id)
                    .await?;
                result.remote_deleted += 1;
            }
        }

        Ok(())
    }

    async fn apply_pull(
        &self,
        integration: &Integration,
        change: PullChange,
        result: &mut SyncResult,
    ) -> WorkmateResult<()> {
        let now = Utc::now();

        match change {
            PullChange::Create(remote) => {
                let event =
                    CalendarEvent::from_remote(integration.user_id, integration.id, &remote, now)?;
                self.events.insert_event(event).await?;
                result.local_created += 1;
            }
            PullChange::Update { mut local, remote } => {
                local.apply_remote(&remote, now)?;
                self.events.update_event(&local).await?;
                result.local_updated += 1;
            }
            PullChange::Delete(local) => {
                self.events.delete_event(local.id).await?;
                result.local_deleted += 1;
            }
        }

        Ok(())
    }

    /// Record a per-item failure. Authentication failures abort the pass.
    async fn record_failure(
        &self,
        result: &mut SyncResult,
        row: Option<CalendarEvent>,
        label: &str,
        error: WorkmateError,
    ) -> WorkmateResult<()> {
        if error.is_fatal_for_pass() {
            return Err(error);
        }

        warn!(item = label, error = %error, "Failed to apply change");
        result.record_error(format!("{label}: {error}"));

        if let Some(mut event) = row {
            // Retried on the next pass
            event.sync_status = SyncStatus::Failed;
            if let Err(e) = self.events.update_event(&event).await {
                warn!(event = %event.id, error = %e, "Could not mark event as failed");
            }
        }
        Ok(())
    }

    /// Settle a conflicting event by keeping one side.
    ///
    /// `KeepLocal` pushes the local version outward (recreating the remote
    /// event if it has no external id); `KeepRemote` overwrites the local row
    /// from the remote copy stored during the pass that found the conflict.
    #[instrument(skip(self), fields(user = %user_id, event = %event_id))]
    pub async fn resolve_conflict(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        resolution: ConflictResolution,
    ) -> WorkmateResult<CalendarEvent> {
        let mut event = self.events.get_event(user_id, event_id).await?;
        if event.sync_status != SyncStatus::Conflict {
            return Err(WorkmateError::ConflictState(event_id.to_string()));
        }

        match resolution {
            ConflictResolution::KeepLocal => {
                let integration_id = event
                    .integration_id
                    .ok_or_else(|| WorkmateError::ConflictState(event_id.to_string()))?;

                let lock = self.integration_lock(integration_id).await;
                let _guard = lock.lock().await;

                let integration = self
                    .integrations
                    .get_integration(user_id, integration_id)
                    .await?;
                let adapter = self.adapters.adapter_for(&integration)?;

                if let Some(credentials) = adapter.refresh_credentials().await? {
                    self.integrations
                        .update_credentials(integration.id, &credentials)
                        .await?;
                }

                let calendar_id = integration.calendar_id();
                let remote = match event.external_event_id.as_deref() {
                    Some(remote_id) => {
                        adapter
                            .update_event(calendar_id, remote_id, &event.fields)
                            .await?
                    }
                    None => adapter.create_event(calendar_id, &event.fields).await?,
                };
                event.mark_synced(&remote, Utc::now());
            }
            ConflictResolution::KeepRemote => {
                let snapshot = event.remote_snapshot.clone().ok_or_else(|| {
                    WorkmateError::NotFound(format!("Remote copy of event {event_id}"))
                })?;
                event.apply_remote(&snapshot, Utc::now())?;
            }
        }

        self.events.update_event(&event).await?;
        info!(resolution = ?resolution, "Conflict resolved");
        Ok(event)
    }
}
