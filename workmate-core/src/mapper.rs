//! Derives local calendar events from tasks with due dates.
//!
//! Only local rows are touched here. Rows are attached to the user's first
//! push-capable integration so the next sync pass carries them outward.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::date_range::shift_days;
use crate::error::{WorkmateError, WorkmateResult};
use crate::model::{CalendarEvent, EventFields, SyncStatus, Task, TaskStatus};
use crate::store::{EventStore, IntegrationStore, TaskStore, delete_event_with_tombstone};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskSyncStats {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
}

enum TaskOutcome {
    Created,
    Updated,
    Unchanged,
}

pub struct TaskEventMapper {
    tasks: Arc<dyn TaskStore>,
    events: Arc<dyn EventStore>,
    integrations: Arc<dyn IntegrationStore>,
}

/// Event content for a task's due date: a whole day when the due date sits
/// on midnight UTC, one hour from the due time otherwise.
pub fn event_fields_for(task: &Task) -> Option<EventFields> {
    let due = task.due_date?;
    let all_day = due.time() == NaiveTime::MIN;
    let length = if all_day {
        Duration::days(1)
    } else {
        Duration::hours(1)
    };
    let end = due.checked_add_signed(length)?;

    Some(EventFields {
        title: task.title.clone(),
        description: task.description.clone(),
        location: None,
        start_time: due,
        end_time: end,
        all_day,
    })
}

impl TaskEventMapper {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        events: Arc<dyn EventStore>,
        integrations: Arc<dyn IntegrationStore>,
    ) -> Self {
        TaskEventMapper {
            tasks,
            events,
            integrations,
        }
    }

    /// Integration new task events are attached to: the oldest enabled one
    /// whose direction pushes.
    async fn target_integration(&self, user_id: Uuid) -> WorkmateResult<Option<Uuid>> {
        let integrations = self.integrations.list_integrations(user_id).await?;
        Ok(integrations
            .into_iter()
            .find(|i| i.enabled && i.sync_direction.pushes())
            .map(|i| i.id))
    }

    /// Ensure every open task with a due date has exactly one event.
    ///
    /// With `force`, existing events are deleted and recreated instead of
    /// patched. Failures are counted per task and never stop the batch.
    pub async fn bulk_sync_user_tasks(
        &self,
        user_id: Uuid,
        force: bool,
    ) -> WorkmateResult<TaskSyncStats> {
        let target = self.target_integration(user_id).await?;
        let tasks: Vec<Task> = self
            .tasks
            .list_tasks(user_id)
            .await?
            .into_iter()
            .filter(|t| t.due_date.is_some())
            .filter(|t| !matches!(t.status, TaskStatus::Done | TaskStatus::Cancelled))
            .collect();

        let mut stats = TaskSyncStats::default();

        for task in &tasks {
            stats.processed += 1;
            match self.sync_task(task, target, force).await {
                Ok(TaskOutcome::Created) => stats.created += 1,
                Ok(TaskOutcome::Updated) => stats.updated += 1,
                Ok(TaskOutcome::Unchanged) => {}
                Err(e) => {
                    warn!(task = %task.id, error = %e, "Failed to map task to event");
                    stats.errors += 1;
                    stats.error_messages.push(format!("{}: {e}", task.title));
                }
            }
        }

        info!(
            processed = stats.processed,
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "Task events synced"
        );
        Ok(stats)
    }

    async fn sync_task(
        &self,
        task: &Task,
        target: Option<Uuid>,
        force: bool,
    ) -> WorkmateResult<TaskOutcome> {
        let Some(fields) = event_fields_for(task) else {
            return Ok(TaskOutcome::Unchanged);
        };
        fields.validate()?;

        let mut existing = self.events.events_for_task(task.id).await?;
        existing.sort_by_key(|e| e.created_at);

        if force {
            for event in &existing {
                delete_event_with_tombstone(self.events.as_ref(), event).await?;
            }
            self.create_for(task, fields, target).await?;
            return Ok(TaskOutcome::Created);
        }

        let mut rows = existing.into_iter();
        let Some(mut event) = rows.next() else {
            self.create_for(task, fields, target).await?;
            return Ok(TaskOutcome::Created);
        };

        for extra in rows {
            debug!(task = %task.id, event = %extra.id, "Removing duplicate task event");
            delete_event_with_tombstone(self.events.as_ref(), &extra).await?;
        }

        let content_changed =
            !event.fields.same_content(&fields) || event.fields.all_day != fields.all_day;
        let needs_target = event.integration_id.is_none() && target.is_some();
        if !content_changed && !needs_target {
            return Ok(TaskOutcome::Unchanged);
        }

        event.fields = fields;
        if needs_target {
            event.integration_id = target;
        }
        event.updated_at = Utc::now();
        if event.sync_status != SyncStatus::Conflict {
            event.sync_status = SyncStatus::Pending;
        }
        self.events.update_event(&event).await?;
        Ok(TaskOutcome::Updated)
    }

    async fn create_for(
        &self,
        task: &Task,
        fields: EventFields,
        target: Option<Uuid>,
    ) -> WorkmateResult<CalendarEvent> {
        let mut event = CalendarEvent::new(task.user_id, fields, Utc::now())?;
        event.task_id = Some(task.id);
        event.integration_id = target;
        self.events.insert_event(event).await
    }

    /// Delete events of tasks completed more than `older_than_days` ago.
    pub async fn remove_completed_task_events(
        &self,
        user_id: Uuid,
        older_than_days: i64,
    ) -> WorkmateResult<usize> {
        if older_than_days < 1 {
            return Err(WorkmateError::Validation(
                "older_than_days must be at least 1".into(),
            ));
        }
        let cutoff: DateTime<Utc> = shift_days(Utc::now(), -older_than_days)?;

        let tasks = self.tasks.list_tasks(user_id).await?;
        let mut deleted = 0;

        for task in tasks.iter().filter(|t| t.is_completed()) {
            if !task.completed_at.is_some_and(|at| at < cutoff) {
                continue;
            }
            for event in self.events.events_for_task(task.id).await? {
                delete_event_with_tombstone(self.events.as_ref(), &event).await?;
                deleted += 1;
            }
        }

        info!(deleted, older_than_days, "Removed events of completed tasks");
        Ok(deleted)
    }
}
