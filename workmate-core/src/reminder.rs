//! Reminder batches derived from a task's priority and due date.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::constants::DEFAULT_SNOOZE_MINUTES;
use crate::date_range::{shift_days, shift_minutes};
use crate::error::WorkmateResult;
use crate::model::{Channel, Priority, Reminder, ReminderSeverity, ReminderStatus, Task};
use crate::store::ReminderStore;

/// Lead times in days before the due date, with their severity.
fn schedule(priority: Priority) -> &'static [(i64, ReminderSeverity)] {
    use ReminderSeverity::*;

    match priority {
        Priority::Critical => &[(0, Critical), (1, Urgent), (3, Warning)],
        Priority::High => &[(0, Urgent), (2, Warning), (7, Info)],
        Priority::Medium => &[(0, Warning), (3, Info)],
        Priority::Low => &[(0, Info)],
    }
}

fn default_channels(severity: ReminderSeverity) -> Vec<Channel> {
    match severity {
        ReminderSeverity::Critical | ReminderSeverity::Urgent => {
            vec![Channel::Push, Channel::Email]
        }
        ReminderSeverity::Warning | ReminderSeverity::Info => vec![Channel::Push],
    }
}

/// Reminders a task should get at `now`. Lead times already in the past are
/// dropped, except the due-date reminder of an overdue task, which fires
/// immediately.
pub fn plan_reminders(
    task: &Task,
    now: DateTime<Utc>,
    channels: Option<&[Channel]>,
) -> Vec<Reminder> {
    let Some(due) = task.due_date else {
        return Vec::new();
    };

    schedule(task.priority)
        .iter()
        .filter_map(|&(days_before, severity)| {
            let mut trigger_at = shift_days(due, -days_before).ok()?;
            if trigger_at < now {
                if days_before != 0 {
                    return None;
                }
                trigger_at = now;
            }

            Some(Reminder {
                id: Uuid::new_v4(),
                task_id: task.id,
                trigger_at,
                severity,
                channels: channels
                    .filter(|c| !c.is_empty())
                    .map(<[Channel]>::to_vec)
                    .unwrap_or_else(|| default_channels(severity)),
                status: ReminderStatus::Pending,
                snoozed_until: None,
                acknowledged_at: None,
                sent_at: None,
                error_message: None,
            })
        })
        .collect()
}

pub struct ReminderScheduler {
    reminders: Arc<dyn ReminderStore>,
}

impl ReminderScheduler {
    pub fn new(reminders: Arc<dyn ReminderStore>) -> Self {
        ReminderScheduler { reminders }
    }

    pub async fn create_reminders_for_task(
        &self,
        task: &Task,
        channels: Option<&[Channel]>,
    ) -> WorkmateResult<Vec<Reminder>> {
        let reminders = plan_reminders(task, Utc::now(), channels);
        debug!(task = %task.id, count = reminders.len(), "Scheduling reminders");
        self.reminders.insert_reminders(reminders.clone()).await?;
        Ok(reminders)
    }

    pub async fn due_reminders(&self, now: DateTime<Utc>) -> WorkmateResult<Vec<Reminder>> {
        let pending = self.reminders.pending_reminders().await?;
        Ok(pending.into_iter().filter(|r| r.is_due(now)).collect())
    }

    /// Record a delivery attempt; an error marks the reminder failed.
    pub async fn mark_sent(&self, id: Uuid, error: Option<String>) -> WorkmateResult<Reminder> {
        let mut reminder = self.reminders.get_reminder(id).await?;
        match error {
            Some(message) => {
                reminder.status = ReminderStatus::Failed;
                reminder.error_message = Some(message);
            }
            None => {
                reminder.status = ReminderStatus::Sent;
                reminder.sent_at = Some(Utc::now());
            }
        }
        self.reminders.update_reminder(&reminder).await?;
        Ok(reminder)
    }

    pub async fn snooze(&self, id: Uuid, minutes: Option<i64>) -> WorkmateResult<Reminder> {
        let mut reminder = self.reminders.get_reminder(id).await?;
        let minutes = minutes.unwrap_or(DEFAULT_SNOOZE_MINUTES);
        reminder.snoozed_until = Some(shift_minutes(Utc::now(), minutes)?);
        self.reminders.update_reminder(&reminder).await?;
        Ok(reminder)
    }

    pub async fn acknowledge(&self, id: Uuid) -> WorkmateResult<Reminder> {
        let mut reminder = self.reminders.get_reminder(id).await?;
        reminder.acknowledged_at = Some(Utc::now());
        self.reminders.update_reminder(&reminder).await?;
        Ok(reminder)
    }

    /// Drop pending reminders, e.g. once the task is done.
    pub async fn cancel_task_reminders(&self, task_id: Uuid) -> WorkmateResult<usize> {
        self.reminders.delete_pending_for_task(task_id).await
    }
}
