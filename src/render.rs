//! Colored terminal rendering for workmate types.

use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use workmate_core::SyncResult;
use workmate_core::mapper::TaskSyncStats;
use workmate_core::model::{
    CalendarEvent, Integration, Priority, Reminder, ReminderSeverity, SyncStatus, Task,
};
use workmate_core::remote::ConnectionTest;

pub trait Render {
    fn render(&self) -> String;
}

fn render_time(start: DateTime<Utc>, all_day: bool) -> String {
    if all_day {
        start.format("%Y-%m-%d").to_string()
    } else {
        start.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

impl Render for SyncStatus {
    fn render(&self) -> String {
        let label = self.to_string();
        match self {
            SyncStatus::Synced => label.green().to_string(),
            SyncStatus::Pending => label.yellow().to_string(),
            SyncStatus::Failed | SyncStatus::Conflict => label.red().to_string(),
        }
    }
}

impl Render for CalendarEvent {
    fn render(&self) -> String {
        let marker = if self.task_id.is_some() { " (task)" } else { "" };
        format!(
            "{} {}{} {} {}",
            self.sync_status.render(),
            self.fields.title,
            marker.dimmed(),
            render_time(self.fields.start_time, self.fields.all_day).dimmed(),
            self.id.dimmed()
        )
    }
}

impl Render for Integration {
    fn render(&self) -> String {
        let state = if self.needs_reauth {
            "needs re-auth".red().to_string()
        } else if !self.enabled {
            "disabled".yellow().to_string()
        } else {
            "enabled".green().to_string()
        };

        let last = match self.last_synced_at {
            Some(at) => format!("last synced {}", at.format("%Y-%m-%d %H:%M")),
            None => "never synced".to_string(),
        };

        format!(
            "📅 {} [{}] {} {}\n   {}",
            self.name.bold(),
            self.integration_type,
            state,
            last.dimmed(),
            self.id.dimmed()
        )
    }
}

impl Render for Priority {
    fn render(&self) -> String {
        match self {
            Priority::Low => self.as_str().dimmed().to_string(),
            Priority::Medium => self.as_str().to_string(),
            Priority::High => self.as_str().yellow().to_string(),
            Priority::Critical => self.as_str().red().to_string(),
        }
    }
}

impl Render for Task {
    fn render(&self) -> String {
        let check = if self.is_completed() { "✓".green().to_string() } else { "·".to_string() };
        let due = self
            .due_date
            .map(|d| format!("due {}", d.format("%Y-%m-%d")))
            .unwrap_or_default();
        format!(
            "{} {} {} {} {}",
            check,
            self.title,
            self.priority.render(),
            due.dimmed(),
            self.id.dimmed()
        )
    }
}

impl Render for Reminder {
    fn render(&self) -> String {
        let severity = match self.severity {
            ReminderSeverity::Info => "info".dimmed().to_string(),
            ReminderSeverity::Warning => "warning".yellow().to_string(),
            ReminderSeverity::Urgent => "urgent".red().to_string(),
            ReminderSeverity::Critical => "critical".red().bold().to_string(),
        };
        format!(
            "🔔 {} at {} for task {} {}",
            severity,
            self.trigger_at.format("%Y-%m-%d %H:%M"),
            self.task_id.dimmed(),
            self.id.dimmed()
        )
    }
}

impl Render for ConnectionTest {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        if self.success {
            lines.push(format!("{} {}", "✓".green(), self.message));
        } else {
            lines.push(format!("{} {}", "✗".red(), self.message.red()));
        }
        for calendar in &self.calendars {
            let primary = if calendar.primary { " (primary)" } else { "" };
            lines.push(format!(
                "   {}{} {}",
                calendar.name,
                primary.dimmed(),
                calendar.id.dimmed()
            ));
        }
        lines.join("\n")
    }
}

impl Render for SyncResult {
    fn render(&self) -> String {
        let mut lines = Vec::new();

        let pulled = [self.local_created, self.local_updated, self.local_deleted];
        if pulled.iter().any(|n| *n > 0) {
            lines.push(format!(
                "   {} {} created, {} updated, {} deleted",
                "Pulled:".green(),
                self.local_created,
                self.local_updated,
                self.local_deleted
            ));
        }

        let pushed = [self.remote_created, self.remote_updated, self.remote_deleted];
        if pushed.iter().any(|n| *n > 0) {
            lines.push(format!(
                "   {} {} created, {} updated, {} deleted",
                "Pushed:".green(),
                self.remote_created,
                self.remote_updated,
                self.remote_deleted
            ));
        }

        if lines.is_empty() {
            lines.push(format!("   {}", "Everything up to date".dimmed()));
        }

        if !self.conflicts.is_empty() {
            let count = self.conflicts.len();
            lines.push(format!(
                "   {} {} {} (workmate resolve <event> keep_local|keep_remote)",
                "!".yellow(),
                count,
                pluralize("conflict", count).yellow()
            ));
            for id in &self.conflicts {
                lines.push(format!("      {}", id.dimmed()));
            }
        }

        for message in &self.error_messages {
            lines.push(format!("   {}", message.red()));
        }

        lines.join("\n")
    }
}

impl Render for TaskSyncStats {
    fn render(&self) -> String {
        let mut lines = vec![format!(
            "Processed {} {}: {} created, {} updated",
            self.processed,
            pluralize("task", self.processed),
            self.created,
            self.updated
        )];
        for message in &self.error_messages {
            lines.push(format!("   {}", message.red()));
        }
        lines.join("\n")
    }
}
