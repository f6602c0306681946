use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::Args;
use owo_colors::OwoColorize;
use uuid::Uuid;
use workmate_core::model::{Priority, Task, TaskStatus};
use workmate_core::store::TaskStore;

use crate::app::App;
use crate::render::Render;
use crate::utils::tui;

#[derive(Args)]
pub struct TaskArgs {
    title: String,

    /// YYYY-MM-DD for an all-day due date, or an RFC 3339 timestamp
    #[arg(long)]
    due: Option<String>,

    /// low, medium, high or critical
    #[arg(short, long, default_value = "medium", value_parser = parse_priority)]
    priority: Priority,

    #[arg(long)]
    description: Option<String>,
}

fn parse_priority(s: &str) -> Result<Priority> {
    match Priority::parse(s) {
        Some(priority) => Ok(priority),
        None => bail!("Unknown priority '{s}'. Expected low, medium, high or critical"),
    }
}

fn parse_due(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    match DateTime::parse_from_rfc3339(s) {
        Ok(at) => Ok(at.with_timezone(&Utc)),
        Err(_) => bail!("Invalid due date '{s}'. Expected YYYY-MM-DD or RFC 3339"),
    }
}

pub async fn list(app: &App, user: Uuid) -> Result<()> {
    let mut tasks = app.store.list_tasks(user).await?;
    tasks.sort_by_key(|t| (t.is_completed(), t.due_date));

    if tasks.is_empty() {
        println!("{}", "No tasks".dimmed());
        return Ok(());
    }

    for task in &tasks {
        println!("{}", task.render());
    }
    Ok(())
}

pub async fn add(app: &App, user: Uuid, args: TaskArgs) -> Result<()> {
    let mut task = Task::new(user, &args.title);
    task.priority = args.priority;
    task.description = args.description;
    task.due_date = args.due.as_deref().map(parse_due).transpose()?;

    let task = app.store.insert_task(task).await?;
    let reminders = app.reminders().create_reminders_for_task(&task, None).await?;

    println!("{} Added task", "✓".green());
    println!("   {}", task.render());
    if !reminders.is_empty() {
        println!("   {}", format!("{} reminder(s) scheduled", reminders.len()).dimmed());
    }
    Ok(())
}

/// Mark a task done and drop its reminders that have not fired.
pub async fn done(app: &App, user: Uuid, id: Uuid) -> Result<()> {
    let mut task = app.store.get_task(user, id).await?;
    let now = Utc::now();
    task.status = TaskStatus::Done;
    task.completed_at = Some(now);
    task.updated_at = now;
    app.store.update_task(&task).await?;

    let cancelled = app.reminders().cancel_task_reminders(task.id).await?;
    println!("{} {}", "✓".green(), task.title);
    if cancelled > 0 {
        println!("   {}", format!("{cancelled} pending reminder(s) cancelled").dimmed());
    }
    Ok(())
}

pub async fn sync_all(app: &App, user: Uuid, force: bool) -> Result<()> {
    let spinner = tui::create_spinner("Projecting tasks onto the calendar".to_string());
    let stats = app.mapper().bulk_sync_user_tasks(user, force).await;
    spinner.finish_and_clear();

    let stats = stats?;
    println!("{}", stats.render());
    if stats.errors > 0 {
        bail!("{} task(s) could not be mapped", stats.errors);
    }
    Ok(())
}

pub async fn cleanup(app: &App, user: Uuid, older_than_days: i64) -> Result<()> {
    let removed = app
        .mapper()
        .remove_completed_task_events(user, older_than_days)
        .await?;
    println!(
        "{} Removed {} event(s) of tasks completed over {} day(s) ago",
        "✓".green(),
        removed,
        older_than_days
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_due_date_only_is_midnight_utc() {
        assert_eq!(
            parse_due("2025-03-01").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_due_rfc3339_converts_to_utc() {
        assert_eq!(
            parse_due("2025-03-01T10:00:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
        );
        assert!(parse_due("next tuesday").is_err());
    }

    #[test]
    fn test_parse_priority_is_lenient_about_case() {
        assert_eq!(parse_priority("HIGH").unwrap(), Priority::High);
        assert!(parse_priority("urgent").is_err());
    }
}
