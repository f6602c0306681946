use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::app::App;
use crate::render::Render;

/// Print due reminders. With `mark_sent` they count as delivered.
pub async fn due(app: &App, mark_sent: bool) -> Result<()> {
    let scheduler = app.reminders();
    let mut due = scheduler.due_reminders(Utc::now()).await?;
    due.sort_by_key(|r| r.trigger_at);

    if due.is_empty() {
        println!("{}", "Nothing due".dimmed());
        return Ok(());
    }

    for reminder in &due {
        println!("{}", reminder.render());
        if mark_sent {
            scheduler.mark_sent(reminder.id, None).await?;
        }
    }
    Ok(())
}

pub async fn snooze(app: &App, id: Uuid, minutes: Option<i64>) -> Result<()> {
    let reminder = app.reminders().snooze(id, minutes).await?;
    if let Some(until) = reminder.snoozed_until {
        println!(
            "{} Snoozed until {}",
            "✓".green(),
            until.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn ack(app: &App, id: Uuid) -> Result<()> {
    app.reminders().acknowledge(id).await?;
    println!("{} Acknowledged", "✓".green());
    Ok(())
}
