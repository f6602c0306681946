use anyhow::Result;
use owo_colors::OwoColorize;
use uuid::Uuid;
use workmate_core::date_range::SyncWindow;
use workmate_core::model::SyncStatus;
use workmate_core::store::EventFilter;

use crate::app::App;
use crate::render::Render;

pub async fn list(
    app: &App,
    user: Uuid,
    from: Option<&str>,
    to: Option<&str>,
    status: Option<SyncStatus>,
) -> Result<()> {
    let window = SyncWindow::from_args(from, to, &app.config.sync)?;
    let filter = EventFilter {
        start: Some(window.start),
        end: Some(window.end),
        sync_status: status,
    };

    let mut events = app.calendar().list_events(user, &filter).await?;
    events.sort_by_key(|e| e.fields.start_time);

    if events.is_empty() {
        println!("{}", "No events in this range".dimmed());
        return Ok(());
    }

    for event in &events {
        println!("{}", event.render());
    }
    Ok(())
}

pub async fn delete(app: &App, user: Uuid, event: Uuid) -> Result<()> {
    app.calendar().delete_event(user, event).await?;
    println!(
        "{} Deleted event; linked remote copies are removed on the next sync",
        "✓".green()
    );
    Ok(())
}
