use anyhow::Result;
use owo_colors::OwoColorize;
use uuid::Uuid;
use workmate_core::ConflictResolution;

use crate::app::App;
use crate::render::Render;

pub async fn run(app: &App, user: Uuid, event: Uuid, resolution: ConflictResolution) -> Result<()> {
    let resolved = app.engine().resolve_conflict(user, event, resolution).await?;

    let kept = match resolution {
        ConflictResolution::KeepLocal => "Kept local version; it will be pushed on the next sync",
        ConflictResolution::KeepRemote => "Took the remote version",
    };
    println!("{} {}", "✓".green(), kept);
    println!("   {}", resolved.render());

    Ok(())
}
