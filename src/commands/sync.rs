use anyhow::Result;
use chrono::Utc;
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::app::App;
use crate::render::Render;
use crate::utils::tui;

/// Sync one integration, or every enabled integration of the user.
pub async fn run(app: &App, user: Uuid, integration: Option<Uuid>, force: bool) -> Result<()> {
    let engine = app.engine();
    let integrations = app.calendar().list_integrations(user).await?;

    let targets: Vec<_> = integrations
        .into_iter()
        .filter(|i| match integration {
            Some(id) => i.id == id,
            None => i.enabled || force,
        })
        .collect();

    if targets.is_empty() {
        match integration {
            Some(id) => anyhow::bail!("Integration {id} not found"),
            None => {
                println!("{}", "No enabled integrations to sync".dimmed());
                return Ok(());
            }
        }
    }

    let mut failed = 0;
    for (i, target) in targets.iter().enumerate() {
        let label = format!("📅 {}", target.name);
        let spinner = tui::create_spinner(label.clone());
        let outcome = engine.sync_integration(user, target.id, force).await;
        spinner.finish_and_clear();

        println!("{label}");
        match outcome {
            Ok(result) => println!("{}", result.render()),
            Err(e) => {
                failed += 1;
                println!("   {}", e.to_string().red());
            }
        }

        if i < targets.len() - 1 {
            println!();
        }
    }

    if failed > 0 {
        // Rotated credentials and needs_reauth flags are still worth keeping
        app.save().await?;
        anyhow::bail!("{failed} of {} integration(s) failed to sync", targets.len());
    }

    Ok(())
}

/// Sync every integration whose auto-sync interval has elapsed.
pub async fn run_due(app: &App) -> Result<()> {
    let spinner = tui::create_spinner("Syncing due integrations".to_string());
    let outcomes = app.engine().sync_due_integrations(Utc::now()).await?;
    spinner.finish_and_clear();

    if outcomes.is_empty() {
        println!("{}", "No integrations are due".dimmed());
        return Ok(());
    }

    for (id, outcome) in outcomes {
        println!("📅 {}", id.dimmed());
        match outcome {
            Ok(result) => println!("{}", result.render()),
            Err(e) => println!("   {}", e.to_string().red()),
        }
    }

    Ok(())
}
