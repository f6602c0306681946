use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use owo_colors::OwoColorize;
use uuid::Uuid;
use workmate_core::model::{Integration, IntegrationType, SyncDirection};

use crate::app::App;
use crate::render::Render;
use crate::utils::tui;

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Caldav,
    Google,
    Outlook,
}

impl From<Kind> for IntegrationType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Caldav => IntegrationType::Caldav,
            Kind::Google => IntegrationType::GoogleCalendar,
            Kind::Outlook => IntegrationType::Outlook,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Direction {
    Push,
    Pull,
    Both,
}

impl From<Direction> for SyncDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Push => SyncDirection::LocalToRemote,
            Direction::Pull => SyncDirection::RemoteToLocal,
            Direction::Both => SyncDirection::Bidirectional,
        }
    }
}

#[derive(Args)]
pub struct IntegrationArgs {
    /// Display name
    name: String,

    #[arg(short, long, value_enum)]
    kind: Kind,

    #[arg(short, long, value_enum, default_value = "both")]
    direction: Direction,

    /// Provider setting as key=value, e.g. url=https://dav.example.com/cal/
    #[arg(short, long = "config", value_parser = parse_key_value)]
    config: Vec<(String, String)>,

    /// Provider secret as key=value, e.g. password=...
    #[arg(long = "credential", value_parser = parse_key_value)]
    credentials: Vec<(String, String)>,

    /// Sync automatically with `workmate sync --due`
    #[arg(long)]
    auto_sync: bool,

    /// Minutes between automatic passes
    #[arg(long, default_value_t = 15)]
    interval: u32,
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{s}'"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

pub async fn list(app: &App, user: Uuid) -> Result<()> {
    let integrations = app.calendar().list_integrations(user).await?;

    if integrations.is_empty() {
        println!("{}", "No integrations. Add one with `workmate integrations add`".dimmed());
        return Ok(());
    }

    for integration in integrations {
        println!("{}", integration.render());
    }
    Ok(())
}

pub async fn add(app: &App, user: Uuid, args: IntegrationArgs) -> Result<()> {
    let mut integration = Integration::new(user, &args.name, args.kind.into());
    integration.sync_direction = args.direction.into();
    integration.auto_sync = args.auto_sync;
    integration.sync_interval_minutes = args.interval;

    for (key, value) in args.config {
        integration.config.set(&key, value);
    }
    for (key, value) in args.credentials {
        integration.credentials.set(&key, value);
    }

    let stored = app.calendar().add_integration(integration).await?;

    println!("{} Added integration", "✓".green());
    println!("{}", stored.render());
    println!("   {}", format!("user {user}").dimmed());
    Ok(())
}

pub async fn remove(app: &App, user: Uuid, integration: Uuid) -> Result<()> {
    let unlinked = app.calendar().remove_integration(user, integration).await?;
    println!(
        "{} Removed integration, {} event(s) kept as local events",
        "✓".green(),
        unlinked
    );
    Ok(())
}

pub async fn test(app: &App, user: Uuid, integration: Uuid) -> Result<()> {
    let spinner = tui::create_spinner("Testing connection".to_string());
    let outcome = app.calendar().test_connection(user, integration).await;
    spinner.finish_and_clear();

    let outcome = outcome?;
    println!("{}", outcome.render());
    if !outcome.success {
        anyhow::bail!("Connection test failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value_splits_on_first_equals() {
        let (key, value) = parse_key_value("url=https://dav.example.com/?a=b").unwrap();
        assert_eq!(key, "url");
        assert_eq!(value, "https://dav.example.com/?a=b");
    }

    #[test]
    fn test_parse_key_value_requires_equals() {
        assert!(parse_key_value("password").is_err());
    }

    #[test]
    fn test_kind_maps_to_integration_type() {
        assert_eq!(IntegrationType::from(Kind::Google), IntegrationType::GoogleCalendar);
        assert_eq!(SyncDirection::from(Direction::Pull), SyncDirection::RemoteToLocal);
    }
}
