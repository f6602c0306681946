use anyhow::Result;
use owo_colors::OwoColorize;
use workmate_core::WorkmateConfig;

use crate::app::App;

pub fn run(app: &App) -> Result<()> {
    let config_path = WorkmateConfig::config_path()?;

    println!("{}", "Paths".bold());
    println!("  Config:  {}", config_path.display());
    println!("  Data:    {}", app.snapshot_path().display());

    // Never echo the OAuth client secret
    let mut shown = app.config.clone();
    if let Some(google) = shown.google.as_mut() {
        google.client_secret = "********".to_string();
    }

    println!();
    println!("{}", "Effective settings".bold());
    for line in toml::to_string_pretty(&shown)?.lines() {
        println!("  {line}");
    }

    Ok(())
}
