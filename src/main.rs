mod app;
mod commands;
mod render;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use workmate_core::model::SyncStatus;
use workmate_core::sync::ConflictResolution;

use crate::app::App;
use crate::commands::integrations::IntegrationArgs;
use crate::commands::tasks::TaskArgs;

#[derive(Parser)]
#[command(name = "workmate")]
#[command(about = "Sync your tasks and calendar events with CalDAV and Google Calendar")]
struct Cli {
    /// Log debug output to stderr (overrides WORKMATE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Act as this user (needed only when the data holds several users)
    #[arg(long, global = true)]
    user: Option<Uuid>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync pass against connected calendars
    Sync {
        /// Only this integration
        integration: Option<Uuid>,

        /// Sync even if the integration is disabled
        #[arg(short, long)]
        force: bool,

        /// Sync every integration whose auto-sync interval has elapsed
        #[arg(long, conflicts_with = "integration")]
        due: bool,
    },
    /// Settle a conflicting event
    Resolve {
        event: Uuid,

        /// keep_local or keep_remote
        resolution: ConflictResolution,
    },
    /// Check that an integration's calendar is reachable
    TestConnection { integration: Uuid },
    /// Manage calendar integrations
    Integrations {
        #[command(subcommand)]
        command: Option<IntegrationCommands>,
    },
    /// Local calendar events
    Events {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Manage tasks and their calendar events
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Work through task reminders
    Reminders {
        #[command(subcommand)]
        command: ReminderCommands,
    },
    /// Show configuration paths and effective settings
    Config,
}

#[derive(Subcommand)]
enum IntegrationCommands {
    /// List integrations (default)
    List,
    /// Connect a new calendar
    Add(IntegrationArgs),
    /// Disconnect a calendar; its events stay as local events
    Remove { integration: Uuid },
}

#[derive(Subcommand)]
enum EventCommands {
    /// List events in a date range
    List {
        /// From this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Until this date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<String>,

        /// pending, synced, failed or conflict
        #[arg(long)]
        status: Option<SyncStatus>,
    },
    /// Delete an event locally and, on the next sync, remotely
    Delete { event: Uuid },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks
    List,
    /// Create a task with reminders
    Add(TaskArgs),
    /// Mark a task done
    Done { task: Uuid },
    /// Project every open task with a due date onto the calendar
    SyncAll {
        /// Delete and recreate existing task events
        #[arg(short, long)]
        force: bool,
    },
    /// Delete calendar events of tasks completed long ago
    Cleanup {
        #[arg(long, default_value_t = 30)]
        older_than_days: i64,
    },
}

#[derive(Subcommand)]
enum ReminderCommands {
    /// Reminders that should fire now
    Due {
        /// Record them as delivered
        #[arg(long)]
        mark_sent: bool,
    },
    /// Push a reminder back
    Snooze {
        reminder: Uuid,

        /// Minutes to snooze (default 60)
        #[arg(short, long)]
        minutes: Option<i64>,
    },
    /// Mark a reminder as seen
    Ack { reminder: Uuid },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("WORKMATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let app = App::load()?;

    match cli.command {
        Commands::Sync {
            integration,
            force,
            due,
        } => {
            if due {
                commands::sync::run_due(&app).await?;
            } else {
                let user = app.user(cli.user).await?;
                commands::sync::run(&app, user, integration, force).await?;
            }
        }
        Commands::Resolve { event, resolution } => {
            let user = app.user(cli.user).await?;
            commands::resolve::run(&app, user, event, resolution).await?;
        }
        Commands::TestConnection { integration } => {
            let user = app.user(cli.user).await?;
            commands::integrations::test(&app, user, integration).await?;
        }
        Commands::Integrations { command } => match command.unwrap_or(IntegrationCommands::List) {
            IntegrationCommands::List => {
                let user = app.user(cli.user).await?;
                commands::integrations::list(&app, user).await?;
            }
            IntegrationCommands::Add(args) => {
                let user = app.user_or_new(cli.user).await?;
                commands::integrations::add(&app, user, args).await?;
            }
            IntegrationCommands::Remove { integration } => {
                let user = app.user(cli.user).await?;
                commands::integrations::remove(&app, user, integration).await?;
            }
        },
        Commands::Events { command } => {
            let user = app.user(cli.user).await?;
            match command {
                EventCommands::List { from, to, status } => {
                    commands::events::list(&app, user, from.as_deref(), to.as_deref(), status)
                        .await?
                }
                EventCommands::Delete { event } => {
                    commands::events::delete(&app, user, event).await?
                }
            }
        }
        Commands::Tasks { command } => match command {
            TaskCommands::List => {
                let user = app.user(cli.user).await?;
                commands::tasks::list(&app, user).await?;
            }
            TaskCommands::Add(args) => {
                let user = app.user_or_new(cli.user).await?;
                commands::tasks::add(&app, user, args).await?;
            }
            TaskCommands::Done { task } => {
                let user = app.user(cli.user).await?;
                commands::tasks::done(&app, user, task).await?;
            }
            TaskCommands::SyncAll { force } => {
                let user = app.user(cli.user).await?;
                commands::tasks::sync_all(&app, user, force).await?;
            }
            TaskCommands::Cleanup { older_than_days } => {
                let user = app.user(cli.user).await?;
                commands::tasks::cleanup(&app, user, older_than_days).await?;
            }
        },
        Commands::Reminders { command } => match command {
            ReminderCommands::Due { mark_sent } => commands::reminders::due(&app, mark_sent).await?,
            ReminderCommands::Snooze { reminder, minutes } => {
                commands::reminders::snooze(&app, reminder, minutes).await?
            }
            ReminderCommands::Ack { reminder } => commands::reminders::ack(&app, reminder).await?,
        },
        Commands::Config => commands::config::run(&app)?,
    }

    app.save().await
}
