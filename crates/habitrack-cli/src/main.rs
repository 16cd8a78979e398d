use clap::{Parser, Subcommand};
use habitrack_core::{Config, CoreError};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "habitrack", version, about = "Habitrack CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, register or sign out
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Habit management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Today's habits and their completion
    Today(commands::today::TodayArgs),
    /// Streaks and weekly completion
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Profile management
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// Scheduled daily reminders
    Reminders {
        #[command(subcommand)]
        action: commands::reminders::RemindersAction,
    },
    /// Local cache maintenance
    Cache {
        #[command(subcommand)]
        action: commands::cache::CacheAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_tracing(&config);

    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action, config).await,
        Commands::Habit { action } => commands::habit::run(action, config).await,
        Commands::Today(args) => commands::today::run(args, config).await,
        Commands::Stats { json } => commands::stats::run(json, config).await,
        Commands::Profile { action } => commands::profile::run(action, config).await,
        Commands::Reminders { action } => commands::reminders::run(action),
        Commands::Cache { action } => commands::cache::run(action).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {}", user_facing(e.as_ref()));
        std::process::exit(1);
    }
}

/// Core failures are shown generically with the detail sent to the log.
/// Configuration, validation and usage errors are shown as they are.
fn user_facing(e: &(dyn std::error::Error + 'static)) -> String {
    match e.downcast_ref::<CoreError>() {
        None | Some(CoreError::Config(_) | CoreError::Validation(_)) => e.to_string(),
        Some(core) => {
            tracing::error!("{core}");
            core.user_message().to_string()
        }
    }
}
