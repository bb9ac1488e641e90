use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;
mod identity;
mod location;
mod notify;
mod state;

#[derive(Parser)]
#[command(name = "roadrest", version, about = "Roadrest -- road trip breaks and exercises")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Route planning and management
    Route {
        #[command(subcommand)]
        action: commands::route::RouteAction,
    },
    /// Break schedule inspection
    Breaks {
        #[command(subcommand)]
        action: commands::breaks::BreaksAction,
    },
    /// Exercise catalog and history
    Exercise {
        #[command(subcommand)]
        action: commands::exercise::ExerciseAction,
    },
    /// Live trip monitoring
    Trip {
        #[command(subcommand)]
        action: commands::trip::TripAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Route { action } => commands::route::run(action).await,
        Commands::Breaks { action } => commands::breaks::run(action).await,
        Commands::Exercise { action } => commands::exercise::run(action).await,
        Commands::Trip { action } => commands::trip::run(action).await,
        Commands::Config { action } => commands::config::run(action).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
