use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "buytime", version, about = "BuyTime CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time balance and remote sync
    Balance {
        #[command(subcommand)]
        action: commands::balance::BalanceAction,
    },
    /// Focus duration, mode and reward
    Prefs {
        #[command(subcommand)]
        action: commands::prefs::PrefsAction,
    },
    /// App restrictions and earned windows
    Shield {
        #[command(subcommand)]
        action: commands::shield::ShieldAction,
    },
    /// API token management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BUYTIME_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Balance { action } => commands::balance::run(action),
        Commands::Prefs { action } => commands::prefs::run(action),
        Commands::Shield { action } => commands::shield::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
