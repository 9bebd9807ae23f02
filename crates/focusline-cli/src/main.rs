use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusline", version, about = "Focusline timeline engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work item management
    Item {
        #[command(subcommand)]
        action: commands::item::ItemAction,
    },
    /// Parking sweep
    Sweep {
        #[command(subcommand)]
        action: commands::sweep::SweepAction,
    },
    /// Role-fit score for one owner's day
    Score(commands::analysis::DayArgs),
    /// Ranked optimization suggestions for one owner's day
    Suggest(commands::analysis::DayArgs),
    /// Ranked free slots for a new item
    Slot(commands::analysis::SlotArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("FOCUSLINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Item { action } => commands::item::run(action).await,
        Commands::Sweep { action } => commands::sweep::run(action).await,
        Commands::Score(args) => commands::analysis::score(args).await,
        Commands::Suggest(args) => commands::analysis::suggest(args).await,
        Commands::Slot(args) => commands::analysis::slot(args).await,
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
