//! Sweep commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use tokio::sync::watch;

use super::{open_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum SweepAction {
    /// Run a single sweep and print its report
    Once {
        /// Evaluate as of this instant instead of now (RFC 3339)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Sweep on the configured interval until interrupted
    Watch {
        /// Override the interval in seconds
        #[arg(long)]
        every: Option<u64>,
    },
}

pub async fn run(action: SweepAction) -> CliResult {
    let engine = open_engine()?;

    match action {
        SweepAction::Once { now } => {
            let report = engine.run_sweep(now).await?;
            print_json(&report)?;
        }
        SweepAction::Watch { every } => {
            let mut driver = engine.sweep_driver();
            if let Some(secs) = every {
                driver = driver.with_interval(std::time::Duration::from_secs(secs));
            }
            let (stop, stopped) = watch::channel(false);
            let handle = driver.spawn(stopped);

            tokio::signal::ctrl_c().await?;
            eprintln!("stopping sweep driver");
            stop.send(true)?;
            handle.await?;
        }
    }
    Ok(())
}
