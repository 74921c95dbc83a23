//! Tally CLI - Monthly budget tracker
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally serve --port 3000             Start web server
//!   tally summary --owner me@x.com      Show this month's summary
//!   tally recalc                        Rebuild every stored summary

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
        Commands::Summary {
            owner,
            period,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_summary(&db, &owner, period.as_deref(), json)
        }
        Commands::Months { owner } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_months(&db, &owner)
        }
        Commands::Recalc { owner } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_recalc(&db, owner.as_deref())
        }
    }
}
