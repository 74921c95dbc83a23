//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Monthly budget tracker
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted monthly income and expense tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// Every request then acts as the single "local-dev" owner.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Show database status (encryption, size, owners)
    Status,

    /// Show the summary and analysis for one month
    Summary {
        /// Owner identity (e.g., the Cloudflare Access email)
        #[arg(short, long)]
        owner: String,

        /// Month as YYYY-MM (defaults to the current month)
        period: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List months that have records
    Months {
        /// Owner identity
        #[arg(short, long)]
        owner: String,
    },

    /// Rebuild stored summaries from the records
    Recalc {
        /// Only rebuild this owner's summaries (all owners if omitted)
        #[arg(short, long)]
        owner: Option<String>,
    },
}
