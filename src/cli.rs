use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(author, version, about = "Bulk AI content enrichment for a plant catalog")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enrich every catalog entry that has not been enriched yet
    Run {
        /// Process at most this many entries
        #[arg(long)]
        limit: Option<usize>,

        /// Print progress events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Add a catalog entry to the enrichment queue
    Import {
        /// Entry ID
        #[arg(required = true)]
        id: String,

        /// Plant name sent to the providers
        #[arg(required = true)]
        name: String,
    },

    /// Show the outcome log of previous runs
    History {
        /// Number of most recent outcomes to show
        #[arg(short, long, default_value = "50")]
        limit: u32,

        /// Delete the outcome log instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// List the fields that will be generated, grouped by category
    Fields,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
