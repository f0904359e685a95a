//! CLI parser and command dispatch.

mod import;
mod init;
mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "cranewatch")]
#[command(about = "Crane fleet fault and maintenance record tracker")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Import a directory tree of PLC log exports
    Import {
        /// Directory containing per-crane export folders
        path: PathBuf,
    },

    /// Import a fault library export (tab-delimited CSV)
    ImportFaults {
        /// Library file path
        path: PathBuf,
    },

    /// Show maintenance records for a crane, date range and fault
    Data {
        /// Crane number or "all"
        crane: String,
        /// Start date, DD-MM-YYYY
        start: String,
        /// End date, DD-MM-YYYY
        end: String,
        /// Fault id, keyword, or "all"
        #[arg(default_value = "all")]
        fault: String,
    },

    /// Search fault references by keyword
    Faults {
        /// Keyword, fault code, or fault id
        keyword: String,
    },

    /// List cranes with recorded data
    Cranes,

    /// List years with recorded data
    Years {
        /// Crane number or "all"
        #[arg(default_value = "all")]
        crane: String,
    },

    /// Delete maintenance records in scope
    Delete {
        /// Crane number or "all"
        crane: String,
        /// Start date, DD-MM-YYYY
        start: String,
        /// End date, DD-MM-YYYY
        end: String,
        /// Fault id, keyword, or "all"
        #[arg(default_value = "all")]
        fault: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Import { path } => import::cmd_import(&settings, &path).await,
        Commands::ImportFaults { path } => import::cmd_import_faults(&settings, &path).await,
        Commands::Data {
            crane,
            start,
            end,
            fault,
        } => query::cmd_data(&settings, &crane, &start, &end, &fault).await,
        Commands::Faults { keyword } => query::cmd_faults(&settings, &keyword).await,
        Commands::Cranes => query::cmd_cranes(&settings).await,
        Commands::Years { crane } => query::cmd_years(&settings, &crane).await,
        Commands::Delete {
            crane,
            start,
            end,
            fault,
            yes,
        } => query::cmd_delete(&settings, &crane, &start, &end, &fault, yes).await,
    }
}
