//! VFS CLI: select interesting frames with the help of an external analyzer.
//!
//! Usage:
//!   vfs files [OPTIONS]      Exchange frames with an analyzer through directories
//!   vfs redis [OPTIONS]      Exchange frames with an analyzer through Redis pub/sub
//!   vfs inspect <FILE>       Print the predictions in an analysis result file
//!   vfs config <show|init>   Show or create the defaults file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vfs_common::config::AppConfig;
use vfs_frame_model::AnalysisFormat;

mod args;
mod commands;

use args::{FileExchangeArgs, RedisArgs, SelectionArgs};

#[derive(Parser)]
#[command(
    name = "vfs",
    about = "Replay videos, image directories or webcams and keep the frames an image analyzer finds interesting",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select frames, exchanging them with the analyzer through directories
    Files {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        exchange: FileExchangeArgs,
    },

    /// Select frames, exchanging them with the analyzer over Redis pub/sub
    Redis {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        broker: RedisArgs,
    },

    /// Parse an analysis result file and print its predictions
    Inspect {
        /// Path to the result file
        path: PathBuf,

        /// Format of the result file
        #[arg(long, default_value = "rois-csv")]
        analysis_type: AnalysisFormat,

        /// Print predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show or create the defaults file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location and the effective defaults
    Show,

    /// Write a config file holding the built-in defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = AppConfig::load();

    let mut logging = app.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    vfs_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Files {
            selection,
            exchange,
        } => commands::files::run(selection, exchange, &app).await,
        Commands::Redis { selection, broker } => {
            commands::redis::run(selection, broker, &app).await
        }
        Commands::Inspect {
            path,
            analysis_type,
            json,
        } => commands::inspect::run(path, analysis_type, json),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&app),
            ConfigAction::Init { force } => commands::config::init(force),
        },
    }
}
