//! Ignition CLI - Command-line interface for the Ignition project scanner
//!
//! Provides `ignition-scan scan`, `ignition-scan types` and
//! `ignition-scan check`.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ignition-scan")]
#[command(about = "Ignition project scanner and inheritance resolver")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan Ignition projects
    Scan {
        /// Project directories to scan (in addition to configured ones)
        #[arg(value_name = "PROJECT")]
        projects: Vec<PathBuf>,

        /// Configuration file listing projects and scanner settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output directory for inventory files (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Always scan from disk
        #[arg(long)]
        no_cache: bool,
    },
    /// List registered resource types
    Types {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether a directory is an Ignition project
    Check {
        /// Directory to check
        path: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Json,
    Markdown,
    Both,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan {
            projects,
            config,
            format,
            output,
            no_cache,
        } => {
            let options = commands::scan::ScanOptions {
                projects,
                config,
                format,
                output,
                use_cache: !no_cache,
            };
            if let Err(e) = commands::scan::execute(options).await {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Types { json } => {
            if let Err(e) = commands::types::execute(json) {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Check { path } => match commands::check::execute(&path).await {
            Ok(true) => {}
            Ok(false) => std::process::exit(1),
            Err(e) => {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        },
    }
}
