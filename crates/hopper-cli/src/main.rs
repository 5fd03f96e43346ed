//! Hopper CLI - Command-line interface for Hopper
//!
//! Watch a drop directory and report files as they become ready, or take
//! a one-off look at what's in it.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "hopper")]
#[command(author = "Hopper Contributors")]
#[command(version)]
#[command(about = "Watch a directory for files that are ready to consume", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config into the directory
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Watch the directory until Ctrl-C
    Watch {
        /// Directory to watch (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only report files whose name matches this glob
        #[arg(short, long)]
        filter: Option<String>,

        /// Use OS notifications instead of polling
        #[arg(short, long)]
        realtime: bool,

        /// Polling (or resubscribe) interval in seconds
        #[arg(short, long)]
        interval: Option<u64>,

        /// Don't report files already in the directory at startup
        #[arg(long)]
        ignore_existing: bool,
    },

    /// List the directory once, showing ready and locked files
    Scan {
        /// Directory to scan (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only list files whose name matches this glob
        #[arg(short, long)]
        filter: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Watch {
            path,
            filter,
            realtime,
            interval,
            ignore_existing,
        } => {
            let overrides = commands::WatchOverrides {
                filter,
                realtime,
                interval,
                ignore_existing,
            };
            commands::watch(&path, overrides).await
        }
        Commands::Scan { path, filter } => commands::scan(&path, filter.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
