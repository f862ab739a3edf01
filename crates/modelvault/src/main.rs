//! modelvault - sandboxed storage and model bundle downloads

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

mod commands;

use commands::{check_command, clean_command, fetch_command, init_command, status_command};

/// modelvault - keep speech models and user data inside known roots
#[derive(Parser)]
#[command(name = "modelvault")]
#[command(about = "◆ Sandboxed storage and resilient model downloads")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create config and data layout
    Init,
    /// Download and install a model bundle
    Fetch {
        /// Model code, e.g. "en-us"
        code: String,
        /// Archive URL; defaults to the configured source for the code
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Show storage layout and installed models
    Status,
    /// Remove orphaned temp directories
    Clean,
    /// Check a path against the sandbox
    Check {
        /// Path to validate
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let (name, result) = match cli.command {
        Commands::Init => ("Init", init_command().await),
        Commands::Fetch { code, url } => ("Fetch", fetch_command(code, url).await),
        Commands::Status => ("Status", status_command().await),
        Commands::Clean => ("Clean", clean_command().await),
        Commands::Check { path } => ("Check", check_command(path).await),
    };

    if let Err(e) = result {
        error!("{} failed: {:#}", name, e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
