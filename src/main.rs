//! belegsync CLI entry point

use belegsync::{
    commands::{cmd_check, cmd_import, print_check, print_import_stats},
    config::{Config, ConfigOverrides},
    error::Result,
    progress::LogWriterFactory,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "belegsync")]
#[command(version, about = "Import scanned invoices into BelegManager", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// BelegManager data directory (holds BelegManager.db4)
    #[arg(short = 'd', long, global = true, env = "BELEGSYNC_BELEG_MANAGER_DIR")]
    beleg_manager_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze documents and reconcile them into the BelegManager database
    Import {
        /// Glob selecting the documents to import
        #[arg(short, long)]
        files_to_import_glob: Option<String>,

        /// Document analysis endpoint
        #[arg(long, env = "BELEGSYNC_DI_ENDPOINT")]
        di_endpoint: Option<String>,

        /// Document analysis subscription key
        #[arg(long, env = "BELEGSYNC_DI_KEY", hide_env_values = true)]
        di_key: Option<String>,

        /// Maximum number of files processed at the same time
        #[arg(long)]
        max_concurrent_files: Option<usize>,

        /// Give up on a single file after this many seconds
        #[arg(long)]
        file_timeout_secs: Option<u64>,

        /// Do not back up the database before importing
        #[arg(long)]
        no_backup: bool,

        /// Output the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify the BelegManager database and show its contents
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if e.is_file_scoped() {
            error!("{}", e);
        } else {
            error!("Aborted: {}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Handle completions command (doesn't need config/store)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "belegsync", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Import {
            files_to_import_glob,
            di_endpoint,
            di_key,
            max_concurrent_files,
            file_timeout_secs,
            no_backup,
            json,
        } => {
            config.apply_overrides(ConfigOverrides {
                beleg_manager_dir: cli.beleg_manager_dir,
                files_to_import_glob,
                endpoint: di_endpoint,
                max_concurrent_files,
                file_timeout_secs,
                no_backup,
            })?;

            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let stats = cmd_import(&config, di_key, &cancel).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_import_stats(&stats);
            }
        }

        Commands::Check { json } => {
            config.apply_overrides(ConfigOverrides {
                beleg_manager_dir: cli.beleg_manager_dir,
                ..Default::default()
            })?;

            let info = cmd_check(&config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_check(&info);
            }
        }

        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}

/// Cancel the run on the first Ctrl-C; in-flight transactions roll back
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining files");
            cancel.cancel();
        }
    });
}
