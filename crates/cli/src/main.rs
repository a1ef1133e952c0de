//! Tagcard CLI - schema setup and tag inventory tools.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the database schema
//! tagcard-cli migrate
//!
//! # Provision 50 tags and write their shortids as CSV
//! tagcard-cli tags generate -n 50 -o generated_tags.csv
//!
//! # Import pre-printed inventory (shortid[,site_code,server_code] per line)
//! tagcard-cli tags import inventory.csv
//!
//! # Add one tag by hand
//! tagcard-cli tags add ab12cd34
//! ```
//!
//! The database is taken from `TAGCARD_DATABASE_URL` / `DATABASE_URL`
//! (default `sqlite://tagcard.db`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tagcard-cli")]
#[command(author, version, about = "Tagcard CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing tables and columns
    Migrate,
    /// Manage the tag inventory
    Tags {
        #[command(subcommand)]
        action: TagAction,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Provision new unowned tags with random shortids
    Generate {
        /// Number of tags (1-1000)
        #[arg(short = 'n', long, default_value_t = 10)]
        count: i64,

        /// Write the CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import inventory from a CSV file
    Import {
        /// File with one `shortid[,site_code,server_code]` per line
        file: PathBuf,
    },
    /// Add a single unowned tag
    Add {
        shortid: String,

        #[arg(long)]
        site_code: Option<String>,

        #[arg(long)]
        server_code: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagcard_cli=info,tagcard_server=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let pool = commands::connect().await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&pool).await?,
        Commands::Tags { action } => match action {
            TagAction::Generate { count, output } => {
                commands::tags::generate(&pool, count, output.as_deref()).await?;
            }
            TagAction::Import { file } => commands::tags::import(&pool, &file).await?,
            TagAction::Add {
                shortid,
                site_code,
                server_code,
            } => {
                commands::tags::add(
                    &pool,
                    &shortid,
                    site_code.as_deref(),
                    server_code.as_deref(),
                )
                .await?;
            }
        },
    }
    Ok(())
}
