use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use libris_app::modules::books::{models::OneOrMany, repository::BookRepository};
use libris_kernel::settings::Settings;
use serde_json::{Map, Value};

#[derive(Debug, Parser)]
#[command(name = "libris", version, about = "Books directory API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API until interrupted
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Insert the book or array of books held in a JSON file
    Seed { file: PathBuf },
    /// Print the effective settings as JSON
    Settings,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load().with_context(|| "failed to load libris settings")?;

    match cli.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            libris_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "libris serve");
            libris_app::run(settings).await
        }
        Command::Seed { file } => {
            libris_telemetry::init(&settings.telemetry)?;
            let seeded = seed(&settings, &file).await?;
            println!("seeded {seeded} books");
            Ok(())
        }
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

async fn seed(settings: &Settings, file: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let input: OneOrMany<Map<String, Value>> = serde_json::from_str(&raw)
        .with_context(|| format!("{} must hold a book object or an array of books", file.display()))?;
    if matches!(&input, OneOrMany::Many(books) if books.is_empty()) {
        bail!("{} holds an empty array", file.display());
    }

    let db = libris_app::connect(settings).await?;
    let books = BookRepository::new(&db, &settings.database.collection);
    let created = books.create(input).await?;

    let count = match created {
        OneOrMany::One(_) => 1,
        OneOrMany::Many(books) => books.len(),
    };
    tracing::info!(count, collection = %settings.database.collection, "seed complete");
    Ok(count)
}
