//! Bulk-load stamp records from a JSON file into the catalog database.
//!
//! ```text
//! import_stamps [--database-url URL] [FILE]
//! ```
//!
//! `FILE` holds a JSON array of objects with any of `title`, `image`, `year`,
//! `description`, `country`, `value`, `category`. All records are inserted in
//! a single transaction.

use anyhow::{Context, Result};
use clap::Parser;
use stamp_catalog::{db, models::stamp::ImportedStamp, services::stamp_service::insert_many};
use std::{env, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Import stamps from a JSON file")]
struct Args {
    /// JSON file containing an array of stamp records
    #[arg(default_value = "stamps.json")]
    file: PathBuf,

    /// Database URL (overrides STAMP_CATALOG_DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .or_else(|| env::var("STAMP_CATALOG_DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://./data/stamps.db".into());

    let raw = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let records: Vec<ImportedStamp> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {} as a JSON array of stamps", args.file.display()))?;

    let pool = db::connect(&database_url).await?;
    let count = insert_many(&pool, records)
        .await
        .context("inserting stamps")?;
    pool.close().await;
    tracing::info!("Stamps imported: {}", count);
    println!("Stamps imported! ({})", count);

    Ok(())
}
