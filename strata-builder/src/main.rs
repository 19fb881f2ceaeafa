//! strata-builder CLI
//!
//! Entry points over the assembler: build one site document, preload the
//! whole cache, or flush it. The HTTP layer consuming these documents
//! lives elsewhere; this binary is the operational surface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use strata_builder::{assembler::AssembleOptions, batch, cache::CacheStore, db, SiteAssembler};
use strata_common::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata-builder", version, about = "Site document aggregation service")]
struct Cli {
    /// Database file (overrides env and config file)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble one site document and print it as JSON
    Build {
        site_id: i32,
        /// Rebuild even when a valid cached document exists
        #[arg(long)]
        no_cache: bool,
        /// Accept cached documents regardless of source version
        #[arg(long)]
        ignore_version: bool,
    },
    /// Regenerate all site documents
    Preload {
        /// Flush the cache before regenerating
        #[arg(long)]
        flush: bool,
        /// Override the configured concurrency ceiling
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Delete all cached site documents
    Flush,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.database.as_deref())?;
    info!(database = %config.database_path.display(), "Starting strata-builder");

    let pool = db::init_database_pool(&config.database_path)
        .await
        .context("Failed to open database")?;
    let cache = CacheStore::new(pool.clone())?;
    let assembler = Arc::new(SiteAssembler::new(
        pool,
        cache,
        config.cache_collection.clone(),
    ));

    match cli.command {
        Command::Build {
            site_id,
            no_cache,
            ignore_version,
        } => {
            let opts = AssembleOptions {
                no_cache,
                ignore_version,
            };
            match assembler.get_site(site_id, opts).await? {
                Some(site) => println!("{}", serde_json::to_string_pretty(&site)?),
                None => {
                    eprintln!("Site {} not found", site_id);
                    std::process::exit(1);
                }
            }
        }
        Command::Preload { flush, concurrency } => {
            let report = batch::preload(
                assembler,
                concurrency.unwrap_or(config.batch_concurrency),
                flush,
            )
            .await?;
            info!(
                completed = report.completed,
                failed = report.failed,
                missing = report.missing,
                "Preload done"
            );
        }
        Command::Flush => {
            let flushed = assembler.flush_cache().await?;
            info!(flushed, "Flush done");
        }
    }

    Ok(())
}
