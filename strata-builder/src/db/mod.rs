//! Database access for the site builder
//!
//! One SQLite database holds both the normalized source-of-truth tables
//! and the document cache collection. Accessor modules are split by area;
//! enrichment modules own their domain-specific queries themselves.

pub mod datasets;
pub mod init;
pub mod samples;
pub mod sites;

use sqlx::SqlitePool;
use std::path::Path;
use strata_common::Result;

/// Initialize database connection pool, creating the file and the schema
/// when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!(url = %db_url, "Connecting to database");

    let pool = SqlitePool::connect(&db_url).await?;
    init::init_tables(&pool).await?;

    Ok(pool)
}
