//! Configuration loading for the strata services
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`~/.config/strata/config.toml`, then
//!    `/etc/strata/config.toml`)
//! 4. Compiled default (fallback)

use crate::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the database file.
pub const DATABASE_ENV: &str = "STRATA_DATABASE";

const DEFAULT_DATABASE: &str = "strata.db";
const DEFAULT_CACHE_COLLECTION: &str = "site_cache";
const DEFAULT_BATCH_CONCURRENCY: usize = 10;

/// Service configuration for the site builder.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database holding both the relational source
    /// tables and the document cache collection.
    pub database_path: PathBuf,
    /// Cache collection (table) name for assembled site documents.
    pub cache_collection: String,
    /// Concurrency ceiling for batch regeneration.
    pub batch_concurrency: usize,
}

/// On-disk TOML shape; every field optional so partial files work.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    cache_collection: Option<String>,
    batch_concurrency: Option<usize>,
}

impl Config {
    /// Resolve configuration with `cli_database` taking highest priority.
    pub fn resolve(cli_database: Option<&str>) -> Result<Self> {
        let file = load_config_file().unwrap_or_default();

        let database_path = if let Some(path) = cli_database {
            PathBuf::from(path)
        } else if let Ok(path) = std::env::var(DATABASE_ENV) {
            PathBuf::from(path)
        } else if let Some(path) = file.database_path.clone() {
            path
        } else {
            PathBuf::from(DEFAULT_DATABASE)
        };

        Ok(Self {
            database_path,
            cache_collection: file
                .cache_collection
                .unwrap_or_else(|| DEFAULT_CACHE_COLLECTION.to_string()),
            batch_concurrency: file.batch_concurrency.unwrap_or(DEFAULT_BATCH_CONCURRENCY),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE),
            cache_collection: DEFAULT_CACHE_COLLECTION.to_string(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

/// Read the first config file that exists. Unreadable or malformed files
/// are treated as absent; resolution then falls through to defaults.
fn load_config_file() -> Option<ConfigFile> {
    for path in candidate_paths() {
        if let Ok(contents) = std::fs::read_to_string(&path) {
            match toml::from_str::<ConfigFile>(&contents) {
                Ok(file) => return Some(file),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed config file");
                }
            }
        }
    }
    None
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("strata").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        paths.push(PathBuf::from("/etc/strata/config.toml"));
    }
    paths
}
