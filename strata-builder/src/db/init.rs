//! Schema initialization
//!
//! Creates the normalized source tables and the cache collection when they
//! do not exist yet. The same statements seed the in-memory fixtures the
//! tests run against.

use sqlx::SqlitePool;
use strata_common::Result;
use tracing::info;

/// Create all tables if missing. Idempotent.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            site_id INTEGER PRIMARY KEY,
            site_name TEXT NOT NULL,
            national_site_identifier TEXT,
            latitude_dd REAL,
            longitude_dd REAL,
            description TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS biblio (
            biblio_id INTEGER PRIMARY KEY,
            authors TEXT,
            title TEXT,
            year TEXT,
            full_reference TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS site_references (
            site_id INTEGER NOT NULL,
            biblio_id INTEGER NOT NULL,
            PRIMARY KEY (site_id, biblio_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sample_groups (
            sample_group_id INTEGER PRIMARY KEY,
            site_id INTEGER NOT NULL,
            sample_group_name TEXT NOT NULL,
            sampling_context TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS physical_samples (
            physical_sample_id INTEGER PRIMARY KEY,
            sample_group_id INTEGER NOT NULL,
            sample_name TEXT NOT NULL,
            sample_type TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS analysis_entities (
            analysis_entity_id INTEGER PRIMARY KEY,
            physical_sample_id INTEGER NOT NULL,
            dataset_id INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            dataset_id INTEGER PRIMARY KEY,
            dataset_name TEXT NOT NULL,
            method_id INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS methods (
            method_id INTEGER PRIMARY KEY,
            method_group_id INTEGER,
            method_name TEXT NOT NULL,
            method_abbrev TEXT,
            unit_id INTEGER
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS units (
            unit_id INTEGER PRIMARY KEY,
            unit_name TEXT NOT NULL,
            unit_abbrev TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS dating_labs (
            lab_id INTEGER PRIMARY KEY,
            lab_name TEXT NOT NULL,
            country TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS dendro_measurements (
            analysis_entity_id INTEGER NOT NULL,
            measurement_key TEXT NOT NULL,
            measurement_value TEXT,
            dating_lab_id INTEGER
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS taxa (
            taxon_id INTEGER PRIMARY KEY,
            family TEXT,
            genus TEXT,
            species TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS abundance_elements (
            abundance_element_id INTEGER PRIMARY KEY,
            element_name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS abundances (
            abundance_id INTEGER PRIMARY KEY,
            analysis_entity_id INTEGER NOT NULL,
            taxon_id INTEGER NOT NULL,
            abundance_element_id INTEGER,
            abundance INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS measured_values (
            analysis_entity_id INTEGER NOT NULL,
            measured_value REAL NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS isotope_values (
            isotope_id INTEGER PRIMARY KEY,
            analysis_entity_id INTEGER NOT NULL,
            isotope_type TEXT NOT NULL,
            isotope_value REAL NOT NULL,
            unit_id INTEGER
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS cache_documents (
            collection TEXT NOT NULL,
            key_id INTEGER NOT NULL,
            source_version TEXT NOT NULL,
            payload TEXT NOT NULL
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_cache_documents_key
            ON cache_documents (collection, key_id)
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database tables initialized");
    Ok(())
}
