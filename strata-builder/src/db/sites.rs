//! Site base-row and bibliography fetches

use crate::models::{BiblioRef, LookupTables, Site};
use sqlx::{Row, SqlitePool};
use strata_common::Result;

/// Fetch the site base row. `Ok(None)` when the site does not exist;
/// assembly stops there without running any later stage.
pub async fn fetch_site_row(pool: &SqlitePool, site_id: i32) -> Result<Option<Site>> {
    let row = sqlx::query(
        r#"
        SELECT site_id, site_name, national_site_identifier,
               latitude_dd, longitude_dd, description
        FROM sites
        WHERE site_id = ?
        "#,
    )
    .bind(site_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Site {
        site_id: row.get("site_id"),
        site_name: row.get("site_name"),
        national_site_identifier: row.get("national_site_identifier"),
        latitude_dd: row.get("latitude_dd"),
        longitude_dd: row.get("longitude_dd"),
        description: row.get("description"),
        biblio: Vec::new(),
        sample_groups: Vec::new(),
        datasets: Vec::new(),
        lookup_tables: LookupTables::default(),
        data_groups: Vec::new(),
    }))
}

/// Bibliographic references linked to the site, oldest id first.
pub async fn fetch_biblio(pool: &SqlitePool, site_id: i32) -> Result<Vec<BiblioRef>> {
    let rows = sqlx::query(
        r#"
        SELECT b.biblio_id, b.authors, b.title, b.year, b.full_reference
        FROM biblio b
        JOIN site_references sr ON sr.biblio_id = b.biblio_id
        WHERE sr.site_id = ?
        ORDER BY b.biblio_id
        "#,
    )
    .bind(site_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| BiblioRef {
            biblio_id: row.get("biblio_id"),
            authors: row.get("authors"),
            title: row.get("title"),
            year: row.get("year"),
            full_reference: row.get("full_reference"),
        })
        .collect())
}

/// All known site ids, ascending. Drives batch preload.
pub async fn all_site_ids(pool: &SqlitePool) -> Result<Vec<i32>> {
    let ids = sqlx::query_scalar("SELECT site_id FROM sites ORDER BY site_id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_tables;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_missing_site_is_none() {
        let pool = setup().await;
        let site = fetch_site_row(&pool, 999).await.unwrap();
        assert!(site.is_none());
    }

    #[tokio::test]
    async fn test_base_row_fetch() {
        let pool = setup().await;
        sqlx::query(
            "INSERT INTO sites (site_id, site_name, latitude_dd) VALUES (7, 'Uppåkra', 55.7)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let site = fetch_site_row(&pool, 7).await.unwrap().unwrap();
        assert_eq!(site.site_name, "Uppåkra");
        assert_eq!(site.latitude_dd, Some(55.7));
        assert!(site.sample_groups.is_empty());
    }

    #[tokio::test]
    async fn test_all_site_ids_sorted() {
        let pool = setup().await;
        for id in [3, 1, 2] {
            sqlx::query("INSERT INTO sites (site_id, site_name) VALUES (?, 'x')")
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }
        assert_eq!(all_site_ids(&pool).await.unwrap(), vec![1, 2, 3]);
    }
}
