//! Dataset, method, and unit fetches

use crate::models::lookup::Unit;
use crate::models::{Dataset, Method};
use sqlx::{Row, SqlitePool};
use strata_common::Result;

/// Dataset by id, with the owning method's group id joined in.
pub async fn fetch_dataset(pool: &SqlitePool, dataset_id: i32) -> Result<Option<Dataset>> {
    let row = sqlx::query(
        r#"
        SELECT d.dataset_id, d.dataset_name, d.method_id, m.method_group_id
        FROM datasets d
        LEFT JOIN methods m ON m.method_id = d.method_id
        WHERE d.dataset_id = ?
        "#,
    )
    .bind(dataset_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Dataset {
        dataset_id: row.get("dataset_id"),
        dataset_name: row.get("dataset_name"),
        method_id: row.get("method_id"),
        method_group_id: row.get("method_group_id"),
    }))
}

pub async fn fetch_method(pool: &SqlitePool, method_id: i32) -> Result<Option<Method>> {
    let row = sqlx::query(
        r#"
        SELECT method_id, method_group_id, method_name, method_abbrev, unit_id
        FROM methods
        WHERE method_id = ?
        "#,
    )
    .bind(method_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Method {
        method_id: row.get("method_id"),
        method_group_id: row.get("method_group_id"),
        method_name: row.get("method_name"),
        method_abbrev: row.get("method_abbrev"),
        unit_id: row.get("unit_id"),
    }))
}

pub async fn fetch_unit(pool: &SqlitePool, unit_id: i32) -> Result<Option<Unit>> {
    let row = sqlx::query(
        r#"
        SELECT unit_id, unit_name, unit_abbrev
        FROM units
        WHERE unit_id = ?
        "#,
    )
    .bind(unit_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Unit {
        unit_id: row.get("unit_id"),
        unit_name: row.get("unit_name"),
        unit_abbrev: row.get("unit_abbrev"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_tables;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_dataset_joins_method_group() {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_tables(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO methods (method_id, method_group_id, method_name) VALUES (10, 2, 'Dendrochronology')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO datasets (dataset_id, dataset_name, method_id) VALUES (5, 'Dendro dataset', 10)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let dataset = fetch_dataset(&pool, 5).await.unwrap().unwrap();
        assert_eq!(dataset.method_id, 10);
        assert_eq!(dataset.method_group_id, Some(2));

        assert!(fetch_dataset(&pool, 999).await.unwrap().is_none());
    }
}
