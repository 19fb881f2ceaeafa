//! Sample-tree fetches: sample groups, physical samples, analysis entities

use crate::models::{AnalysisEntity, PhysicalSample, SampleGroup};
use sqlx::{Row, SqlitePool};
use strata_common::Result;

pub async fn fetch_sample_groups(pool: &SqlitePool, site_id: i32) -> Result<Vec<SampleGroup>> {
    let rows = sqlx::query(
        r#"
        SELECT sample_group_id, site_id, sample_group_name, sampling_context
        FROM sample_groups
        WHERE site_id = ?
        ORDER BY sample_group_id
        "#,
    )
    .bind(site_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| SampleGroup {
            sample_group_id: row.get("sample_group_id"),
            site_id: row.get("site_id"),
            sample_group_name: row.get("sample_group_name"),
            sampling_context: row.get("sampling_context"),
            physical_samples: Vec::new(),
        })
        .collect())
}

pub async fn fetch_physical_samples(
    pool: &SqlitePool,
    sample_group_id: i32,
) -> Result<Vec<PhysicalSample>> {
    let rows = sqlx::query(
        r#"
        SELECT physical_sample_id, sample_group_id, sample_name, sample_type
        FROM physical_samples
        WHERE sample_group_id = ?
        ORDER BY physical_sample_id
        "#,
    )
    .bind(sample_group_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PhysicalSample {
            physical_sample_id: row.get("physical_sample_id"),
            sample_group_id: row.get("sample_group_id"),
            sample_name: row.get("sample_name"),
            sample_type: row.get("sample_type"),
            analysis_entities: Vec::new(),
        })
        .collect())
}

pub async fn fetch_analysis_entities(
    pool: &SqlitePool,
    physical_sample_id: i32,
) -> Result<Vec<AnalysisEntity>> {
    let rows = sqlx::query(
        r#"
        SELECT analysis_entity_id, physical_sample_id, dataset_id
        FROM analysis_entities
        WHERE physical_sample_id = ?
        ORDER BY analysis_entity_id
        "#,
    )
    .bind(physical_sample_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| AnalysisEntity {
            analysis_entity_id: row.get("analysis_entity_id"),
            physical_sample_id: row.get("physical_sample_id"),
            dataset_id: row.get("dataset_id"),
            raw: None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_tables;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_sample_tree_fetch() {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        init_tables(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO sample_groups (sample_group_id, site_id, sample_group_name) VALUES (1, 7, 'Trench A')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO physical_samples (physical_sample_id, sample_group_id, sample_name) VALUES (10, 1, 'Timber 1')",
        )
        .execute(&pool)
        .await
        .unwrap();
        for id in [100, 101] {
            sqlx::query(
                "INSERT INTO analysis_entities (analysis_entity_id, physical_sample_id, dataset_id) VALUES (?, 10, 5)",
            )
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
        }

        let groups = fetch_sample_groups(&pool, 7).await.unwrap();
        assert_eq!(groups.len(), 1);
        let samples = fetch_physical_samples(&pool, 1).await.unwrap();
        assert_eq!(samples.len(), 1);
        let entities = fetch_analysis_entities(&pool, 10).await.unwrap();
        assert_eq!(entities.len(), 2);
        assert!(entities.iter().all(|e| e.dataset_id == 5 && e.raw.is_none()));
    }
}
