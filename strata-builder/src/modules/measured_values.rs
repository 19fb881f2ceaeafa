//! Measured-value enrichment
//!
//! Plain numeric measurements, one row per analysis entity.

use super::{attach_raw, covers_dataset, matching_entity_ids, raw_rows, EnrichmentModule};
use crate::models::{DataGroup, DataGroupValue, Site, ValueType};
use futures::future::try_join_all;
use sqlx::{Row, SqlitePool};
use strata_common::Result;
use tracing::debug;

// Membership is maintained here until a methods registry exists; see
// DESIGN.md.
const METHOD_IDS: &[i32] = &[];
const METHOD_GROUP_IDS: &[i32] = &[2];

pub struct MeasuredValuesModule;

#[async_trait::async_trait]
impl EnrichmentModule for MeasuredValuesModule {
    fn name(&self) -> &'static str {
        "measured_values"
    }

    fn method_ids(&self) -> &[i32] {
        METHOD_IDS
    }

    fn method_group_ids(&self) -> &[i32] {
        METHOD_GROUP_IDS
    }

    async fn fetch(&self, pool: &SqlitePool, site: &mut Site) -> Result<()> {
        let ids = matching_entity_ids(site, self);
        debug!(site_id = site.site_id, entities = ids.len(), "Fetching measured values");

        let fetched = try_join_all(ids.into_iter().map(|id| fetch_value(pool, id))).await?;
        for (entity_id, values) in fetched {
            attach_raw(site, entity_id, self.name(), serde_json::to_value(values)?);
        }
        Ok(())
    }

    fn post_process(&self, site: &mut Site) -> Result<()> {
        let mut groups = Vec::new();

        for dataset in &site.datasets {
            if !covers_dataset(self, dataset) {
                continue;
            }

            let method_name = site
                .lookup_tables
                .methods
                .get(&dataset.method_id)
                .map(|m| m.method_name.clone())
                .unwrap_or_else(|| "Measured value".to_string());

            let mut values = Vec::new();
            for entity in site.analysis_entities() {
                if entity.dataset_id != dataset.dataset_id {
                    continue;
                }
                let Some(raw) = raw_rows(&entity.raw, self.name()) else {
                    continue;
                };
                let measured: Vec<f64> = serde_json::from_value(raw.clone())?;
                for value in measured {
                    values.push(DataGroupValue {
                        analysis_entity_id: entity.analysis_entity_id,
                        key: method_name.clone(),
                        value: Some(value.to_string()),
                        value_type: ValueType::Simple,
                        data: None,
                    });
                }
            }

            if !values.is_empty() {
                groups.push(DataGroup {
                    data_group_id: format!("measured_values-{}", dataset.dataset_id),
                    dataset_id: dataset.dataset_id,
                    method_ids: vec![dataset.method_id],
                    name: dataset.dataset_name.clone(),
                    values,
                });
            }
        }

        site.data_groups.extend(groups);
        Ok(())
    }
}

async fn fetch_value(pool: &SqlitePool, entity_id: i32) -> Result<(i32, Vec<f64>)> {
    let rows = sqlx::query(
        r#"
        SELECT measured_value
        FROM measured_values
        WHERE analysis_entity_id = ?
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok((
        entity_id,
        rows.into_iter().map(|row| row.get("measured_value")).collect(),
    ))
}
