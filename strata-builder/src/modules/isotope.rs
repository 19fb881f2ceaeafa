//! Isotope enrichment
//!
//! Isotope measurements per analysis entity, with a follow-up unit fetch
//! for units not yet in the site lookup tables.

use super::{attach_raw, covers_dataset, matching_entity_ids, raw_rows, EnrichmentModule};
use crate::db::datasets::fetch_unit;
use crate::models::{DataGroup, DataGroupValue, Site, ValueType};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use strata_common::Result;
use tracing::debug;

// Membership is maintained here until a methods registry exists; see
// DESIGN.md.
const METHOD_IDS: &[i32] = &[175];
const METHOD_GROUP_IDS: &[i32] = &[];

pub struct IsotopeModule;

#[derive(Debug, Serialize, Deserialize)]
struct IsotopeRow {
    isotope_type: String,
    isotope_value: f64,
    unit_id: Option<i32>,
}

#[async_trait::async_trait]
impl EnrichmentModule for IsotopeModule {
    fn name(&self) -> &'static str {
        "isotope"
    }

    fn method_ids(&self) -> &[i32] {
        METHOD_IDS
    }

    fn method_group_ids(&self) -> &[i32] {
        METHOD_GROUP_IDS
    }

    async fn fetch(&self, pool: &SqlitePool, site: &mut Site) -> Result<()> {
        let ids = matching_entity_ids(site, self);
        debug!(site_id = site.site_id, entities = ids.len(), "Fetching isotope values");

        let fetched = try_join_all(ids.into_iter().map(|id| fetch_isotopes(pool, id))).await?;

        let unit_ids: BTreeSet<i32> = fetched
            .iter()
            .flat_map(|(_, rows)| rows.iter().filter_map(|r| r.unit_id))
            .filter(|id| !site.lookup_tables.has_unit(*id))
            .collect();
        let units = try_join_all(unit_ids.into_iter().map(|id| fetch_unit(pool, id))).await?;
        for unit in units.into_iter().flatten() {
            site.lookup_tables.add_unit(unit);
        }

        for (entity_id, rows) in fetched {
            attach_raw(site, entity_id, self.name(), serde_json::to_value(rows)?);
        }
        Ok(())
    }

    fn post_process(&self, site: &mut Site) -> Result<()> {
        let mut groups = Vec::new();

        for dataset in &site.datasets {
            if !covers_dataset(self, dataset) {
                continue;
            }

            let mut values = Vec::new();
            for entity in site.analysis_entities() {
                if entity.dataset_id != dataset.dataset_id {
                    continue;
                }
                let Some(raw) = raw_rows(&entity.raw, self.name()) else {
                    continue;
                };
                let rows: Vec<IsotopeRow> = serde_json::from_value(raw.clone())?;
                for row in rows {
                    values.push(DataGroupValue {
                        analysis_entity_id: entity.analysis_entity_id,
                        key: row.isotope_type.clone(),
                        value: Some(row.isotope_value.to_string()),
                        value_type: ValueType::Simple,
                        data: row.unit_id.map(|id| serde_json::json!({ "unit_id": id })),
                    });
                }
            }

            if !values.is_empty() {
                groups.push(DataGroup {
                    data_group_id: format!("isotope-{}", dataset.dataset_id),
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

async fn fetch_isotopes(pool: &SqlitePool, entity_id: i32) -> Result<(i32, Vec<IsotopeRow>)> {
    let rows = sqlx::query(
        r#"
        SELECT isotope_type, isotope_value, unit_id
        FROM isotope_values
        WHERE analysis_entity_id = ?
        ORDER BY isotope_id
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok((
        entity_id,
        rows.into_iter()
            .map(|row| IsotopeRow {
                isotope_type: row.get("isotope_type"),
                isotope_value: row.get("isotope_value"),
                unit_id: row.get("unit_id"),
            })
            .collect(),
    ))
}
